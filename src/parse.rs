//! Análisis sintáctico del flujo de instrucciones.
//!
//! El parser agrupa secuencias de instrucciones `+ - < >` idénticas y
//! contiguas en una sola instrucción con conteo, y empareja cada `]`
//! con el `[` abierto más interno. Cada ciclo recibe una etiqueta
//! única en orden de aparición de su `[`.
//!
//! Dos instrucciones iguales separadas por cualquier otro carácter,
//! incluso uno ignorado, forman secuencias distintas.

use std::fmt::{self, Display};
use thiserror::Error;

use crate::{
    machine::Op,
    source::{Located, Location},
};

/// Error de emparejamiento de ciclos.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Found `]` without a matching `[`")]
    UnmatchedClose,

    #[error("Loop opened here is never closed")]
    UnclosedLoop,
}

/// Etiqueta de un ciclo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Label(pub u32);

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{:04x}", self.0)
    }
}

/// Instrucción agrupada.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Right(u32),
    Left(u32),
    Inc(u32),
    Dec(u32),
    Read,
    Write,
    BeginLoop(Label),
    EndLoop(Label),
}

/// Programa listo para generación de código.
#[derive(Debug)]
pub struct Program {
    commands: Vec<Located<Command>>,
    loops: u32,
}

impl Program {
    pub fn commands(&self) -> &[Located<Command>] {
        &self.commands
    }

    /// Cantidad de ciclos, que es también la cantidad de etiquetas.
    pub fn loops(&self) -> u32 {
        self.loops
    }
}

/// Construye un programa, acumulando todos los errores de emparejamiento.
pub fn parse<I>(tokens: I) -> Result<Program, Vec<Located<ParserError>>>
where
    I: IntoIterator<Item = Located<Op>>,
{
    let mut tokens = tokens.into_iter().peekable();
    let mut commands = Vec::new();
    let mut errors = Vec::new();
    let mut open: Vec<(Label, Location)> = Vec::new();
    let mut next_label = 0;

    while let Some(token) = tokens.next() {
        let (location, op) = token.split();

        let command = match op {
            Op::Read => Command::Read,
            Op::Write => Command::Write,

            Op::Begin => {
                let label = Label(next_label);
                next_label += 1;

                open.push((label, location.clone()));
                Command::BeginLoop(label)
            }

            Op::End => match open.pop() {
                Some((label, _)) => Command::EndLoop(label),
                None => {
                    errors.push(Located::at(ParserError::UnmatchedClose, location));
                    continue;
                }
            },

            Op::Right | Op::Left | Op::Inc | Op::Dec => {
                let mut count = 1;
                let mut last = location.clone();

                while let Some(next) = tokens.peek() {
                    let adjacent = next.location().start().offset() == last.end().offset();
                    if *next.val() != op || !adjacent {
                        break;
                    }

                    last = next.location().clone();
                    count += 1;
                    tokens.next();
                }

                let command = match op {
                    Op::Right => Command::Right(count),
                    Op::Left => Command::Left(count),
                    Op::Inc => Command::Inc(count),
                    _ => Command::Dec(count),
                };

                commands.push(Located::at(command, Location::span(&location, &last)));
                continue;
            }
        };

        commands.push(Located::at(command, location));
    }

    errors.extend(
        open.into_iter()
            .map(|(_, location)| Located::at(ParserError::UnclosedLoop, location)),
    );

    if errors.is_empty() {
        Ok(Program {
            commands,
            loops: next_label,
        })
    } else {
        Err(errors)
    }
}
