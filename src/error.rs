//! Errores y su presentación.
//!
//! El compilador de macros detiene la compilación ante el primer
//! error que encuentra, por lo cual todas sus fases comparten una
//! única taxonomía: [`CompileError`]. El backend, por su parte,
//! produce errores ubicados en el flujo de instrucciones original
//! ([`Located`]), los cuales se acumulan y se reportan juntos por
//! medio de [`Diagnostics`].

use crate::{
    ir::{StackAddress, Symbol, Tag},
    source::{Located, Location},
};

use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

/// Error de compilación de macros.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CompileError {
    /// Búsqueda de un nombre que no existe en toda la cadena de ámbitos.
    #[error("Name `{0}` is not bound in any enclosing scope")]
    UnboundName(Symbol),

    /// Un nombre se declaró dos veces en un mismo ámbito.
    #[error("Name `{0}` is already declared in this scope")]
    DuplicateDeclaration(Symbol),

    /// Asignación a un nombre que no fue declarado en el ámbito actual.
    #[error("Name `{0}` was not declared in the current scope")]
    Undeclared(Symbol),

    #[error("Name `{0}` is declared but has no value yet")]
    Unset(Symbol),

    #[error("Scope end without a matching scope begin")]
    UnbalancedScope,

    #[error("Call to undefined macro `{0}`")]
    UnknownMacro(String),

    #[error("Macro `{0}` is defined more than once")]
    DuplicateMacro(String),

    #[error("`{name}` expects {expected} argument(s), found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Dos operandos de un built-in que deben ser celdas distintas coinciden.
    #[error("Operands of `{builtin}` must be distinct cells, `{address}` appears twice")]
    Aliasing {
        builtin: &'static str,
        address: StackAddress,
    },

    /// El cuerpo de un ciclo no devuelve el cursor a su posición de entrada.
    #[error("Loop body is not position-neutral: opened at frame offset {expected}, closed at {found}")]
    LoopImbalance { expected: i64, found: i64 },

    #[error("Loop end without a matching loop begin")]
    UnmatchedLoopEnd,

    #[error("{0} loop(s) left open at the end of the program")]
    UnclosedLoop(usize),

    /// El cursor o una asignación de celda sale de la cinta.
    #[error("Tape position {position} is outside of [0, {tape_size})")]
    OutOfRange { position: i64, tape_size: usize },

    /// Una etiqueta o nombre de built-in sin manejador.
    #[error("No handler for operation `{0}`")]
    UnknownOperation(String),

    #[error("Cell `{0}` is not allocated")]
    DoubleFree(StackAddress),

    /// Construcción de un nodo con una cantidad incorrecta de hijos.
    #[error("`{tag}` takes {expected} children, found {found}")]
    BadArity {
        tag: Tag,
        expected: usize,
        found: usize,
    },

    /// Un patrón que captura el mismo nombre más de una vez.
    #[error("Pattern binds `{0}` more than once")]
    DuplicateBinding(&'static str),

    /// Una acción consulta una captura ausente o de otra forma.
    #[error("Pattern variable `{name}` is not bound to a {expected}")]
    MissingCapture {
        name: String,
        expected: &'static str,
    },

    /// Un operando de tipo inesperado.
    #[error("Expected {expected}, found `{found}`")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("Bad character {0:?} in instruction fragment")]
    BadInstruction(char),

    #[error("Count must not be negative, found {0}")]
    NegativeCount(i64),

    #[error("Character {0:?} does not fit in a tape cell")]
    NonByteChar(char),

    /// Se excedió el límite de rondas de reescritura.
    #[error("{stage} of macro `{name}` did not reach a fixed point after {rounds} rounds")]
    RewriteLimit {
        stage: &'static str,
        name: String,
        rounds: usize,
    },
}

/// Un error listo para presentarse al usuario.
struct Entry {
    message: String,
    location: Option<Location>,
}

/// Colección de errores con formato para terminal.
pub struct Diagnostics {
    kind: &'static str,
    entries: Vec<Entry>,
}

impl Diagnostics {
    /// Cambia la clase de error que se muestra como prefijo.
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            entries: Vec::new(),
        }
    }
}

impl From<CompileError> for Diagnostics {
    fn from(error: CompileError) -> Self {
        Diagnostics {
            entries: vec![Entry {
                message: error.to_string(),
                location: None,
            }],
            ..Default::default()
        }
    }
}

impl<E: Error> From<Located<E>> for Diagnostics {
    fn from(error: Located<E>) -> Self {
        Diagnostics::from(vec![error])
    }
}

impl<E: Error> From<Vec<Located<E>>> for Diagnostics {
    fn from(errors: Vec<Located<E>>) -> Self {
        let entries = errors
            .into_iter()
            .map(|error| {
                let (location, error) = error.split();
                Entry {
                    message: error.to_string(),
                    location: Some(location),
                }
            })
            .collect();

        Diagnostics {
            entries,
            ..Default::default()
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for Entry { message, location } in &self.entries {
            writeln!(fmt, "{}: {}", self.kind, message)?;
            if let Some(location) = location {
                excerpt(fmt, location)?;
            }

            writeln!(fmt)?;
        }

        let count = self.entries.len();
        let noun = if count == 1 { "error" } else { "errors" };
        writeln!(fmt, "Build failed with {} {}", count, noun)
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, fmt)
    }
}

impl Error for Diagnostics {}

/// Muestra la línea de código fuente señalada, subrayando la columna.
fn excerpt(fmt: &mut fmt::Formatter<'_>, location: &Location) -> fmt::Result {
    let start = location.start();
    writeln!(fmt, " --> {}", location)?;

    let gutter = start.line().to_string().len();
    writeln!(fmt, "{:gutter$} |", "", gutter = gutter)?;

    if let Some(line) = location.source().line(start.line()) {
        // Los tabuladores se reducen a un espacio para que el subrayado coincida
        let line = line.replace('\t', " ");
        writeln!(fmt, "{:>gutter$} | {}", start.line(), line, gutter = gutter)?;

        let skip = start.column().saturating_sub(1) as usize;
        let width = location.width().max(1);
        writeln!(
            fmt,
            "{:gutter$} | {:skip$}{:^<width$}",
            "",
            "",
            "",
            gutter = gutter,
            skip = skip,
            width = width
        )?;
    }

    Ok(())
}
