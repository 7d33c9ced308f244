//! Simulación de la máquina de cinta en tiempo de compilación.
//!
//! La máquina objetivo tiene un único cursor móvil sobre una cinta
//! de celdas de un byte y ocho instrucciones ([`Op`]). Durante la
//! compilación se lleva cuenta de la posición del cursor y de la
//! base del frame activo para traducir direcciones relativas en
//! movimientos, y se verifican dos invariantes:
//!
//! - El cursor nunca sale de `[0, tape_size)`.
//! - Al cerrar un ciclo, el cursor está en el mismo desplazamiento
//!   relativo al frame que al abrirlo. Un ciclo cuyo cuerpo desplaza
//!   al cursor no tiene una posición de salida conocida en tiempo de
//!   compilación, por lo cual se rechaza.

use crate::{error::CompileError, ir::StackAddress};

use std::fmt::{self, Display};

/// Instrucción de la máquina de cinta.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    /// `<`
    Left,
    /// `>`
    Right,
    /// `+`
    Inc,
    /// `-`
    Dec,
    /// `[`
    Begin,
    /// `]`
    End,
    /// `,`
    Read,
    /// `.`
    Write,
}

impl Op {
    pub fn from_char(c: char) -> Option<Op> {
        use Op::*;

        let op = match c {
            '<' => Left,
            '>' => Right,
            '+' => Inc,
            '-' => Dec,
            '[' => Begin,
            ']' => End,
            ',' => Read,
            '.' => Write,
            _ => return None,
        };

        Some(op)
    }

    pub fn as_char(self) -> char {
        use Op::*;

        match self {
            Left => '<',
            Right => '>',
            Inc => '+',
            Dec => '-',
            Begin => '[',
            End => ']',
            Read => ',',
            Write => '.',
        }
    }
}

impl Display for Op {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.as_char())
    }
}

/// Estado simulado de la máquina y código emitido hasta el momento.
pub struct Machine {
    tape_size: usize,
    cursor: i64,
    base: i64,
    code: String,

    /// Desplazamiento relativo esperado al cerrar cada ciclo abierto.
    loops: Vec<i64>,
}

impl Machine {
    pub fn new(tape_size: usize) -> Self {
        Machine {
            tape_size,
            cursor: 0,
            base: 0,
            code: String::new(),
            loops: Vec::new(),
        }
    }

    pub fn tape_size(&self) -> usize {
        self.tape_size
    }

    /// Posición absoluta del cursor.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Base absoluta del frame activo.
    pub fn base(&self) -> i64 {
        self.base
    }

    /// Posición del cursor relativa al frame activo.
    pub fn relative(&self) -> i64 {
        self.cursor - self.base
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn open_loops(&self) -> usize {
        self.loops.len()
    }

    /// Verifica que una posición absoluta pertenezca a la cinta.
    pub fn check(&self, position: i64) -> Result<(), CompileError> {
        if (0..self.tape_size as i64).contains(&position) {
            Ok(())
        } else {
            Err(CompileError::OutOfRange {
                position,
                tape_size: self.tape_size,
            })
        }
    }

    /// Verifica que una dirección del frame activo pertenezca a la cinta.
    pub fn check_address(&self, StackAddress(offset): StackAddress) -> Result<(), CompileError> {
        self.check(self.base + offset)
    }

    /// Mueve el cursor por un desplazamiento con signo.
    pub fn shift(&mut self, offset: i64) -> Result<(), CompileError> {
        let target = self.cursor + offset;
        self.check(target)?;

        let (op, count) = if offset < 0 {
            (Op::Left, -offset)
        } else {
            (Op::Right, offset)
        };

        self.run(op, count as usize);
        self.cursor = target;
        Ok(())
    }

    /// Mueve el cursor a una dirección relativa al frame activo.
    pub fn move_to(&mut self, StackAddress(offset): StackAddress) -> Result<(), CompileError> {
        self.shift(self.base + offset - self.cursor)
    }

    /// Incrementa la celda bajo el cursor `count` veces.
    pub fn inc(&mut self, count: usize) {
        self.run(Op::Inc, count);
    }

    /// Decrementa la celda bajo el cursor `count` veces.
    pub fn dec(&mut self, count: usize) {
        self.run(Op::Dec, count);
    }

    pub fn begin_loop(&mut self) {
        self.code.push(Op::Begin.as_char());
        self.loops.push(self.relative());
    }

    pub fn end_loop(&mut self) -> Result<(), CompileError> {
        let expected = self.loops.pop().ok_or(CompileError::UnmatchedLoopEnd)?;
        let found = self.relative();
        if expected != found {
            return Err(CompileError::LoopImbalance { expected, found });
        }

        self.code.push(Op::End.as_char());
        Ok(())
    }

    pub fn read(&mut self) {
        self.code.push(Op::Read.as_char());
    }

    pub fn write(&mut self) {
        self.code.push(Op::Write.as_char());
    }

    /// Emite un fragmento de instrucciones literal.
    ///
    /// El fragmento se valida completo antes de emitir cualquier cosa, y
    /// luego se reproduce instrucción por instrucción, de manera que los
    /// invariantes de cursor y de ciclos se siguen verificando.
    pub fn raw(&mut self, fragment: &str) -> Result<(), CompileError> {
        let ops = fragment
            .chars()
            .map(|c| Op::from_char(c).ok_or(CompileError::BadInstruction(c)))
            .collect::<Result<Vec<_>, _>>()?;

        for op in ops {
            self.step(op)?;
        }

        Ok(())
    }

    /// Ejecuta simbólicamente una única instrucción.
    pub fn step(&mut self, op: Op) -> Result<(), CompileError> {
        match op {
            Op::Left => return self.shift(-1),
            Op::Right => return self.shift(1),
            Op::End => return self.end_loop(),
            Op::Inc => self.inc(1),
            Op::Dec => self.dec(1),
            Op::Begin => self.begin_loop(),
            Op::Read => self.read(),
            Op::Write => self.write(),
        }

        Ok(())
    }

    /// Desplaza la base del frame. No emite código.
    pub fn rebase(&mut self, delta: i64) -> Result<(), CompileError> {
        let base = self.base + delta;
        if base < 0 || base > self.tape_size as i64 {
            return Err(CompileError::OutOfRange {
                position: base,
                tape_size: self.tape_size,
            });
        }

        self.base = base;
        Ok(())
    }

    /// Concluye la emisión, fallando si quedaron ciclos abiertos.
    pub fn finish(self, line_width: usize) -> Result<Instructions, CompileError> {
        if !self.loops.is_empty() {
            return Err(CompileError::UnclosedLoop(self.loops.len()));
        }

        Ok(Instructions {
            code: self.code,
            line_width,
        })
    }

    fn run(&mut self, op: Op, count: usize) {
        self.code.extend(std::iter::repeat(op.as_char()).take(count));
    }
}

/// Flujo de instrucciones final.
///
/// Al mostrarse se parte en líneas de ancho fijo, lo cual es puramente
/// cosmético para el backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instructions {
    code: String,
    line_width: usize,
}

impl Instructions {
    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn into_string(self) -> String {
        self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Líneas de a lo sumo `line_width` instrucciones.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        let width = self.line_width.max(1);
        // Todas las instrucciones son ASCII, cualquier índice es frontera de carácter
        (0..self.code.len())
            .step_by(width)
            .map(move |start| &self.code[start..(start + width).min(self.code.len())])
    }
}

impl Display for Instructions {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(fmt, "{}", line)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_are_collapsed_into_runs() {
        let mut machine = Machine::new(100);
        machine.move_to(StackAddress(3)).unwrap();
        machine.inc(2);
        machine.move_to(StackAddress(1)).unwrap();
        machine.dec(0);
        machine.write();

        assert_eq!(machine.code(), ">>>++<<.");
        assert_eq!(machine.cursor(), 1);
    }

    #[test]
    fn cursor_stays_on_tape() {
        let mut machine = Machine::new(4);
        assert!(matches!(
            machine.shift(-1),
            Err(CompileError::OutOfRange { position: -1, .. })
        ));

        assert!(machine.move_to(StackAddress(3)).is_ok());
        assert!(machine.move_to(StackAddress(4)).is_err());
        assert!(machine.check_address(StackAddress(3)).is_ok());
    }

    #[test]
    fn loops_must_be_position_neutral() {
        let mut machine = Machine::new(10);
        machine.begin_loop();
        machine.dec(1);
        machine.end_loop().unwrap();

        machine.begin_loop();
        machine.shift(1).unwrap();
        assert!(matches!(
            machine.end_loop(),
            Err(CompileError::LoopImbalance {
                expected: 0,
                found: 1
            })
        ));

        assert!(matches!(
            Machine::new(1).end_loop(),
            Err(CompileError::UnmatchedLoopEnd)
        ));
    }

    #[test]
    fn loop_offsets_are_frame_relative() {
        let mut machine = Machine::new(10);
        machine.begin_loop();
        machine.rebase(2).unwrap();
        machine.move_to(StackAddress(0)).unwrap();
        machine.end_loop().unwrap();
        assert_eq!(machine.cursor(), 2);
    }

    #[test]
    fn raw_fragments_are_validated_before_emission() {
        let mut machine = Machine::new(10);
        assert!(matches!(
            machine.raw("+x-"),
            Err(CompileError::BadInstruction('x'))
        ));
        assert_eq!(machine.code(), "");

        machine.raw("[-]>+<").unwrap();
        assert_eq!(machine.code(), "[-]>+<");
        assert!(machine.raw("[>]").is_err());
    }

    #[test]
    fn unclosed_loops_fail_to_finish() {
        let mut machine = Machine::new(10);
        machine.begin_loop();
        assert!(matches!(
            machine.finish(70),
            Err(CompileError::UnclosedLoop(1))
        ));
    }

    #[test]
    fn output_is_wrapped() {
        let mut machine = Machine::new(10);
        machine.inc(5);
        let instructions = machine.finish(2).unwrap();

        assert_eq!(instructions.as_str(), "+++++");
        assert_eq!(instructions.to_string(), "++\n++\n+\n");
        assert_eq!(Op::from_char('?'), None);
    }
}
