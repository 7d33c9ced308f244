//! Biblioteca de macros integradas.
//!
//! Cada built-in opera exclusivamente sobre la máquina de cinta y el
//! asignador de celdas, agrupados en [`Tape`]. Los operandos llegan ya
//! evaluados: direcciones de celda relativas al frame o constantes.
//!
//! Las restricciones de aliasing se verifican antes de emitir cualquier
//! instrucción de la sentencia, de modo que una invocación inválida no
//! deja código parcial.

use crate::{
    alloc::Allocator,
    error::CompileError,
    ir::{Atom, StackAddress},
    machine::{Instructions, Machine},
};

use std::collections::HashMap;

builtins! {
    Clear => "clear" (dst),
    DestructiveAdd => "destructive_add" (src, dst),
    DestructiveSub => "destructive_sub" (src, dst),
    Move => "move" (src, dst),
    Copy => "copy" (src, dst),
    StackAdd => "stack_add" (src, dst),
    StackSub => "stack_sub" (src, dst),
    ConstantAdd => "constant_add" (constant, dst),
    ConstantSub => "constant_sub" (constant, dst),
    AsLogical => "as_logical" (src, dst),
    LogicalNot => "logical_not" (src, dst),
    LogicalAnd => "logical_and" (src_a, src_b, dst),
    LogicalOr => "logical_or" (src_a, src_b, dst),
    GetChar => "get_char" (dst),
    PutChar => "put_char" (src),
    PutStringConstant => "put_string_constant" (string),
    BeginLoop => "begin_loop" (src),
    EndLoop => "end_loop" (src),
    GrowStack => "grow_stack" (size),
    ShrinkStack => "shrink_stack" (size),
}

impl Builtin {
    pub fn arity(self) -> usize {
        self.params().len()
    }

    /// Ejecuta el built-in sobre operandos ya evaluados.
    pub fn invoke(self, tape: &mut Tape, args: &[Atom]) -> Result<(), CompileError> {
        use Builtin::*;

        if args.len() != self.arity() {
            return Err(CompileError::ArityMismatch {
                name: self.name().to_owned(),
                expected: self.arity(),
                found: args.len(),
            });
        }

        let cell = |index: usize| address(&args[index]);
        let constant = |index: usize| integer(&args[index]);

        match self {
            Clear => tape.clear(cell(0)?),
            DestructiveAdd => tape.destructive_add(cell(0)?, cell(1)?),
            DestructiveSub => tape.destructive_sub(cell(0)?, cell(1)?),
            Move => tape.move_cell(cell(0)?, cell(1)?),
            Copy => tape.copy(cell(0)?, cell(1)?),
            StackAdd => tape.stack_add(cell(0)?, cell(1)?),
            StackSub => tape.stack_sub(cell(0)?, cell(1)?),
            ConstantAdd => tape.constant_add(constant(0)?, cell(1)?),
            ConstantSub => tape.constant_sub(constant(0)?, cell(1)?),
            AsLogical => tape.as_logical(cell(0)?, cell(1)?),
            LogicalNot => tape.logical_not(cell(0)?, cell(1)?),
            LogicalAnd => tape.logical_and(cell(0)?, cell(1)?, cell(2)?),
            LogicalOr => tape.logical_or(cell(0)?, cell(1)?, cell(2)?),
            GetChar => tape.get_char(cell(0)?),
            PutChar => tape.put_char(cell(0)?),
            PutStringConstant => tape.put_string_constant(string(&args[0])?),
            BeginLoop => tape.begin_loop(cell(0)?),
            EndLoop => tape.end_loop(cell(0)?),
            GrowStack => tape.grow_stack(constant(0)?),
            ShrinkStack => tape.shrink_stack(constant(0)?),
        }
    }
}

/// Registro explícito de built-ins, indexado por nombre.
#[derive(Clone, Debug)]
pub struct Builtins {
    table: HashMap<&'static str, Builtin>,
}

impl Builtins {
    /// Registro con la biblioteca completa.
    pub fn standard() -> Self {
        let table = Builtin::ALL
            .iter()
            .map(|&builtin| (builtin.name(), builtin))
            .collect();

        Builtins { table }
    }

    pub fn lookup(&self, name: &str) -> Option<Builtin> {
        self.table.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Builtins::standard()
    }
}

/// Máquina de cinta junto con la ocupación de celdas del frame.
pub struct Tape {
    machine: Machine,
    cells: Allocator,
}

impl Tape {
    pub fn new(tape_size: usize) -> Self {
        Tape {
            machine: Machine::new(tape_size),
            cells: Allocator::new(),
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn cells(&self) -> &Allocator {
        &self.cells
    }

    /// Asigna una celda, verificando que quepa en la cinta.
    pub fn allocate(&mut self) -> Result<StackAddress, CompileError> {
        let address = self.cells.allocate();
        if let Err(error) = self.machine.check_address(address) {
            self.cells.free(address)?;
            return Err(error);
        }

        Ok(address)
    }

    pub fn free(&mut self, address: StackAddress) -> Result<(), CompileError> {
        self.cells.free(address)
    }

    pub fn finish(self, line_width: usize) -> Result<Instructions, CompileError> {
        self.machine.finish(line_width)
    }

    pub fn clear(&mut self, dst: StackAddress) -> Result<(), CompileError> {
        self.machine.move_to(dst)?;
        self.machine.raw("[-]")
    }

    pub fn destructive_add(
        &mut self,
        src: StackAddress,
        dst: StackAddress,
    ) -> Result<(), CompileError> {
        distinct("destructive_add", &[src, dst])?;
        self.transfer(src, &[dst], true)
    }

    pub fn destructive_sub(
        &mut self,
        src: StackAddress,
        dst: StackAddress,
    ) -> Result<(), CompileError> {
        distinct("destructive_sub", &[src, dst])?;
        self.transfer(src, &[dst], false)
    }

    pub fn move_cell(&mut self, src: StackAddress, dst: StackAddress) -> Result<(), CompileError> {
        distinct("move", &[src, dst])?;
        self.clear(dst)?;
        self.destructive_add(src, dst)
    }

    pub fn copy(&mut self, src: StackAddress, dst: StackAddress) -> Result<(), CompileError> {
        distinct("copy", &[src, dst])?;
        self.with_temp("copy", &[src, dst], |tape, tmp| {
            tape.clear(dst)?;
            tape.clear(tmp)?;
            tape.transfer(src, &[dst, tmp], true)?;
            tape.destructive_add(tmp, src)
        })
    }

    pub fn stack_add(&mut self, src: StackAddress, dst: StackAddress) -> Result<(), CompileError> {
        self.with_temp("stack_add", &[src, dst], |tape, tmp| {
            tape.copy(src, tmp)?;
            tape.destructive_add(tmp, dst)
        })
    }

    pub fn stack_sub(&mut self, src: StackAddress, dst: StackAddress) -> Result<(), CompileError> {
        self.with_temp("stack_sub", &[src, dst], |tape, tmp| {
            tape.copy(src, tmp)?;
            tape.destructive_sub(tmp, dst)
        })
    }

    pub fn constant_add(&mut self, constant: i64, dst: StackAddress) -> Result<(), CompileError> {
        let count = count(constant)?;
        self.machine.move_to(dst)?;
        self.machine.inc(count);
        Ok(())
    }

    pub fn constant_sub(&mut self, constant: i64, dst: StackAddress) -> Result<(), CompileError> {
        let count = count(constant)?;
        self.machine.move_to(dst)?;
        self.machine.dec(count);
        Ok(())
    }

    /// `dst := (src != 0) ? 1 : 0`
    pub fn as_logical(&mut self, src: StackAddress, dst: StackAddress) -> Result<(), CompileError> {
        distinct("as_logical", &[src, dst])?;
        self.with_temp("as_logical", &[src, dst], |tape, tmp| {
            tape.copy(src, tmp)?;
            tape.clear(dst)?;
            tape.machine.move_to(tmp)?;
            tape.machine.begin_loop();
            tape.machine.move_to(dst)?;
            tape.machine.inc(1);
            tape.clear(tmp)?;
            tape.machine.end_loop()
        })
    }

    /// `dst := (src == 0) ? 1 : 0`
    pub fn logical_not(&mut self, src: StackAddress, dst: StackAddress) -> Result<(), CompileError> {
        distinct("logical_not", &[src, dst])?;
        self.with_temp("logical_not", &[src, dst], |tape, tmp| {
            tape.copy(src, tmp)?;
            tape.clear(dst)?;
            tape.machine.inc(1);
            tape.machine.move_to(tmp)?;
            tape.machine.begin_loop();
            tape.machine.move_to(dst)?;
            tape.machine.dec(1);
            tape.clear(tmp)?;
            tape.machine.end_loop()
        })
    }

    /// `dst := !(!a + !b)`
    pub fn logical_and(
        &mut self,
        a: StackAddress,
        b: StackAddress,
        dst: StackAddress,
    ) -> Result<(), CompileError> {
        distinct("logical_and", &[a, dst])?;
        distinct("logical_and", &[b, dst])?;
        self.with_temp("logical_and", &[a, b, dst], |tape, tmp| {
            tape.clear(dst)?;
            tape.logical_not(a, tmp)?;
            tape.stack_add(tmp, dst)?;
            tape.logical_not(b, tmp)?;
            tape.stack_add(tmp, dst)?;
            tape.logical_not(dst, tmp)?;
            tape.move_cell(tmp, dst)
        })
    }

    /// `dst := !!(!!a + !!b)`
    pub fn logical_or(
        &mut self,
        a: StackAddress,
        b: StackAddress,
        dst: StackAddress,
    ) -> Result<(), CompileError> {
        distinct("logical_or", &[a, dst])?;
        distinct("logical_or", &[b, dst])?;
        self.with_temp("logical_or", &[a, b, dst], |tape, tmp| {
            tape.clear(dst)?;
            tape.as_logical(a, tmp)?;
            tape.stack_add(tmp, dst)?;
            tape.as_logical(b, tmp)?;
            tape.stack_add(tmp, dst)?;
            tape.as_logical(dst, tmp)?;
            tape.move_cell(tmp, dst)
        })
    }

    pub fn get_char(&mut self, dst: StackAddress) -> Result<(), CompileError> {
        self.machine.move_to(dst)?;
        self.machine.read();
        Ok(())
    }

    pub fn put_char(&mut self, src: StackAddress) -> Result<(), CompileError> {
        self.machine.move_to(src)?;
        self.machine.write();
        Ok(())
    }

    /// Escribe una cadena conocida en tiempo de compilación.
    ///
    /// Entre caracteres consecutivos se emite solo la diferencia de
    /// códigos sobre una celda temporal.
    pub fn put_string_constant(&mut self, string: &str) -> Result<(), CompileError> {
        let codes = string
            .chars()
            .map(|c| u8::try_from(c).map_err(|_| CompileError::NonByteChar(c)))
            .collect::<Result<Vec<_>, _>>()?;

        self.with_temp("put_string_constant", &[], |tape, tmp| {
            tape.clear(tmp)?;

            let mut current = 0;
            for code in codes {
                let delta = i64::from(code) - current;
                if delta >= 0 {
                    tape.machine.inc(delta as usize);
                } else {
                    tape.machine.dec(-delta as usize);
                }

                tape.machine.write();
                current = i64::from(code);
            }

            Ok(())
        })
    }

    pub fn begin_loop(&mut self, src: StackAddress) -> Result<(), CompileError> {
        self.machine.move_to(src)?;
        self.machine.begin_loop();
        Ok(())
    }

    pub fn end_loop(&mut self, src: StackAddress) -> Result<(), CompileError> {
        self.machine.move_to(src)?;
        self.machine.end_loop()
    }

    /// Agranda el frame activo en `size` celdas, desplazando su base.
    ///
    /// Los valores de las celdas ocupadas se conservan en sus mismos
    /// desplazamientos relativos, y las celdas que quedan debajo de la
    /// nueva base se limpian.
    pub fn grow_stack(&mut self, size: i64) -> Result<(), CompileError> {
        let size = count(size)? as i64;
        if size == 0 {
            return Ok(());
        }

        for StackAddress(offset) in self.cells.occupied().into_iter().rev() {
            self.move_cell(StackAddress(offset), StackAddress(offset + size))?;
        }

        for offset in 0..size {
            self.clear(StackAddress(offset))?;
        }

        self.machine.rebase(size)
    }

    /// Inverso de [`Tape::grow_stack()`].
    pub fn shrink_stack(&mut self, size: i64) -> Result<(), CompileError> {
        let size = count(size)? as i64;
        if size == 0 {
            return Ok(());
        }

        for StackAddress(offset) in self.cells.occupied() {
            self.move_cell(StackAddress(offset), StackAddress(offset - size))?;
        }

        self.machine.rebase(-size)
    }

    /// Vacía `src` sumando (o restando) su valor en cada destino.
    fn transfer(
        &mut self,
        src: StackAddress,
        targets: &[StackAddress],
        add: bool,
    ) -> Result<(), CompileError> {
        self.machine.move_to(src)?;
        self.machine.begin_loop();
        self.machine.dec(1);

        for &target in targets {
            self.machine.move_to(target)?;
            if add {
                self.machine.inc(1);
            } else {
                self.machine.dec(1);
            }
        }

        self.machine.move_to(src)?;
        self.machine.end_loop()
    }

    /// Ejecuta `body` con una celda temporal distinta de cada operando.
    ///
    /// Los operandos que no estaban asignados quedan reservados durante
    /// `body`, de manera que los temporales anidados tampoco los pisan.
    fn with_temp<F>(
        &mut self,
        builtin: &'static str,
        operands: &[StackAddress],
        body: F,
    ) -> Result<(), CompileError>
    where
        F: FnOnce(&mut Tape, StackAddress) -> Result<(), CompileError>,
    {
        let tmp = self.allocate()?;
        if operands.contains(&tmp) {
            self.free(tmp)?;
            return Err(CompileError::Aliasing {
                builtin,
                address: tmp,
            });
        }

        let reserved: Vec<_> = operands
            .iter()
            .copied()
            .filter(|&operand| self.cells.reserve(operand))
            .collect();

        let result = body(self, tmp);
        for address in reserved.into_iter().chain(Some(tmp)) {
            self.free(address)?;
        }

        result
    }
}

/// Falla si dos operandos coinciden.
fn distinct(builtin: &'static str, cells: &[StackAddress]) -> Result<(), CompileError> {
    for (index, &address) in cells.iter().enumerate() {
        if cells[..index].contains(&address) {
            return Err(CompileError::Aliasing { builtin, address });
        }
    }

    Ok(())
}

fn count(value: i64) -> Result<usize, CompileError> {
    usize::try_from(value).map_err(|_| CompileError::NegativeCount(value))
}

fn address(atom: &Atom) -> Result<StackAddress, CompileError> {
    match atom {
        Atom::Address(address) => Ok(*address),
        other => Err(mismatch("stack address", other)),
    }
}

fn integer(atom: &Atom) -> Result<i64, CompileError> {
    match atom {
        Atom::Int(value) => Ok(*value),
        other => Err(mismatch("integer constant", other)),
    }
}

fn string(atom: &Atom) -> Result<&str, CompileError> {
    match atom {
        Atom::Str(string) => Ok(string),
        other => Err(mismatch("string constant", other)),
    }
}

fn mismatch(expected: &'static str, found: &Atom) -> CompileError {
    CompileError::TypeMismatch {
        expected,
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tape_with(cells: usize) -> (Tape, Vec<StackAddress>) {
        let mut tape = Tape::new(100);
        let cells = (0..cells).map(|_| tape.allocate().unwrap()).collect();
        (tape, cells)
    }

    #[test]
    fn registry_knows_every_builtin() {
        let builtins = Builtins::standard();
        assert_eq!(builtins.len(), Builtin::ALL.len());
        assert_eq!(builtins.lookup("move"), Some(Builtin::Move));
        assert_eq!(builtins.lookup("logical_and").map(Builtin::arity), Some(3));
        assert!(!builtins.contains("nope"));
    }

    #[test]
    fn clear_is_a_decrement_loop() {
        let (mut tape, cells) = tape_with(2);
        tape.clear(cells[1]).unwrap();
        assert_eq!(tape.machine().code(), ">[-]");
    }

    #[test]
    fn string_constants_emit_deltas() {
        let mut tape = Tape::new(100);
        tape.put_string_constant("AB").unwrap();

        let expected = format!("[-]{}.+.", "+".repeat(65));
        assert_eq!(tape.machine().code(), expected);
        assert!(tape.cells().is_empty());

        let mut tape = Tape::new(100);
        tape.put_string_constant("ba").unwrap();
        assert!(tape.machine().code().ends_with(".-."));
    }

    #[test]
    fn aliased_operands_emit_nothing() {
        let (mut tape, cells) = tape_with(1);
        let error = tape.destructive_add(cells[0], cells[0]).unwrap_err();
        assert!(matches!(
            error,
            CompileError::Aliasing {
                builtin: "destructive_add",
                ..
            }
        ));

        assert!(tape.copy(cells[0], cells[0]).is_err());
        assert!(tape.move_cell(cells[0], cells[0]).is_err());
        assert!(tape.as_logical(cells[0], cells[0]).is_err());
        assert!(tape.logical_and(cells[0], cells[0], cells[0]).is_err());
        assert_eq!(tape.machine().code(), "");

        // Los temporales se liberan aun ante un error
        assert_eq!(tape.cells().len(), 1);
    }

    #[test]
    fn temporaries_never_alias_explicit_addresses() {
        let (mut tape, cells) = tape_with(1);
        let next = StackAddress(1);

        let error = tape.stack_add(cells[0], next).unwrap_err();
        assert!(matches!(
            error,
            CompileError::Aliasing {
                builtin: "stack_add",
                address: StackAddress(1),
            }
        ));

        assert!(tape.stack_sub(cells[0], next).is_err());
        assert!(tape.logical_or(cells[0], next, StackAddress(2)).is_err());
        assert!(tape.logical_and(cells[0], next, StackAddress(2)).is_err());
        assert_eq!(tape.machine().code(), "");
        assert_eq!(tape.cells().occupied(), cells);

        tape.stack_add(cells[0], StackAddress(2)).unwrap();
        assert_eq!(tape.cells().occupied(), cells);

        let (mut tape, cells) = tape_with(1);
        tape.stack_add(cells[0], cells[0]).unwrap();
        assert_eq!(tape.cells().len(), 1);
    }

    #[test]
    fn copy_preserves_source_position() {
        let (mut tape, cells) = tape_with(2);
        tape.copy(cells[0], cells[1]).unwrap();
        assert_eq!(tape.machine().open_loops(), 0);
        assert_eq!(tape.cells().len(), 2);
    }

    #[test]
    fn negative_counts_are_rejected() {
        let (mut tape, cells) = tape_with(1);
        assert!(matches!(
            tape.constant_add(-1, cells[0]),
            Err(CompileError::NegativeCount(-1))
        ));
        assert!(tape.grow_stack(-2).is_err());
    }

    #[test]
    fn grow_and_shrink_restore_the_base() {
        let (mut tape, _) = tape_with(1);
        tape.grow_stack(2).unwrap();
        assert_eq!(tape.machine().base(), 2);

        tape.shrink_stack(2).unwrap();
        assert_eq!(tape.machine().base(), 0);
        assert_eq!(tape.machine().open_loops(), 0);
    }

    #[test]
    fn operands_are_type_checked() {
        let mut tape = Tape::new(10);
        let error = Builtin::Clear
            .invoke(&mut tape, &[Atom::Int(3)])
            .unwrap_err();
        assert!(matches!(error, CompileError::TypeMismatch { .. }));

        let error = Builtin::Clear.invoke(&mut tape, &[]).unwrap_err();
        assert!(matches!(
            error,
            CompileError::ArityMismatch {
                expected: 1,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn allocation_is_bounded_by_the_tape() {
        let mut tape = Tape::new(1);
        tape.allocate().unwrap();
        assert!(matches!(
            tape.allocate(),
            Err(CompileError::OutOfRange { position: 1, .. })
        ));
        assert_eq!(tape.cells().len(), 1);
    }
}
