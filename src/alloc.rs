//! Asignación de celdas locales.
//!
//! Las celdas se identifican por su desplazamiento respecto a la base
//! del frame activo. Como el redimensionamiento del frame reubica los
//! valores sin alterar sus desplazamientos, el asignador no necesita
//! conocer la base.

use crate::{error::CompileError, ir::StackAddress};

use std::collections::BTreeSet;

#[derive(Clone, Debug, Default)]
pub struct Allocator {
    occupied: BTreeSet<i64>,
}

impl Allocator {
    pub fn new() -> Self {
        Default::default()
    }

    /// Ocupa y retorna el menor desplazamiento no negativo libre.
    pub fn allocate(&mut self) -> StackAddress {
        let offset = (0..)
            .find(|offset| !self.occupied.contains(offset))
            .unwrap_or_default();

        self.occupied.insert(offset);
        StackAddress(offset)
    }

    /// Libera una celda ocupada.
    pub fn free(&mut self, address: StackAddress) -> Result<(), CompileError> {
        if self.occupied.remove(&address.0) {
            Ok(())
        } else {
            Err(CompileError::DoubleFree(address))
        }
    }

    /// Marca una celda como ocupada sin asignarla.
    ///
    /// Retorna `false` si ya estaba ocupada.
    pub fn reserve(&mut self, address: StackAddress) -> bool {
        self.occupied.insert(address.0)
    }

    pub fn is_occupied(&self, address: StackAddress) -> bool {
        self.occupied.contains(&address.0)
    }

    /// Celdas ocupadas en orden ascendente.
    pub fn occupied(&self) -> Vec<StackAddress> {
        self.occupied.iter().copied().map(StackAddress).collect()
    }

    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_free_offset() {
        let mut cells = Allocator::new();
        assert_eq!(cells.allocate(), StackAddress(0));
        assert_eq!(cells.allocate(), StackAddress(1));
        assert_eq!(cells.allocate(), StackAddress(2));

        cells.free(StackAddress(1)).unwrap();
        assert_eq!(cells.allocate(), StackAddress(1));
        assert_eq!(cells.allocate(), StackAddress(3));
    }

    #[test]
    fn double_free_fails() {
        let mut cells = Allocator::new();
        let cell = cells.allocate();
        cells.free(cell).unwrap();

        assert!(matches!(
            cells.free(cell),
            Err(CompileError::DoubleFree(StackAddress(0)))
        ));

        assert!(cells.free(StackAddress(-2)).is_err());
    }

    #[test]
    fn occupied_is_ascending() {
        let mut cells = Allocator::new();
        for _ in 0..4 {
            cells.allocate();
        }

        cells.free(StackAddress(2)).unwrap();
        assert_eq!(
            cells.occupied(),
            vec![StackAddress(0), StackAddress(1), StackAddress(3)]
        );
        assert!(!cells.is_occupied(StackAddress(2)));
        assert_eq!(cells.len(), 3);
    }
}
