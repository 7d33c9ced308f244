//! Entornos léxicos.
//!
//! Los ámbitos forman una cadena en la que cada uno conoce a su padre.
//! Como varios sitios de llamada expandidos pueden necesitar hijos
//! distintos de un mismo ancestro, los ámbitos se guardan en una arena
//! y se enlazan por índice en vez de por ownership anidado.
//!
//! Solo se abren hijos del ámbito activo y solo se cierra el ámbito
//! activo, por lo cual la arena contiene exactamente la cadena viva:
//! cerrar un ámbito descarta su registro y un hijo posterior reutiliza
//! el mismo espacio.
//!
//! El ámbito raíz se comporta como el entorno base: las constantes y
//! las direcciones explícitas se evalúan a sí mismas en cualquier
//! búsqueda que llegue hasta él.

use crate::{
    error::CompileError,
    ir::{Atom, StackAddress, Symbol},
};

use std::collections::HashMap;

/// Identificador de un ámbito dentro de la arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

struct Scope {
    parent: Option<ScopeId>,
    bound: HashMap<Symbol, Option<Atom>>,

    /// Celdas a liberar al salir del ámbito, en este orden.
    release: Vec<StackAddress>,
}

impl Scope {
    fn child_of(parent: Option<ScopeId>) -> Self {
        Scope {
            parent,
            bound: HashMap::new(),
            release: Vec::new(),
        }
    }
}

/// Arena de ámbitos con un ámbito activo.
pub struct Scopes {
    arena: Vec<Scope>,
    current: ScopeId,
}

impl Default for Scopes {
    fn default() -> Self {
        Scopes {
            arena: vec![Scope::child_of(None)],
            current: ScopeId(0),
        }
    }
}

impl Scopes {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Cantidad de ámbitos abiertos por encima de la raíz.
    pub fn depth(&self) -> usize {
        std::iter::successors(Some(self.current), |&id| self.scope(id).parent).count() - 1
    }

    /// Cantidad de registros en la arena, incluyendo la raíz.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    fn scope(&self, ScopeId(id): ScopeId) -> &Scope {
        &self.arena[id]
    }

    fn scope_mut(&mut self, ScopeId(id): ScopeId) -> &mut Scope {
        &mut self.arena[id]
    }

    /// Abre un ámbito hijo del actual y lo activa.
    pub fn open(&mut self) -> ScopeId {
        let id = ScopeId(self.arena.len());
        self.arena.push(Scope::child_of(Some(self.current)));
        self.current = id;
        id
    }

    /// Cierra el ámbito actual y retorna su lista de liberación.
    ///
    /// El llamador es responsable de liberar las celdas retornadas.
    pub fn close(&mut self) -> Result<Vec<StackAddress>, CompileError> {
        let parent = self
            .scope(self.current)
            .parent
            .ok_or(CompileError::UnbalancedScope)?;

        let scope = self.arena.pop().ok_or(CompileError::UnbalancedScope)?;
        debug_assert_eq!(self.arena.len(), self.current.0);
        self.current = parent;

        Ok(scope.release)
    }

    /// Introduce un nombre sin valor en el ámbito actual.
    pub fn declare(&mut self, name: Symbol) -> Result<(), CompileError> {
        let scope = self.scope_mut(self.current);
        if scope.bound.contains_key(&name) {
            return Err(CompileError::DuplicateDeclaration(name));
        }

        scope.bound.insert(name, None);
        Ok(())
    }

    /// Asigna un nombre declarado en el ámbito actual.
    pub fn set(&mut self, name: &Symbol, value: Atom) -> Result<(), CompileError> {
        match self.scope_mut(self.current).bound.get_mut(name) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }

            None => Err(CompileError::Undeclared(name.clone())),
        }
    }

    /// Busca un nombre desde el ámbito actual hacia la raíz.
    pub fn get(&self, name: &Symbol) -> Result<Atom, CompileError> {
        self.lookup_from(Some(self.current), name)
    }

    /// Busca un nombre a partir del padre del ámbito actual.
    ///
    /// Esto permite ligar un parámetro de macro al valor que tiene en
    /// el llamador un argumento del mismo nombre, sin capturarse a sí mismo.
    pub fn outer_get(&self, name: &Symbol) -> Result<Atom, CompileError> {
        let parent = self.scope(self.current).parent;
        if parent.is_none() {
            return Err(CompileError::UnboundName(name.clone()));
        }

        self.lookup_from(parent, name)
    }

    /// Evalúa un literal: los nombres se buscan, lo demás se evalúa a sí mismo.
    pub fn resolve(&self, atom: &Atom) -> Result<Atom, CompileError> {
        match atom {
            Atom::Name(name) => self.get(name),
            _ => Ok(atom.clone()),
        }
    }

    /// Como [`Scopes::resolve()`], pero a partir del ámbito padre.
    pub fn outer_resolve(&self, atom: &Atom) -> Result<Atom, CompileError> {
        match atom {
            Atom::Name(name) => self.outer_get(name),
            _ => Ok(atom.clone()),
        }
    }

    /// Agenda la liberación de una celda al cerrar el ámbito actual.
    pub fn release_on_exit(&mut self, address: StackAddress) {
        self.scope_mut(self.current).release.push(address);
    }

    fn lookup_from(&self, start: Option<ScopeId>, name: &Symbol) -> Result<Atom, CompileError> {
        let mut next = start;
        while let Some(id) = next {
            let scope = self.scope(id);
            match scope.bound.get(name) {
                Some(Some(value)) => return Ok(value.clone()),
                Some(None) => return Err(CompileError::Unset(name.clone())),
                None => next = scope.parent,
            }
        }

        Err(CompileError::UnboundName(name.clone()))
    }
}
