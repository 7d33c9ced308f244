//! Compilador de macros para una máquina de cinta de ocho instrucciones.
//!
//! # Compilador de macros
//! Un programa se escribe como un conjunto de macros armadas con los
//! constructores de [`sugar`] y registradas en una [`ir::MacroTable`].
//! Cada cuerpo de macro es un árbol etiquetado que se transforma por
//! reescritura de términos ([`pattern`]): primero se desazucaran las
//! construcciones de alto nivel (`local`, `if`, `while`) y luego se
//! hace inlining de cada llamada, en [`expand`]. El cuerpo resultante
//! consiste solo de primitivas de entorno ([`env`]), de asignación de
//! celdas ([`alloc`]) y de llamadas a la biblioteca integrada
//! ([`builtins`]), las cuales se evalúan en [`driver`] sobre una
//! simulación en tiempo de compilación de la máquina objetivo
//! ([`machine`]). La salida es un flujo de instrucciones de la máquina.
//!
//! # Back end
//! El flujo de instrucciones se traduce a ensamblador GNU. Primero se
//! extraen las instrucciones del archivo fuente en [`lex`], luego se
//! agrupan y se emparejan los ciclos en [`parse`], y finalmente se
//! emiten fragmentos por arquitectura en [`target`]. El ensamblado y
//! enlazado se delegan a `gcc` en [`link`].
//!
//! El mismo traductor está escrito también en el lenguaje de macros,
//! en [`selfhost`].

#[macro_use]
mod macros;

pub mod alloc;
pub mod builtins;
pub mod driver;
pub mod env;
pub mod error;
pub mod expand;
pub mod ir;
pub mod lex;
pub mod link;
pub mod machine;
pub mod parse;
pub mod pattern;
pub mod selfhost;
pub mod source;
pub mod sugar;

mod arch;
mod codegen;

/// Emisión de código.
///
/// Este módulo reexporta suficientes ítems internos relacionados a generación de código para
/// traducir un flujo de instrucciones a alguna arquitectura en específico.
pub mod target {
    pub use crate::arch::{Arch, Fragments, Immediate, UnknownArch};
    pub use crate::codegen::{emit, EmitOptions};
}
