//! Análisis léxico del flujo de instrucciones.
//!
//! El vocabulario de la máquina de cinta consiste de ocho caracteres
//! (ver [`Op`]). Cualquier otro carácter es un comentario y se descarta
//! sin error. Cada instrucción reconocida conserva su ubicación en el
//! archivo original, lo cual permite señalar errores de fases posteriores
//! y distinguir instrucciones adyacentes de instrucciones separadas por
//! comentarios.

use crate::{
    machine::Op,
    source::{Located, Location, Source},
};

use std::rc::Rc;

/// Iterador de instrucciones ubicadas.
pub struct Lexer<S: Iterator<Item = (char, Location)>> {
    source: S,
}

impl<S: Iterator<Item = (char, Location)>> Lexer<S> {
    pub fn new(source: S) -> Self {
        Lexer { source }
    }
}

impl<S: Iterator<Item = (char, Location)>> Iterator for Lexer<S> {
    type Item = Located<Op>;

    fn next(&mut self) -> Option<Self::Item> {
        self.source
            .by_ref()
            .find_map(|(c, location)| Op::from_char(c).map(|op| Located::at(op, location)))
    }
}

/// Extrae todas las instrucciones de un archivo fuente.
pub fn tokenize(source: &Rc<Source>) -> Vec<Located<Op>> {
    Lexer::new(source.chars()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_ignored() {
        let source = Source::new("test.bf", "+a-\n[x]");
        let ops: Vec<_> = tokenize(&source)
            .into_iter()
            .map(Located::into_inner)
            .collect();

        assert_eq!(ops, [Op::Inc, Op::Dec, Op::Begin, Op::End]);
    }

    #[test]
    fn locations_are_preserved() {
        let source = Source::new("test.bf", "ab\n c.");
        let tokens = tokenize(&source);
        assert_eq!(tokens.len(), 1);

        let start = tokens[0].location().start();
        assert_eq!((start.line(), start.column()), (2, 3));
        assert_eq!(start.offset(), 5);
    }
}
