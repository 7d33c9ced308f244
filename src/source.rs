//! Rastreo de ubicaciones en el flujo de instrucciones.
//!
//! El backend lee flujos de instrucciones escritos a mano o emitidos
//! por el compilador de macros. Cada carácter se asocia a una
//! posición línea-columna para que los errores de emparejamiento de
//! ciclos puedan señalarse con exactitud.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

/// Un archivo de entrada completo, junto con el nombre que lo identifica.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    pub fn new<N, T>(name: N, text: T) -> Rc<Self>
    where
        N: Into<String>,
        T: Into<String>,
    {
        Rc::new(Source {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Nombre del origen, usualmente una ruta o `<stdin>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Obtiene una línea por número, a partir de 1.
    pub fn line(&self, number: u32) -> Option<&str> {
        let index = (number as usize).checked_sub(1)?;
        self.text.lines().nth(index)
    }

    /// Itera sobre cada carácter con su ubicación.
    pub fn chars(self: &Rc<Self>) -> impl Iterator<Item = (char, Location)> + '_ {
        let mut position = Position::default();

        self.text.chars().map(move |c| {
            let location = Location {
                from: Rc::clone(self),
                position: position..position.advance(),
            };

            position = if c == '\n' {
                position.newline()
            } else {
                position.advance()
            };

            (c, location)
        })
    }
}

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    pub fn val(&self) -> &T {
        &self.value
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Un origen y un rango semiabierto de posiciones dentro de él.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Une dos ubicaciones del mismo origen.
    pub fn span(from: &Location, to: &Location) -> Self {
        Location {
            from: Rc::clone(&from.from),
            position: from.position.start..to.position.end,
        }
    }

    pub fn source(&self) -> &Source {
        &self.from
    }

    pub fn start(&self) -> Position {
        self.position.start
    }

    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Cantidad de caracteres que abarca la ubicación.
    pub fn width(&self) -> usize {
        self.position.end.offset - self.position.start.offset
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.from.name, self.position.start)
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, formatter)
    }
}

/// Una posición línea-columna, con su desplazamiento absoluto en caracteres.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
    offset: usize,
}

impl Position {
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Índice del carácter desde el inicio del origen.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn advance(self) -> Position {
        Position {
            column: self.column + 1,
            offset: self.offset + 1,
            ..self
        }
    }

    fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
            offset: self.offset + 1,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_follow_lines_and_columns() {
        let source = Source::new("<test>", "ab\ncd");
        let positions: Vec<_> = source
            .chars()
            .map(|(c, location)| (c, location.start().line(), location.start().column()))
            .collect();

        assert_eq!(
            positions,
            vec![('a', 1, 1), ('b', 1, 2), ('\n', 1, 3), ('c', 2, 1), ('d', 2, 2)]
        );
    }

    #[test]
    fn offsets_are_contiguous() {
        let source = Source::new("<test>", "x\ny");
        let offsets: Vec<_> = source.chars().map(|(_, l)| l.start().offset()).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(source.line(2), Some("y"));
        assert_eq!(source.line(0), None);
    }
}
