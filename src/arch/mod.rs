//! Detalles específicos para cada arquitectura objetivo.
//!
//! Cada arquitectura se describe por completo mediante una tabla de
//! fragmentos de ensamblador GNU ([`Fragments`]), uno por instrucción
//! de la máquina de cinta más un prólogo y un epílogo de programa.
//! Tanto el backend en [`target::emit()`](crate::target::emit) como el traductor
//! autoalojado en [`selfhost`](crate::selfhost) emiten exactamente
//! estos fragmentos.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;
use unicase::Ascii as NoCase;

mod ia32;
mod x86_64;

/// Arquitectura de procesador (ISA).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Ia32,
}

impl Arch {
    pub const ALL: &'static [Arch] = &[Arch::X86_64, Arch::Ia32];

    /// Nombre canónico, tal como se acepta en la línea de comandos.
    pub fn name(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86-64",
            Arch::Ia32 => "ia32",
        }
    }

    pub fn fragments(self) -> &'static Fragments {
        match self {
            Arch::X86_64 => &x86_64::FRAGMENTS,
            Arch::Ia32 => &ia32::FRAGMENTS,
        }
    }
}

impl Display for Arch {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

/// Nombre de arquitectura desconocido.
#[derive(Error, Debug)]
#[error("Unknown architecture `{0}`")]
pub struct UnknownArch(String);

impl FromStr for Arch {
    type Err = UnknownArch;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let name = NoCase::new(string);
        let arch = if name == NoCase::new("x86-64") || name == NoCase::new("x86_64") {
            Arch::X86_64
        } else if name == NoCase::new("ia32") || name == NoCase::new("i386") {
            Arch::Ia32
        } else {
            return Err(UnknownArch(string.to_owned()));
        };

        Ok(arch)
    }
}

/// Prefijo y sufijo alrededor de un inmediato hexadecimal de dos dígitos.
pub type Immediate = (&'static str, &'static str);

/// Fragmentos de código de una arquitectura.
///
/// Los ciclos se parten en tres fragmentos: entre el primero y el
/// segundo, y entre el segundo y el tercero, se inserta el número de
/// etiqueta del ciclo en cuatro dígitos hexadecimales.
pub struct Fragments {
    pub program_start: &'static str,
    pub program_end: &'static str,
    pub read_char: &'static str,
    pub write_char: &'static str,
    pub dp_left: &'static str,
    pub dp_right: &'static str,
    pub dp_inc: &'static str,
    pub dp_dec: &'static str,
    pub begin_while: [&'static str; 3],
    pub end_while: [&'static str; 3],

    // Variantes para secuencias de instrucciones repetidas
    pub dp_left_by: Immediate,
    pub dp_right_by: Immediate,
    pub dp_inc_by: Immediate,
    pub dp_dec_by: Immediate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!("X86-64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("x86_64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("IA32".parse::<Arch>().unwrap(), Arch::Ia32);
        assert!("arm".parse::<Arch>().is_err());

        for &arch in Arch::ALL {
            assert_eq!(arch.name().parse::<Arch>().unwrap(), arch);
        }
    }

    #[test]
    fn fragments_are_complete() {
        for &arch in Arch::ALL {
            let fragments = arch.fragments();
            assert!(fragments.program_start.contains("_start"));
            assert_eq!(fragments.begin_while[2], ":");
            assert!(fragments.dp_inc_by.0.ends_with("$0x"));
            assert!(fragments.program_start.is_ascii());
        }
    }
}
