//! Generación de código ensamblador.
//!
//! La traducción es directa: cada instrucción agrupada se reemplaza por
//! el fragmento correspondiente de la arquitectura, y el programa
//! completo se envuelve en el prólogo y el epílogo. Por omisión una
//! secuencia de `n` instrucciones repetidas produce `n` fragmentos; con
//! [`EmitOptions::RUN_LENGTH`] se emite una única suma o resta con
//! inmediato.

use crate::{
    arch::{Arch, Immediate},
    parse::{Command, Program},
};

use bitflags::bitflags;
use std::io::{self, Write};

bitflags! {
    /// Opciones de emisión.
    pub struct EmitOptions: u32 {
        /// Colapsar secuencias de `+ - < >` en una instrucción con inmediato.
        ///
        /// Los conteos de celda se truncan a un byte, lo cual preserva la
        /// aritmética módulo 256 de las celdas. Los desplazamientos de
        /// cursor mayores a 255 se parten en varias instrucciones.
        const RUN_LENGTH = 0x01;
    }
}

/// Emite el programa completo para una arquitectura.
pub fn emit<W: Write>(
    program: &Program,
    arch: Arch,
    options: EmitOptions,
    output: &mut W,
) -> io::Result<()> {
    let fragments = arch.fragments();
    let run_length = options.contains(EmitOptions::RUN_LENGTH);

    emit!(output, fragments.program_start)?;

    for command in program.commands() {
        match *command.val() {
            Command::Read => emit!(output, fragments.read_char)?,
            Command::Write => emit!(output, fragments.write_char)?,

            Command::BeginLoop(label) => {
                let [first, second, third] = fragments.begin_while;
                emit!(output, first, "{}", label)?;
                emit!(output, second, "{}", label)?;
                emit!(output, third)?;
            }

            Command::EndLoop(label) => {
                let [first, second, third] = fragments.end_while;
                emit!(output, first, "{}", label)?;
                emit!(output, second, "{}", label)?;
                emit!(output, third)?;
            }

            Command::Inc(count) if run_length => {
                immediate(output, fragments.dp_inc_by, count % 0x100)?
            }

            Command::Dec(count) if run_length => {
                immediate(output, fragments.dp_dec_by, count % 0x100)?
            }

            Command::Right(count) if run_length => shift(output, fragments.dp_right_by, count)?,
            Command::Left(count) if run_length => shift(output, fragments.dp_left_by, count)?,

            Command::Inc(count) => repeat(output, fragments.dp_inc, count)?,
            Command::Dec(count) => repeat(output, fragments.dp_dec, count)?,
            Command::Right(count) => repeat(output, fragments.dp_right, count)?,
            Command::Left(count) => repeat(output, fragments.dp_left, count)?,
        }
    }

    emit!(output, fragments.program_end)
}

fn immediate<W: Write>(output: &mut W, (prefix, suffix): Immediate, value: u32) -> io::Result<()> {
    emit!(output, prefix, "{:02x}{}", value, suffix)
}

fn shift<W: Write>(output: &mut W, fragment: Immediate, count: u32) -> io::Result<()> {
    let mut left = count;
    while left > 0 {
        let step = left.min(0xff);
        immediate(output, fragment, step)?;
        left -= step;
    }

    Ok(())
}

fn repeat<W: Write>(output: &mut W, fragment: &str, count: u32) -> io::Result<()> {
    for _ in 0..count {
        emit!(output, fragment)?;
    }

    Ok(())
}
