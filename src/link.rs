//! Construcción de ejecutables.
//!
//! El código ensamblador emitido no depende de ninguna biblioteca:
//! define su propio `_start` y se comunica con el sistema operativo
//! mediante llamadas al sistema. Por tanto basta ensamblarlo y
//! enlazarlo con `-nostdlib`.

use std::{
    io::BufWriter,
    path::Path,
    process::{Child, ChildStdin, Command, ExitStatus, Stdio},
};

use crate::arch::Arch;
use bitflags::bitflags;
use log::debug;
use thiserror::Error;

bitflags! {
    /// Opciones a aplicar durante el enlazado.
    pub struct LinkOptions: u32 {
        /// Remover símbolos del ejecutable final.
        const STRIP = 0x01;
    }
}

/// Un error de ensamblado o enlazado.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LinkerError {
    /// Ocurrió un evento de error de E/S durante la invocación
    /// de comandos externos.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// El enlazador inició su ejecución, pero falló en enlazar.
    #[error("Linker exited with status code {0:?}")]
    Failed(ExitStatus),
}

/// Instancia del enlazador para un ejecutable definido.
///
/// Las operaciones de ensamblado y enlazado se delegan a `gcc`.
pub struct Linker {
    child: Child,
    stdin: BufWriter<ChildStdin>,
}

impl Linker {
    /// Inicia una instancia del enlazador.
    ///
    /// El enlazador tratará de emitir un ejecutable y escribirlo a
    /// la ruta indicada por `output`.
    pub fn spawn<O>(arch: Arch, output: &O, opts: LinkOptions) -> Result<Self, LinkerError>
    where
        O: AsRef<Path>,
    {
        // El ensamblador se recibe por pipe en stdin
        let mut command = Command::new("gcc");
        command
            .args(arch_args(arch))
            .arg("-nostdlib")
            .arg("-o")
            .arg(output.as_ref())
            .args(&["-x", "assembler", "-"])
            .stdin(Stdio::piped());

        if opts.contains(LinkOptions::STRIP) {
            command.arg("-s");
        }

        debug!("Spawning linker: {:?}", command);

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "linker stdin is closed")
        })?;

        Ok(Linker {
            child,
            stdin: BufWriter::new(stdin),
        })
    }

    /// Obtiene la entrada estándar del proceso que espera recibir ensamblador.
    pub fn stdin(&mut self) -> &mut BufWriter<ChildStdin> {
        &mut self.stdin
    }

    /// Indica el fin del flujo de código y finaliza el enlazado.
    pub fn finish(mut self) -> Result<(), LinkerError> {
        self.stdin.into_inner().map_err(|error| error.into_error())?;

        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(LinkerError::Failed(status))
        }
    }
}

fn arch_args(arch: Arch) -> &'static [&'static str] {
    match arch {
        Arch::X86_64 => &[],
        Arch::Ia32 => &["-m32"],
    }
}
