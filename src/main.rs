//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{anyhow, bail, Context};
use clap::{self, crate_version, Arg, ArgMatches, Command};

use abfc::{
    driver::{Compiler, Options},
    error::Diagnostics,
    lex, parse,
    link::{LinkOptions, Linker},
    selfhost,
    source::Source,
    target::{self, Arch, EmitOptions},
};

use std::{
    fs::{self, File},
    io::{self, Read, Write},
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let target = Arg::new("target")
        .short('t')
        .long("target")
        .value_name("ARCH")
        .takes_value(true)
        .default_value("x86-64")
        .help("Target architecture (x86-64, ia32)");

    let output = Arg::new("output")
        .short('o')
        .takes_value(true)
        .required(true)
        .value_name("FILE")
        .help("Output file ('-' for stdout where allowed)");

    // Parsing de CLI
    let args = Command::new("abfc")
        .version(crate_version!())
        .about("Macro compiler and assembler backend for an eight-instruction tape machine")
        .subcommand_required(true)
        .subcommand(
            Command::new("asm")
                .about("Translate an instruction stream to assembly or an executable")
                .arg(target.clone())
                .arg(
                    Arg::new("asm")
                        .short('S')
                        .help("Generate assembly instead of linking"),
                )
                .arg(Arg::new("strip").short('s').help("Strip executables"))
                .arg(
                    Arg::new("run-length")
                        .short('r')
                        .long("run-length")
                        .help("Collapse repeated instructions into immediates"),
                )
                .arg(output.clone())
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_name("INPUT")
                        .help("Instruction stream ('-' for stdin)"),
                ),
        )
        .subcommand(
            Command::new("bootstrap")
                .about("Compile the self-hosted translator to an instruction stream")
                .arg(target)
                .arg(output),
        )
        .get_matches();

    match args.subcommand() {
        Some(("asm", args)) => asm(args),
        Some(("bootstrap", args)) => bootstrap(args),
        _ => unreachable!("clap requires a subcommand"),
    }
}

fn arch(args: &ArgMatches) -> anyhow::Result<Arch> {
    let name = args.value_of("target").unwrap_or("x86-64");
    Ok(name.parse()?)
}

fn asm(args: &ArgMatches) -> anyhow::Result<()> {
    let arch = arch(args)?;
    let output = args.value_of("output").context("Missing output")?;
    let input = args.value_of("input").context("Missing input")?;

    let text = if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;
        text
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read: {}", input))?
    };

    let name = if input == "-" { "<stdin>" } else { input };
    let source = Source::new(name, text);
    let program = parse::parse(lex::tokenize(&source)).map_err(|errors| report(errors.into()))?;

    let mut options = EmitOptions::empty();
    if args.is_present("run-length") {
        options |= EmitOptions::RUN_LENGTH;
    }

    match (args.is_present("asm"), output) {
        // Salida a stdout sin enlazado
        (true, "-") => {
            let mut stdout = io::stdout();
            target::emit(&program, arch, options, &mut stdout)
                .context("Failed to emit to stdout")?;
        }

        // Salida a archivo sin enlazado
        (true, path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            target::emit(&program, arch, options, &mut file)
                .with_context(|| format!("Failed to emit to file: {}", path))?;
        }

        // Salida a stdout con enlazado
        (false, "-") => bail!("Refusing to write executable to stdout"),

        // Salida a archivo con enlazado
        (false, path) => {
            let mut link_options = LinkOptions::empty();
            if args.is_present("strip") {
                link_options |= LinkOptions::STRIP;
            }

            let mut linker = Linker::spawn(arch, &path, link_options).context("Failed to link")?;
            target::emit(&program, arch, options, linker.stdin())
                .context("Failed to emit assembly to assembler")?;

            linker
                .finish()
                .with_context(|| format!("Failed to generate executable: {}", path))?;
        }
    };

    Ok(())
}

fn bootstrap(args: &ArgMatches) -> anyhow::Result<()> {
    let arch = arch(args)?;
    let output = args.value_of("output").context("Missing output")?;

    let instructions = selfhost::translator(arch)
        .and_then(|table| Compiler::new(Options::default()).compile(&table, "main"))
        .map_err(|error| report(Diagnostics::from(error).kind("compile error")))?;

    if output == "-" {
        write!(io::stdout(), "{}", instructions).context("Failed to write to stdout")?;
    } else {
        let mut file = File::create(output)
            .with_context(|| format!("Failed to open for writing: {}", output))?;

        write!(file, "{}", instructions)
            .with_context(|| format!("Failed to write to file: {}", output))?;
    }

    Ok(())
}

/// Muestra los diagnósticos en stderr.
///
/// Los diagnósticos guardan referencias compartidas al código fuente,
/// por lo cual no pueden viajar dentro de un `anyhow::Error`.
fn report(diagnostics: Diagnostics) -> anyhow::Error {
    eprint!("{}", diagnostics);
    anyhow!("Aborting due to previous errors")
}
