//! Intérprete de referencia de la máquina de cinta.
//!
//! Las celdas son bytes con aritmética modular. Al agotarse la entrada,
//! `,` deja la celda intacta.

#![allow(dead_code)]

use abfc::{
    driver::Compiler,
    ir::MacroTable,
};

/// Estado final de una ejecución.
pub struct Run {
    pub output: Vec<u8>,
    pub tape: Vec<u8>,
    pub cursor: usize,
}

impl Run {
    pub fn output_str(&self) -> &str {
        std::str::from_utf8(&self.output).unwrap()
    }
}

const TAPE_SIZE: usize = 30000;
const STEP_LIMIT: u64 = 1_000_000_000;

pub fn run(code: &str, input: &[u8]) -> Run {
    let code: Vec<u8> = code.bytes().filter(|b| b"<>+-[].,".contains(b)).collect();
    let jumps = jumps(&code);

    let mut tape = vec![0u8; TAPE_SIZE];
    let mut output = Vec::new();
    let mut input = input.iter();
    let mut cursor = 0usize;
    let mut pc = 0usize;
    let mut steps = 0u64;

    while pc < code.len() {
        steps += 1;
        assert!(steps < STEP_LIMIT, "program did not halt");

        match code[pc] {
            b'>' => cursor += 1,
            b'<' => cursor = cursor.checked_sub(1).expect("cursor moved below zero"),
            b'+' => tape[cursor] = tape[cursor].wrapping_add(1),
            b'-' => tape[cursor] = tape[cursor].wrapping_sub(1),
            b'.' => output.push(tape[cursor]),
            b',' => {
                if let Some(&byte) = input.next() {
                    tape[cursor] = byte;
                }
            }
            b'[' if tape[cursor] == 0 => pc = jumps[pc],
            b']' if tape[cursor] != 0 => pc = jumps[pc],
            _ => (),
        }

        pc += 1;
    }

    Run {
        output,
        tape,
        cursor,
    }
}

fn jumps(code: &[u8]) -> Vec<usize> {
    let mut jumps = vec![0; code.len()];
    let mut open = Vec::new();

    for (index, &byte) in code.iter().enumerate() {
        match byte {
            b'[' => open.push(index),
            b']' => {
                let start = open.pop().expect("unmatched ]");
                jumps[start] = index;
                jumps[index] = start;
            }
            _ => (),
        }
    }

    assert!(open.is_empty(), "unclosed [");
    jumps
}

/// Compila `main` y lo ejecuta con la entrada dada.
pub fn compile_and_run(table: &MacroTable, input: &[u8]) -> Run {
    let instructions = Compiler::default().compile(table, "main").unwrap();
    run(instructions.as_str(), input)
}
