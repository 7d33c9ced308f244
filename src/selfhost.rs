//! Traductor autoalojado.
//!
//! Este módulo define, en el lenguaje de macros, un traductor completo
//! de flujos de instrucciones a ensamblador. Al compilarse produce un
//! programa para la máquina de cinta que lee un flujo de instrucciones
//! de su entrada y escribe en su salida exactamente el mismo texto que
//! [`emit()`](crate::target::emit) con
//! [`EmitOptions::RUN_LENGTH`](crate::target::EmitOptions::RUN_LENGTH).
//!
//! # Estado en la cinta
//! - Un contador de dos bytes numera las etiquetas de ciclo.
//! - La entrada se lee agrupada por secuencias: `n` repeticiones del
//!   carácter `c`, seguidas del carácter `c_next` ya leído. Un carácter
//!   nulo marca el fin de la entrada.
//! - Las etiquetas de los ciclos abiertos se apilan debajo del frame:
//!   cada `[` agranda el frame en dos celdas donde guarda su etiqueta,
//!   y cada `]` la lee de `stack[-2]` y `stack[-1]` antes de encogerlo.

use crate::{
    arch::{Arch, Fragments, Immediate},
    error::CompileError,
    ir::{Atom, MacroTable, Node},
    sugar::*,
};

/// Construye la tabla de macros del traductor. La entrada es `main`.
pub fn translator(arch: Arch) -> Result<MacroTable, CompileError> {
    let mut table = MacroTable::new();

    arithmetic(&mut table)?;
    output(&mut table)?;
    counter(&mut table)?;
    input(&mut table)?;

    table.define(
        "is_equal",
        &["const", "src", "dst"],
        vec![
            local("temp"),
            copy("src", "temp"),
            constant_sub("const", "temp"),
            logical_not("temp", "dst"),
        ],
    )?;

    table.define("main", &[], main(arch.fragments()))?;
    Ok(table)
}

fn arithmetic(table: &mut MacroTable) -> Result<(), CompileError> {
    // q := x / y, por restas sucesivas de y
    table.define(
        "div_q",
        &["x", "y", "q"],
        vec![
            local("r"),
            clear("q"),
            copy("x", "r"),
            local("t"),
            as_logical("r", "t"),
            while_(
                "t",
                vec![
                    local("i"),
                    copy("y", "i"),
                    local("t2"),
                    logical_and("i", "t", "t2"),
                    while_(
                        "t2",
                        vec![
                            constant_sub(1, "i"),
                            constant_sub(1, "r"),
                            as_logical("r", "t"),
                            logical_and("i", "t", "t2"),
                        ],
                    ),
                    local("t3"),
                    logical_not("i", "t3"),
                    if_("t3", vec![constant_add(1, "q")]),
                    // Si no se completó una resta, termina
                    local("t4"),
                    logical_not("t3", "t4"),
                    if_("t4", vec![clear("t")]),
                ],
            ),
        ],
    )?;

    // r := x - q * y
    table.define(
        "div_r",
        &["x", "y", "q", "r"],
        vec![
            copy("x", "r"),
            local("i"),
            copy("q", "i"),
            while_("i", vec![stack_sub("y", "r"), constant_sub(1, "i")]),
        ],
    )?;

    table.define(
        "div",
        &["x", "y", "q", "r"],
        vec![
            call("div_q", vec!["x".into(), "y".into(), "q".into()]),
            call("div_r", vec!["x".into(), "y".into(), "q".into(), "r".into()]),
        ],
    )?;

    Ok(())
}

fn output(table: &mut MacroTable) -> Result<(), CompileError> {
    // 0 <= x < 16
    table.define(
        "print_hex_digit",
        &["x"],
        vec![
            local("y"),
            clear("y"),
            constant_add(10, "y"),
            local("q"),
            local("r"),
            call("div", vec!["x".into(), "y".into(), "q".into(), "r".into()]),
            if_("q", vec![constant_add(chr('a'), "r")]),
            local("not_q"),
            logical_not("q", "not_q"),
            if_("not_q", vec![constant_add(chr('0'), "r")]),
            put_char("r"),
        ],
    )?;

    table.define(
        "print_hex_byte",
        &["x"],
        vec![
            local("y"),
            clear("y"),
            constant_add(16, "y"),
            local("q"),
            local("r"),
            call("div", vec!["x".into(), "y".into(), "q".into(), "r".into()]),
            call("print_hex_digit", vec!["q".into()]),
            call("print_hex_digit", vec!["r".into()]),
        ],
    )?;

    Ok(())
}

fn counter(table: &mut MacroTable) -> Result<(), CompileError> {
    table.define("counter_init", &["x0", "x1"], vec![clear("x0"), clear("x1")])?;

    table.define(
        "counter_inc",
        &["x0", "x1"],
        vec![
            constant_add(1, "x0"),
            local("test"),
            logical_not("x0", "test"),
            if_("test", vec![clear("x0"), constant_add(1, "x1")]),
        ],
    )?;

    table.define(
        "counter_print",
        &["x0", "x1"],
        vec![
            call("print_hex_byte", vec!["x1".into()]),
            call("print_hex_byte", vec!["x0".into()]),
        ],
    )?;

    Ok(())
}

/// Argumentos de estado de entrada, seguidos de otros adicionales.
fn input_args(extra: &[&str]) -> Vec<Atom> {
    ["input0", "input1", "input2"]
        .iter()
        .chain(extra)
        .map(|&name| name.into())
        .collect()
}

fn input(table: &mut MacroTable) -> Result<(), CompileError> {
    const STATE: [&str; 3] = ["n", "c", "c_next"];

    let with = |extra: &'static str| [STATE[0], STATE[1], STATE[2], extra];

    table.define(
        "input_init",
        &STATE,
        vec![
            clear("c"),
            clear("n"),
            clear("c_next"),
            get_char("c_next"),
            call("input_update", vec!["n".into(), "c".into(), "c_next".into()]),
        ],
    )?;

    // Acumula n mientras n sea cero o c_next coincida con c
    table.define(
        "input_update",
        &STATE,
        vec![
            local("n_is_zero"),
            logical_not("n", "n_is_zero"),
            local("not_match"),
            copy("c_next", "not_match"),
            stack_sub("c", "not_match"),
            local("match"),
            logical_not("not_match", "match"),
            local("merge_ok"),
            logical_or("n_is_zero", "match", "merge_ok"),
            while_(
                "merge_ok",
                vec![
                    copy("c_next", "c"),
                    constant_add(1, "n"),
                    clear("merge_ok"),
                    // Un c_next nulo es fin de entrada
                    if_(
                        "c_next",
                        vec![
                            clear("c_next"),
                            get_char("c_next"),
                            copy("c_next", "not_match"),
                            stack_sub("c", "not_match"),
                            logical_not("not_match", "merge_ok"),
                        ],
                    ),
                ],
            ),
        ],
    )?;

    table.define(
        "input_has_next",
        &with("result_has_next"),
        vec![copy("c", "result_has_next")],
    )?;

    table.define(
        "input_peek_char",
        &with("result_c"),
        vec![copy("c", "result_c")],
    )?;

    table.define("input_consume_char", &STATE, vec![constant_sub(1, "n")])?;

    table.define(
        "input_consume_run",
        &with("result_n"),
        vec![copy("n", "result_n"), clear("n")],
    )?;

    Ok(())
}

/// Rama de una instrucción repetible: consume la secuencia completa y
/// emite su longitud como inmediato.
fn run_branch(op: char, (prefix, suffix): Immediate) -> Vec<Node> {
    vec![
        call("is_equal", vec![chr(op), "c".into(), "match".into()]),
        if_(
            "match",
            vec![
                local("run_length"),
                call("input_consume_run", input_args(&["run_length"])),
                put_string_constant(string(prefix)),
                call("print_hex_byte", vec!["run_length".into()]),
                put_string_constant(string(suffix)),
                clear("no_match_found"),
            ],
        ),
    ]
}

/// Rama de una instrucción simple.
fn char_branch(op: char, fragment: &str) -> Vec<Node> {
    vec![
        call("is_equal", vec![chr(op), "c".into(), "match".into()]),
        if_(
            "match",
            vec![
                call("input_consume_char", input_args(&[])),
                put_string_constant(string(fragment)),
                clear("no_match_found"),
            ],
        ),
    ]
}

/// Rama de un ciclo: imprime la etiqueta entre los tres fragmentos.
fn loop_branch(op: char, [first, second, third]: [&str; 3], body: Vec<Node>) -> Vec<Node> {
    let label = |x0, x1| call("counter_print", vec![x0, x1]);
    let (x0, x1): (Atom, Atom) = match op {
        '[' => ("name_counter_0".into(), "name_counter_1".into()),
        _ => (addr(-2), addr(-1)),
    };

    let mut branch = vec![
        call("input_consume_char", input_args(&[])),
        put_string_constant(string(first)),
        label(x0.clone(), x1.clone()),
        put_string_constant(string(second)),
        label(x0, x1),
        put_string_constant(string(third)),
    ];

    branch.extend(body);
    branch.push(clear("no_match_found"));

    vec![
        call("is_equal", vec![chr(op), "c".into(), "match".into()]),
        if_("match", branch),
    ]
}

fn main(fragments: &Fragments) -> Vec<Node> {
    let mut step = vec![
        clear("no_match_found"),
        constant_add(1, "no_match_found"),
        call("input_peek_char", input_args(&["c"])),
    ];

    step.extend(run_branch('+', fragments.dp_inc_by));
    step.extend(run_branch('-', fragments.dp_dec_by));
    step.extend(run_branch('<', fragments.dp_left_by));
    step.extend(run_branch('>', fragments.dp_right_by));

    // La etiqueta del ciclo se apila debajo del frame
    step.extend(loop_branch(
        '[',
        fragments.begin_while,
        vec![
            grow_stack(2),
            copy("name_counter_0", addr(-2)),
            copy("name_counter_1", addr(-1)),
            call(
                "counter_inc",
                vec!["name_counter_0".into(), "name_counter_1".into()],
            ),
        ],
    ));

    step.extend(loop_branch(']', fragments.end_while, vec![shrink_stack(2)]));
    step.extend(char_branch(',', fragments.read_char));
    step.extend(char_branch('.', fragments.write_char));

    step.extend([
        // Caracteres fuera del vocabulario se descartan
        if_(
            "no_match_found",
            vec![call("input_consume_char", input_args(&[]))],
        ),
        call("input_update", input_args(&[])),
        call("input_has_next", input_args(&["input_ok"])),
    ]);

    vec![
        local("name_counter_0"),
        local("name_counter_1"),
        call(
            "counter_init",
            vec!["name_counter_0".into(), "name_counter_1".into()],
        ),
        local("input0"),
        local("input1"),
        local("input2"),
        call("input_init", input_args(&[])),
        local("input_ok"),
        call("input_has_next", input_args(&["input_ok"])),
        put_string_constant(string(fragments.program_start)),
        local("match"),
        local("no_match_found"),
        local("c"),
        while_("input_ok", step),
        put_string_constant(string(fragments.program_end)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Compiler;

    #[test]
    fn translator_compiles_for_every_arch() {
        for &arch in Arch::ALL {
            let table = translator(arch).unwrap();
            assert!(table.get("main").is_some());

            let instructions = Compiler::default().compile(&table, "main").unwrap();
            assert!(!instructions.is_empty());
            assert!(instructions.as_str().chars().all(|c| "<>+-[].,".contains(c)));
        }
    }
}
