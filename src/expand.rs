//! Reescritura de macros.
//!
//! La expansión ocurre en dos etapas:
//!
//! 1. **Desazucarado**: `local`, `if` y `while` se reescriben en
//!    primitivas de entorno y llamadas a built-ins. Las reglas se
//!    aplican en orden lexicográfico de nombre sobre cada sentencia de
//!    primer nivel, ronda tras ronda, hasta que una ronda completa no
//!    cambia nada. Como una regla puede exponer construcciones nuevas
//!    al primer nivel (el cuerpo de un `if` queda a la vista tras
//!    expandirlo), una sola pasada no basta.
//! 2. **Inlining**: cada llamada a una macro de usuario se reemplaza
//!    por el cuerpo desazucarado de esta, envuelto en un ámbito propio
//!    donde cada parámetro se liga al valor que el argumento tiene en
//!    el ámbito del llamador.
//!
//! Ambas etapas tienen un límite de rondas. Una regla que no reduce
//! su construcción objetivo, o una recursión entre macros, terminan
//! en [`CompileError::RewriteLimit`].

use crate::{
    builtins::{Builtin, Builtins},
    driver::Options,
    error::CompileError,
    ir::{Atom, MacroDef, MacroTable, Node, Symbol, Tag},
    pattern::{Bindings, Pattern, Rule},
    sugar,
};

use log::debug;
use std::collections::HashMap;

/// Nombre del temporal oculto de cada `if`.
const IF_TMP: &str = "if_tmp";

/// Reglas de desazucarado, en orden de aplicación.
pub struct Rules {
    rules: Vec<(&'static str, Rule)>,
}

impl Rules {
    pub fn standard() -> Result<Self, CompileError> {
        let mut rules = vec![
            ("allocate_locals", allocate_locals()?),
            ("expand_if_block", expand_if_block()?),
            ("expand_while_block", expand_while_block()?),
        ];

        rules.sort_by_key(|&(name, _)| name);
        Ok(Rules { rules })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|&(name, _)| name)
    }

    /// Aplica cada regla una vez, en orden, a las sentencias de primer nivel.
    ///
    /// Retorna el cuerpo resultante y si alguna regla coincidió.
    pub fn round(&self, body: Vec<Node>) -> Result<(Vec<Node>, bool), CompileError> {
        let mut body = body;
        let mut changed = false;

        for (name, rule) in &self.rules {
            let mut output = Vec::with_capacity(body.len());
            for statement in body {
                match rule.try_apply(&statement)? {
                    Some(replacement) => {
                        debug!("Rule `{}` rewrote {}", name, statement);
                        output.extend(replacement);
                        changed = true;
                    }

                    None => output.push(statement),
                }
            }

            body = output;
        }

        Ok((body, changed))
    }

    /// Aplica rondas hasta un punto fijo, con a lo sumo `limit` rondas.
    ///
    /// Retorna el cuerpo y la cantidad de rondas ejecutadas, incluyendo
    /// la última ronda sin cambios.
    pub fn fixed_point(
        &self,
        body: Vec<Node>,
        limit: usize,
    ) -> Result<Option<(Vec<Node>, usize)>, CompileError> {
        let mut body = body;
        for rounds in 1..=limit {
            let (next, changed) = self.round(body)?;
            if !changed {
                return Ok(Some((next, rounds)));
            }

            body = next;
        }

        Ok(None)
    }
}

/// `(local x)` → declaración, asignación de celda y liberación diferida.
fn allocate_locals() -> Result<Rule, CompileError> {
    Pattern::expr(Tag::Local, vec![Pattern::Bind("name")]).replace(|bindings| {
        let name = bindings.node("name")?;
        Ok(vec![
            Node::build(Tag::EnvDeclare, vec![name.clone()]),
            Node::build(
                Tag::EnvSet,
                vec![name.clone(), Node::build(Tag::AllocateLocal, vec![])],
            ),
            Node::build(
                Tag::FreeLocalOnEnvExit,
                vec![Node::build(Tag::EnvGet, vec![name.clone()])],
            ),
        ])
    })
}

/// Patrón común de `if` y `while`: `(tag (arguments cond) (body ..))`.
fn block(tag: Tag) -> Pattern {
    Pattern::expr(
        tag,
        vec![
            Pattern::expr(Tag::Arguments, vec![Pattern::Bind("cond")]),
            Pattern::cons(Pattern::tag(Tag::Body), Pattern::Bind("body")),
        ],
    )
}

fn condition(bindings: &Bindings<'_>) -> Result<Atom, CompileError> {
    let node = bindings.node("cond")?;
    node.as_literal()
        .cloned()
        .ok_or_else(|| CompileError::TypeMismatch {
            expected: "literal condition",
            found: node.to_string(),
        })
}

/// Un `if` copia la condición a un temporal oculto y ejecuta un ciclo
/// que limpia ese temporal al final, forzando a lo sumo una iteración.
fn expand_if_block() -> Result<Rule, CompileError> {
    block(Tag::If).replace(|bindings| {
        let cond = condition(bindings)?;
        let tmp = Symbol::hidden(IF_TMP);

        let mut output = vec![
            Node::build(Tag::EnvBegin, vec![]),
            Node::build(Tag::Local, vec![Node::literal(tmp.clone())]),
            sugar::copy(cond, tmp.clone()),
            sugar::begin_loop(tmp.clone()),
        ];

        output.extend(bindings.seq("body")?.iter().cloned());
        output.extend([
            sugar::clear(tmp.clone()),
            sugar::end_loop(tmp),
            Node::build(Tag::EnvEnd, vec![]),
        ]);

        Ok(output)
    })
}

fn expand_while_block() -> Result<Rule, CompileError> {
    block(Tag::While).replace(|bindings| {
        let cond = condition(bindings)?;

        let mut output = vec![
            Node::build(Tag::EnvBegin, vec![]),
            sugar::begin_loop(cond.clone()),
        ];

        output.extend(bindings.seq("body")?.iter().cloned());
        output.extend([sugar::end_loop(cond), Node::build(Tag::EnvEnd, vec![])]);

        Ok(output)
    })
}

/// Expansor de una unidad de compilación.
pub struct Rewriter<'a> {
    table: &'a MacroTable,
    builtins: &'a Builtins,
    rules: Rules,
    options: Options,
    call: Pattern,
    desugared: HashMap<String, MacroDef>,
}

impl<'a> Rewriter<'a> {
    pub fn new(
        table: &'a MacroTable,
        builtins: &'a Builtins,
        options: Options,
    ) -> Result<Self, CompileError> {
        // (call_macro (name <macro>) (arguments ..))
        let call = Pattern::expr(
            Tag::CallMacro,
            vec![
                Pattern::expr(Tag::Name, vec![Pattern::Bind("macro")]),
                Pattern::cons(Pattern::tag(Tag::Arguments), Pattern::Bind("args")),
            ],
        );

        call.validate()?;

        Ok(Rewriter {
            table,
            builtins,
            rules: Rules::standard()?,
            options,
            call,
            desugared: HashMap::new(),
        })
    }

    /// Desazucara el cuerpo de una macro y lo envuelve en un ámbito.
    pub fn desugar(&mut self, name: &str) -> Result<&MacroDef, CompileError> {
        if !self.desugared.contains_key(name) {
            let table = self.table;
            let def = table
                .get(name)
                .ok_or_else(|| CompileError::UnknownMacro(name.to_owned()))?;

            let limit = self.options.max_rewrite_rounds;
            let (body, rounds) = self
                .rules
                .fixed_point(def.body().to_vec(), limit)?
                .ok_or_else(|| CompileError::RewriteLimit {
                    stage: "Desugaring",
                    name: name.to_owned(),
                    rounds: limit,
                })?;

            debug!("Desugared `{}` in {} round(s)", name, rounds);

            let mut wrapped = Vec::with_capacity(body.len() + 2);
            wrapped.push(Node::build(Tag::EnvBegin, vec![]));
            wrapped.extend(body);
            wrapped.push(Node::build(Tag::EnvEnd, vec![]));

            self.desugared.insert(name.to_owned(), def.with_body(wrapped));
        }

        Ok(&self.desugared[name])
    }

    /// Expande por completo una macro de entrada, sin parámetros libres.
    pub fn expand(&mut self, entry: &str) -> Result<Vec<Node>, CompileError> {
        let mut body = self.desugar(entry)?.body().to_vec();
        let limit = self.options.max_inline_rounds;

        for round in 1..=limit {
            let mut output = Vec::with_capacity(body.len());
            let mut changed = false;

            for statement in body {
                match self.inline(&statement)? {
                    Some(replacement) => {
                        output.extend(replacement);
                        changed = true;
                    }

                    None => output.push(statement),
                }
            }

            if !changed {
                debug!("Inlined `{}` in {} round(s)", entry, round);
                return Ok(output);
            }

            body = output;
        }

        Err(CompileError::RewriteLimit {
            stage: "Inlining",
            name: entry.to_owned(),
            rounds: limit,
        })
    }

    /// Reemplaza una sentencia de llamada, si lo es.
    fn inline(&mut self, statement: &Node) -> Result<Option<Vec<Node>>, CompileError> {
        let bindings = match self.call.matches(statement) {
            Some(bindings) => bindings,
            None => return Ok(None),
        };

        let macro_name = bindings.node("macro")?;
        let callee = match macro_name.as_literal() {
            Some(Atom::Name(symbol)) => symbol.as_str().to_owned(),
            _ => {
                return Err(CompileError::TypeMismatch {
                    expected: "macro name",
                    found: macro_name.to_string(),
                })
            }
        };

        let args = bindings.seq("args")?;

        if self.table.get(&callee).is_none() {
            return match self.builtins.lookup(&callee) {
                Some(builtin) => Ok(Some(vec![builtin_call(builtin, args)])),
                None => Err(CompileError::UnknownMacro(callee)),
            };
        }

        let def = self.desugar(&callee)?;
        if def.params().len() != args.len() {
            return Err(CompileError::ArityMismatch {
                name: callee,
                expected: def.params().len(),
                found: args.len(),
            });
        }

        debug!("Inlining call to `{}`", callee);

        let mut output = vec![Node::build(Tag::EnvBegin, vec![])];
        for (param, arg) in def.params().iter().zip(args) {
            let param = Node::literal(param.clone());
            output.push(Node::build(Tag::EnvDeclare, vec![param.clone()]));
            output.push(Node::build(
                Tag::EnvSet,
                vec![param, Node::build(Tag::OuterEnvGet, vec![arg.clone()])],
            ));
        }

        output.extend(def.body().iter().cloned());
        output.push(Node::build(Tag::EnvEnd, vec![]));

        Ok(Some(output))
    }
}

fn builtin_call(builtin: Builtin, args: &[Node]) -> Node {
    Node::build(
        Tag::CallBuiltin,
        vec![
            sugar::name(builtin.name()),
            Node::build(Tag::Arguments, args.to_vec()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sugar::*;

    fn expand(table: &MacroTable, entry: &str) -> Result<Vec<Node>, CompileError> {
        let builtins = Builtins::standard();
        Rewriter::new(table, &builtins, Options::default())?.expand(entry)
    }

    fn contains(body: &[Node], tag: Tag) -> bool {
        fn walk(node: &Node, tag: Tag) -> bool {
            match node {
                Node::Literal(_) => false,
                Node::Expr(expr) => {
                    expr.tag() == tag || expr.children().iter().any(|child| walk(child, tag))
                }
            }
        }

        body.iter().any(|node| walk(node, tag))
    }

    #[test]
    fn rules_are_sorted_by_name() {
        let rules = Rules::standard().unwrap();
        let names: Vec<_> = rules.names().collect();
        assert_eq!(
            names,
            ["allocate_locals", "expand_if_block", "expand_while_block"]
        );
    }

    #[test]
    fn local_expands_into_three_statements() {
        let rules = Rules::standard().unwrap();
        let (body, changed) = rules.round(vec![local("x")]).unwrap();

        assert!(changed);
        let rendered: Vec<_> = body.iter().map(Node::to_string).collect();
        assert_eq!(
            rendered,
            [
                "(env_declare x)",
                "(env_set x (allocate_local))",
                "(free_local_on_env_exit (env_get x))",
            ]
        );
    }

    #[test]
    fn if_uses_a_hidden_temporary() {
        let rules = Rules::standard().unwrap();
        let (body, rounds) = rules
            .fixed_point(vec![if_("c", vec![put_char("c")])], 8)
            .unwrap()
            .unwrap();

        assert_eq!(rounds, 3);
        assert!(!contains(&body, Tag::If));
        assert!(!contains(&body, Tag::Local));
        assert!(body
            .iter()
            .any(|node| node.to_string() == "(env_declare <hidden if_tmp>)"));
        assert!(!body.iter().any(|node| node.to_string() == "(env_declare if_tmp)"));
    }

    #[test]
    fn nested_blocks_reach_a_fixed_point() {
        let body = vec![while_(
            "c",
            vec![
                local("t"),
                if_("t", vec![local("u"), while_("u", vec![clear("u")])]),
            ],
        )];

        let rules = Rules::standard().unwrap();
        let (fixed, _) = rules.fixed_point(body, 16).unwrap().unwrap();
        for tag in [Tag::While, Tag::If, Tag::Local] {
            assert!(!contains(&fixed, tag));
        }

        // Un cuerpo ya expandido no cambia
        let (again, changed) = rules.round(fixed.clone()).unwrap();
        assert!(!changed);
        assert_eq!(again, fixed);
    }

    #[test]
    fn round_limit_is_enforced() {
        let rules = Rules::standard().unwrap();
        let body = vec![if_("c", vec![if_("c", vec![])])];
        assert!(rules.fixed_point(body, 1).unwrap().is_none());
    }

    #[test]
    fn calls_are_inlined_hygienically() {
        let mut table = MacroTable::new();
        table
            .define("add_one", &["dst"], vec![constant_add(1, "dst")])
            .unwrap()
            .define("main", &[], vec![local("dst"), call("add_one", vec!["dst".into()])])
            .unwrap();

        let body = expand(&table, "main").unwrap();
        assert!(!contains(&body, Tag::CallMacro));
        assert!(body
            .iter()
            .any(|node| node.to_string() == "(env_set dst (outer_env_get dst))"));
    }

    #[test]
    fn builtin_names_become_builtin_calls() {
        let mut table = MacroTable::new();
        table
            .define("main", &[], vec![local("x"), call("clear", vec!["x".into()])])
            .unwrap();

        let body = expand(&table, "main").unwrap();
        assert!(body
            .iter()
            .any(|node| node.to_string() == "(call_builtin (name clear) (arguments x))"));
    }

    #[test]
    fn unknown_macros_and_arity() {
        let mut table = MacroTable::new();
        table
            .define("main", &[], vec![call("nope", vec![])])
            .unwrap()
            .define("one", &["a"], vec![])
            .unwrap()
            .define("bad", &[], vec![call("one", vec![])])
            .unwrap();

        assert!(matches!(
            expand(&table, "main"),
            Err(CompileError::UnknownMacro(name)) if name == "nope"
        ));

        assert!(matches!(
            expand(&table, "bad"),
            Err(CompileError::ArityMismatch {
                expected: 1,
                found: 0,
                ..
            })
        ));

        assert!(matches!(
            expand(&table, "missing"),
            Err(CompileError::UnknownMacro(_))
        ));
    }

    #[test]
    fn recursion_hits_the_inlining_limit() {
        let mut table = MacroTable::new();
        table.define("loop", &[], vec![call("loop", vec![])]).unwrap();

        let builtins = Builtins::standard();
        let options = Options {
            max_inline_rounds: 4,
            ..Default::default()
        };

        let error = Rewriter::new(&table, &builtins, options)
            .unwrap()
            .expand("loop")
            .unwrap_err();

        assert!(matches!(
            error,
            CompileError::RewriteLimit {
                stage: "Inlining",
                rounds: 4,
                ..
            }
        ));
    }
}
