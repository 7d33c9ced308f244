//! Evaluación de macros expandidas.
//!
//! Tras la expansión, un cuerpo consiste únicamente de primitivas de
//! entorno, de asignación de celdas y de llamadas a built-ins. El
//! [`Driver`] recorre ese cuerpo en profundidad una sola vez: cada
//! literal se evalúa a su valor, y cada expresión evalúa primero sus
//! hijos de izquierda a derecha y luego se despacha según su etiqueta.
//!
//! Todo el estado mutable de la compilación (cadena de ámbitos,
//! asignador y máquina) pertenece al [`Driver`].

use crate::{
    builtins::{Builtin, Builtins, Tape},
    env::Scopes,
    error::CompileError,
    expand::Rewriter,
    ir::{Atom, MacroTable, Node, StackAddress, Symbol, Tag},
    machine::Instructions,
};

use log::{info, trace};

/// Parámetros de compilación.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Cantidad de celdas de la cinta objetivo.
    pub tape_size: usize,

    /// Ancho de línea del flujo de instrucciones al mostrarse.
    pub line_width: usize,

    /// Límite de rondas de desazucarado por macro.
    pub max_rewrite_rounds: usize,

    /// Límite de rondas de inlining por macro de entrada.
    pub max_inline_rounds: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            tape_size: 30000,
            line_width: 70,
            max_rewrite_rounds: 256,
            max_inline_rounds: 256,
        }
    }
}

/// Resultado de evaluar un nodo.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Unit,
    Atom(Atom),
    Builtin(Builtin),
    Args(Vec<Atom>),
}

impl Value {
    fn kind(&self) -> String {
        match self {
            Value::Unit => String::from("()"),
            Value::Atom(atom) => atom.to_string(),
            Value::Builtin(builtin) => builtin.name().to_owned(),
            Value::Args(_) => String::from("argument list"),
        }
    }
}

/// Estado de una evaluación.
pub struct Driver<'a> {
    scopes: Scopes,
    tape: Tape,
    builtins: &'a Builtins,
}

impl<'a> Driver<'a> {
    pub fn new(builtins: &'a Builtins, options: &Options) -> Self {
        Driver {
            scopes: Scopes::new(),
            tape: Tape::new(options.tape_size),
            builtins,
        }
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    /// Evalúa una secuencia de sentencias en orden.
    pub fn run(&mut self, body: &[Node]) -> Result<(), CompileError> {
        for statement in body {
            self.eval(statement)?;
        }

        Ok(())
    }

    pub fn eval(&mut self, node: &Node) -> Result<Value, CompileError> {
        let expr = match node {
            Node::Literal(atom) => return Ok(Value::Atom(atom.clone())),
            Node::Expr(expr) => expr,
        };

        let mut values = Vec::with_capacity(expr.children().len());
        for child in expr.children() {
            values.push(self.eval(child)?);
        }

        trace!("Dispatching `{}`", expr.tag());
        self.dispatch(expr.tag(), values)
    }

    fn dispatch(&mut self, tag: Tag, values: Vec<Value>) -> Result<Value, CompileError> {
        use Tag::*;

        let value = match tag {
            EnvBegin => {
                self.scopes.open();
                Value::Unit
            }

            EnvEnd => {
                for address in self.scopes.close()? {
                    self.tape.free(address)?;
                }

                Value::Unit
            }

            EnvDeclare => {
                self.scopes.declare(symbol(&values[0])?)?;
                Value::Unit
            }

            EnvSet => {
                let name = symbol(&values[0])?;
                self.scopes.set(&name, atom(&values[1])?)?;
                Value::Unit
            }

            EnvGet => Value::Atom(self.scopes.resolve(&atom(&values[0])?)?),
            OuterEnvGet => Value::Atom(self.scopes.outer_resolve(&atom(&values[0])?)?),

            Arguments => {
                let args = values
                    .iter()
                    .map(|value| atom(value).and_then(|atom| self.scopes.resolve(&atom)))
                    .collect::<Result<_, _>>()?;

                Value::Args(args)
            }

            AllocateLocal => Value::Atom(Atom::Address(self.tape.allocate()?)),

            FreeLocal => {
                self.tape.free(address(&values[0])?)?;
                Value::Unit
            }

            FreeLocalOnEnvExit => {
                self.scopes.release_on_exit(address(&values[0])?);
                Value::Unit
            }

            Name => {
                let name = symbol(&values[0])?;
                let builtin = self
                    .builtins
                    .lookup(name.as_str())
                    .ok_or_else(|| CompileError::UnknownOperation(name.to_string()))?;

                Value::Builtin(builtin)
            }

            CallBuiltin => match (&values[0], &values[1]) {
                (Value::Builtin(builtin), Value::Args(args)) => {
                    builtin.invoke(&mut self.tape, args)?;
                    Value::Unit
                }

                (other, _) => return Err(mismatch("built-in call", other)),
            },

            Local | While | If | CallMacro | Body | Parameters | UserMacro => {
                return Err(CompileError::UnknownOperation(tag.name().to_owned()))
            }
        };

        Ok(value)
    }

    /// Concluye la evaluación y retorna el flujo de instrucciones.
    pub fn finish(self, line_width: usize) -> Result<Instructions, CompileError> {
        if self.scopes.depth() != 0 {
            return Err(CompileError::UnbalancedScope);
        }

        self.tape.finish(line_width)
    }
}

fn atom(value: &Value) -> Result<Atom, CompileError> {
    match value {
        Value::Atom(atom) => Ok(atom.clone()),
        other => Err(mismatch("literal", other)),
    }
}

fn symbol(value: &Value) -> Result<Symbol, CompileError> {
    match value {
        Value::Atom(Atom::Name(symbol)) => Ok(symbol.clone()),
        other => Err(mismatch("name", other)),
    }
}

fn address(value: &Value) -> Result<StackAddress, CompileError> {
    match value {
        Value::Atom(Atom::Address(address)) => Ok(*address),
        other => Err(mismatch("stack address", other)),
    }
}

fn mismatch(expected: &'static str, found: &Value) -> CompileError {
    CompileError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

/// Punto de entrada de la compilación de macros.
pub struct Compiler {
    builtins: Builtins,
    options: Options,
}

impl Compiler {
    pub fn new(options: Options) -> Self {
        Compiler {
            builtins: Builtins::standard(),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Expande y evalúa la macro `entry`.
    ///
    /// El flujo de instrucciones solo se produce si la compilación
    /// completa tiene éxito.
    pub fn compile(&self, table: &MacroTable, entry: &str) -> Result<Instructions, CompileError> {
        let body = Rewriter::new(table, &self.builtins, self.options)?.expand(entry)?;
        info!("Macro `{}` expanded to {} statement(s)", entry, body.len());

        let mut driver = Driver::new(&self.builtins, &self.options);
        driver.run(&body)?;

        let instructions = driver.finish(self.options.line_width)?;
        info!("Emitted {} instruction(s)", instructions.len());

        Ok(instructions)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new(Options::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sugar::*;

    fn compile(table: &MacroTable) -> Result<Instructions, CompileError> {
        Compiler::default().compile(table, "main")
    }

    #[test]
    fn builtin_call_emits_code() {
        let mut table = MacroTable::new();
        table
            .define("main", &[], vec![local("a"), local("b"), clear("b")])
            .unwrap();

        assert_eq!(compile(&table).unwrap().as_str(), ">[-]");
    }

    #[test]
    fn locals_are_released_on_scope_exit() {
        let builtins = Builtins::standard();
        let mut driver = Driver::new(&builtins, &Options::default());

        let mut table = MacroTable::new();
        table
            .define("main", &[], vec![local("a"), if_("a", vec![local("b")])])
            .unwrap();

        let body = Rewriter::new(&table, &builtins, Options::default())
            .unwrap()
            .expand("main")
            .unwrap();

        driver.run(&body).unwrap();
        assert!(driver.tape().cells().is_empty());
        assert_eq!(driver.scopes().depth(), 0);
    }

    #[test]
    fn unknown_tags_fail() {
        let builtins = Builtins::standard();
        let mut driver = Driver::new(&builtins, &Options::default());

        let error = driver.eval(&local("x")).unwrap_err();
        assert!(matches!(error, CompileError::UnknownOperation(tag) if tag == "local"));

        let error = driver.eval(&name("frobnicate")).unwrap_err();
        assert!(matches!(error, CompileError::UnknownOperation(_)));
    }

    #[test]
    fn unbound_names_fail_without_output() {
        let mut table = MacroTable::new();
        table.define("main", &[], vec![clear("ghost")]).unwrap();

        assert!(matches!(
            compile(&table),
            Err(CompileError::UnboundName(symbol)) if symbol.as_str() == "ghost"
        ));
    }

    #[test]
    fn constant_arguments_evaluate_to_themselves() {
        let mut table = MacroTable::new();
        table
            .define("add", &["n", "dst"], vec![constant_add("n", "dst")])
            .unwrap()
            .define(
                "main",
                &[],
                vec![local("x"), call("add", vec![int(3), "x".into()])],
            )
            .unwrap();

        assert_eq!(compile(&table).unwrap().as_str(), "+++");
    }

    #[test]
    fn aliasing_fails_compilation() {
        let mut table = MacroTable::new();
        table
            .define("main", &[], vec![local("x"), r#move("x", "x")])
            .unwrap();

        assert!(matches!(
            compile(&table),
            Err(CompileError::Aliasing { builtin: "move", .. })
        ));
    }

    #[test]
    fn out_of_range_allocation() {
        let mut table = MacroTable::new();
        table
            .define("main", &[], vec![local("a"), local("b"), local("c")])
            .unwrap();

        let compiler = Compiler::new(Options {
            tape_size: 2,
            ..Default::default()
        });

        assert!(matches!(
            compiler.compile(&table, "main"),
            Err(CompileError::OutOfRange { position: 2, .. })
        ));
    }
}
