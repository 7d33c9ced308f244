//! Representación intermedia de macros.
//!
//! Un programa en el lenguaje de macros es un conjunto de definiciones,
//! cada una con una lista de parámetros y un cuerpo de sentencias. Las
//! sentencias son árboles etiquetados: un nodo es o bien un literal
//! atómico ([`Atom`]) o una expresión compuesta ([`Expr`]) con una
//! etiqueta de un vocabulario cerrado ([`Tag`]) y una secuencia de hijos.
//!
//! La cantidad de hijos de cada etiqueta es fija (salvo las listas
//! variádicas), y se verifica al construir el nodo.

use crate::error::CompileError;

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    rc::Rc,
};

/// Etiqueta de cabecera de un nodo compuesto.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `(name <literal>)`: referencia a una macro por nombre.
    Name,
    /// `(local <literal>)`: declaración de una celda local.
    Local,
    Parameters,
    Arguments,
    /// `(call_macro (name ..) (arguments ..))`
    CallMacro,
    /// `(call_builtin (name ..) (arguments ..))`
    CallBuiltin,
    /// `(user_macro (name ..) (parameters ..) (body ..))`
    UserMacro,
    Body,
    /// `(while (arguments cond) (body ..))`
    While,
    /// `(if (arguments cond) (body ..))`
    If,

    // Primitivas de entorno y asignación, producidas por el reescritor
    EnvBegin,
    EnvEnd,
    EnvDeclare,
    EnvSet,
    EnvGet,
    OuterEnvGet,
    AllocateLocal,
    FreeLocal,
    FreeLocalOnEnvExit,
}

/// Cantidad de hijos que admite una etiqueta.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl Tag {
    pub fn arity(self) -> Arity {
        use Tag::*;

        match self {
            Parameters | Arguments | Body => Arity::Variadic,
            EnvBegin | EnvEnd | AllocateLocal => Arity::Fixed(0),
            Name | Local | EnvDeclare | EnvGet | OuterEnvGet | FreeLocal | FreeLocalOnEnvExit => {
                Arity::Fixed(1)
            }
            CallMacro | CallBuiltin | While | If | EnvSet => Arity::Fixed(2),
            UserMacro => Arity::Fixed(3),
        }
    }

    pub fn name(self) -> &'static str {
        use Tag::*;

        match self {
            Name => "name",
            Local => "local",
            Parameters => "parameters",
            Arguments => "arguments",
            CallMacro => "call_macro",
            CallBuiltin => "call_builtin",
            UserMacro => "user_macro",
            Body => "body",
            While => "while",
            If => "if",
            EnvBegin => "env_begin",
            EnvEnd => "env_end",
            EnvDeclare => "env_declare",
            EnvSet => "env_set",
            EnvGet => "env_get",
            OuterEnvGet => "outer_env_get",
            AllocateLocal => "allocate_local",
            FreeLocal => "free_local",
            FreeLocalOnEnvExit => "free_local_on_env_exit",
        }
    }
}

impl Display for Tag {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

/// Nombre de variable.
///
/// Los nombres ocultos solo pueden crearse desde el reescritor, por
/// lo cual nunca coinciden con un nombre escrito por el usuario aunque
/// compartan el mismo texto.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    name: Rc<str>,
    hidden: bool,
}

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol {
            name: Rc::from(name),
            hidden: false,
        }
    }

    pub fn hidden(name: &str) -> Self {
        Symbol {
            name: Rc::from(name),
            hidden: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

impl Display for Symbol {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hidden {
            write!(fmt, "<hidden {}>", self.name)
        } else {
            fmt.write_str(&self.name)
        }
    }
}

/// Desplazamiento de una celda relativo a la base del frame activo.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackAddress(pub i64);

impl Display for StackAddress {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "stack[{}]", self.0)
    }
}

/// Valor atómico de un literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Atom {
    Name(Symbol),
    Int(i64),
    Str(Rc<str>),
    Address(StackAddress),
}

impl Atom {
    pub fn kind(&self) -> &'static str {
        match self {
            Atom::Name(_) => "name",
            Atom::Int(_) => "integer constant",
            Atom::Str(_) => "string constant",
            Atom::Address(_) => "stack address",
        }
    }

    /// Las constantes y direcciones se evalúan a sí mismas, los nombres no.
    pub fn is_self_evaluating(&self) -> bool {
        !matches!(self, Atom::Name(_))
    }
}

impl Display for Atom {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Name(symbol) => symbol.fmt(fmt),
            Atom::Int(value) => write!(fmt, "{}", value),
            Atom::Str(string) => write!(fmt, "{:?}", string),
            Atom::Address(address) => address.fmt(fmt),
        }
    }
}

impl From<&str> for Atom {
    fn from(name: &str) -> Self {
        Atom::Name(Symbol::new(name))
    }
}

impl From<Symbol> for Atom {
    fn from(symbol: Symbol) -> Self {
        Atom::Name(symbol)
    }
}

impl From<i64> for Atom {
    fn from(value: i64) -> Self {
        Atom::Int(value)
    }
}

impl From<StackAddress> for Atom {
    fn from(address: StackAddress) -> Self {
        Atom::Address(address)
    }
}

/// Nodo del árbol de macros.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Literal(Atom),
    Expr(Expr),
}

/// Nodo compuesto cuya aridad ya fue verificada.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    tag: Tag,
    children: Vec<Node>,
}

impl Expr {
    /// Construye un nodo compuesto, fallando si la aridad no corresponde.
    pub fn new(tag: Tag, children: Vec<Node>) -> Result<Self, CompileError> {
        match tag.arity() {
            Arity::Fixed(expected) if expected != children.len() => Err(CompileError::BadArity {
                tag,
                expected,
                found: children.len(),
            }),

            _ => Ok(Expr { tag, children }),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }
}

impl Node {
    pub fn literal<A: Into<Atom>>(atom: A) -> Node {
        Node::Literal(atom.into())
    }

    pub fn expr(tag: Tag, children: Vec<Node>) -> Result<Node, CompileError> {
        Expr::new(tag, children).map(Node::Expr)
    }

    /// Constructor interno para formas cuya aridad es correcta por construcción.
    pub(crate) fn build(tag: Tag, children: Vec<Node>) -> Node {
        debug_assert!(
            Expr::new(tag, children.clone()).is_ok(),
            "ill-formed `{}` node",
            tag
        );

        Node::Expr(Expr { tag, children })
    }

    pub fn as_literal(&self) -> Option<&Atom> {
        match self {
            Node::Literal(atom) => Some(atom),
            Node::Expr(_) => None,
        }
    }

    /// Determina si el nodo es una expresión con la etiqueta indicada.
    pub fn is(&self, tag: Tag) -> bool {
        matches!(self, Node::Expr(expr) if expr.tag == tag)
    }
}

impl Display for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(atom) => atom.fmt(fmt),
            Node::Expr(Expr { tag, children }) => {
                write!(fmt, "({}", tag)?;
                for child in children {
                    write!(fmt, " {}", child)?;
                }

                fmt.write_str(")")
            }
        }
    }
}

/// Definición de una macro de usuario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroDef {
    name: String,
    params: Vec<Symbol>,
    body: Vec<Node>,
}

impl MacroDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Symbol] {
        &self.params
    }

    pub fn body(&self) -> &[Node] {
        &self.body
    }

    /// Reemplaza el cuerpo, conservando nombre y parámetros.
    pub fn with_body(&self, body: Vec<Node>) -> MacroDef {
        MacroDef {
            name: self.name.clone(),
            params: self.params.clone(),
            body,
        }
    }

    /// Forma de árbol `(user_macro (name ..) (parameters ..) (body ..))`.
    pub fn to_node(&self) -> Node {
        let name = Node::build(Tag::Name, vec![Node::literal(self.name.as_str())]);
        let params = self
            .params
            .iter()
            .cloned()
            .map(Node::literal)
            .collect();

        Node::build(
            Tag::UserMacro,
            vec![
                name,
                Node::build(Tag::Parameters, params),
                Node::build(Tag::Body, self.body.clone()),
            ],
        )
    }
}

impl Display for MacroDef {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_node().fmt(fmt)
    }
}

/// Conjunto de macros de una unidad de compilación, indexado por nombre.
#[derive(Clone, Debug, Default)]
pub struct MacroTable {
    macros: BTreeMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registra una macro. Los nombres de macro y de parámetro deben ser únicos.
    pub fn define(
        &mut self,
        name: &str,
        params: &[&str],
        body: Vec<Node>,
    ) -> Result<&mut Self, CompileError> {
        if self.macros.contains_key(name) {
            return Err(CompileError::DuplicateMacro(name.to_owned()));
        }

        let mut symbols: Vec<Symbol> = Vec::with_capacity(params.len());
        for param in params {
            let symbol = Symbol::new(param);
            if symbols.contains(&symbol) {
                return Err(CompileError::DuplicateDeclaration(symbol));
            }

            symbols.push(symbol);
        }

        let definition = MacroDef {
            name: name.to_owned(),
            params: symbols,
            body,
        };

        self.macros.insert(name.to_owned(), definition);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Itera en orden lexicográfico de nombre.
    pub fn iter(&self) -> impl Iterator<Item = &MacroDef> {
        self.macros.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_is_checked_on_construction() {
        let error = Node::expr(Tag::EnvSet, vec![Node::literal("x")]).unwrap_err();
        assert!(matches!(
            error,
            CompileError::BadArity {
                tag: Tag::EnvSet,
                expected: 2,
                found: 1
            }
        ));

        assert!(Node::expr(Tag::Body, vec![]).is_ok());
        assert!(Node::expr(Tag::EnvBegin, vec![]).is_ok());
    }

    #[test]
    fn hidden_symbols_differ_from_user_symbols() {
        assert_ne!(Symbol::new("if_tmp"), Symbol::hidden("if_tmp"));
        assert_eq!(Symbol::hidden("if_tmp").to_string(), "<hidden if_tmp>");
    }

    #[test]
    fn display_is_an_s_expression() {
        let node = Node::build(
            Tag::EnvSet,
            vec![
                Node::literal("x"),
                Node::build(Tag::AllocateLocal, vec![]),
            ],
        );

        assert_eq!(node.to_string(), "(env_set x (allocate_local))");
    }

    #[test]
    fn duplicate_definitions_are_rejected() {
        let mut table = MacroTable::new();
        table.define("main", &[], vec![]).unwrap();

        assert!(matches!(
            table.define("main", &[], vec![]),
            Err(CompileError::DuplicateMacro(name)) if name == "main"
        ));

        assert!(matches!(
            table.define("twice", &["a", "a"], vec![]),
            Err(CompileError::DuplicateDeclaration(_))
        ));
    }
}
