//! Constructores de sentencias del lenguaje de macros.
//!
//! Las definiciones de macros se arman con funciones ordinarias que
//! producen nodos ya bien formados, y se registran en una
//! [`MacroTable`](crate::ir::MacroTable) con
//! [`MacroTable::define()`](crate::ir::MacroTable::define).
//!
//! ```
//! use abfc::{ir::MacroTable, sugar::*};
//!
//! let mut table = MacroTable::new();
//! table
//!     .define("add_one", &["dst"], vec![constant_add(1, "dst")])
//!     .unwrap()
//!     .define("main", &[], vec![local("x"), call("add_one", vec!["x".into()])])
//!     .unwrap();
//! ```

use crate::{
    builtins::Builtin,
    ir::{Atom, Node, StackAddress, Symbol, Tag},
};

/// `(name <name>)`
pub fn name(name: &str) -> Node {
    Node::build(Tag::Name, vec![Node::literal(name)])
}

fn arguments(args: Vec<Atom>) -> Node {
    Node::build(Tag::Arguments, args.into_iter().map(Node::literal).collect())
}

fn condition(cond: Atom) -> Node {
    Node::build(Tag::Arguments, vec![Node::literal(cond)])
}

/// Declara una celda local en el ámbito actual.
pub fn local(name: &str) -> Node {
    Node::build(Tag::Local, vec![Node::literal(name)])
}

/// Repite `body` mientras la celda `cond` no sea cero.
pub fn while_(cond: impl Into<Atom>, body: Vec<Node>) -> Node {
    Node::build(
        Tag::While,
        vec![condition(cond.into()), Node::build(Tag::Body, body)],
    )
}

/// Ejecuta `body` una vez si la celda `cond` no es cero, sin modificarla.
pub fn if_(cond: impl Into<Atom>, body: Vec<Node>) -> Node {
    Node::build(
        Tag::If,
        vec![condition(cond.into()), Node::build(Tag::Body, body)],
    )
}

/// Llamada a una macro por nombre.
pub fn call(macro_name: &str, args: Vec<Atom>) -> Node {
    Node::build(Tag::CallMacro, vec![name(macro_name), arguments(args)])
}

pub fn call_builtin(builtin: Builtin, args: Vec<Atom>) -> Node {
    Node::build(Tag::CallBuiltin, vec![name(builtin.name()), arguments(args)])
}

pub fn int(value: i64) -> Atom {
    Atom::Int(value)
}

/// Código de un carácter como constante entera.
pub fn chr(c: char) -> Atom {
    Atom::Int(u32::from(c).into())
}

pub fn string(string: &str) -> Atom {
    Atom::Str(string.into())
}

/// Dirección explícita relativa a la base del frame.
pub fn addr(offset: i64) -> Atom {
    Atom::Address(StackAddress(offset))
}

/// Nombre inalcanzable desde código de usuario.
pub fn hidden(name: &str) -> Atom {
    Atom::Name(Symbol::hidden(name))
}

builtin_wrappers! {
    clear => Clear(dst),
    destructive_add => DestructiveAdd(src, dst),
    destructive_sub => DestructiveSub(src, dst),
    r#move => Move(src, dst),
    copy => Copy(src, dst),
    stack_add => StackAdd(src, dst),
    stack_sub => StackSub(src, dst),
    constant_add => ConstantAdd(constant, dst),
    constant_sub => ConstantSub(constant, dst),
    as_logical => AsLogical(src, dst),
    logical_not => LogicalNot(src, dst),
    logical_and => LogicalAnd(src_a, src_b, dst),
    logical_or => LogicalOr(src_a, src_b, dst),
    get_char => GetChar(dst),
    put_char => PutChar(src),
    put_string_constant => PutStringConstant(string),
    begin_loop => BeginLoop(src),
    end_loop => EndLoop(src),
    grow_stack => GrowStack(size),
    shrink_stack => ShrinkStack(size),
}
