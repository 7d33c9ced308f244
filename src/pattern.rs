//! Coincidencia estructural de patrones.
//!
//! Un [`Pattern`] describe la forma de un árbol de macros. Al
//! compararlo contra un nodo se obtiene o bien un conjunto de
//! capturas con nombre ([`Bindings`]) o bien un fallo. La operación
//! es pura: no modifica el árbol ni el patrón.
//!
//! Un nodo compuesto se ve como una secuencia cuyo primer elemento
//! es su etiqueta y cuyos elementos restantes son sus hijos. Así,
//! `(while (arguments x) (body ..))` puede descomponerse con
//! [`Pattern::Seq`] elemento por elemento o con [`Pattern::Cons`]
//! en cabeza y cola.
//!
//! Sobre esto se construyen las reglas de reescritura ([`Rule`]): un
//! patrón y una acción sobre las capturas que reemplaza al nodo si el
//! patrón coincide, o lo deja intacto si no.

use crate::{
    error::CompileError,
    ir::{Atom, Node, Tag},
};

use std::collections::HashMap;

/// Valor escalar contra el cual se compara por igualdad.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    Tag(Tag),
    Atom(Atom),
}

/// Patrón estructural.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// Coincide con cualquier cosa y la captura bajo un nombre.
    Bind(&'static str),
    /// Coincide con cualquier cosa, sin capturar.
    Discard,
    /// No coincide con nada.
    Never,
    /// Separa una secuencia no vacía en su primer elemento y el resto.
    Cons(Box<Pattern>, Box<Pattern>),
    /// Igualdad exacta contra un escalar.
    Eq(Scalar),
    /// Secuencia de longitud fija, elemento por elemento.
    Seq(Vec<Pattern>),
}

/// Aquello contra lo cual se compara un patrón.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Subject<'a> {
    /// La etiqueta de un nodo compuesto.
    Tag(Tag),
    Node(&'a Node),
    /// Una secuencia de nodos, como la cola de un nodo compuesto.
    Seq(&'a [Node]),
}

impl<'a> Subject<'a> {
    /// Vista de secuencia: etiqueta opcional al frente y nodos restantes.
    fn items(self) -> Option<(Option<Tag>, &'a [Node])> {
        match self {
            Subject::Node(Node::Expr(expr)) => Some((Some(expr.tag()), expr.children())),
            Subject::Seq(nodes) => Some((None, nodes)),
            _ => None,
        }
    }

    fn split_first(self) -> Option<(Subject<'a>, Subject<'a>)> {
        match self.items()? {
            (Some(tag), rest) => Some((Subject::Tag(tag), Subject::Seq(rest))),
            (None, [first, rest @ ..]) => Some((Subject::Node(first), Subject::Seq(rest))),
            (None, []) => None,
        }
    }

    fn len(self) -> Option<usize> {
        self.items()
            .map(|(tag, rest)| rest.len() + tag.map_or(0, |_| 1))
    }
}

/// Capturas de una coincidencia exitosa.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings<'a> {
    captures: HashMap<&'static str, Subject<'a>>,
}

impl<'a> Bindings<'a> {
    pub fn get(&self, name: &str) -> Option<Subject<'a>> {
        self.captures.get(name).copied()
    }

    /// Obtiene un nodo capturado.
    pub fn node(&self, name: &str) -> Result<&'a Node, CompileError> {
        match self.get(name) {
            Some(Subject::Node(node)) => Ok(node),
            _ => Err(missing(name, "node")),
        }
    }

    /// Obtiene una secuencia capturada.
    pub fn seq(&self, name: &str) -> Result<&'a [Node], CompileError> {
        match self.get(name) {
            Some(Subject::Seq(nodes)) => Ok(nodes),
            _ => Err(missing(name, "sequence")),
        }
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    fn extend(&mut self, other: Bindings<'a>) {
        self.captures.extend(other.captures);
    }
}

fn missing(name: &str, expected: &'static str) -> CompileError {
    CompileError::MissingCapture {
        name: name.to_owned(),
        expected,
    }
}

impl Pattern {
    /// Atajo para [`Pattern::Eq`] sobre una etiqueta.
    pub fn tag(tag: Tag) -> Pattern {
        Pattern::Eq(Scalar::Tag(tag))
    }

    /// Atajo para [`Pattern::Eq`] sobre un literal.
    pub fn atom<A: Into<Atom>>(atom: A) -> Pattern {
        Pattern::Eq(Scalar::Atom(atom.into()))
    }

    pub fn cons(head: Pattern, tail: Pattern) -> Pattern {
        Pattern::Cons(Box::new(head), Box::new(tail))
    }

    /// `(tag p1 p2 ..)`
    pub fn expr(tag: Tag, children: Vec<Pattern>) -> Pattern {
        let mut items = Vec::with_capacity(children.len() + 1);
        items.push(Pattern::tag(tag));
        items.extend(children);

        Pattern::Seq(items)
    }

    /// Nombres capturados, en orden de aparición.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<&'static str>) {
        match self {
            Pattern::Bind(name) => names.push(*name),
            Pattern::Cons(head, tail) => {
                head.collect_names(names);
                tail.collect_names(names);
            }
            Pattern::Seq(items) => items.iter().for_each(|item| item.collect_names(names)),
            Pattern::Discard | Pattern::Never | Pattern::Eq(_) => (),
        }
    }

    /// Verifica que ningún nombre se capture dos veces.
    pub fn validate(&self) -> Result<(), CompileError> {
        let names = self.names();
        for (index, name) in names.iter().enumerate() {
            if names[..index].contains(name) {
                return Err(CompileError::DuplicateBinding(*name));
            }
        }

        Ok(())
    }

    /// Compara contra un nodo.
    pub fn matches<'a>(&self, node: &'a Node) -> Option<Bindings<'a>> {
        self.match_subject(Subject::Node(node))
    }

    /// Compara contra cualquier [`Subject`].
    pub fn match_subject<'a>(&self, subject: Subject<'a>) -> Option<Bindings<'a>> {
        match self {
            Pattern::Bind(name) => {
                let mut bindings = Bindings::default();
                bindings.captures.insert(*name, subject);
                Some(bindings)
            }

            Pattern::Discard => Some(Bindings::default()),
            Pattern::Never => None,

            Pattern::Eq(scalar) => match (scalar, subject) {
                (Scalar::Tag(expected), Subject::Tag(found)) if *expected == found => {
                    Some(Bindings::default())
                }

                (Scalar::Atom(expected), Subject::Node(Node::Literal(found)))
                    if expected == found =>
                {
                    Some(Bindings::default())
                }

                _ => None,
            },

            Pattern::Cons(head, tail) => {
                let (first, rest) = subject.split_first()?;
                let mut bindings = head.match_subject(first)?;
                bindings.extend(tail.match_subject(rest)?);
                Some(bindings)
            }

            Pattern::Seq(items) => {
                if subject.len()? != items.len() {
                    return None;
                }

                let mut bindings = Bindings::default();
                let mut rest = subject;
                for item in items {
                    let (first, tail) = rest.split_first()?;
                    bindings.extend(item.match_subject(first)?);
                    rest = tail;
                }

                Some(bindings)
            }
        }
    }

    /// Construye una regla de reescritura a partir de este patrón.
    pub fn replace<F>(self, action: F) -> Result<Rule, CompileError>
    where
        F: 'static + Fn(&Bindings<'_>) -> Result<Vec<Node>, CompileError>,
    {
        self.validate()?;
        Ok(Rule {
            pattern: self,
            action: Box::new(action),
        })
    }
}

/// Acción de una regla: produce las sentencias que reemplazan al nodo.
pub type Action = Box<dyn Fn(&Bindings<'_>) -> Result<Vec<Node>, CompileError>>;

/// Regla de reescritura "coincide y reemplaza, o identidad".
pub struct Rule {
    pattern: Pattern,
    action: Action,
}

impl Rule {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Aplica la regla a una sentencia.
    ///
    /// Retorna `None` si el patrón no coincide, en cuyo caso la
    /// sentencia queda tal cual.
    pub fn try_apply(&self, node: &Node) -> Result<Option<Vec<Node>>, CompileError> {
        match self.pattern.matches(node) {
            Some(bindings) => (self.action)(&bindings).map(Some),
            None => Ok(None),
        }
    }

    /// Aplica la regla a una sentencia, retornándola sin cambios si no coincide.
    pub fn apply(&self, node: &Node) -> Result<Vec<Node>, CompileError> {
        Ok(self
            .try_apply(node)?
            .unwrap_or_else(|| vec![node.clone()]))
    }

    /// Aplica la regla a cada sentencia de un cuerpo, sin descender en ellas.
    pub fn apply_all(&self, body: &[Node]) -> Result<Vec<Node>, CompileError> {
        let mut output = Vec::with_capacity(body.len());
        for statement in body {
            output.extend(self.apply(statement)?);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> Node {
        Node::build(Tag::Local, vec![Node::literal(name)])
    }

    #[test]
    fn bind_captures_the_whole_subject() {
        let node = local("x");
        let bindings = Pattern::Bind("all").matches(&node).unwrap();
        assert_eq!(bindings.node("all").unwrap(), &node);
    }

    #[test]
    fn discard_and_never() {
        let node = local("x");
        assert!(Pattern::Discard.matches(&node).unwrap().is_empty());
        assert!(Pattern::Never.matches(&node).is_none());
    }

    #[test]
    fn positional_sequence_requires_equal_length() {
        let node = local("x");
        let pattern = Pattern::expr(Tag::Local, vec![Pattern::Bind("name")]);
        let bindings = pattern.matches(&node).unwrap();
        assert_eq!(bindings.node("name").unwrap(), &Node::literal("x"));
        assert!(bindings.seq("name").is_err());

        let too_long = Pattern::expr(Tag::Local, vec![Pattern::Discard, Pattern::Discard]);
        assert!(too_long.matches(&node).is_none());

        let wrong_tag = Pattern::expr(Tag::Name, vec![Pattern::Discard]);
        assert!(wrong_tag.matches(&node).is_none());
    }

    #[test]
    fn cons_splits_head_and_tail() {
        let body = Node::build(Tag::Body, vec![local("a"), local("b")]);
        let pattern = Pattern::cons(Pattern::tag(Tag::Body), Pattern::Bind("statements"));
        let bindings = pattern.matches(&body).unwrap();
        assert_eq!(bindings.seq("statements").unwrap(), &[local("a"), local("b")][..]);

        // Cabeza y cola sobre la secuencia de hijos
        let nested = Pattern::cons(
            Pattern::tag(Tag::Body),
            Pattern::cons(Pattern::Bind("first"), Pattern::Bind("rest")),
        );
        let bindings = nested.matches(&body).unwrap();
        assert_eq!(bindings.node("first").unwrap(), &local("a"));
        assert_eq!(bindings.seq("rest").unwrap(), &[local("b")][..]);
    }

    #[test]
    fn cons_fails_on_empty_sequence() {
        let empty = Node::build(Tag::Body, vec![]);
        let pattern = Pattern::cons(
            Pattern::tag(Tag::Body),
            Pattern::cons(Pattern::Discard, Pattern::Discard),
        );

        assert!(pattern.matches(&empty).is_none());
    }

    #[test]
    fn literals_compare_by_value() {
        let node = Node::literal(Atom::Int(7));
        assert!(Pattern::atom(Atom::Int(7)).matches(&node).is_some());
        assert!(Pattern::atom(Atom::Int(8)).matches(&node).is_none());
        assert!(Pattern::atom("x").matches(&Node::literal("x")).is_some());

        // Un literal no es una secuencia
        assert!(Pattern::Seq(vec![]).matches(&node).is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let pattern = Pattern::Seq(vec![Pattern::Bind("x"), Pattern::Bind("x")]);
        assert!(matches!(
            pattern.validate(),
            Err(CompileError::DuplicateBinding("x"))
        ));

        assert!(pattern.replace(|_| Ok(vec![])).is_err());
    }

    #[test]
    fn rule_is_identity_on_mismatch() {
        let rule = Pattern::expr(Tag::Local, vec![Pattern::Bind("x")])
            .replace(|b| Ok(vec![b.node("x")?.clone(), b.node("x")?.clone()]))
            .unwrap();

        let other = Node::build(Tag::EnvBegin, vec![]);
        assert_eq!(rule.apply(&other).unwrap(), vec![other.clone()]);
        assert_eq!(
            rule.apply(&local("y")).unwrap(),
            vec![Node::literal("y"), Node::literal("y")]
        );

        let body = rule.apply_all(&[other.clone(), local("z")]).unwrap();
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn actions_report_missing_captures() {
        let rule = Pattern::expr(Tag::Local, vec![Pattern::Bind("x")])
            .replace(|b| Ok(b.seq("y")?.to_vec()))
            .unwrap();

        assert!(matches!(
            rule.apply(&local("a")),
            Err(CompileError::MissingCapture { name, expected: "sequence" }) if name == "y"
        ));
    }
}
