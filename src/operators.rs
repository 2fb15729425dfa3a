//! Mutation rules and the registry that holds them.
//!
//! A rule looks at one node and proposes alternative nodes of the same kind,
//! expressed as [`NodeEdit`]s over part of that node. Rules are stateless and
//! never propose an edit that leaves the node unchanged. New rule families
//! plug in by implementing [`MutationRule`] and registering an instance.

use crate::parser::{NodeEdit, SyntaxNode};

pub type Edits<'t> = Box<dyn Iterator<Item = NodeEdit> + 't>;

pub trait MutationRule: Send + Sync {
    /// Stable identifier used in reports and in the `rules` setting.
    fn name(&self) -> &'static str;

    fn mutate<'t>(&self, node: SyntaxNode<'t>) -> Edits<'t>;
}

/// Arithmetic operators are inverted; floor division collapses to plain division.
pub const ARITHMETIC_TABLE: &[(&str, &str)] = &[
    ("+", "-"),
    ("-", "+"),
    ("*", "/"),
    ("/", "*"),
    ("//", "/"),
];

pub const LOGICAL_TABLE: &[(&str, &str)] = &[("and", "or"), ("or", "and")];

/// Boundary shift first, then negation.
pub const COMPARISON_TABLE: &[(&str, &str)] = &[
    (">", ">="),
    (">", "<="),
    (">=", ">"),
    (">=", "<"),
    ("<", "<="),
    ("<", ">="),
    ("<=", "<"),
    ("<=", ">"),
    ("==", "!="),
    ("!=", "=="),
    ("is", "is not"),
    ("is not", "is"),
    ("in", "not in"),
    ("not in", "in"),
];

pub const BOOLEAN_TABLE: &[(&str, &str)] = &[("True", "False"), ("False", "True")];

/// Replacements for `op` in `table`, in table order.
pub fn lookup<'a>(table: &'a [(&'a str, &'a str)], op: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    table
        .iter()
        .filter(move |(from, to)| *from == op && from != to)
        .map(|(_, to)| *to)
}

/// Swaps the operator token of a binary-style node according to a fixed table.
pub struct OperatorSwap {
    name: &'static str,
    node_kind: &'static str,
    table: &'static [(&'static str, &'static str)],
}

impl OperatorSwap {
    pub const fn new(
        name: &'static str,
        node_kind: &'static str,
        table: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            name,
            node_kind,
            table,
        }
    }

    pub fn table(&self) -> &'static [(&'static str, &'static str)] {
        self.table
    }
}

impl MutationRule for OperatorSwap {
    fn name(&self) -> &'static str {
        self.name
    }

    fn mutate<'t>(&self, node: SyntaxNode<'t>) -> Edits<'t> {
        if node.kind() != self.node_kind {
            return Box::new(std::iter::empty());
        }
        let Some(op) = node.field("operator") else {
            return Box::new(std::iter::empty());
        };
        let span = op.span();
        Box::new(lookup(self.table, op.text()).map(move |to| NodeEdit {
            span,
            replacement: to.to_string(),
        }))
    }
}

/// Flips each operator of a (possibly chained) comparison.
pub struct ComparisonFlip;

impl MutationRule for ComparisonFlip {
    fn name(&self) -> &'static str {
        "comparison"
    }

    fn mutate<'t>(&self, node: SyntaxNode<'t>) -> Edits<'t> {
        if node.kind() != "comparison_operator" {
            return Box::new(std::iter::empty());
        }
        // Operands are named nodes; the operator tokens are the anonymous children.
        let ops: Vec<SyntaxNode<'t>> = node
            .children()
            .filter(|c| COMPARISON_TABLE.iter().any(|(from, _)| *from == c.kind()))
            .collect();
        Box::new(ops.into_iter().flat_map(|op| {
            let span = op.span();
            lookup(COMPARISON_TABLE, op.text()).map(move |to| NodeEdit {
                span,
                replacement: to.to_string(),
            })
        }))
    }
}

pub struct BooleanFlip;

impl MutationRule for BooleanFlip {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn mutate<'t>(&self, node: SyntaxNode<'t>) -> Edits<'t> {
        if node.kind() != "true" && node.kind() != "false" {
            return Box::new(std::iter::empty());
        }
        let span = node.span();
        Box::new(lookup(BOOLEAN_TABLE, node.text()).map(move |to| NodeEdit {
            span,
            replacement: to.to_string(),
        }))
    }
}

pub const DEFAULT_RULES: &[&str] = &["arithmetic", "logical"];

/// Every rule that can be enabled by name.
pub fn catalog() -> Vec<Box<dyn MutationRule>> {
    vec![
        Box::new(OperatorSwap::new("arithmetic", "binary_operator", ARITHMETIC_TABLE)),
        Box::new(OperatorSwap::new("logical", "boolean_operator", LOGICAL_TABLE)),
        Box::new(ComparisonFlip),
        Box::new(BooleanFlip),
    ]
}

pub fn catalog_names() -> Vec<&'static str> {
    catalog().iter().map(|r| r.name()).collect()
}

/// Ordered collection of active rules.
#[derive(Default)]
pub struct Registry {
    rules: Vec<Box<dyn MutationRule>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default rule set: arithmetic and logical operator swaps.
    pub fn builtin() -> Self {
        Self::from_names(DEFAULT_RULES).unwrap_or_default()
    }

    /// Build a registry from catalog names, in the order given.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let mut available = catalog();
        let mut registry = Self::new();
        for name in names {
            let name = name.as_ref();
            let Some(pos) = available.iter().position(|r| r.name() == name) else {
                if registry.rules.iter().any(|r| r.name() == name) {
                    continue;
                }
                return Err(format!(
                    "Unknown mutation rule '{}'. Available: {}",
                    name,
                    catalog_names().join(", ")
                ));
            };
            registry.register(available.remove(pos));
        }
        Ok(registry)
    }

    pub fn register(&mut self, rule: Box<dyn MutationRule>) {
        self.rules.push(rule);
    }

    pub fn all_rules(&self) -> impl Iterator<Item = &dyn MutationRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Union of every rule's edits for `node`, rule by rule in registration order.
    /// Edits that would leave the node text unchanged are dropped.
    pub fn mutate<'t>(
        &'t self,
        node: SyntaxNode<'t>,
    ) -> impl Iterator<Item = (&'static str, NodeEdit)> + 't {
        self.rules.iter().flat_map(move |rule| {
            let name = rule.name();
            rule.mutate(node)
                .filter(move |edit| {
                    node.contains(edit.span)
                        && node.text_with(edit) != node.text()
                })
                .map(move |edit| (name, edit))
        })
    }
}
