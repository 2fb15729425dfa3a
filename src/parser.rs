//! Python syntax tree adapter.
//!
//! Parses source text with tree-sitter and turns node edits back into source
//! text. Unparsing is a byte splice of the edited span followed by a reparse,
//! so untouched code keeps its exact bytes and a replacement that breaks the
//! grammar is rejected before it reaches disk.

use tree_sitter::{Node, Parser, Tree, TreeCursor};

/// Byte range inside a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
}

/// A replacement for part of a node, producing an alternative node of the same kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEdit {
    pub span: Span,
    pub replacement: String,
}

pub struct SyntaxTree<'s> {
    tree: Tree,
    source: &'s str,
}

/// Read-only view of one node together with the text it was parsed from.
#[derive(Clone, Copy)]
pub struct SyntaxNode<'t> {
    node: Node<'t>,
    source: &'t str,
}

fn new_parser() -> Result<Parser, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| format!("Failed to set Python grammar: {}", e))?;
    Ok(parser)
}

/// Parse Python source, rejecting input that contains syntax errors.
pub fn parse(source: &str) -> Result<SyntaxTree<'_>, String> {
    let mut parser = new_parser()?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| "parser returned no tree".to_string())?;

    let parsed = SyntaxTree { tree, source };
    if let Some(bad) = parsed.first_error() {
        return Err(format!(
            "syntax error at line {}, column {}",
            bad.line(),
            bad.column()
        ));
    }
    Ok(parsed)
}

impl<'s> SyntaxTree<'s> {
    pub fn root(&self) -> SyntaxNode<'_> {
        SyntaxNode {
            node: self.tree.root_node(),
            source: self.source,
        }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    fn first_error(&self) -> Option<SyntaxNode<'_>> {
        if !self.tree.root_node().has_error() {
            return None;
        }
        self.root()
            .preorder()
            .find(|n| n.node.is_error() || n.node.is_missing())
    }
}

impl<'t> SyntaxNode<'t> {
    pub fn kind(&self) -> &'static str {
        self.node.kind()
    }

    pub fn text(&self) -> &'t str {
        &self.source[self.node.start_byte()..self.node.end_byte()]
    }

    pub fn span(&self) -> Span {
        Span {
            start_byte: self.node.start_byte(),
            end_byte: self.node.end_byte(),
        }
    }

    /// 1-indexed line of the node start.
    pub fn line(&self) -> usize {
        self.node.start_position().row + 1
    }

    /// 1-indexed column of the node start.
    pub fn column(&self) -> usize {
        self.node.start_position().column + 1
    }

    pub fn field(&self, name: &str) -> Option<SyntaxNode<'t>> {
        self.node.child_by_field_name(name).map(|node| SyntaxNode {
            node,
            source: self.source,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = SyntaxNode<'t>> + '_ {
        (0..self.node.child_count()).filter_map(move |i| {
            self.node.child(i).map(|node| SyntaxNode {
                node,
                source: self.source,
            })
        })
    }

    /// Pre-order, left-to-right walk of this node and all its descendants.
    pub fn preorder(&self) -> PreOrder<'t> {
        PreOrder {
            cursor: self.node.walk(),
            source: self.source,
            done: false,
        }
    }

    /// Source text of this node with `edit` applied. `edit` must lie within the node.
    pub fn text_with(&self, edit: &NodeEdit) -> String {
        let start = self.node.start_byte();
        let relative = Span {
            start_byte: edit.span.start_byte - start,
            end_byte: edit.span.end_byte - start,
        };
        splice(self.text(), relative, &edit.replacement)
    }

    pub fn contains(&self, span: Span) -> bool {
        span.start_byte >= self.node.start_byte() && span.end_byte <= self.node.end_byte()
    }
}

pub struct PreOrder<'t> {
    cursor: TreeCursor<'t>,
    source: &'t str,
    done: bool,
}

impl<'t> Iterator for PreOrder<'t> {
    type Item = SyntaxNode<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let node = self.cursor.node();
        if !self.cursor.goto_first_child() {
            while !self.cursor.goto_next_sibling() {
                if !self.cursor.goto_parent() {
                    self.done = true;
                    break;
                }
            }
        }
        Some(SyntaxNode {
            node,
            source: self.source,
        })
    }
}

/// Replace the bytes in `span` with `replacement`.
pub fn splice(source: &str, span: Span, replacement: &str) -> String {
    let mut result =
        String::with_capacity(source.len() - (span.end_byte - span.start_byte) + replacement.len());
    result.push_str(&source[..span.start_byte]);
    result.push_str(replacement);
    result.push_str(&source[span.end_byte..]);
    result
}

/// Apply `edit` to the whole file and check that the result still parses.
pub fn unparse_with(source: &str, edit: &NodeEdit) -> Result<String, String> {
    if edit.span.end_byte > source.len()
        || edit.span.start_byte > edit.span.end_byte
        || !source.is_char_boundary(edit.span.start_byte)
        || !source.is_char_boundary(edit.span.end_byte)
    {
        return Err(format!(
            "edit span {}..{} is outside the source",
            edit.span.start_byte, edit.span.end_byte
        ));
    }
    let mutated = splice(source, edit.span, &edit.replacement);
    parse(&mutated)?;
    Ok(mutated)
}
