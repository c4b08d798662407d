//! Python parsing and a typed walk over the syntax tree.
//!
//! tree-sitter hands back an untyped concrete syntax tree where every node is
//! identified by a kind string. The walk below classifies each node into a
//! [`Construct`] exactly once and dispatches on that tag, so checks are written
//! against a closed set of variants instead of string comparisons scattered
//! through the validator.

use std::borrow::Cow;

use tree_sitter::{Node, Parser, Tree};
use tree_sitter_python::LANGUAGE as PYTHON;

/// Where and why parsing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub reason: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column (bytes).
    pub column: usize,
}

/// Security-relevant node kinds; everything else is [`Construct::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Construct {
    /// `import a.b, c as d`: one dotted module path per imported name.
    Import(Vec<String>),
    /// `from x.y import z`. `None` for a bare relative import (`from . import z`).
    ImportFrom(Option<String>),
    /// A call. The target is the bare name or the attribute name of a method
    /// call; `None` when the callee is any other expression.
    Call(Option<String>),
    /// `obj.name`
    Attribute(String),
    /// A dotted value or class name in a `match` pattern, such as
    /// `case int.__class__:`. Holds the segments after the first, outermost
    /// first, so they are checked in the same order as nested attributes.
    PatternAttributes(Vec<String>),
    Other,
}

/// Receives one callback per classified node, in source pre-order.
pub trait Visitor {
    fn visit_import(&mut self, _modules: &[String]) {}
    fn visit_import_from(&mut self, _module: Option<&str>) {}
    fn visit_call(&mut self, _target: Option<&str>) {}
    fn visit_attribute(&mut self, _name: &str) {}
}

/// Encoding names, compared lowercase with `_` as `-`, under which CPython
/// decodes a file to the same text the parser reads.
const SOURCE_ENCODINGS: &[&str] = &["utf-8", "utf8", "ascii", "us-ascii"];

/// Rewrites `\r\n` and lone `\r` to `\n`.
///
/// CPython reads all three as line breaks while the grammar treats a lone
/// `\r` as plain whitespace. Parse and run the normalized text so both sides
/// split lines the same way.
pub fn normalize_newlines(source: &str) -> Cow<'_, str> {
    if source.contains('\r') {
        Cow::Owned(source.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(source)
    }
}

/// Parses Python source, rejecting anything the grammar had to recover from.
///
/// Expects text already passed through [`normalize_newlines`]. A source
/// encoding declaration other than UTF-8 or ASCII is a syntax error, since
/// the interpreter would decode the file into different text.
pub fn parse(source: &str) -> Result<Tree, SyntaxError> {
    check_source_encoding(source)?;

    let mut parser = Parser::new();
    parser
        .set_language(&PYTHON.into())
        .map_err(|e| SyntaxError {
            reason: format!("python grammar unavailable: {e}"),
            line: 1,
            column: 1,
        })?;

    let tree = parser.parse(source, None).ok_or_else(|| SyntaxError {
        reason: "parser produced no tree".to_string(),
        line: 1,
        column: 1,
    })?;

    if let Some(err) = first_error(tree.root_node()) {
        return Err(err);
    }
    Ok(tree)
}

/// Looks for a `coding[:=]name` comment in the first two lines.
fn check_source_encoding(source: &str) -> Result<(), SyntaxError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    for (row, line) in source.split('\n').take(2).enumerate() {
        let Some((column, encoding)) = coding_declaration(line) else {
            continue;
        };
        let normalized = encoding.to_ascii_lowercase().replace('_', "-");
        if !SOURCE_ENCODINGS.contains(&normalized.as_str()) {
            return Err(SyntaxError {
                reason: format!("unsupported source encoding '{encoding}'"),
                line: row + 1,
                column: column + 1,
            });
        }
    }
    Ok(())
}

/// `# -*- coding: latin-1 -*-` → `(0, "latin-1")`
fn coding_declaration(line: &str) -> Option<(usize, &str)> {
    let comment = line.trim_start_matches([' ', '\t', '\x0c']);
    if !comment.starts_with('#') {
        return None;
    }
    let column = line.len() - comment.len();
    comment.match_indices("coding").find_map(|(at, keyword)| {
        let rest = comment[at + keyword.len()..].strip_prefix([':', '='])?;
        let rest = rest.trim_start_matches([' ', '\t']);
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(rest.len());
        (end > 0).then_some((column, &rest[..end]))
    })
}

/// Finds the first node that makes the source invalid Python 3.
///
/// Besides recovery nodes, the grammar accepts the Python 2 `print` and `exec`
/// statements; CPython 3 does not, and an `exec "..."` statement would slip past
/// call-site checks, so both count as syntax errors.
fn first_error(root: Node<'_>) -> Option<SyntaxError> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let reason = if node.is_missing() {
            Some(format!("expected '{}'", node.kind()))
        } else if node.is_error() {
            Some("invalid syntax".to_string())
        } else if matches!(node.kind(), "print_statement" | "exec_statement") {
            Some("Python 2 statement is not valid Python 3".to_string())
        } else {
            None
        };

        if let Some(reason) = reason {
            let pos = node.start_position();
            return Some(SyntaxError {
                reason,
                line: pos.row + 1,
                column: pos.column + 1,
            });
        }

        push_children(node, &mut stack, false);
    }
    None
}

/// Walks every node in source pre-order and dispatches classified constructs.
///
/// Uses an explicit stack so deeply nested input cannot exhaust the call stack.
pub fn walk<V: Visitor>(tree: &Tree, source: &str, visitor: &mut V) {
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        match Construct::classify(node, source) {
            Construct::Import(modules) => visitor.visit_import(&modules),
            Construct::ImportFrom(module) => visitor.visit_import_from(module.as_deref()),
            Construct::Call(target) => visitor.visit_call(target.as_deref()),
            Construct::Attribute(name) => visitor.visit_attribute(&name),
            Construct::PatternAttributes(names) => {
                for name in &names {
                    visitor.visit_attribute(name);
                }
            }
            Construct::Other => {}
        }
        push_children(node, &mut stack, true);
    }
}

fn push_children<'t>(node: Node<'t>, stack: &mut Vec<Node<'t>>, named_only: bool) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = if named_only {
        node.named_children(&mut cursor).collect()
    } else {
        node.children(&mut cursor).collect()
    };
    // LIFO stack: push in reverse so the leftmost child is visited first.
    stack.extend(children.into_iter().rev());
}

impl Construct {
    pub fn classify(node: Node<'_>, source: &str) -> Self {
        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                let modules = node
                    .children_by_field_name("name", &mut cursor)
                    .filter_map(|name| imported_module(name, source))
                    .collect();
                Construct::Import(modules)
            }
            "import_from_statement" => {
                let module = node
                    .child_by_field_name("module_name")
                    .and_then(|m| from_module(m, source));
                Construct::ImportFrom(module)
            }
            "future_import_statement" => Construct::ImportFrom(Some("__future__".to_string())),
            "call" => {
                let target = node.child_by_field_name("function").and_then(|f| match f.kind() {
                    "identifier" => text(f, source),
                    "attribute" => f
                        .child_by_field_name("attribute")
                        .and_then(|a| text(a, source)),
                    _ => None,
                });
                Construct::Call(target)
            }
            "attribute" => match node
                .child_by_field_name("attribute")
                .and_then(|a| text(a, source))
            {
                Some(name) => Construct::Attribute(name),
                None => Construct::Other,
            },
            // Outside imports a dotted name only appears in match patterns.
            "dotted_name" if !is_import_name(node) => {
                let mut cursor = node.walk();
                let mut names: Vec<String> = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() == "identifier")
                    .skip(1)
                    .filter_map(|child| text(child, source))
                    .collect();
                if names.is_empty() {
                    Construct::Other
                } else {
                    names.reverse();
                    Construct::PatternAttributes(names)
                }
            }
            _ => Construct::Other,
        }
    }
}

fn is_import_name(node: Node<'_>) -> bool {
    node.parent().is_some_and(|parent| {
        matches!(
            parent.kind(),
            "import_statement"
                | "import_from_statement"
                | "future_import_statement"
                | "aliased_import"
                | "relative_import"
        )
    })
}

/// `a.b` or `a.b as c` → `a.b`
fn imported_module(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "dotted_name" => dotted(node, source),
        "aliased_import" => node
            .child_by_field_name("name")
            .and_then(|n| dotted(n, source)),
        _ => None,
    }
}

/// `x.y` → `x.y`; `.x.y` → `x.y`; `.` → nothing
fn from_module(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "dotted_name" => dotted(node, source),
        "relative_import" => {
            let mut cursor = node.walk();
            let name = node
                .named_children(&mut cursor)
                .find(|child| child.kind() == "dotted_name");
            name.and_then(|n| dotted(n, source))
        }
        _ => None,
    }
}

/// Joins the identifiers of a dotted name, ignoring any whitespace or
/// comments the source placed between the segments.
fn dotted(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let parts: Vec<String> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "identifier")
        .filter_map(|child| text(child, source))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

fn text(node: Node<'_>, source: &str) -> Option<String> {
    node.utf8_text(source.as_bytes()).ok().map(str::to_owned)
}
