//! Post-generation checks backed by tree-sitter's Python grammar.

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

/// Generated code that does not parse as Python.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("generated code is not valid Python at line {line}, column {column}: {message}")]
pub struct SyntaxError {
    /// One-based line
    pub line: usize,
    /// One-based column (bytes)
    pub column: usize,
    pub message: String,
    /// The offending source line
    pub text: String,
}

fn parse(code: &str) -> Result<Tree, SyntaxError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| SyntaxError {
            line: 0,
            column: 0,
            message: format!("failed to load Python grammar: {}", e),
            text: String::new(),
        })?;
    parser.parse(code, None).ok_or_else(|| SyntaxError {
        line: 0,
        column: 0,
        message: "parser produced no tree".to_string(),
        text: String::new(),
    })
}

/// Check that `code` is a syntactically valid Python module.
pub fn check_python(code: &str) -> Result<(), SyntaxError> {
    let tree = parse(code)?;
    let root = tree.root_node();
    if !root.has_error() {
        return Ok(());
    }

    let node = first_error(root).unwrap_or(root);
    let position = node.start_position();
    let message = if node.is_missing() {
        format!("missing '{}'", node.kind())
    } else {
        "unexpected syntax".to_string()
    };

    Err(SyntaxError {
        line: position.row + 1,
        column: position.column + 1,
        message,
        text: code.lines().nth(position.row).unwrap_or("").to_string(),
    })
}

/// S-expression of the first expression in `code`, showing how Python groups it.
///
/// Grouping parentheses show up as `parenthesized_expression`, so two
/// spellings of the same grouping compare equal only after
/// [`strip_parentheses`].
pub fn expression_shape(code: &str) -> Option<String> {
    let tree = parse(code).ok()?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }
    let statement = root.named_child(0)?;
    if statement.kind() != "expression_statement" {
        return None;
    }
    let expression = statement.named_child(0)?;
    if expression.kind().ends_with("assignment") {
        return None;
    }
    Some(expression.to_sexp())
}

/// Remove `parenthesized_expression` wrappers from an S-expression.
pub fn strip_parentheses(sexp: &str) -> String {
    let marker = "(parenthesized_expression ";
    let mut result = String::with_capacity(sexp.len());
    let mut rest = sexp;
    // Depth at which each open wrapper started, so its closing paren is dropped too
    let mut open_wrappers: Vec<usize> = Vec::new();
    let mut depth = 0usize;

    while !rest.is_empty() {
        if rest.starts_with(marker) {
            open_wrappers.push(depth);
            depth += 1;
            rest = &rest[marker.len()..];
            continue;
        }
        let ch = rest.chars().next().unwrap_or(' ');
        match ch {
            '(' => {
                depth += 1;
                result.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if open_wrappers.last() == Some(&depth) {
                    open_wrappers.pop();
                } else {
                    result.push(ch);
                }
            }
            _ => result.push(ch),
        }
        rest = &rest[ch.len_utf8()..];
    }
    result
}

fn first_error<'tree>(node: Node<'tree>) -> Option<Node<'tree>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}
