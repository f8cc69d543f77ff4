//! Predicate expressions carried by read requests
//!
//! The read path never evaluates predicates; stores may. This module only
//! defines the tree and its diagnostic rendering, which is what ends up in
//! the request log record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `=~`
    Regex,
    /// `!~`
    NotRegex,
}

impl Comparison {
    fn symbol(self) -> &'static str {
        match self {
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Regex => "=~",
            Comparison::NotRegex => "!~",
        }
    }
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logical {
    /// Both sides must hold
    And,
    /// Either side may hold
    Or,
}

/// One node of a predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Binary logical expression
    Logical(Logical, Box<Node>, Box<Node>),
    /// Comparison of two operands
    Comparison(Comparison, Box<Node>, Box<Node>),
    /// Parenthesized sub-expression
    Paren(Box<Node>),
    /// Reference to a tag key
    TagRef(String),
    /// Reference to a field key
    FieldRef(String),
    /// String literal
    String(String),
    /// Regex literal
    Regex(String),
    /// Signed integer literal
    Integer(i64),
    /// Unsigned integer literal
    Unsigned(u64),
    /// Float literal
    Float(f64),
    /// Boolean literal
    Boolean(bool),
}

impl Node {
    /// `tag == "value"`
    pub fn tag_eq(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Node::Comparison(
            Comparison::Equal,
            Box::new(Node::TagRef(tag.into())),
            Box::new(Node::String(value.into())),
        )
    }

    /// `self AND other`
    pub fn and(self, other: Node) -> Self {
        Node::Logical(Logical::And, Box::new(self), Box::new(other))
    }

    /// `self OR other`
    pub fn or(self, other: Node) -> Self {
        Node::Logical(Logical::Or, Box::new(self), Box::new(other))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Logical(op, l, r) => {
                let word = match op {
                    Logical::And => "AND",
                    Logical::Or => "OR",
                };
                write!(f, "{} {} {}", l, word, r)
            }
            Node::Comparison(op, l, r) => write!(f, "{} {} {}", l, op.symbol(), r),
            Node::Paren(inner) => write!(f, "({})", inner),
            Node::TagRef(k) => write!(f, "{}", k),
            Node::FieldRef(k) => write!(f, "${}", k),
            Node::String(s) => write!(f, "'{}'", s),
            Node::Regex(r) => write!(f, "/{}/", r),
            Node::Integer(v) => write!(f, "{}", v),
            Node::Unsigned(v) => write!(f, "{}u", v),
            Node::Float(v) => write!(f, "{}", v),
            Node::Boolean(v) => write!(f, "{}", v),
        }
    }
}

/// A filter expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Root of the expression; `None` renders as `[none]`
    pub root: Option<Node>,
}

impl Predicate {
    /// Wrap an expression tree
    pub fn new(root: Node) -> Self {
        Self { root: Some(root) }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(node) => write!(f, "{}", node),
            None => f.write_str("[none]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_nested_expression() {
        let p = Predicate::new(
            Node::tag_eq("host", "a").and(Node::Paren(Box::new(
                Node::tag_eq("region", "west").or(Node::Comparison(
                    Comparison::Gt,
                    Box::new(Node::FieldRef("usage".into())),
                    Box::new(Node::Float(0.5)),
                )),
            ))),
        );
        assert_eq!(
            p.to_string(),
            "host == 'a' AND (region == 'west' OR $usage > 0.5)"
        );
    }

    #[test]
    fn test_render_empty_root() {
        assert_eq!(Predicate { root: None }.to_string(), "[none]");
    }

    #[test]
    fn test_render_regex() {
        let n = Node::Comparison(
            Comparison::NotRegex,
            Box::new(Node::TagRef("host".into())),
            Box::new(Node::Regex("^db".into())),
        );
        assert_eq!(n.to_string(), "host !~ /^db/");
    }
}
