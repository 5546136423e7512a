//! Smart Game Format record tree: model, canonical serializer and parser.
//!
//! The live game path only ever produces a single linear sequence, but the
//! model keeps variations so externally authored records survive a
//! parse/serialize cycle.

use thiserror::Error;

/// Keys emitted first, in this order, before any other property of a node.
pub const CANONICAL_KEYS: [&str; 12] = [
    "FF", "GM", "SZ", "PB", "PW", "DT", "RE", "KM", "RU", "C", "B", "W",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SgfError {
    #[error("unexpected end of record")]
    UnexpectedEnd,

    #[error("unexpected '{found}' at byte {pos}, expected {expected}")]
    Unexpected {
        pos: usize,
        found: char,
        expected: &'static str,
    },

    #[error("record is not terminated by ')'")]
    Unterminated,

    #[error("record contains no game tree")]
    Empty,
}

/// Ordered key -> values bag. Keys keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    properties: Vec<(String, Vec<String>)>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Node::push`].
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Append a value to `key`, creating the key if needed.
    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.push(value.into()),
            None => self.properties.push((key.to_string(), vec![value.into()])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// Replace every value of `key` with `value`, keeping the key's position.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        match self.properties.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => *values = vec![value.into()],
            None => self.properties.push((key.to_string(), vec![value.into()])),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(k, _)| k.as_str())
    }

    /// Properties in output order: canonical keys first, then the rest as inserted.
    fn ordered(&self) -> impl Iterator<Item = (&str, &[String])> {
        let canonical = CANONICAL_KEYS
            .iter()
            .filter_map(move |key| self.get(key).map(|values| (*key, values)));
        let rest = self
            .properties
            .iter()
            .filter(|(k, _)| !CANONICAL_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_slice()));
        canonical.chain(rest)
    }
}

/// A sequence of nodes followed by zero or more variations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameTree {
    pub nodes: Vec<Node>,
    pub children: Vec<GameTree>,
}

impl GameTree {
    pub fn new(root: Node) -> Self {
        Self {
            nodes: vec![root],
            children: Vec::new(),
        }
    }

    /// Nodes of the main line: this sequence, then always the first variation.
    pub fn main_line(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut tree = Some(self);
        while let Some(t) = tree {
            out.extend(t.nodes.iter());
            tree = t.children.first();
        }
        out
    }
}

pub fn serialize(tree: &GameTree) -> String {
    let mut out = String::new();
    out.push('(');
    write_tree(&mut out, tree);
    out.push(')');
    out
}

fn write_tree(out: &mut String, tree: &GameTree) {
    for node in &tree.nodes {
        write_node(out, node);
    }
    for child in &tree.children {
        out.push('(');
        write_tree(out, child);
        out.push(')');
    }
}

pub(crate) fn write_node(out: &mut String, node: &Node) {
    out.push(';');
    for (key, values) in node.ordered() {
        out.push_str(key);
        for value in values {
            out.push('[');
            escape_into(out, value);
            out.push(']');
        }
    }
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        if c == ']' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

pub(crate) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse the first game tree of a record.
pub fn parse(text: &str) -> Result<GameTree, SgfError> {
    parse_collection(text)?
        .into_iter()
        .next()
        .ok_or(SgfError::Empty)
}

/// Parse every game tree of a collection.
pub fn parse_collection(text: &str) -> Result<Vec<GameTree>, SgfError> {
    let mut parser = Parser { src: text, pos: 0 };
    let mut trees = Vec::new();
    loop {
        parser.skip_ws();
        match parser.peek() {
            None => break,
            Some('(') => trees.push(parser.tree()?),
            Some(found) => {
                return Err(SgfError::Unexpected {
                    pos: parser.pos,
                    found,
                    expected: "'('",
                })
            }
        }
    }
    if trees.is_empty() {
        return Err(SgfError::Empty);
    }
    Ok(trees)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char, expected: &'static str) -> Result<(), SgfError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(found) => Err(SgfError::Unexpected {
                pos: self.pos - found.len_utf8(),
                found,
                expected,
            }),
            None => Err(SgfError::UnexpectedEnd),
        }
    }

    fn tree(&mut self) -> Result<GameTree, SgfError> {
        self.expect('(', "'('")?;
        let mut tree = GameTree::default();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(';') if tree.children.is_empty() => tree.nodes.push(self.node()?),
                Some('(') => tree.children.push(self.tree()?),
                Some(')') => {
                    self.bump();
                    break;
                }
                Some(found) => {
                    return Err(SgfError::Unexpected {
                        pos: self.pos,
                        found,
                        expected: "';', '(' or ')'",
                    })
                }
                None => return Err(SgfError::UnexpectedEnd),
            }
        }
        if tree.nodes.is_empty() {
            return Err(SgfError::Unexpected {
                pos: self.pos.saturating_sub(1),
                found: ')',
                expected: "';'",
            });
        }
        Ok(tree)
    }

    fn node(&mut self) -> Result<Node, SgfError> {
        self.expect(';', "';'")?;
        let mut node = Node::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if c.is_ascii_alphabetic() => {
                    let key = self.ident();
                    self.skip_ws();
                    if self.peek() != Some('[') {
                        return match self.peek() {
                            Some(found) => Err(SgfError::Unexpected {
                                pos: self.pos,
                                found,
                                expected: "'['",
                            }),
                            None => Err(SgfError::UnexpectedEnd),
                        };
                    }
                    while self.peek() == Some('[') {
                        let value = self.value()?;
                        node.push(&key, value);
                        self.skip_ws();
                    }
                }
                _ => return Ok(node),
            }
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn value(&mut self) -> Result<String, SgfError> {
        self.expect('[', "'['")?;
        let start = self.pos;
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump().ok_or(SgfError::UnexpectedEnd)?;
                }
                Some(']') => break,
                Some(_) => {}
                None => return Err(SgfError::UnexpectedEnd),
            }
        }
        Ok(unescape(&self.src[start..self.pos - 1]))
    }
}
