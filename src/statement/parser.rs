//! Statement parser: parenthesized surface syntax → term tree.
//!
//! Tokenization inserts separators around every `(` and `)` and splits on
//! whitespace. Groups are then consumed recursively. Only the outermost level
//! is ever interpreted by the rest of the crate, so [`split`] flattens the
//! tree one level and renders nested groups back into opaque strings.

use std::fmt;

use crate::error::StatementError;

/// Parsed form of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermTree {
    /// A bare token such as `red`, `?` or `!ball1`.
    Atom(String),
    /// A parenthesized group of child terms.
    List(Vec<TermTree>),
}

impl TermTree {
    /// Flatten one level: a top-level group yields its children, with nested
    /// groups rendered back to their parenthesized text.
    pub fn into_terms(self) -> Vec<String> {
        match self {
            TermTree::Atom(token) => vec![token],
            TermTree::List(children) => children.iter().map(ToString::to_string).collect(),
        }
    }
}

impl fmt::Display for TermTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermTree::Atom(token) => f.write_str(token),
            TermTree::List(children) => {
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Open(usize),
    Close(usize),
    Word(&'a str),
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        if ch == '(' || ch == ')' || ch.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(Token::Word(&text[s..i]));
            }
            match ch {
                '(' => tokens.push(Token::Open(i)),
                ')' => tokens.push(Token::Close(i)),
                _ => {}
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(Token::Word(&text[s..]));
    }
    tokens
}

/// Parse statement text into a term tree.
///
/// Parenthesization is optional at the top level: `a b c` and `(a b c)` both
/// yield a three-element list. A lone atom yields [`TermTree::Atom`].
pub fn parse(text: &str) -> Result<TermTree, StatementError> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Err(StatementError::Empty);
    }

    let mut pos = 0;
    let mut top = Vec::new();
    while pos < tokens.len() {
        top.push(parse_node(&tokens, &mut pos)?);
    }

    if top.len() == 1 {
        Ok(top.remove(0))
    } else {
        Ok(TermTree::List(top))
    }
}

fn parse_node(tokens: &[Token<'_>], pos: &mut usize) -> Result<TermTree, StatementError> {
    let token = tokens[*pos];
    *pos += 1;
    match token {
        Token::Word(word) => Ok(TermTree::Atom(word.to_string())),
        Token::Close(offset) => Err(StatementError::UnexpectedClose { offset }),
        Token::Open(offset) => {
            let mut children = Vec::new();
            loop {
                match tokens.get(*pos) {
                    None => return Err(StatementError::Unbalanced { offset }),
                    Some(Token::Close(_)) => {
                        *pos += 1;
                        return Ok(TermTree::List(children));
                    }
                    Some(_) => children.push(parse_node(tokens, pos)?),
                }
            }
        }
    }
}

/// Split a statement into its top-level terms.
///
/// `(not (red has-color ball1))` → `["not", "(red has-color ball1)"]`.
pub fn split(text: &str) -> Result<Vec<String>, StatementError> {
    parse(text).map(TermTree::into_terms)
}
