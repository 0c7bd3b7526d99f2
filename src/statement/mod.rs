//! Statement classification: the logical shape behind `ask` and `tell`.
//!
//! Surface conventions:
//! - `(value attribute)`: type fact, e.g. `(ball ball1)`
//! - `(value relation subject)`: relation fact, e.g. `(red has-color ball1)`
//! - `?` marks the unknown position of a query
//! - `(not S)` negates a whole statement
//! - `(!...)` requests the complement set of a query
//! - `!term` excludes one specific reference inside a backend filter
//! - `(is_a A B)` asks whether `A` subsumes `B`

pub mod parser;

use crate::error::StatementError;

pub use parser::{TermTree, parse, split};

/// Prefix of a negated statement.
pub const NEGATION_PREFIX: &str = "(not ";
/// Prefix of a complement-set query.
pub const COMPLEMENT_PREFIX: &str = "(!";
/// The query placeholder.
pub const WILDCARD: &str = "?";
/// Marks a term as "anything except this reference".
pub const EXCLUSION_PREFIX: char = '!';
/// Reserved first term of a subsumption check.
pub const SUBSUMPTION_KEYWORD: &str = "is_a";

/// Whether the statement is a logical negation `(not ...)`.
pub fn is_negative(statement: &str) -> bool {
    statement.trim_start().starts_with(NEGATION_PREFIX)
}

/// Whether the statement asks for a complement set `(!...)`.
pub fn is_complement(statement: &str) -> bool {
    statement.trim_start().starts_with(COMPLEMENT_PREFIX)
}

/// Wrap a statement in `(not ...)`, or unwrap it if it is already negated.
///
/// Applying `negate` twice yields the whitespace-normalized original.
pub fn negate(statement: &str) -> Result<String, StatementError> {
    if !is_negative(statement) {
        return Ok(format!("{NEGATION_PREFIX}{})", statement.trim()));
    }
    let mut terms = split(statement)?;
    match terms.len() {
        count @ (0 | 1) => Err(StatementError::Arity { count }),
        2 => Ok(terms.remove(1)),
        _ => Ok(format!("({})", terms[1..].join(" "))),
    }
}

/// Reject statements that could smuggle protocol commands into a shared
/// connection: line breaks, and any of the `reserved` tokens.
pub fn screen(statement: &str, reserved: &[String]) -> Result<(), StatementError> {
    if let Some(ch) = statement.chars().find(|c| matches!(c, '\n' | '\r')) {
        return Err(StatementError::Disallowed {
            token: ch.to_string(),
        });
    }
    if let Some(token) = reserved
        .iter()
        .find(|t| !t.is_empty() && statement.contains(t.as_str()))
    {
        return Err(StatementError::Disallowed {
            token: token.clone(),
        });
    }
    Ok(())
}

/// A backend identifier with its exclusion flag split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    /// Identifier with any leading `!` removed.
    pub name: String,
    /// Set when the term was written `!name`.
    pub excluded: bool,
}

impl Ident {
    pub fn parse(term: &str) -> Self {
        match term.strip_prefix(EXCLUSION_PREFIX) {
            Some(rest) => Self {
                name: rest.to_string(),
                excluded: true,
            },
            None => Self {
                name: term.to_string(),
                excluded: false,
            },
        }
    }
}

/// Derived, transient view of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Statement text (after unwrapping any negation).
    pub text: String,
    /// Odd number of `(not ...)` wrappers.
    pub negated: bool,
    /// Complement-set query marker.
    pub complement: bool,
    /// Top-level terms; the complement `!` is already stripped from the first.
    pub terms: Vec<String>,
    /// Position of the first `?`, if any.
    pub wildcard: Option<usize>,
}

/// The backend-independent question a statement poses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryShape {
    /// `(C i)`: does `i` hold type `C`?
    TypeCheck { concept: Ident, individual: Ident },
    /// `(? i)`: which types does `i` have?
    TypeQuery { individual: Ident },
    /// `(C ?)` / `(!C ?)`: which individuals are (not) of type `C`?
    ConceptInstances { concept: Ident, complement: bool },
    /// `(? r s)` / `(!? r s)`: which values does (not) `s` have for `r`?
    RelationQuery {
        relation: Ident,
        subject: Ident,
        complement: bool,
    },
    /// `(v ? s)`: which relations link `s` to `v`?
    RoleHolder { value: Ident, subject: Ident },
    /// `(v r ?)` / `(!v r ?)`: which subjects have (not) value `v` for `r`?
    SubjectQuery {
        value: Ident,
        relation: Ident,
        complement: bool,
    },
    /// `(is_a A B)`: does `A` subsume `B`?
    Subsumption { general: Ident, specific: Ident },
    /// `(v r s)`: does `s` have value `v` for `r`?
    RelationCheck {
        value: Ident,
        relation: Ident,
        subject: Ident,
    },
}

impl QueryShape {
    /// Whether the answer is a set of terms rather than a boolean.
    pub fn returns_terms(&self) -> bool {
        !matches!(
            self,
            QueryShape::TypeCheck { .. }
                | QueryShape::Subsumption { .. }
                | QueryShape::RelationCheck { .. }
        )
    }
}

/// A ground fact, the payload of `tell`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    /// `(C i)`
    Concept { concept: Ident, individual: Ident },
    /// `(v r s)`
    Role {
        value: Ident,
        relation: Ident,
        subject: Ident,
    },
}

impl Fact {
    /// Canonical surface form, as produced by `dump`.
    pub fn render(&self) -> String {
        match self {
            Fact::Concept {
                concept,
                individual,
            } => format!("({} {})", concept.name, individual.name),
            Fact::Role {
                value,
                relation,
                subject,
            } => format!("({} {} {})", value.name, relation.name, subject.name),
        }
    }
}

/// Classify statement text.
pub fn classify(statement: &str) -> Result<Classified, StatementError> {
    if is_negative(statement) {
        let inner = negate(statement)?;
        let mut classified = classify(&inner)?;
        classified.negated = !classified.negated;
        return Ok(classified);
    }

    let complement = is_complement(statement);
    let mut terms = split(statement)?;

    if complement {
        if let Some(first) = terms.first_mut() {
            first.remove(0);
            if first.is_empty() {
                terms.remove(0);
            }
        }
    }

    if !(2..=3).contains(&terms.len()) {
        return Err(StatementError::Arity { count: terms.len() });
    }

    let wildcard = terms.iter().position(|t| t == WILDCARD);

    Ok(Classified {
        text: statement.trim().to_string(),
        negated: false,
        complement,
        terms,
        wildcard,
    })
}

impl Classified {
    pub fn is_query(&self) -> bool {
        self.wildcard.is_some()
    }

    fn ident(&self, index: usize) -> Ident {
        Ident::parse(&self.terms[index])
    }

    /// Arity- and wildcard-based dispatch.
    pub fn shape(&self) -> QueryShape {
        let complement = self.complement;
        match (self.terms.len(), self.wildcard) {
            (2, None) => QueryShape::TypeCheck {
                concept: self.ident(0),
                individual: self.ident(1),
            },
            (2, Some(0)) => QueryShape::TypeQuery {
                individual: self.ident(1),
            },
            (2, Some(_)) => QueryShape::ConceptInstances {
                concept: self.ident(0),
                complement,
            },
            (_, Some(0)) => QueryShape::RelationQuery {
                relation: self.ident(1),
                subject: self.ident(2),
                complement,
            },
            (_, Some(1)) => QueryShape::RoleHolder {
                value: self.ident(0),
                subject: self.ident(2),
            },
            (_, Some(_)) => QueryShape::SubjectQuery {
                value: self.ident(0),
                relation: self.ident(1),
                complement,
            },
            (_, None) if self.terms[0] == SUBSUMPTION_KEYWORD => QueryShape::Subsumption {
                general: self.ident(1),
                specific: self.ident(2),
            },
            (_, None) => QueryShape::RelationCheck {
                value: self.ident(0),
                relation: self.ident(1),
                subject: self.ident(2),
            },
        }
    }

    /// The ground fact this statement asserts or retracts.
    pub fn fact(&self) -> Result<Fact, StatementError> {
        if self.is_query() {
            return Err(StatementError::WildcardInTell {
                statement: self.text.clone(),
            });
        }
        Ok(match self.terms.len() {
            2 => Fact::Concept {
                concept: self.ident(0),
                individual: self.ident(1),
            },
            _ => Fact::Role {
                value: self.ident(0),
                relation: self.ident(1),
                subject: self.ident(2),
            },
        })
    }
}
