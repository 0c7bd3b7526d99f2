//! Typed requests of the reasoner line protocol.
//!
//! Every request the adapter sends is one [`Request`] variant rendered by its
//! `Display` impl, so each wire shape can be checked in isolation. Individual,
//! concept and role names are written as `#!:name` (resolved against the
//! ontology's default namespace).

use std::fmt;

/// Prefix that resolves a bare name in the default namespace.
pub const NAME_PREFIX: &str = "#!:";

/// Query variable used by `retrieve`.
pub const QUERY_VAR: &str = "?x";

struct Name<'a>(&'a str);

impl fmt::Display for Name<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{NAME_PREFIX}{}", self.0)
    }
}

/// Body of a `retrieve` query over the single variable `?x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievePattern<'a> {
    /// `?x` is an instance of `concept`.
    Instance { concept: &'a str },
    /// `subject` is related to `?x` by `relation`.
    Filler { subject: &'a str, relation: &'a str },
    /// `?x` is related to `value` by `relation`.
    Holder { value: &'a str, relation: &'a str },
}

impl fmt::Display for RetrievePattern<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RetrievePattern::Instance { concept } => {
                write!(f, "({QUERY_VAR} {})", Name(concept))
            }
            RetrievePattern::Filler { subject, relation } => {
                write!(f, "({} {QUERY_VAR} {})", Name(subject), Name(relation))
            }
            RetrievePattern::Holder { value, relation } => {
                write!(f, "({QUERY_VAR} {} {})", Name(value), Name(relation))
            }
        }
    }
}

/// One line of the reasoner protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    // -- session control --
    LoggingOn,
    EnableSimplifiedProtocol,
    FullReset,
    PrepareAbox,
    ReadFile { path: &'a str },
    SaveKb { path: &'a str },
    SetCurrentAbox { abox: &'a str },
    CloneAbox { abox: &'a str },
    DeleteAbox { abox: &'a str },
    LastAnswer,
    NamespacePrefix { prefix: &'a str },

    // -- queries --
    IndividualInstance { individual: &'a str, concept: &'a str },
    IndividualDirectTypes { individual: &'a str },
    ConceptInstances { concept: &'a str },
    Retrieve { pattern: RetrievePattern<'a>, complement: bool },
    IndividualFilledRoles { subject: &'a str, value: &'a str },
    ConceptSubsumes { general: &'a str, specific: &'a str },
    IndividualsRelated { subject: &'a str, value: &'a str, relation: &'a str },
    Feature { relation: &'a str },
    RoleInverse { role: &'a str },

    // -- mutations --
    AddConceptAssertion { abox: &'a str, individual: &'a str, concept: &'a str },
    ForgetConceptAssertion { abox: &'a str, individual: &'a str, concept: &'a str },
    AddRoleAssertion { abox: &'a str, subject: &'a str, value: &'a str, relation: &'a str },
    ForgetRoleAssertion { abox: &'a str, subject: &'a str, value: &'a str, relation: &'a str },

    // -- listings --
    AllIndividuals,
    AllConceptAssertions,
    ConceptAssertionsFor { individual: &'a str },
    AllRoleAssertions,
}

impl Request<'_> {
    /// Whether the request is bound to the current abox.
    pub fn is_scoped(&self) -> bool {
        !matches!(
            self,
            Request::LoggingOn
                | Request::EnableSimplifiedProtocol
                | Request::FullReset
                | Request::ReadFile { .. }
                | Request::SetCurrentAbox { .. }
                | Request::LastAnswer
        )
    }
}

impl fmt::Display for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Request::LoggingOn => f.write_str("(logging-on)"),
            Request::EnableSimplifiedProtocol => {
                f.write_str("(|OWLAPI-enableSimplifiedProtocol| :|global|)")
            }
            Request::FullReset => f.write_str("(full-reset)"),
            Request::PrepareAbox => f.write_str("(prepare-abox)"),
            Request::ReadFile { path } => write!(f, "(owl-read-file \"{path}\")"),
            Request::SaveKb { path } => write!(f, "(save-kb \"{path}\" :syntax :OWL)"),
            Request::SetCurrentAbox { abox } => write!(f, "(set-current-abox {abox})"),
            Request::CloneAbox { abox } => write!(f, "(clone-abox {abox})"),
            Request::DeleteAbox { abox } => write!(f, "(delete-abox {abox})"),
            Request::LastAnswer => f.write_str("(|OWLAPI-getLastAnswer|)"),
            Request::NamespacePrefix { prefix } => write!(f, "(get-namespace-prefix {prefix}|)"),

            Request::IndividualInstance {
                individual,
                concept,
            } => write!(f, "(individual-instance? {} {})", Name(individual), Name(concept)),
            Request::IndividualDirectTypes { individual } => {
                write!(f, "(individual-direct-types {})", Name(individual))
            }
            Request::ConceptInstances { concept } => {
                write!(f, "(concept-instances {})", Name(concept))
            }
            Request::Retrieve {
                pattern,
                complement: false,
            } => write!(f, "(retrieve ({QUERY_VAR}) {pattern})"),
            Request::Retrieve {
                pattern,
                complement: true,
            } => write!(
                f,
                "(retrieve ({QUERY_VAR}) (neg (project-to ({QUERY_VAR}) {pattern})))"
            ),
            Request::IndividualFilledRoles { subject, value } => write!(
                f,
                "(individual-filled-roles {} {})",
                Name(subject),
                Name(value)
            ),
            Request::ConceptSubsumes { general, specific } => write!(
                f,
                "(concept-subsumes? {} {})",
                Name(general),
                Name(specific)
            ),
            Request::IndividualsRelated {
                subject,
                value,
                relation,
            } => write!(
                f,
                "(individuals-related? {} {} {})",
                Name(subject),
                Name(value),
                Name(relation)
            ),
            Request::Feature { relation } => write!(f, "(feature? {})", Name(relation)),
            Request::RoleInverse { role } => write!(f, "(role-inverse {})", Name(role)),

            Request::AddConceptAssertion {
                abox,
                individual,
                concept,
            } => write!(
                f,
                "(add-concept-assertion {abox} {} {})",
                Name(individual),
                Name(concept)
            ),
            Request::ForgetConceptAssertion {
                abox,
                individual,
                concept,
            } => write!(
                f,
                "(forget-concept-assertion {abox} {} {})",
                Name(individual),
                Name(concept)
            ),
            Request::AddRoleAssertion {
                abox,
                subject,
                value,
                relation,
            } => write!(
                f,
                "(add-role-assertion {abox} {} {} {})",
                Name(subject),
                Name(value),
                Name(relation)
            ),
            Request::ForgetRoleAssertion {
                abox,
                subject,
                value,
                relation,
            } => write!(
                f,
                "(forget-role-assertion {abox} {} {} {})",
                Name(subject),
                Name(value),
                Name(relation)
            ),

            Request::AllIndividuals => f.write_str("(all-individuals)"),
            Request::AllConceptAssertions => f.write_str("(all-concept-assertions)"),
            Request::ConceptAssertionsFor { individual } => write!(
                f,
                "(all-concept-assertions-for-individual {})",
                Name(individual)
            ),
            Request::AllRoleAssertions => f.write_str("(all-role-assertions)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_shapes() {
        assert_eq!(
            Request::IndividualInstance {
                individual: "ball1",
                concept: "ball"
            }
            .to_string(),
            "(individual-instance? #!:ball1 #!:ball)"
        );
        assert_eq!(
            Request::IndividualFilledRoles {
                subject: "ball1",
                value: "red"
            }
            .to_string(),
            "(individual-filled-roles #!:ball1 #!:red)"
        );
    }

    #[test]
    fn retrieve_shapes() {
        let filler = RetrievePattern::Filler {
            subject: "ball1",
            relation: "has-color",
        };
        assert_eq!(
            Request::Retrieve {
                pattern: filler,
                complement: false
            }
            .to_string(),
            "(retrieve (?x) (#!:ball1 ?x #!:has-color))"
        );
        assert_eq!(
            Request::Retrieve {
                pattern: RetrievePattern::Instance { concept: "ball" },
                complement: true
            }
            .to_string(),
            "(retrieve (?x) (neg (project-to (?x) (?x #!:ball))))"
        );
    }

    #[test]
    fn mutation_shapes() {
        assert_eq!(
            Request::AddRoleAssertion {
                abox: "A1",
                subject: "ball1",
                value: "red",
                relation: "has-color"
            }
            .to_string(),
            "(add-role-assertion A1 #!:ball1 #!:red #!:has-color)"
        );
        assert_eq!(
            Request::ForgetConceptAssertion {
                abox: "A1",
                individual: "ball1",
                concept: "ball"
            }
            .to_string(),
            "(forget-concept-assertion A1 #!:ball1 #!:ball)"
        );
    }

    #[test]
    fn control_shapes() {
        assert_eq!(
            Request::SaveKb { path: "/tmp/kb.owl" }.to_string(),
            "(save-kb \"/tmp/kb.owl\" :syntax :OWL)"
        );
        assert_eq!(
            Request::NamespacePrefix {
                prefix: "|file:///kb.owl"
            }
            .to_string(),
            "(get-namespace-prefix |file:///kb.owl|)"
        );
        assert!(!Request::SetCurrentAbox { abox: "A1" }.is_scoped());
        assert!(Request::AllIndividuals.is_scoped());
    }
}
