//! Reasoner backend: statements become line-protocol requests against one
//! abox on a shared connection.
//!
//! The adapter never switches aboxes itself; the session calls
//! [`ContextTracker::ensure`] with [`Backend::switch_context`] before any
//! scoped request, so `(set-current-abox ...)` is only written when the
//! connection's active abox differs from this adapter's.

pub mod connection;
pub mod mock;
pub mod request;
pub mod response;
pub mod transport;

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::config::ReasonerConfig;
use crate::context::ContextTracker;
use crate::error::{KbResult, ReasonerError};
use crate::statement::{Classified, Fact, Ident, QueryShape};

use super::{Answer, Backend};
use connection::SharedConnection;
use request::{Request, RetrievePattern};
use response::{identifiers, is_error, is_true, regroup_concept_assertions};

/// Abox every reasoner starts with; cloned to make empty sessions.
pub const DEFAULT_ABOX: &str = "DEFAULT";

/// A session's view of the reasoner: one abox on the shared connection.
#[derive(Debug)]
pub struct ReasonerAdapter {
    connection: SharedConnection,
    abox: Option<String>,
    config: ReasonerConfig,
}

impl ReasonerAdapter {
    pub fn new(connection: SharedConnection, config: ReasonerConfig) -> Self {
        Self {
            connection,
            abox: None,
            config,
        }
    }

    /// Bind to an abox that already exists on the reasoner.
    pub fn with_abox(mut self, abox: impl Into<String>) -> Self {
        self.abox = Some(abox.into());
        self
    }

    pub fn connection(&self) -> &SharedConnection {
        &self.connection
    }

    fn abox(&self) -> Result<&str, ReasonerError> {
        self.abox.as_deref().ok_or(ReasonerError::NoScope)
    }

    fn rebind(&self, abox: String) -> Self {
        Self {
            connection: self.connection.clone(),
            abox: Some(abox),
            config: self.config.clone(),
        }
    }

    fn evaluate(&self, request: &Request<'_>) -> KbResult<String> {
        Ok(self.connection.request(request)?)
    }

    /// Identifiers in the reply; an error reply is logged and reads as empty.
    fn query(&self, request: &Request<'_>) -> KbResult<Vec<String>> {
        let reply = self.evaluate(request)?;
        if is_error(&reply) {
            tracing::warn!(%request, %reply, "reasoner reported an error, treating as empty");
        }
        Ok(identifiers(&reply))
    }

    fn check(&self, request: &Request<'_>) -> KbResult<bool> {
        let reply = self.evaluate(request)?;
        if is_error(&reply) {
            tracing::warn!(%request, %reply, "reasoner reported an error, treating as false");
        }
        Ok(is_true(&reply))
    }

    fn prepare(&self) -> KbResult<()> {
        Ok(self.connection.send(&Request::PrepareAbox)?)
    }

    /// Whether `relation` is single-valued. Only an exact `T` reply counts.
    fn is_feature(&self, relation: &str) -> KbResult<bool> {
        Ok(self.evaluate(&Request::Feature { relation })?.trim() == response::TRUTH)
    }

    /// Clone `source`, select the copy and return an adapter bound to it.
    fn clone_from(&self, source: &str) -> KbResult<Self> {
        let reply = self.evaluate(&Request::CloneAbox { abox: source })?;
        if reply.is_empty() || is_error(&reply) {
            let last_answer = self.evaluate(&Request::LastAnswer)?;
            tracing::error!(abox = source, %reply, %last_answer, "abox clone failed");
            return Err(ReasonerError::CloneFailed {
                abox: source.to_string(),
                last_answer,
            }
            .into());
        }
        self.connection.context().set(&reply);
        tracing::info!(from = source, to = %reply, "cloned abox");
        let copy = self.rebind(reply);
        copy.prepare()?;
        Ok(copy)
    }

    /// Inverse of `role`, if the ontology declares one.
    pub fn inverse(&self, role: &str) -> KbResult<Option<String>> {
        Ok(self
            .query(&Request::RoleInverse { role })?
            .into_iter()
            .next())
    }

    /// Namespace URI of the loaded ontology, derived from the abox id.
    ///
    /// `None` when the abox was not created by loading an `.owl` file.
    pub fn namespace_uri(&self) -> KbResult<Option<String>> {
        let abox = self.abox()?;
        let Some(end) = abox.find(".owl") else {
            return Ok(None);
        };
        let prefix = &abox[..end + ".owl".len()];
        let reply = self.evaluate(&Request::NamespacePrefix { prefix })?;
        if is_error(&reply) || reply.len() < 2 {
            return Ok(None);
        }
        Ok(reply.get(1..reply.len() - 1).map(str::to_string))
    }

    /// Per-individual listing; `None` when the reasoner rejects it.
    fn grouped_concept_assertions(
        &self,
        individuals: &BTreeSet<String>,
    ) -> KbResult<Option<Vec<(String, String)>>> {
        let mut pairs = Vec::new();
        for individual in individuals {
            let reply = self.evaluate(&Request::ConceptAssertionsFor { individual })?;
            if is_error(&reply) {
                tracing::debug!(%reply, "grouped concept listing unavailable, scanning instead");
                return Ok(None);
            }
            pairs.extend(
                identifiers(&reply)
                    .into_iter()
                    .filter(|concept| concept != individual)
                    .map(|concept| (individual.clone(), concept)),
            );
        }
        Ok(Some(pairs))
    }

    fn scanned_concept_assertions(
        &self,
        individuals: &BTreeSet<String>,
    ) -> KbResult<Vec<(String, String)>> {
        let flat = self.query(&Request::AllConceptAssertions)?;
        let known: HashSet<String> = individuals.iter().cloned().collect();
        Ok(regroup_concept_assertions(&flat, &known))
    }
}

/// The reasoner has no per-term exclusion; the `!` is dropped with a note.
fn note_exclusions(idents: &[&Ident]) {
    if idents.iter().any(|i| i.excluded) {
        tracing::debug!("exclusion prefix has no reasoner equivalent, ignoring");
    }
}

impl Backend for ReasonerAdapter {
    fn scope(&self) -> Option<&str> {
        self.abox.as_deref()
    }

    fn context(&self) -> ContextTracker {
        self.connection.context().clone()
    }

    fn switch_context(&mut self, scope: &str) -> KbResult<()> {
        let request = Request::SetCurrentAbox { abox: scope };
        let reply = self.evaluate(&request)?;
        if is_error(&reply) {
            tracing::warn!(abox = scope, %reply, "abox switch rejected");
            return Err(ReasonerError::Protocol {
                request: request.to_string(),
                reply,
            }
            .into());
        }
        Ok(())
    }

    fn connect(&mut self) -> KbResult<()> {
        self.connection.open()?;
        if self.connection.claim_handshake() {
            if !self.config.debugging {
                self.connection.send(&Request::LoggingOn)?;
            }
            self.connection.send(&Request::EnableSimplifiedProtocol)?;
            tracing::info!(address = self.connection.address(), "reasoner session ready");
        }
        if let Some(ontology) = self.config.ontology.clone() {
            self.load(&ontology)?;
        }
        Ok(())
    }

    fn close(&mut self) -> KbResult<()> {
        Ok(self.connection.close()?)
    }

    fn load(&mut self, source: &Path) -> KbResult<()> {
        let path = source.to_string_lossy().replace('\\', "/");
        self.connection.send(&Request::FullReset)?;
        let request = Request::ReadFile { path: &path };
        let reply = self.evaluate(&request)?;
        if reply.is_empty() || is_error(&reply) {
            return Err(ReasonerError::Protocol {
                request: request.to_string(),
                reply,
            }
            .into());
        }
        self.connection.context().set(&reply);
        tracing::info!(%path, abox = %reply, "ontology loaded");
        self.abox = Some(reply);
        self.prepare()
    }

    fn save(&mut self, sink: &Path) -> KbResult<String> {
        self.abox()?;
        let path = sink.to_string_lossy().replace('\\', "/");
        self.evaluate(&Request::SaveKb { path: &path })
    }

    fn ask(&mut self, statement: &Classified) -> KbResult<Answer> {
        // Unbound, the reply would come from whichever abox is selected.
        self.abox()?;
        Ok(match statement.shape() {
            QueryShape::TypeCheck {
                concept,
                individual,
            } => {
                note_exclusions(&[&concept, &individual]);
                Answer::Truth(self.check(&Request::IndividualInstance {
                    individual: &individual.name,
                    concept: &concept.name,
                })?)
            }
            QueryShape::TypeQuery { individual } => {
                note_exclusions(&[&individual]);
                Answer::Terms(self.query(&Request::IndividualDirectTypes {
                    individual: &individual.name,
                })?)
            }
            QueryShape::ConceptInstances {
                concept,
                complement: false,
            } => {
                note_exclusions(&[&concept]);
                Answer::Terms(self.query(&Request::ConceptInstances {
                    concept: &concept.name,
                })?)
            }
            QueryShape::ConceptInstances {
                concept,
                complement: true,
            } => {
                note_exclusions(&[&concept]);
                Answer::Terms(self.query(&Request::Retrieve {
                    pattern: RetrievePattern::Instance {
                        concept: &concept.name,
                    },
                    complement: true,
                })?)
            }
            QueryShape::RelationQuery {
                relation,
                subject,
                complement,
            } => {
                note_exclusions(&[&relation, &subject]);
                Answer::Terms(self.query(&Request::Retrieve {
                    pattern: RetrievePattern::Filler {
                        subject: &subject.name,
                        relation: &relation.name,
                    },
                    complement,
                })?)
            }
            QueryShape::RoleHolder { value, subject } => {
                note_exclusions(&[&value, &subject]);
                Answer::Terms(self.query(&Request::IndividualFilledRoles {
                    subject: &subject.name,
                    value: &value.name,
                })?)
            }
            QueryShape::SubjectQuery {
                value,
                relation,
                complement,
            } => {
                note_exclusions(&[&value, &relation]);
                Answer::Terms(self.query(&Request::Retrieve {
                    pattern: RetrievePattern::Holder {
                        value: &value.name,
                        relation: &relation.name,
                    },
                    complement,
                })?)
            }
            QueryShape::Subsumption { general, specific } => {
                note_exclusions(&[&general, &specific]);
                Answer::Truth(self.check(&Request::ConceptSubsumes {
                    general: &general.name,
                    specific: &specific.name,
                })?)
            }
            QueryShape::RelationCheck {
                value,
                relation,
                subject,
            } => {
                note_exclusions(&[&value, &relation, &subject]);
                Answer::Truth(self.check(&Request::IndividualsRelated {
                    subject: &subject.name,
                    value: &value.name,
                    relation: &relation.name,
                })?)
            }
        })
    }

    fn tell(&mut self, statement: &Classified) -> KbResult<()> {
        let scope = self.abox()?.to_string();
        let abox = scope.as_str();
        match (statement.fact()?, statement.negated) {
            (
                Fact::Concept {
                    concept,
                    individual,
                },
                false,
            ) => self.connection.send(&Request::AddConceptAssertion {
                abox,
                individual: &individual.name,
                concept: &concept.name,
            })?,
            (
                Fact::Concept {
                    concept,
                    individual,
                },
                true,
            ) => self.connection.send(&Request::ForgetConceptAssertion {
                abox,
                individual: &individual.name,
                concept: &concept.name,
            })?,
            (
                Fact::Role {
                    value,
                    relation,
                    subject,
                },
                true,
            ) => self.connection.send(&Request::ForgetRoleAssertion {
                abox,
                subject: &subject.name,
                value: &value.name,
                relation: &relation.name,
            })?,
            (
                Fact::Role {
                    value,
                    relation,
                    subject,
                },
                false,
            ) => {
                if self.is_feature(&relation.name)? {
                    let previous = self.query(&Request::Retrieve {
                        pattern: RetrievePattern::Filler {
                            subject: &subject.name,
                            relation: &relation.name,
                        },
                        complement: false,
                    })?;
                    for old in previous.iter().filter(|old| **old != value.name) {
                        tracing::debug!(relation = %relation.name, subject = %subject.name, %old, "retracting previous filler of functional relation");
                        self.connection.send(&Request::ForgetRoleAssertion {
                            abox,
                            subject: &subject.name,
                            value: old,
                            relation: &relation.name,
                        })?;
                    }
                }
                self.connection.send(&Request::AddRoleAssertion {
                    abox,
                    subject: &subject.name,
                    value: &value.name,
                    relation: &relation.name,
                })?
            }
        }
        Ok(())
    }

    fn dump(&mut self) -> KbResult<BTreeSet<String>> {
        self.abox()?;
        let individuals: BTreeSet<String> =
            self.query(&Request::AllIndividuals)?.into_iter().collect();

        let concepts = match self.grouped_concept_assertions(&individuals)? {
            Some(pairs) => pairs,
            None => self.scanned_concept_assertions(&individuals)?,
        };

        let mut facts: BTreeSet<String> = concepts
            .into_iter()
            .map(|(individual, concept)| format!("({concept} {individual})"))
            .collect();

        let roles = self.query(&Request::AllRoleAssertions)?;
        for triple in roles.chunks_exact(3) {
            let (subject, value, relation) = (&triple[0], &triple[1], &triple[2]);
            facts.insert(format!("({value} {relation} {subject})"));
        }
        Ok(facts)
    }

    fn clone_scope(&mut self) -> KbResult<Self> {
        let abox = self.abox()?.to_string();
        self.clone_from(&abox)
    }

    fn empty_scope(&mut self) -> KbResult<Self> {
        self.clone_from(DEFAULT_ABOX)
    }

    fn forget(&mut self) -> KbResult<()> {
        let abox = self.abox()?.to_string();
        self.connection.send(&Request::DeleteAbox { abox: &abox })?;
        if self.connection.context().is_active(&abox) {
            self.connection.context().clear();
        }
        tracing::info!(%abox, "abox deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::KbError;
    use crate::statement::classify;
    use connection::ReasonerConnection;
    use mock::MockTransport;

    fn adapter(mock: &MockTransport) -> ReasonerAdapter {
        let conn = Arc::new(ReasonerConnection::with_transport("mock", Box::new(mock.clone())));
        conn.context().set(DEFAULT_ABOX);
        ReasonerAdapter::new(conn, ReasonerConfig::default()).with_abox(DEFAULT_ABOX)
    }

    fn tell(adapter: &mut ReasonerAdapter, statement: &str) {
        adapter.tell(&classify(statement).unwrap()).unwrap();
    }

    fn ask(adapter: &mut ReasonerAdapter, statement: &str) -> Answer {
        adapter.ask(&classify(statement).unwrap()).unwrap()
    }

    #[test]
    fn handshake_sent_once_per_connection() {
        let mock = MockTransport::new();
        let mut a = adapter(&mock);
        a.connect().unwrap();
        a.connect().unwrap();
        assert_eq!(mock.count("logging-on"), 1);
        assert_eq!(mock.count("|OWLAPI-enableSimplifiedProtocol|"), 1);
    }

    #[test]
    fn debugging_skips_logging_on() {
        let mock = MockTransport::new();
        let conn = Arc::new(ReasonerConnection::with_transport("mock", Box::new(mock.clone())));
        let config = ReasonerConfig {
            debugging: true,
            ..ReasonerConfig::default()
        };
        ReasonerAdapter::new(conn, config).connect().unwrap();
        assert_eq!(mock.count("logging-on"), 0);
    }

    #[test]
    fn asks_each_shape() {
        let mock = MockTransport::new().with_subsumption("toy", "ball");
        let mut a = adapter(&mock);
        tell(&mut a, "(ball ball1)");
        tell(&mut a, "(doll doll1)");
        tell(&mut a, "(red has-color ball1)");

        assert_eq!(ask(&mut a, "(ball ball1)"), Answer::Truth(true));
        assert_eq!(ask(&mut a, "(? ball1)"), Answer::Terms(vec!["ball".into()]));
        assert_eq!(ask(&mut a, "(ball ?)"), Answer::Terms(vec!["ball1".into()]));
        assert_eq!(ask(&mut a, "(? has-color ball1)"), Answer::Terms(vec!["red".into()]));
        assert_eq!(ask(&mut a, "(red ? ball1)"), Answer::Terms(vec!["has-color".into()]));
        assert_eq!(ask(&mut a, "(red has-color ?)"), Answer::Terms(vec!["ball1".into()]));
        assert_eq!(ask(&mut a, "(red has-color ball1)"), Answer::Truth(true));
        assert_eq!(ask(&mut a, "(is_a toy ball)"), Answer::Truth(true));
        assert_eq!(ask(&mut a, "(is_a ball toy)"), Answer::Truth(false));
    }

    #[test]
    fn complement_concept_query() {
        let mock = MockTransport::new();
        let mut a = adapter(&mock);
        tell(&mut a, "(ball ball1)");
        tell(&mut a, "(doll doll1)");
        assert_eq!(ask(&mut a, "(!ball ?)"), Answer::Terms(vec!["doll1".into()]));
        assert!(
            mock.requests()
                .contains(&"(retrieve (?x) (neg (project-to (?x) (?x #!:ball))))".to_string())
        );
    }

    #[test]
    fn error_reply_reads_as_empty() {
        let mock = MockTransport::new();
        let mut a = adapter(&mock);
        a.forget().unwrap();
        assert_eq!(ask(&mut a, "(? ball1)"), Answer::Terms(vec![]));
        assert_eq!(ask(&mut a, "(ball ball1)"), Answer::Truth(false));
    }

    #[test]
    fn functional_relation_replaces_filler() {
        let mock = MockTransport::new().with_feature("has-color");
        let mut a = adapter(&mock);
        tell(&mut a, "(red has-color ball1)");
        tell(&mut a, "(blue has-color ball1)");
        assert_eq!(ask(&mut a, "(? has-color ball1)"), Answer::Terms(vec!["blue".into()]));
        assert_eq!(mock.count("forget-role-assertion"), 1);
    }

    #[test]
    fn multi_valued_relation_accumulates() {
        let mock = MockTransport::new();
        let mut a = adapter(&mock);
        tell(&mut a, "(red has-color ball1)");
        tell(&mut a, "(blue has-color ball1)");
        assert_eq!(
            ask(&mut a, "(? has-color ball1)"),
            Answer::Terms(vec!["blue".into(), "red".into()])
        );
    }

    #[test]
    fn negated_tell_retracts() {
        let mock = MockTransport::new();
        let mut a = adapter(&mock);
        tell(&mut a, "(ball ball1)");
        tell(&mut a, "(not (ball ball1))");
        assert_eq!(ask(&mut a, "(ball ball1)"), Answer::Truth(false));
    }

    #[test]
    fn wildcard_tell_is_rejected() {
        let mock = MockTransport::new();
        let mut a = adapter(&mock);
        assert!(a.tell(&classify("(? has-color ball1)").unwrap()).is_err());
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn dump_grouped_and_scanned_agree() {
        let expected: BTreeSet<String> = ["(ball ball1)", "(toy ball1)", "(red has-color ball1)"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        for mock in [MockTransport::new(), MockTransport::new().without_grouped_listings()] {
            let mut a = adapter(&mock);
            tell(&mut a, "(ball ball1)");
            tell(&mut a, "(toy ball1)");
            tell(&mut a, "(red has-color ball1)");
            assert_eq!(a.dump().unwrap(), expected);
        }
    }

    #[test]
    fn clone_selects_the_copy() {
        let mock = MockTransport::new();
        let mut a = adapter(&mock);
        tell(&mut a, "(ball ball1)");
        let copy = a.clone_scope().unwrap();
        assert_eq!(copy.scope(), Some("ABOX-1"));
        assert!(copy.context().is_active("ABOX-1"));
        assert_eq!(mock.current_abox().as_deref(), Some("ABOX-1"));
        assert_eq!(mock.count("prepare-abox"), 1);
    }

    #[test]
    fn failed_clone_is_fatal() {
        let mock = MockTransport::new().with_failing_clones();
        let mut a = adapter(&mock);
        let err = a.clone_scope().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(mock.count("|OWLAPI-getLastAnswer|"), 1);
    }

    #[test]
    fn load_binds_the_new_abox() {
        let mock = MockTransport::new();
        let conn = Arc::new(ReasonerConnection::with_transport("mock", Box::new(mock.clone())));
        let mut a = ReasonerAdapter::new(conn, ReasonerConfig::default());
        a.load(Path::new("/kb/toys.owl")).unwrap();
        assert_eq!(a.scope(), Some("|file:///kb/toys.owl|"));
        assert!(a.context().is_active("|file:///kb/toys.owl|"));
        assert_eq!(mock.count("full-reset"), 1);
        assert_eq!(
            a.namespace_uri().unwrap().as_deref(),
            Some("http://lingua/kb#")
        );
    }

    #[test]
    fn inverse_role() {
        let mock = MockTransport::new().with_inverse("has-part", "part-of");
        let a = adapter(&mock);
        assert_eq!(a.inverse("has-part").unwrap().as_deref(), Some("part-of"));
        assert_eq!(a.inverse("has-color").unwrap(), None);
    }

    #[test]
    fn unbound_adapter_has_no_scope() {
        let mock = MockTransport::new();
        let conn = Arc::new(ReasonerConnection::with_transport("mock", Box::new(mock.clone())));
        let mut a = ReasonerAdapter::new(conn, ReasonerConfig::default());
        assert!(a.dump().is_err());
        assert!(matches!(
            a.ask(&classify("(ball ball1)").unwrap()),
            Err(KbError::Reasoner(ReasonerError::NoScope))
        ));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn rejected_switch_is_an_error() {
        let mock = MockTransport::new();
        let mut a = adapter(&mock);
        let err = a.switch_context("ABOX-404").unwrap_err();
        assert!(matches!(
            err,
            KbError::Reasoner(ReasonerError::Protocol { ref request, .. })
                if request == "(set-current-abox ABOX-404)"
        ));
        assert!(a.switch_context(DEFAULT_ABOX).is_ok());
    }

    #[test]
    fn rejected_load_keeps_the_binding() {
        let mock = MockTransport::new().with_failing_loads();
        let mut a = adapter(&mock);
        let err = a.load(Path::new("/kb/missing.owl")).unwrap_err();
        assert!(matches!(err, KbError::Reasoner(ReasonerError::Protocol { .. })));
        assert!(!err.is_fatal());
        assert_eq!(a.scope(), Some(DEFAULT_ABOX));
        assert!(a.context().is_active(DEFAULT_ABOX));
        assert_eq!(mock.count("prepare-abox"), 0);
    }
}
