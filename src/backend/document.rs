//! Document-store backend.
//!
//! A fact `(v r s)` is stored on the document of subject `s` as attribute
//! `{key: r, value: [v]}`; a type fact `(C i)` uses the reserved key
//! [`TYPE_KEY`]. Each session owns one collection. Subsumption and the type
//! operations read the store's type forest, which is shared by all
//! collections.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::ContextTracker;
use crate::error::KbResult;
use crate::hierarchy::Direction;
use crate::statement::{Classified, Fact, Ident, QueryShape};
use crate::store::{Attribute, DocumentStore, Filter, Match, Snapshot, SubjectDocument, TypeNode};

use super::{Answer, Backend};

/// Attribute key holding the types of a subject.
pub const TYPE_KEY: &str = "type";

static SCOPES: AtomicUsize = AtomicUsize::new(0);

/// A session's view of a document store: one collection.
pub struct DocumentAdapter {
    store: Arc<dyn DocumentStore>,
    collection: String,
    context: ContextTracker,
}

impl std::fmt::Debug for DocumentAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAdapter")
            .field("collection", &self.collection)
            .field("active", &self.context.active())
            .finish()
    }
}

fn subject(ident: &Ident) -> Filter {
    Filter::subject(Match::from_ident(ident))
}

fn sorted(items: impl IntoIterator<Item = String>) -> Vec<String> {
    items.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

impl DocumentAdapter {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            context: ContextTracker::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// A sibling adapter on a collection name no other scope uses.
    fn fresh_scope(&self) -> KbResult<Self> {
        let existing: BTreeSet<String> = self.store.collection_names()?.into_iter().collect();
        let root = self
            .collection
            .split_once('~')
            .map_or(self.collection.as_str(), |(root, _)| root);
        let collection = loop {
            let n = SCOPES.fetch_add(1, Ordering::Relaxed) + 1;
            let candidate = format!("{root}~{n}");
            if !existing.contains(&candidate) {
                break candidate;
            }
        };
        Ok(Self {
            store: self.store.clone(),
            collection,
            context: self.context.clone(),
        })
    }

    fn find(&self, filter: &Filter) -> KbResult<Vec<SubjectDocument>> {
        Ok(self.store.find(&self.collection, filter)?)
    }

    fn exists(&self, filter: &Filter) -> KbResult<bool> {
        Ok(self.store.count(&self.collection, filter)? > 0)
    }

    /// Values under `key` on the subjects matching `filter`.
    fn values(&self, filter: &Filter, key: &str) -> KbResult<BTreeSet<String>> {
        Ok(self
            .find(filter)?
            .iter()
            .flat_map(|doc| doc.values(key).map(str::to_string).collect::<Vec<_>>())
            .collect())
    }

    fn object_ids(&self, filter: &Filter) -> KbResult<BTreeSet<String>> {
        Ok(self.find(filter)?.into_iter().map(|doc| doc.object_id).collect())
    }

    /// Every term that can stand in the value position of `key`.
    fn universe(&self, key: &str) -> KbResult<BTreeSet<String>> {
        let mut all = self.object_ids(&Filter::all())?;
        all.extend(self.values(&Filter::all(), key)?);
        Ok(all)
    }

    fn replace(&self, object_id: &str, key: &str, value: &str) -> KbResult<()> {
        Ok(self
            .store
            .replace_attribute(&self.collection, object_id, Attribute::new(key, value))?)
    }

    fn retract(&self, object_id: &str, key: &str, value: &str) -> KbResult<()> {
        Ok(self
            .store
            .pull_value(&self.collection, object_id, key, value)?)
    }

    // ---- type forest ----

    /// Insert or replace `typename` under `parent`.
    pub fn add_type(&self, typename: &str, parent: Option<&str>) -> KbResult<()> {
        self.store.upsert_type(TypeNode::new(typename, parent))?;
        tracing::debug!(typename, ?parent, "type added");
        Ok(())
    }

    /// Remove `typename` and every type below it. Returns how many were removed.
    pub fn remove_type(&self, typename: &str) -> KbResult<usize> {
        let mut doomed = self.store.graph_lookup(typename, Direction::Descendants)?;
        doomed.push(typename.to_string());
        let removed = self.store.delete_types(&doomed)?;
        tracing::debug!(typename, removed, "type subtree removed");
        Ok(removed)
    }

    pub fn get_parent_types(&self, typename: &str) -> KbResult<Vec<String>> {
        Ok(sorted(self.store.graph_lookup(typename, Direction::Ancestors)?))
    }

    pub fn get_child_types(&self, typename: &str) -> KbResult<Vec<String>> {
        Ok(sorted(self.store.graph_lookup(typename, Direction::Descendants)?))
    }
}

impl Backend for DocumentAdapter {
    fn scope(&self) -> Option<&str> {
        Some(&self.collection)
    }

    fn context(&self) -> ContextTracker {
        self.context.clone()
    }

    fn switch_context(&mut self, scope: &str) -> KbResult<()> {
        // Requests name their collection; nothing to select on the store.
        tracing::trace!(collection = scope, "document scope selected");
        Ok(())
    }

    fn connect(&mut self) -> KbResult<()> {
        tracing::debug!(collection = %self.collection, "document session ready");
        Ok(())
    }

    fn close(&mut self) -> KbResult<()> {
        Ok(())
    }

    fn load(&mut self, source: &Path) -> KbResult<()> {
        let snapshot = Snapshot::read(source)?;
        let documents = snapshot.documents.len();
        snapshot.restore(self.store.as_ref(), &self.collection)?;
        tracing::info!(path = %source.display(), collection = %self.collection, documents, "snapshot loaded");
        Ok(())
    }

    fn save(&mut self, sink: &Path) -> KbResult<String> {
        let snapshot = Snapshot::capture(self.store.as_ref(), &self.collection)?;
        snapshot.write(sink)?;
        Ok(format!(
            "saved {} documents and {} types to {}",
            snapshot.documents.len(),
            snapshot.types.len(),
            sink.display()
        ))
    }

    fn ask(&mut self, statement: &Classified) -> KbResult<Answer> {
        Ok(match statement.shape() {
            QueryShape::TypeCheck {
                concept,
                individual,
            } => Answer::Truth(self.exists(
                &subject(&individual).with_attribute(TYPE_KEY, Match::from_ident(&concept)),
            )?),
            QueryShape::TypeQuery { individual } => {
                Answer::Terms(self.values(&subject(&individual), TYPE_KEY)?.into_iter().collect())
            }
            QueryShape::ConceptInstances {
                concept,
                complement,
            } => {
                let typed = self.object_ids(
                    &Filter::all().with_attribute(TYPE_KEY, Match::from_ident(&concept)),
                )?;
                let ids = if complement {
                    self.object_ids(&Filter::all())?
                        .difference(&typed)
                        .cloned()
                        .collect()
                } else {
                    typed
                };
                Answer::Terms(ids.into_iter().collect())
            }
            QueryShape::RelationQuery {
                relation,
                subject: s,
                complement,
            } => {
                let held = self.values(&subject(&s), &relation.name)?;
                let found = if complement {
                    self.universe(&relation.name)?
                        .difference(&held)
                        .filter(|term| **term != s.name)
                        .cloned()
                        .collect()
                } else {
                    held
                };
                Answer::Terms(found.into_iter().collect())
            }
            QueryShape::RoleHolder { value, subject: s } => {
                let keys: BTreeSet<String> = self
                    .find(&subject(&s))?
                    .into_iter()
                    .flat_map(|doc| doc.attributes)
                    .filter(|a| a.key != TYPE_KEY && a.value.contains(&value.name))
                    .map(|a| a.key)
                    .collect();
                Answer::Terms(keys.into_iter().collect())
            }
            QueryShape::SubjectQuery {
                value,
                relation,
                complement,
            } => {
                let holders = self.object_ids(
                    &Filter::all().with_attribute(&relation.name, Match::from_ident(&value)),
                )?;
                let ids = if complement {
                    self.object_ids(&Filter::all())?
                        .difference(&holders)
                        .cloned()
                        .collect()
                } else {
                    holders
                };
                Answer::Terms(ids.into_iter().collect())
            }
            QueryShape::Subsumption { general, specific } => Answer::Truth(
                general.name == specific.name
                    || self
                        .store
                        .graph_lookup(&specific.name, Direction::Ancestors)?
                        .contains(&general.name),
            ),
            QueryShape::RelationCheck {
                value,
                relation,
                subject: s,
            } => Answer::Truth(self.exists(
                &subject(&s).with_attribute(&relation.name, Match::from_ident(&value)),
            )?),
        })
    }

    fn tell(&mut self, statement: &Classified) -> KbResult<()> {
        let (object_id, key, value) = match statement.fact()? {
            Fact::Concept {
                concept,
                individual,
            } => (individual.name, TYPE_KEY.to_string(), concept.name),
            Fact::Role {
                value,
                relation,
                subject,
            } => (subject.name, relation.name, value.name),
        };
        if statement.negated {
            self.retract(&object_id, &key, &value)
        } else {
            self.replace(&object_id, &key, &value)
        }
    }

    fn dump(&mut self) -> KbResult<BTreeSet<String>> {
        let mut facts = BTreeSet::new();
        for doc in self.find(&Filter::all())? {
            for attribute in &doc.attributes {
                for value in &attribute.value {
                    facts.insert(if attribute.key == TYPE_KEY {
                        format!("({value} {})", doc.object_id)
                    } else {
                        format!("({value} {} {})", attribute.key, doc.object_id)
                    });
                }
            }
        }
        Ok(facts)
    }

    fn clone_scope(&mut self) -> KbResult<Self> {
        let copy = self.fresh_scope()?;
        self.store
            .copy_collection(&self.collection, &copy.collection)?;
        tracing::info!(from = %self.collection, to = %copy.collection, "cloned collection");
        Ok(copy)
    }

    fn empty_scope(&mut self) -> KbResult<Self> {
        self.fresh_scope()
    }

    fn forget(&mut self) -> KbResult<()> {
        self.store.drop_collection(&self.collection)?;
        if self.context.is_active(&self.collection) {
            self.context.clear();
        }
        tracing::info!(collection = %self.collection, "collection dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::classify;
    use crate::store::mem::MemDocumentStore;

    fn adapter() -> DocumentAdapter {
        DocumentAdapter::new(Arc::new(MemDocumentStore::new()), "facts")
    }

    fn tell(adapter: &mut DocumentAdapter, statement: &str) {
        adapter.tell(&classify(statement).unwrap()).unwrap();
    }

    fn ask(adapter: &mut DocumentAdapter, statement: &str) -> Answer {
        adapter.ask(&classify(statement).unwrap()).unwrap()
    }

    fn terms(items: &[&str]) -> Answer {
        Answer::Terms(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn value_wildcard_lists_values() {
        let mut a = adapter();
        assert_eq!(ask(&mut a, "(? has-color ball1)"), terms(&[]));
        tell(&mut a, "(red has-color ball1)");
        assert_eq!(ask(&mut a, "(? has-color ball1)"), terms(&["red"]));
    }

    #[test]
    fn tell_replaces_by_key() {
        let mut a = adapter();
        tell(&mut a, "(red has-color ball1)");
        tell(&mut a, "(blue has-color ball1)");
        assert_eq!(ask(&mut a, "(? has-color ball1)"), terms(&["blue"]));
        assert_eq!(ask(&mut a, "(red has-color ball1)"), Answer::Truth(false));
    }

    #[test]
    fn negated_tell_pulls_value() {
        let mut a = adapter();
        tell(&mut a, "(red has-color ball1)");
        tell(&mut a, "(not (red has-color ball1))");
        assert_eq!(ask(&mut a, "(red has-color ball1)"), Answer::Truth(false));
    }

    #[test]
    fn subject_wildcard_with_exclusion() {
        let mut a = adapter();
        tell(&mut a, "(red has-color ball1)");
        tell(&mut a, "(red has-color ball2)");
        tell(&mut a, "(blue has-color ball3)");
        assert_eq!(ask(&mut a, "(red has-color ?)"), terms(&["ball1", "ball2"]));
        assert_eq!(ask(&mut a, "(!red has-color ?)"), terms(&["ball3"]));
        assert_eq!(ask(&mut a, "(red has-color !ball1)"), Answer::Truth(true));
        assert_eq!(ask(&mut a, "(blue has-color !ball3)"), Answer::Truth(false));
    }

    #[test]
    fn type_facts_use_type_key() {
        let mut a = adapter();
        tell(&mut a, "(ball ball1)");
        tell(&mut a, "(doll doll1)");
        assert_eq!(ask(&mut a, "(ball ball1)"), Answer::Truth(true));
        assert_eq!(ask(&mut a, "(? ball1)"), terms(&["ball"]));
        assert_eq!(ask(&mut a, "(ball ?)"), terms(&["ball1"]));
        assert_eq!(ask(&mut a, "(!ball ?)"), terms(&["doll1"]));
    }

    #[test]
    fn role_holder_lists_keys() {
        let mut a = adapter();
        tell(&mut a, "(red has-color ball1)");
        tell(&mut a, "(red likes ball1)");
        assert_eq!(ask(&mut a, "(red ? ball1)"), terms(&["has-color", "likes"]));
    }

    #[test]
    fn complement_relation_query() {
        let mut a = adapter();
        tell(&mut a, "(red has-color ball1)");
        tell(&mut a, "(blue has-color ball2)");
        assert_eq!(ask(&mut a, "(!? has-color ball1)"), terms(&["ball2", "blue"]));
    }

    #[test]
    fn subsumption_follows_type_forest() {
        let mut a = adapter();
        a.add_type("toy", None).unwrap();
        a.add_type("ball", Some("toy")).unwrap();
        assert_eq!(ask(&mut a, "(is_a toy ball)"), Answer::Truth(true));
        assert_eq!(ask(&mut a, "(is_a ball toy)"), Answer::Truth(false));
        assert_eq!(ask(&mut a, "(is_a ball ball)"), Answer::Truth(true));
    }

    #[test]
    fn type_closure() {
        let a = adapter();
        a.add_type("A", None).unwrap();
        a.add_type("B", Some("A")).unwrap();
        a.add_type("C", Some("B")).unwrap();
        assert_eq!(a.get_child_types("A").unwrap(), vec!["B", "C"]);
        assert_eq!(a.get_parent_types("C").unwrap(), vec!["A", "B"]);
        assert!(a.get_child_types("C").unwrap().is_empty());

        assert_eq!(a.remove_type("B").unwrap(), 2);
        assert!(a.get_child_types("A").unwrap().is_empty());
    }

    #[test]
    fn dump_renders_surface_forms() {
        let mut a = adapter();
        tell(&mut a, "(ball ball1)");
        tell(&mut a, "(red has-color ball1)");
        let dumped: Vec<String> = a.dump().unwrap().into_iter().collect();
        assert_eq!(dumped, vec!["(ball ball1)", "(red has-color ball1)"]);
    }

    #[test]
    fn clone_diverges_and_shares_context() {
        let mut a = adapter();
        tell(&mut a, "(red has-color ball1)");
        let mut b = a.clone_scope().unwrap();
        assert_ne!(a.collection(), b.collection());
        assert!(a.context().shares_state_with(&b.context()));

        tell(&mut b, "(blue has-color ball1)");
        assert_eq!(ask(&mut a, "(? has-color ball1)"), terms(&["red"]));
        assert_eq!(ask(&mut b, "(? has-color ball1)"), terms(&["blue"]));

        let mut e = a.empty_scope().unwrap();
        assert!(e.dump().unwrap().is_empty());
    }

    #[test]
    fn forget_drops_collection() {
        let mut a = adapter();
        tell(&mut a, "(ball ball1)");
        a.forget().unwrap();
        assert!(a.dump().unwrap().is_empty());
    }

    #[test]
    fn snapshot_save_and_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("facts.json");

        let mut a = adapter();
        tell(&mut a, "(red has-color ball1)");
        a.add_type("toy", None).unwrap();
        a.add_type("ball", Some("toy")).unwrap();
        a.save(&path).unwrap();

        let mut b = adapter();
        b.load(&path).unwrap();
        assert_eq!(b.dump().unwrap(), a.dump().unwrap());
        assert_eq!(b.get_parent_types("ball").unwrap(), vec!["toy"]);
    }
}
