//! Document store interface.
//!
//! Facts are kept as one [`SubjectDocument`] per subject, holding a list of
//! `{key, value-set}` [`Attribute`]s, grouped into named collections (one
//! collection per session scope). Type hierarchy nodes live beside the
//! collections in a single forest.
//!
//! Two implementations:
//!
//! - [`MemDocumentStore`](mem::MemDocumentStore): concurrent hashmaps (DashMap)
//! - [`DurableDocumentStore`](durable::DurableDocumentStore): ACID tables (redb)

pub mod durable;
pub mod mem;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::hierarchy::{self, Direction};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One `{key, value-set}` entry of a subject document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: Vec<String>,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: vec![value.into()],
        }
    }
}

/// All facts about one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDocument {
    pub object_id: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl SubjectDocument {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            attributes: Vec::new(),
        }
    }

    /// Every value stored under `key`.
    pub fn values(&self, key: &str) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(move |a| a.key == key)
            .flat_map(|a| a.value.iter().map(String::as_str))
    }
}

/// A node of the type forest. `parent == None` (or empty) marks a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeNode {
    pub typename: String,
    #[serde(default)]
    pub parent: Option<String>,
}

impl TypeNode {
    pub fn new(typename: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            typename: typename.into(),
            parent: parent.map(str::to_string),
        }
    }
}

/// Equality test on one document field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Match {
    #[default]
    Any,
    Eq(String),
    Ne(String),
}

impl Match {
    /// `Ne` when the term was written with the exclusion prefix, else `Eq`.
    pub fn from_ident(ident: &crate::statement::Ident) -> Self {
        if ident.excluded {
            Match::Ne(ident.name.clone())
        } else {
            Match::Eq(ident.name.clone())
        }
    }

    fn accepts(&self, candidate: &str) -> bool {
        match self {
            Match::Any => true,
            Match::Eq(v) => v == candidate,
            Match::Ne(v) => v != candidate,
        }
    }
}

/// Document filter: subject id test, plus an optional attribute test.
///
/// With `key` set, a document matches only if it has an attribute under
/// `key` whose value set satisfies `value` (`Eq` = contains, `Ne` = does not
/// contain).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filter {
    pub object_id: Match,
    pub key: Option<String>,
    pub value: Match,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn subject(object_id: Match) -> Self {
        Self {
            object_id,
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Match) -> Self {
        self.key = Some(key.into());
        self.value = value;
        self
    }

    pub fn matches(&self, doc: &SubjectDocument) -> bool {
        if !self.object_id.accepts(&doc.object_id) {
            return false;
        }
        let Some(key) = &self.key else {
            return true;
        };
        doc.attributes.iter().filter(|a| &a.key == key).any(|a| match &self.value {
            Match::Any => true,
            Match::Eq(v) => a.value.iter().any(|x| x == v),
            Match::Ne(v) => a.value.iter().all(|x| x != v),
        })
    }
}

/// The operations the document-store adapter consumes.
///
/// All methods take `&self`; implementations provide interior mutability so
/// one store can back many sessions.
pub trait DocumentStore: Send + Sync {
    /// Documents of `collection` matching `filter`. Unknown collections are empty.
    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<SubjectDocument>>;

    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        Ok(self.find(collection, filter)?.len())
    }

    /// Upsert a whole document, keyed by its `object_id`.
    fn replace_document(&self, collection: &str, doc: SubjectDocument) -> StoreResult<()>;

    /// Delete every matching document, returning how many were removed.
    fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize>;

    /// Append an attribute, creating the document if needed.
    fn push_attribute(
        &self,
        collection: &str,
        object_id: &str,
        attribute: Attribute,
    ) -> StoreResult<()>;

    /// Replace whatever `key` held on the document with `attribute`, as one
    /// atomic update.
    fn replace_attribute(
        &self,
        collection: &str,
        object_id: &str,
        attribute: Attribute,
    ) -> StoreResult<()>;

    /// Remove every attribute stored under `key`.
    fn pull_key(&self, collection: &str, object_id: &str, key: &str) -> StoreResult<()>;

    /// Remove the attribute under `key` whose value set contains `value`.
    fn pull_value(
        &self,
        collection: &str,
        object_id: &str,
        key: &str,
        value: &str,
    ) -> StoreResult<()>;

    fn collection_names(&self) -> StoreResult<Vec<String>>;

    /// Copy every document of `from` into `to`, replacing what `to` held.
    fn copy_collection(&self, from: &str, to: &str) -> StoreResult<()>;

    fn drop_collection(&self, collection: &str) -> StoreResult<()>;

    /// Insert or replace a type node, keyed by typename.
    fn upsert_type(&self, node: TypeNode) -> StoreResult<()>;

    fn delete_types(&self, typenames: &[String]) -> StoreResult<usize>;

    fn type_nodes(&self) -> StoreResult<Vec<TypeNode>>;

    /// Ancestor or descendant closure of `typename`.
    fn graph_lookup(&self, typename: &str, direction: Direction) -> StoreResult<Vec<String>> {
        Ok(hierarchy::closure(&self.type_nodes()?, typename, direction))
    }
}

/// JSON snapshot of one collection plus the type forest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub documents: Vec<SubjectDocument>,
    #[serde(default)]
    pub types: Vec<TypeNode>,
}

impl Snapshot {
    /// Capture `collection` and the type forest from `store`.
    pub fn capture(store: &dyn DocumentStore, collection: &str) -> StoreResult<Self> {
        Ok(Self {
            documents: store.find(collection, &Filter::all())?,
            types: store.type_nodes()?,
        })
    }

    /// Replace `collection` with the snapshot's documents and upsert its types.
    pub fn restore(self, store: &dyn DocumentStore, collection: &str) -> StoreResult<()> {
        store.drop_collection(collection)?;
        for doc in self.documents {
            store.replace_document(collection, doc)?;
        }
        for node in self.types {
            store.upsert_type(node)?;
        }
        Ok(())
    }

    pub fn read(path: &std::path::Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io { source: e })?;
        serde_json::from_str(&content).map_err(|e| StoreError::Serialization {
            message: format!("invalid snapshot {}: {e}", path.display()),
        })
    }

    pub fn write(&self, path: &std::path::Path) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| StoreError::Serialization {
            message: format!("failed to serialize snapshot: {e}"),
        })?;
        std::fs::write(path, json).map_err(|e| StoreError::Io { source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball() -> SubjectDocument {
        SubjectDocument {
            object_id: "ball1".into(),
            attributes: vec![
                Attribute::new("has-color", "red"),
                Attribute::new("type", "ball"),
            ],
        }
    }

    #[test]
    fn filter_on_subject() {
        assert!(Filter::subject(Match::Eq("ball1".into())).matches(&ball()));
        assert!(!Filter::subject(Match::Ne("ball1".into())).matches(&ball()));
        assert!(Filter::all().matches(&ball()));
    }

    #[test]
    fn filter_on_attribute() {
        let red = Filter::all().with_attribute("has-color", Match::Eq("red".into()));
        let not_red = Filter::all().with_attribute("has-color", Match::Ne("red".into()));
        let sized = Filter::all().with_attribute("has-size", Match::Any);
        assert!(red.matches(&ball()));
        assert!(!not_red.matches(&ball()));
        assert!(!sized.matches(&ball()));
    }

    #[test]
    fn document_values() {
        let doc = ball();
        assert_eq!(doc.values("has-color").collect::<Vec<_>>(), vec!["red"]);
        assert_eq!(doc.values("missing").count(), 0);
    }

    #[test]
    fn type_node_json_shape() {
        let json = serde_json::to_string(&TypeNode::new("ball", Some("toy"))).unwrap();
        assert_eq!(json, r#"{"typename":"ball","parent":"toy"}"#);
        let root: TypeNode = serde_json::from_str(r#"{"typename":"thing"}"#).unwrap();
        assert_eq!(root.parent, None);
    }
}
