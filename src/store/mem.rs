//! In-memory document store backed by DashMap.
//!
//! The fastest backing for the document adapter and the one tests use. All
//! data is lost on process exit.

use std::collections::BTreeMap;

use dashmap::DashMap;

use super::{Attribute, DocumentStore, Filter, StoreResult, SubjectDocument, TypeNode};

/// object_id → document, ordered so `find` is deterministic.
type Collection = BTreeMap<String, SubjectDocument>;

/// Concurrent in-memory document store using sharded hashmaps.
#[derive(Debug, Default)]
pub struct MemDocumentStore {
    collections: DashMap<String, Collection>,
    types: DashMap<String, TypeNode>,
}

impl MemDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of documents across all collections.
    pub fn len(&self) -> usize {
        self.collections.iter().map(|c| c.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemDocumentStore {
    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<SubjectDocument>> {
        Ok(self
            .collections
            .get(collection)
            .map(|c| c.values().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    fn replace_document(&self, collection: &str, doc: SubjectDocument) -> StoreResult<()> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(doc.object_id.clone(), doc);
        Ok(())
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|_, d| !filter.matches(d));
        Ok(before - docs.len())
    }

    fn push_attribute(
        &self,
        collection: &str,
        object_id: &str,
        attribute: Attribute,
    ) -> StoreResult<()> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .entry(object_id.to_string())
            .or_insert_with(|| SubjectDocument::new(object_id))
            .attributes
            .push(attribute);
        Ok(())
    }

    fn replace_attribute(
        &self,
        collection: &str,
        object_id: &str,
        attribute: Attribute,
    ) -> StoreResult<()> {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let doc = docs
            .entry(object_id.to_string())
            .or_insert_with(|| SubjectDocument::new(object_id));
        doc.attributes.retain(|a| a.key != attribute.key);
        doc.attributes.push(attribute);
        Ok(())
    }

    fn pull_key(&self, collection: &str, object_id: &str, key: &str) -> StoreResult<()> {
        if let Some(mut docs) = self.collections.get_mut(collection) {
            if let Some(doc) = docs.get_mut(object_id) {
                doc.attributes.retain(|a| a.key != key);
            }
        }
        Ok(())
    }

    fn pull_value(
        &self,
        collection: &str,
        object_id: &str,
        key: &str,
        value: &str,
    ) -> StoreResult<()> {
        if let Some(mut docs) = self.collections.get_mut(collection) {
            if let Some(doc) = docs.get_mut(object_id) {
                doc.attributes
                    .retain(|a| !(a.key == key && a.value.iter().any(|v| v == value)));
            }
        }
        Ok(())
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.collections.iter().map(|c| c.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn copy_collection(&self, from: &str, to: &str) -> StoreResult<()> {
        let docs = self
            .collections
            .get(from)
            .map(|c| c.value().clone())
            .unwrap_or_default();
        self.collections.insert(to.to_string(), docs);
        Ok(())
    }

    fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        self.collections.remove(collection);
        Ok(())
    }

    fn upsert_type(&self, node: TypeNode) -> StoreResult<()> {
        self.types.insert(node.typename.clone(), node);
        Ok(())
    }

    fn delete_types(&self, typenames: &[String]) -> StoreResult<usize> {
        Ok(typenames
            .iter()
            .filter(|t| self.types.remove(t.as_str()).is_some())
            .count())
    }

    fn type_nodes(&self) -> StoreResult<Vec<TypeNode>> {
        let mut nodes: Vec<TypeNode> = self.types.iter().map(|n| n.value().clone()).collect();
        nodes.sort_by(|a, b| a.typename.cmp(&b.typename));
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Direction;
    use crate::store::Match;

    #[test]
    fn push_and_find() {
        let store = MemDocumentStore::new();
        store
            .push_attribute("facts", "ball1", Attribute::new("has-color", "red"))
            .unwrap();
        let docs = store
            .find("facts", &Filter::subject(Match::Eq("ball1".into())))
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].values("has-color").collect::<Vec<_>>(), vec!["red"]);
        assert!(store.find("other", &Filter::all()).unwrap().is_empty());
    }

    #[test]
    fn pull_key_and_value() {
        let store = MemDocumentStore::new();
        store
            .push_attribute("facts", "ball1", Attribute::new("has-color", "red"))
            .unwrap();
        store
            .push_attribute("facts", "ball1", Attribute::new("has-size", "big"))
            .unwrap();
        store.pull_key("facts", "ball1", "has-color").unwrap();
        store.pull_value("facts", "ball1", "has-size", "small").unwrap();

        let doc = &store.find("facts", &Filter::all()).unwrap()[0];
        assert_eq!(doc.values("has-color").count(), 0);
        assert_eq!(doc.values("has-size").collect::<Vec<_>>(), vec!["big"]);

        store.pull_value("facts", "ball1", "has-size", "big").unwrap();
        let doc = &store.find("facts", &Filter::all()).unwrap()[0];
        assert!(doc.attributes.is_empty());
    }

    #[test]
    fn replace_attribute_swaps_only_its_key() {
        let store = MemDocumentStore::new();
        store
            .push_attribute("facts", "ball1", Attribute::new("has-color", "red"))
            .unwrap();
        store
            .push_attribute("facts", "ball1", Attribute::new("has-size", "big"))
            .unwrap();
        store
            .replace_attribute("facts", "ball1", Attribute::new("has-color", "blue"))
            .unwrap();
        store
            .replace_attribute("facts", "ball2", Attribute::new("has-color", "green"))
            .unwrap();

        let docs = store.find("facts", &Filter::all()).unwrap();
        let ball1 = docs.iter().find(|d| d.object_id == "ball1").unwrap();
        assert_eq!(ball1.values("has-color").collect::<Vec<_>>(), vec!["blue"]);
        assert_eq!(ball1.values("has-size").collect::<Vec<_>>(), vec!["big"]);
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn copying_a_missing_collection_yields_an_empty_one() {
        let store = MemDocumentStore::new();
        store
            .push_attribute("b", "ball1", Attribute::new("type", "ball"))
            .unwrap();
        store.copy_collection("never-written", "b").unwrap();
        assert_eq!(store.count("b", &Filter::all()).unwrap(), 0);
    }

    #[test]
    fn copy_and_drop_collections() {
        let store = MemDocumentStore::new();
        store
            .push_attribute("a", "ball1", Attribute::new("type", "ball"))
            .unwrap();
        store.copy_collection("a", "b").unwrap();
        store.drop_collection("a").unwrap();
        assert_eq!(store.collection_names().unwrap(), vec!["b"]);
        assert_eq!(store.count("b", &Filter::all()).unwrap(), 1);
    }

    #[test]
    fn delete_many_counts() {
        let store = MemDocumentStore::new();
        for id in ["x", "y", "z"] {
            store.replace_document("c", SubjectDocument::new(id)).unwrap();
        }
        let removed = store
            .delete_many("c", &Filter::subject(Match::Ne("y".into())))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn type_forest_lookup() {
        let store = MemDocumentStore::new();
        store.upsert_type(TypeNode::new("A", None)).unwrap();
        store.upsert_type(TypeNode::new("B", Some("A"))).unwrap();
        store.upsert_type(TypeNode::new("C", Some("B"))).unwrap();
        assert_eq!(
            store.graph_lookup("A", Direction::Descendants).unwrap(),
            vec!["B", "C"]
        );
        assert_eq!(store.delete_types(&["B".into(), "Q".into()]).unwrap(), 1);
        assert!(store.graph_lookup("A", Direction::Descendants).unwrap().is_empty());
    }

    #[test]
    fn concurrent_pushes() {
        use std::sync::Arc;
        let store = Arc::new(MemDocumentStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .push_attribute("facts", &format!("ball{i}"), Attribute::new("type", "ball"))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 16);
    }
}
