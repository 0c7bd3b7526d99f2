//! ACID-durable document store backed by redb.
//!
//! Documents are stored as JSON under `"<collection>\0<object_id>"` keys so a
//! collection is one contiguous key range. Type nodes live in their own table.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;

use super::{Attribute, DocumentStore, Filter, StoreResult, SubjectDocument, TypeNode};

const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");
const TYPES: TableDefinition<&str, &[u8]> = TableDefinition::new("types");

const SEPARATOR: char = '\0';

fn redb_error(op: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

fn doc_key(collection: &str, object_id: &str) -> String {
    format!("{collection}{SEPARATOR}{object_id}")
}

fn collection_prefix(collection: &str) -> String {
    format!("{collection}{SEPARATOR}")
}

fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
        message: format!("failed to encode: {e}"),
    })
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to decode: {e}"),
    })
}

/// Persistent document store using redb.
///
/// All writes go through transactions. Reads use MVCC snapshots.
pub struct DurableDocumentStore {
    db: Arc<Database>,
}

impl DurableDocumentStore {
    /// Open or create a store at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io { source: e })?;
        }
        let db = Database::create(path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", path.display()),
        })?;

        // Create both tables up front so read transactions never miss them.
        let txn = db.begin_write().map_err(|e| redb_error("begin_write", e))?;
        txn.open_table(DOCUMENTS)
            .map_err(|e| redb_error("open_table", e))?;
        txn.open_table(TYPES).map_err(|e| redb_error("open_table", e))?;
        txn.commit().map_err(|e| redb_error("commit", e))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn read_collection(&self, collection: &str) -> StoreResult<Vec<SubjectDocument>> {
        let prefix = collection_prefix(collection);
        let txn = self.db.begin_read().map_err(|e| redb_error("begin_read", e))?;
        let table = txn
            .open_table(DOCUMENTS)
            .map_err(|e| redb_error("open_table", e))?;
        let mut docs = Vec::new();
        for entry in table
            .range::<&str>(prefix.as_str()..)
            .map_err(|e| redb_error("range", e))?
        {
            let (key, value) = entry.map_err(|e| redb_error("range", e))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            docs.push(decode(value.value())?);
        }
        Ok(docs)
    }

    /// Apply `update` to one document inside a single write transaction.
    ///
    /// A missing document is created only when `create` is set.
    fn update_document(
        &self,
        collection: &str,
        object_id: &str,
        create: bool,
        update: impl FnOnce(&mut SubjectDocument),
    ) -> StoreResult<()> {
        let key = doc_key(collection, object_id);
        let txn = self.db.begin_write().map_err(|e| redb_error("begin_write", e))?;
        {
            let mut table = txn
                .open_table(DOCUMENTS)
                .map_err(|e| redb_error("open_table", e))?;
            let existing: Option<SubjectDocument> = match table
                .get(key.as_str())
                .map_err(|e| redb_error("get", e))?
            {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            let mut doc = match existing {
                Some(doc) => doc,
                None if create => SubjectDocument::new(object_id),
                None => return Ok(()),
            };
            update(&mut doc);
            let bytes = encode(&doc)?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| redb_error("insert", e))?;
        }
        txn.commit().map_err(|e| redb_error("commit", e))
    }

    /// Remove every document key in `keys` and write `docs` in one transaction.
    fn rewrite(&self, remove: &[String], docs: &[(String, Vec<u8>)]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| redb_error("begin_write", e))?;
        {
            let mut table = txn
                .open_table(DOCUMENTS)
                .map_err(|e| redb_error("open_table", e))?;
            for key in remove {
                table
                    .remove(key.as_str())
                    .map_err(|e| redb_error("remove", e))?;
            }
            for (key, bytes) in docs {
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| redb_error("insert", e))?;
            }
        }
        txn.commit().map_err(|e| redb_error("commit", e))
    }

    fn all_keys(&self) -> StoreResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(|e| redb_error("begin_read", e))?;
        let table = txn
            .open_table(DOCUMENTS)
            .map_err(|e| redb_error("open_table", e))?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(|e| redb_error("iter", e))? {
            let (key, _) = entry.map_err(|e| redb_error("iter", e))?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

impl std::fmt::Debug for DurableDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableDocumentStore").finish()
    }
}

impl DocumentStore for DurableDocumentStore {
    fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<SubjectDocument>> {
        Ok(self
            .read_collection(collection)?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect())
    }

    fn replace_document(&self, collection: &str, doc: SubjectDocument) -> StoreResult<()> {
        let key = doc_key(collection, &doc.object_id);
        self.rewrite(&[], &[(key, encode(&doc)?)])
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let doomed: Vec<String> = self
            .find(collection, filter)?
            .iter()
            .map(|d| doc_key(collection, &d.object_id))
            .collect();
        self.rewrite(&doomed, &[])?;
        Ok(doomed.len())
    }

    fn push_attribute(
        &self,
        collection: &str,
        object_id: &str,
        attribute: Attribute,
    ) -> StoreResult<()> {
        self.update_document(collection, object_id, true, |doc| {
            doc.attributes.push(attribute)
        })
    }

    fn replace_attribute(
        &self,
        collection: &str,
        object_id: &str,
        attribute: Attribute,
    ) -> StoreResult<()> {
        self.update_document(collection, object_id, true, |doc| {
            doc.attributes.retain(|a| a.key != attribute.key);
            doc.attributes.push(attribute);
        })
    }

    fn pull_key(&self, collection: &str, object_id: &str, key: &str) -> StoreResult<()> {
        self.update_document(collection, object_id, false, |doc| {
            doc.attributes.retain(|a| a.key != key)
        })
    }

    fn pull_value(
        &self,
        collection: &str,
        object_id: &str,
        key: &str,
        value: &str,
    ) -> StoreResult<()> {
        self.update_document(collection, object_id, false, |doc| {
            doc.attributes
                .retain(|a| !(a.key == key && a.value.iter().any(|v| v == value)))
        })
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self
            .all_keys()?
            .into_iter()
            .filter_map(|k| k.split_once(SEPARATOR).map(|(c, _)| c.to_string()))
            .collect();
        names.dedup();
        Ok(names)
    }

    fn copy_collection(&self, from: &str, to: &str) -> StoreResult<()> {
        let stale: Vec<String> = self
            .read_collection(to)?
            .iter()
            .map(|d| doc_key(to, &d.object_id))
            .collect();
        let copies = self
            .read_collection(from)?
            .iter()
            .map(|d| -> StoreResult<(String, Vec<u8>)> {
                Ok((doc_key(to, &d.object_id), encode(d)?))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        self.rewrite(&stale, &copies)
    }

    fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        self.delete_many(collection, &Filter::all()).map(|_| ())
    }

    fn upsert_type(&self, node: TypeNode) -> StoreResult<()> {
        let bytes = encode(&node)?;
        let txn = self.db.begin_write().map_err(|e| redb_error("begin_write", e))?;
        {
            let mut table = txn.open_table(TYPES).map_err(|e| redb_error("open_table", e))?;
            table
                .insert(node.typename.as_str(), bytes.as_slice())
                .map_err(|e| redb_error("insert", e))?;
        }
        txn.commit().map_err(|e| redb_error("commit", e))
    }

    fn delete_types(&self, typenames: &[String]) -> StoreResult<usize> {
        let txn = self.db.begin_write().map_err(|e| redb_error("begin_write", e))?;
        let mut removed = 0;
        {
            let mut table = txn.open_table(TYPES).map_err(|e| redb_error("open_table", e))?;
            for name in typenames {
                if table
                    .remove(name.as_str())
                    .map_err(|e| redb_error("remove", e))?
                    .is_some()
                {
                    removed += 1;
                }
            }
        }
        txn.commit().map_err(|e| redb_error("commit", e))?;
        Ok(removed)
    }

    fn type_nodes(&self) -> StoreResult<Vec<TypeNode>> {
        let txn = self.db.begin_read().map_err(|e| redb_error("begin_read", e))?;
        let table = txn.open_table(TYPES).map_err(|e| redb_error("open_table", e))?;
        let mut nodes = Vec::new();
        for entry in table.iter().map_err(|e| redb_error("iter", e))? {
            let (_, value) = entry.map_err(|e| redb_error("iter", e))?;
            nodes.push(decode(value.value())?);
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Direction;
    use crate::store::Match;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> DurableDocumentStore {
        DurableDocumentStore::open(&dir.path().join("kb.redb")).unwrap()
    }

    #[test]
    fn push_pull_find() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store
            .push_attribute("facts", "ball1", Attribute::new("has-color", "red"))
            .unwrap();
        store
            .push_attribute("facts", "ball2", Attribute::new("has-color", "blue"))
            .unwrap();

        let red = Filter::all().with_attribute("has-color", Match::Eq("red".into()));
        let found = store.find("facts", &red).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].object_id, "ball1");

        store.pull_key("facts", "ball1", "has-color").unwrap();
        assert_eq!(store.count("facts", &red).unwrap(), 0);
    }

    #[test]
    fn replace_attribute_is_one_write() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store
            .push_attribute("facts", "ball1", Attribute::new("has-color", "red"))
            .unwrap();
        store
            .push_attribute("facts", "ball1", Attribute::new("has-color", "green"))
            .unwrap();
        store
            .replace_attribute("facts", "ball1", Attribute::new("has-color", "blue"))
            .unwrap();

        let doc = &store.find("facts", &Filter::all()).unwrap()[0];
        assert_eq!(doc.values("has-color").collect::<Vec<_>>(), vec!["blue"]);
        assert_eq!(doc.attributes.len(), 1);
    }

    #[test]
    fn pull_on_missing_document_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.pull_value("facts", "ghost", "k", "v").unwrap();
        assert!(store.find("facts", &Filter::all()).unwrap().is_empty());
    }

    #[test]
    fn collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.replace_document("a", SubjectDocument::new("x")).unwrap();
        store.replace_document("ab", SubjectDocument::new("y")).unwrap();
        assert_eq!(store.find("a", &Filter::all()).unwrap().len(), 1);
        assert_eq!(store.collection_names().unwrap(), vec!["a", "ab"]);

        store.copy_collection("a", "c").unwrap();
        store.drop_collection("a").unwrap();
        assert_eq!(store.collection_names().unwrap(), vec!["ab", "c"]);
    }

    #[test]
    fn persistence_across_reopens() {
        let dir = TempDir::new().unwrap();
        {
            let store = open(&dir);
            store
                .push_attribute("facts", "ball1", Attribute::new("type", "ball"))
                .unwrap();
            store.upsert_type(TypeNode::new("ball", Some("toy"))).unwrap();
            store.upsert_type(TypeNode::new("toy", None)).unwrap();
        }
        let store = open(&dir);
        assert_eq!(store.count("facts", &Filter::all()).unwrap(), 1);
        assert_eq!(
            store.graph_lookup("ball", Direction::Ancestors).unwrap(),
            vec!["toy"]
        );
        assert_eq!(store.delete_types(&["toy".into()]).unwrap(), 1);
        assert_eq!(store.type_nodes().unwrap().len(), 1);
    }
}
