// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # lingua-kb
//!
//! Knowledge-base sessions over a small statement language, answered by a
//! description-logic reasoner or by a document store.
//!
//! ## Architecture
//!
//! - **Statements** (`statement`): parse, classify and negate `(value relation subject)` text
//! - **Sessions** (`session`): per-session query cache, active-context switching
//! - **Reasoner backend** (`backend::reasoner`): typed line-protocol requests on one shared connection
//! - **Document backend** (`backend::document`): subject documents and a type forest in a `store`
//! - **Stores** (`store`): in-memory (DashMap) or durable (redb)
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use lingua_kb::config::KbConfig;
//! use lingua_kb::session::KnowledgeBase;
//! use lingua_kb::store::mem::MemDocumentStore;
//!
//! let mut kb = KnowledgeBase::document(Arc::new(MemDocumentStore::new()), &KbConfig::default());
//! kb.tell("(red has-color ball1)").unwrap();
//! assert_eq!(kb.ask("(? has-color ball1)").unwrap().terms(), ["red"]);
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod hierarchy;
pub mod registry;
pub mod session;
pub mod statement;
pub mod store;
