//! AppTest data model
//!
//! Projects the live control tree of a hosted app into typed values a
//! formula evaluator can read and write:
//! - `grammar` parses compact type strings (`*[Title:s]`, `![Text:s]`, `n`)
//!   into [`TypeNode`] trees;
//! - `record` and `table` hold addresses and types, fetching leaves on
//!   demand through the provider;
//! - `provider` wraps the async [`Provider`] in a blocking, deadline-bounded
//!   [`ProviderHandle`] for the single-threaded evaluator.
//!
//! # Addressing
//!
//! ```text
//! Component1 ──▶ Label1.Text           {Label1, Text, parent: {Component1}}
//! Gallery1.AllItems[2] ──▶ Title       {Gallery1, Title, index: 2}
//! Gallery1.AllItems[2] ──▶ Label4.Text {Label4, Text, parent: {Gallery1, AllItems, 2}}
//! ```

pub mod catalog;
pub mod coerce;
pub mod grammar;
pub mod memory;
pub mod provider;
pub mod record;
pub mod table;
pub mod value;

pub use apptest_common::{EngineConfig, Error, ItemPath, PropertyEnvelope, Result};
pub use catalog::ControlCatalog;
pub use coerce::ZoneMode;
pub use grammar::{RecordType, ScalarKind, TypeGrammar, TypeNode};
pub use memory::InMemoryProvider;
pub use provider::{Provider, ProviderHandle};
pub use record::{ControlRecord, RecordScope, ROW_PLACEHOLDER};
pub use table::{TableSource, TableValue};
pub use value::{Color, FieldValue, ScalarValue};
