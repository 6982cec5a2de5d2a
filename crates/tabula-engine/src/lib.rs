//! Tabula engine
//!
//! Schema-on-read over a fixed physical layout. Every team table shares the
//! same generic row shape (five slots, each holding a string, a nullable
//! number and a timestamp); a table definition decides which slot column a
//! named field lives in.
//!
//! Nothing in this crate touches storage or HTTP. The DB layer executes the
//! fragments built here and the API layer maps [`TableError`] to responses.

pub mod context;
pub mod error;
pub mod naming;
pub mod paging;
pub mod privacy;
pub mod query;
pub mod record;
pub mod schema;

pub use context::{CallerContext, CallerKind};
pub use error::{Result, TableError};
pub use record::{FieldValue, GenericRecord, LogicalRecord, Slot};
pub use schema::{FieldDefinition, FieldSchema, FieldType, PrivacyLevel, TableDefinition, TableState};
