pub mod document;
pub mod schema;
pub mod store;
pub mod sync;

pub use document::LedgerDocument;
pub use schema::{DocumentSchema, ValidationError};
pub use store::{DocumentStore, StoreError};
