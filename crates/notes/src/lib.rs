//! Durable note persistence: one JSON file per note plus a listing index.

pub mod index;
pub mod schema;
mod store;

pub use index::{INDEX_FILE_NAME, NoteIndex};
pub use schema::{NOTE_SCHEMA_VERSION, Note, NoteIndexEntry, NoteType};
pub use store::{NoteStore, ReconcileReport};
