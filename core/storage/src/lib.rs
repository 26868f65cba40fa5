//! Storage backends for Lockbox.
//!
//! Two stores back every file resource: the relational [`Database`] holding
//! credential and resource records, and a [`BlobStore`] holding the raw file
//! bytes. Keeping them consistent is the caller's job; this crate supplies
//! the [`Transaction`] to do it with.

pub mod blob;
pub mod database;
pub mod local;
pub mod memory;
pub mod resources;
pub mod users;

pub use blob::{BlobLocator, BlobReader, BlobStore, BlobWriter};
pub use database::{map_sqlite_error, Database, Transaction};
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use resources::ListPage;
pub use users::UserRecord;
