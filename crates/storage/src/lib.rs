pub mod error;
pub mod kind;
pub mod schema;
pub mod sqlite;
pub mod table;
pub mod traits;

pub use error::StorageError;
pub use kind::{Column, ColumnKind, MappingKind};
pub use sqlite::SqliteStore;
pub use table::MappingTable;
pub use traits::*;
