pub mod error;
pub mod hlc;
pub mod key;
pub mod mapping;
pub mod page;

pub use error::CoreError;
pub use hlc::{Hlc, HlcClock};
pub use key::{KeyValue, MappingKey};
pub use mapping::{Mapping, MappingRow, MappingType};
pub use page::{Page, PageRequest};
