pub mod fixture;
pub mod racing;

pub use fixture::*;
pub use racing::RacingStore;
