//! Address decoding, shared value types, and the error taxonomy.

mod addr;
mod data;
mod error;

pub use addr::{DecodedAddress, Geometry};
pub use data::{AccessType, MesiState};
pub use error::CacheError;
