//! Remote tool server connection identity.

pub mod key;

pub use key::{ConnectionCacheKey, ConnectionScope};
