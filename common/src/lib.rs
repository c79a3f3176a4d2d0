//! walletledger common types
//!
//! Shared identifiers, currency types and the error taxonomy used by the
//! rate resolver, the wallet store and the operation engine.

pub mod identifiers;
pub mod monetary;
pub mod error;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
