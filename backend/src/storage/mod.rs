//! Storage layer: abstraction traits plus the JSON-file implementation.

pub mod json;
mod traits;

pub use traits::{CategoryStorage, Connection, ItemStorage, PaymentStorage};
