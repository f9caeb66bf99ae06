//! # JSON File Storage
//!
//! File-backed storage implementation: one pretty-printed JSON array per
//! entity type (`categories.json`, `payments.json`, `items.json`) in a
//! shared data directory. Collections are held in memory and every
//! mutation synchronously rewrites the affected file, so the files stay
//! human-readable and can be hand-edited between runs — the loader accepts
//! any well-formed externally modified array.
//!
//! Writers to the same entity type are serialized behind a mutex. There is
//! no durability guarantee: a failed write is logged and memory stays
//! ahead of disk until the next successful write.

pub mod category_repository;
pub mod connection;
pub mod item_repository;
pub mod payment_repository;

#[cfg(test)]
pub mod test_utils;

pub use category_repository::CategoryRepository;
pub use connection::JsonConnection;
pub use item_repository::ItemRepository;
pub use payment_repository::PaymentRepository;
