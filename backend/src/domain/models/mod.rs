//! Domain models.

pub mod category;
pub mod item;
pub mod payment;

pub use category::{Category, CategoryUpdate, NewCategory};
pub use item::{Item, ItemUpdate, NewItem};
pub use payment::{BalanceTotals, NewPayment, Payment, PaymentTotalsUpdate};

pub use shared::Participant;
