//! 50/50 balance reporting.

use anyhow::Result;

use crate::domain::models::BalanceTotals;
use crate::storage::{Connection, PaymentStorage};

/// Service responsible for the running 50/50 balance between the two
/// participants. The aggregation itself lives in the payment store; this
/// service is the domain-level entry point for it.
#[derive(Clone)]
pub struct BalanceService<C: Connection> {
    payments: C::Payments,
}

impl<C: Connection> BalanceService<C> {
    pub fn new(connection: &C) -> Self {
        Self {
            payments: connection.payment_repository(),
        }
    }

    /// Per-participant net contributions plus total spend, over payments
    /// with a positive total. Deltas are exact (real division by two);
    /// rounding to major units is the presentation layer's call.
    pub fn totals(&self) -> Result<BalanceTotals> {
        self.payments.balance_totals()
    }
}
