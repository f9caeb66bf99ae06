//! JSON-file-backed payment repository.

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::domain::models::{BalanceTotals, NewPayment, Payment, PaymentTotalsUpdate};
use crate::storage::PaymentStorage;

use super::connection::{JsonConnection, PAYMENTS_FILE};

#[derive(Clone)]
pub struct PaymentRepository {
    connection: JsonConnection,
}

impl PaymentRepository {
    pub fn new(connection: JsonConnection) -> Self {
        Self { connection }
    }
}

impl PaymentStorage for PaymentRepository {
    fn store_payment(&self, new: NewPayment) -> Result<Payment> {
        let mut table = JsonConnection::lock(&self.connection.payments);
        let payment = Payment {
            id: table.allocate_id(),
            ts: Utc::now(),
            total: new.total,
            paid_egor: new.paid_egor,
            paid_syoma: new.paid_syoma,
            description: new.description,
            raw_qr: new.raw_qr,
            fns_payload: new.fns_payload,
            created_by: new.created_by,
        };
        table.records.push(payment.clone());
        self.connection.save_array(PAYMENTS_FILE, &table.records);
        info!("Stored payment {} ({} minor units)", payment.id, payment.total);
        Ok(payment)
    }

    fn get_payment(&self, id: i64) -> Result<Option<Payment>> {
        let table = JsonConnection::lock(&self.connection.payments);
        Ok(table.records.iter().find(|p| p.id == id).cloned())
    }

    fn find_payment_by_raw_qr(&self, raw_qr: &str) -> Result<Option<Payment>> {
        let table = JsonConnection::lock(&self.connection.payments);
        Ok(table
            .records
            .iter()
            .find(|p| p.raw_qr.as_deref() == Some(raw_qr))
            .cloned())
    }

    fn list_payments(&self) -> Result<Vec<Payment>> {
        let table = JsonConnection::lock(&self.connection.payments);
        let mut payments = table.records.clone();
        payments.sort_by(|a, b| b.ts.cmp(&a.ts));
        Ok(payments)
    }

    fn update_payment_totals(&self, id: i64, update: PaymentTotalsUpdate) -> Result<()> {
        let mut table = JsonConnection::lock(&self.connection.payments);
        match table.records.iter_mut().find(|p| p.id == id) {
            Some(payment) => {
                payment.total = update.total;
                payment.paid_egor = update.paid_egor;
                payment.paid_syoma = update.paid_syoma;
                payment.description = update.description;
            }
            // Editing a missing id is an idempotent no-op.
            None => {
                info!("update_payment_totals: no payment with id {}, nothing to do", id);
                return Ok(());
            }
        }
        self.connection.save_array(PAYMENTS_FILE, &table.records);
        Ok(())
    }

    fn delete_payment(&self, id: i64) -> Result<bool> {
        let mut table = JsonConnection::lock(&self.connection.payments);
        let before = table.records.len();
        table.records.retain(|p| p.id != id);
        let deleted = table.records.len() < before;
        if deleted {
            self.connection.save_array(PAYMENTS_FILE, &table.records);
            info!("Deleted payment {}", id);
        }
        Ok(deleted)
    }

    fn balance_totals(&self) -> Result<BalanceTotals> {
        let table = JsonConnection::lock(&self.connection.payments);
        let mut totals = BalanceTotals {
            egor_delta: 0.0,
            syoma_delta: 0.0,
            total_spent: 0,
            payments_count: 0,
        };
        for payment in table.records.iter().filter(|p| p.total > 0) {
            // Real division: a payment with an odd total contributes half a
            // minor unit to each side, rounding happens at the edge.
            let half = payment.total as f64 / 2.0;
            totals.egor_delta += payment.paid_egor as f64 - half;
            totals.syoma_delta += payment.paid_syoma as f64 - half;
            totals.total_spent += payment.total;
            totals.payments_count += 1;
        }
        Ok(totals)
    }
}
