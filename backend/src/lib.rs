//! Family expense tracker backend.
//!
//! Two participants record shared payments — manually or by scanning a
//! store receipt's QR code. Receipt line items are fetched from a fiscal
//! lookup service, classified into spending categories (manually or via an
//! AI text-classification call), and a running 50/50 balance between the
//! two participants is reported.

pub mod ai;
pub mod config;
pub mod domain;
pub mod fiscal;
pub mod qr;
pub mod rest;
pub mod storage;
