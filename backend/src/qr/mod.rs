//! Receipt QR handling: image decoding and payload parsing.

pub mod decoder;
pub mod payload;

pub use decoder::{DecodedQr, QrDecodeError, QrDecoder};
pub use payload::ReceiptPayload;
