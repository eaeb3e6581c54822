//! Opaque codes handed to users.
//!
//! - [`EntryCode`]: printed in a ticket's QR image, 128 random bits
//! - [`TransferCode`]: shared with a transfer recipient, 48 random bits
//! - order numbers: human-readable order references
//!
//! All randomness comes from the operating system CSPRNG.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;

/// Prefix of every entry code.
pub const ENTRY_CODE_PREFIX: &str = "PA-";

const ENTRY_CODE_BYTES: usize = 16;
const TRANSFER_CODE_BYTES: usize = 6;
const ORDER_SUFFIX_BYTES: usize = 4;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(len * 2), |mut out, b| {
        let _ = write!(out, "{b:02X}");
        out
    })
}

/// Code encoded in a ticket's QR image.
///
/// Rendered as `PA-` followed by 32 upper-case hex characters. Replaced on
/// every ownership transfer.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryCode(String);

impl EntryCode {
    /// Generate a fresh, unguessable entry code.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{ENTRY_CODE_PREFIX}{}", random_hex(ENTRY_CODE_BYTES)))
    }

    /// Wrap a scanned or stored code as-is.
    ///
    /// Scanned codes are matched exactly; no normalisation is applied.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Claim code of a ticket transfer: 12 upper-case hex characters.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferCode(String);

impl TransferCode {
    /// Generate a fresh transfer code.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_hex(TRANSFER_CODE_BYTES))
    }

    /// Normalise user input: surrounding whitespace is dropped and letters
    /// are upper-cased.
    #[must_use]
    pub fn normalize(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    /// The code text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate an order number: `ORD-YYYYMMDD-` followed by 8 upper-case hex.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    format!(
        "ORD-{}-{}",
        now.format("%Y%m%d"),
        random_hex(ORDER_SUFFIX_BYTES)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn entry_code_format() {
        let code = EntryCode::generate();
        let hex = code.as_str().strip_prefix(ENTRY_CODE_PREFIX);
        assert!(hex.is_some());
        let hex = hex.unwrap_or_default();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn entry_codes_do_not_repeat() {
        let codes: HashSet<EntryCode> = (0..10_000).map(|_| EntryCode::generate()).collect();
        assert_eq!(codes.len(), 10_000);
    }

    #[test]
    fn transfer_code_format_and_normalisation() {
        let code = TransferCode::generate();
        assert_eq!(code.as_str().len(), 12);
        assert!(code.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

        let typed = format!("  {}\n", code.as_str().to_ascii_lowercase());
        assert_eq!(TransferCode::normalize(&typed), code);
    }

    #[test]
    fn order_number_carries_date() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).single();
        let number = generate_order_number(now.unwrap_or_else(Utc::now));
        assert!(number.starts_with("ORD-20260314-"));
        assert_eq!(number.len(), "ORD-20260314-".len() + 8);
    }
}
