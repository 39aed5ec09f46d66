//! Core domain types for the nadi shipper.
//!
//! This crate provides the types shared by the tracker, the transport
//! client and the shipment engine: per-file delivery status, the remote
//! endpoints the shipper talks to, and the [`Reporter`] sink every
//! component writes its progress lines into.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Sink for human-readable progress and diagnostics.
///
/// Library crates never print; the CLI decides where lines go.
pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Delivery status of a single source file.
///
/// `Pending` is the only retryable state; `Sent` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    /// Whether no further delivery attempts will be made.
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Snapshots written by older revisions store the status as an integer
// (0 = pending, 1 = sent, 2 = failed); both forms are accepted.
impl<'de> Deserialize<'de> for DeliveryStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl Visitor<'_> for StatusVisitor {
            type Value = DeliveryStatus;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a delivery status name or legacy status code 0..=2")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                match v {
                    "pending" => Ok(DeliveryStatus::Pending),
                    "sent" => Ok(DeliveryStatus::Sent),
                    "failed" => Ok(DeliveryStatus::Failed),
                    other => Err(E::unknown_variant(other, &["pending", "sent", "failed"])),
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                match v {
                    0 => Ok(DeliveryStatus::Pending),
                    1 => Ok(DeliveryStatus::Sent),
                    2 => Ok(DeliveryStatus::Failed),
                    other => Err(E::invalid_value(de::Unexpected::Unsigned(other), &self)),
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
                    .and_then(|v| self.visit_u64(v))
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

/// Latest delivery state of one source file, keyed by file name in the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeliveryRecord {
    #[serde(alias = "Status", default)]
    pub status: DeliveryStatus,
    /// Number of failed delivery attempts so far.
    #[serde(alias = "Tries", default)]
    pub tries: u32,
}

/// Remote endpoints, appended to the configured base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Upload of one JSON document.
    Record,
    /// Credential verification.
    Verify,
    /// Connectivity check.
    Test,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Record => "record",
            Endpoint::Verify => "verify",
            Endpoint::Test => "test",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
