//! # nadi-core
//!
//! Store-and-forward shipment of JSON documents to the Nadi ingestion API.
//!
//! A producer drops `*.json` files into a storage directory. The shipment
//! loop sweeps that directory, POSTs each pending document to the `record`
//! endpoint, and reconciles the outcome in a persistent tracker so that
//! delivered files are never resent and failing files are retried a bounded
//! number of times.
//!
//! ## Pipeline
//!
//! The core flow is **sweep → deliver → reconcile → save**:
//!
//! 1. [`spool::list_candidates`] lists the storage directory in file-name
//!    order.
//! 2. Files already `sent` or `failed` in the tracker are skipped.
//! 3. Every other file is read and handed to the [`Transport`].
//! 4. Success marks the file `sent` (and deletes it unless the shipper is
//!    persistent); failure bumps its try counter until it becomes `failed`.
//! 5. The tracker snapshot is written atomically at the end of each pass.
//!    A failed save is reported and flagged in the [`PassSummary`]; the
//!    sweep itself carries on.
//!
//! ## Example
//!
//! ```ignore
//! use nadi_core::{FileStore, HttpTransport, Shipment, ShutdownSignal};
//!
//! let config = nadi_config::load_config("nadi.yaml".as_ref())?;
//! let transport = HttpTransport::from_config(&config)?;
//! let store = FileStore::new(&config.tracker_file);
//!
//! let summary = Shipment::new(&config, &transport, &store)
//!     .run(&ShutdownSignal::new(), &mut reporter)?;
//! println!("{} file(s) delivered", summary.sent);
//! ```
//!
//! ## Modules
//!
//! - [`engine`]: The shipment loop and its drivers
//! - [`probe`]: `verify` and `test` connectivity checks
//! - [`shutdown`]: Cooperative shutdown flag with interruptible sleep
//! - [`spool`]: Listing, reading and removing files in the storage directory

pub mod engine;
pub mod probe;
pub mod shutdown;
pub mod spool;

pub use engine::{PassSummary, RunSummary, Shipment};
pub use nadi_config::{IdlePolicy, ShipperConfig};
pub use nadi_tracker::{DeliverySet, DeliveryStore, FileStore};
pub use nadi_transport::{HttpTransport, Transport, TransportError};
pub use nadi_types::{DeliveryRecord, DeliveryStatus, Endpoint, Reporter};
pub use probe::{ProbeReport, probe, verify};
pub use shutdown::ShutdownSignal;
pub use spool::{Candidate, LocalFiles, SourceFiles, list_candidates};
