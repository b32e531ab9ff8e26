//! Append-only, SHA-256 hash-chained, signed audit ledger.
//!
//! Every decision made by the core is recorded as an [`AuditEntry`] linked
//! to the previous entry's hash and signed, forming a tamper-evident chain
//! that can be verified offline. Storage is abstracted behind
//! [`LedgerStore`] with in-memory and append-only-file implementations.

pub mod canonical;
pub mod entry;
pub mod ledger;
pub mod sign;
pub mod store;

pub use canonical::canonical_bytes;
pub use entry::{genesis_hash, AuditEntry, EventKind};
pub use ledger::{ChainReport, ExportFilter, Ledger};
pub use sign::{Ed25519Signer, HmacSigner, Signer};
pub use store::{FileStore, LedgerStore, MemoryStore};
