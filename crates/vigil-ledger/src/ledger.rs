//! The chained ledger: append, verify, snapshot, export.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;

use vigil_types::{ForensicSnapshot, VigilError};

use crate::canonical::canonical_bytes;
use crate::entry::{genesis_hash, AuditEntry, EventKind};
use crate::sign::Signer;
use crate::store::LedgerStore;

/// Result of verifying the hash chain.
#[derive(Debug, Clone)]
pub struct ChainReport {
    /// Whether the entire chain is intact.
    pub ok: bool,
    /// Number of entries inspected.
    pub total: u64,
    /// Entry id of the first inconsistency, if any.
    pub first_broken: Option<u64>,
    /// Human-readable summary.
    pub message: String,
}

/// Filter for [`Ledger::export`]. Empty filter exports everything.
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    pub agent_id: Option<String>,
    pub kind: Option<EventKind>,
    pub since: Option<DateTime<Utc>>,
}

struct Inner {
    store: Box<dyn LedgerStore>,
    signer: Box<dyn Signer>,
    next_id: u64,
    tip_hash: String,
    /// Set when verification finds a break; appends refuse until an admin
    /// reconciles.
    sealed: bool,
}

/// Append-only, hash-chained, signed audit ledger.
///
/// Appends are serialized by a single writer lock; the chain order is the
/// order in which `append` calls complete.
pub struct Ledger {
    inner: Mutex<Inner>,
}

impl Ledger {
    /// Open a ledger over the given store, recovering the chain tip from
    /// the last readable record.
    pub fn new(store: Box<dyn LedgerStore>, signer: Box<dyn Signer>) -> Result<Self, VigilError> {
        let mut next_id = 1u64;
        let mut tip_hash = genesis_hash();
        for frame in store.scan()? {
            let (_, record) = frame?;
            match serde_json::from_slice::<AuditEntry>(&record) {
                Ok(entry) => {
                    next_id = entry.entry_id + 1;
                    tip_hash = entry.hash;
                }
                Err(e) => {
                    tracing::error!(error = %e, "unreadable ledger record during recovery");
                }
            }
        }
        if signer.demo() {
            tracing::warn!(scheme = signer.scheme(), "ledger running with demo signing");
        }
        tracing::info!(next_id, "ledger opened");
        Ok(Self {
            inner: Mutex::new(Inner {
                store,
                signer,
                next_id,
                tip_hash,
                sealed: false,
            }),
        })
    }

    /// Append an entry. Atomic: the hash link, signature, store append,
    /// and flush all happen under the writer lock.
    pub fn append(
        &self,
        kind: EventKind,
        agent_id: &str,
        payload: Value,
    ) -> Result<u64, VigilError> {
        let mut inner = self.inner.lock();
        if inner.sealed {
            return Err(VigilError::LedgerIntegrity(
                "ledger sealed after integrity failure; reconcile before appending".to_string(),
            ));
        }

        let mut entry = AuditEntry {
            entry_id: inner.next_id,
            timestamp: Utc::now(),
            kind,
            agent_id: agent_id.to_string(),
            payload,
            previous_hash: inner.tip_hash.clone(),
            hash: String::new(),
            signature: String::new(),
            demo_signed: inner.signer.demo(),
        };
        entry.hash = entry.compute_hash();
        entry.signature = inner.signer.sign(&entry.signing_message());

        let record = serde_json::to_value(&entry)
            .map(|v| canonical_bytes(&v))
            .map_err(|e| VigilError::Internal(format!("entry serialization: {e}")))?;
        inner.store.append(&record)?;
        inner.store.flush()?;

        inner.next_id += 1;
        inner.tip_hash = entry.hash.clone();
        tracing::debug!(entry_id = entry.entry_id, kind = %kind, agent_id = %agent_id, "ledger append");
        Ok(entry.entry_id)
    }

    /// Append a forensic snapshot entry.
    pub fn snapshot(&self, snapshot: &ForensicSnapshot) -> Result<u64, VigilError> {
        let payload = serde_json::to_value(snapshot)
            .map_err(|e| VigilError::Internal(format!("snapshot serialization: {e}")))?;
        self.append(EventKind::ForensicSnapshot, &snapshot.agent_id, payload)
    }

    /// Walk the chain, recomputing hashes and verifying signatures.
    ///
    /// On the first inconsistency the report names the broken entry id and
    /// the write path seals until [`mark_reconciled`](Self::mark_reconciled).
    pub fn verify_chain(&self) -> Result<ChainReport, VigilError> {
        let mut inner = self.inner.lock();
        let mut expected_prev = genesis_hash();
        let mut expected_id = 1u64;
        let mut total = 0u64;
        let mut broken: Option<(u64, String)> = None;

        for frame in inner.store.scan()? {
            let (_, record) = frame?;
            total += 1;
            let entry = match serde_json::from_slice::<AuditEntry>(&record) {
                Ok(entry) => entry,
                Err(e) => {
                    broken = Some((expected_id, format!("unreadable record: {e}")));
                    break;
                }
            };
            if entry.entry_id != expected_id {
                broken = Some((
                    expected_id,
                    format!("expected entry id {expected_id}, found {}", entry.entry_id),
                ));
                break;
            }
            if entry.previous_hash != expected_prev {
                broken = Some((entry.entry_id, "chain link does not match".to_string()));
                break;
            }
            if entry.compute_hash() != entry.hash {
                broken = Some((entry.entry_id, "content hash does not match".to_string()));
                break;
            }
            if !inner.signer.verify(&entry.signing_message(), &entry.signature) {
                broken = Some((entry.entry_id, "signature verification failed".to_string()));
                break;
            }
            expected_prev = entry.hash;
            expected_id += 1;
        }

        match broken {
            Some((id, why)) => {
                inner.sealed = true;
                tracing::error!(entry_id = id, reason = %why, "ledger chain broken; sealing write path");
                Ok(ChainReport {
                    ok: false,
                    total,
                    first_broken: Some(id),
                    message: format!("chain broken at entry {id}: {why}"),
                })
            }
            None => Ok(ChainReport {
                ok: true,
                total,
                first_broken: None,
                message: format!("all {total} entries verified"),
            }),
        }
    }

    /// Admin reconciliation: re-open the write path after an operator has
    /// resolved an integrity failure.
    pub fn mark_reconciled(&self) {
        let mut inner = self.inner.lock();
        inner.sealed = false;
        tracing::warn!("ledger reconciled by admin; write path re-opened");
    }

    /// Whether the write path is currently refusing appends.
    pub fn sealed(&self) -> bool {
        self.inner.lock().sealed
    }

    /// Export entries in id order. The entries carry their chain links and
    /// signatures, so an external verifier can re-check integrity.
    pub fn export(&self, filter: &ExportFilter) -> Result<Vec<AuditEntry>, VigilError> {
        let inner = self.inner.lock();
        let mut out = Vec::new();
        for frame in inner.store.scan()? {
            let (_, record) = frame?;
            let entry = serde_json::from_slice::<AuditEntry>(&record)
                .map_err(|e| VigilError::Storage(format!("unreadable record: {e}")))?;
            if let Some(agent_id) = &filter.agent_id {
                if entry.agent_id != *agent_id {
                    continue;
                }
            }
            if let Some(kind) = filter.kind {
                if entry.kind != kind {
                    continue;
                }
            }
            if let Some(since) = filter.since {
                if entry.timestamp < since {
                    continue;
                }
            }
            out.push(entry);
        }
        Ok(out)
    }

    /// Every entry, in id order.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, VigilError> {
        self.export(&ExportFilter::default())
    }

    /// All entries for one agent.
    pub fn entries_for_agent(&self, agent_id: &str) -> Result<Vec<AuditEntry>, VigilError> {
        self.export(&ExportFilter {
            agent_id: Some(agent_id.to_string()),
            ..ExportFilter::default()
        })
    }

    /// Entry counts per event kind.
    pub fn summary(&self) -> Result<BTreeMap<String, u64>, VigilError> {
        let mut counts = BTreeMap::new();
        for entry in self.entries()? {
            *counts.entry(entry.kind.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> u64 {
        self.inner.lock().next_id - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
