//! Error types shared across all Vigil crates.

/// Errors that can occur across the supervision core.
///
/// Policy denies and agent suspensions are *not* errors; they are returned
/// as structured decisions. Only failures that break a subsystem contract
/// (storage, integrity, configuration) surface here.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// Conflicting MODIFY patches, unknown rule kinds on reload, or an
    /// otherwise inconsistent rule document. Fail closed: the previous rule
    /// set stays active.
    #[error("policy misconfiguration: {0}")]
    PolicyMisconfiguration(String),

    /// The hash chain or a signature failed verification. Fatal to the
    /// write path until an admin reconciles; reads stay available.
    #[error("ledger integrity failure: {0}")]
    LedgerIntegrity(String),

    /// The underlying ledger store cannot append or read.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The referenced agent has no profile.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// The agent has used up its resurrection budget.
    #[error("resurrection limit reached for {agent_id} (max {limit})")]
    ResurrectionLimit { agent_id: String, limit: u32 },

    /// Resurrection was requested for an agent that is not killed.
    #[error("agent {agent_id} is not killed; nothing to resurrect")]
    NotKilled { agent_id: String },

    /// Resume was requested for an agent that is not paused or quarantined.
    #[error("agent {agent_id} is not paused; nothing to resume")]
    NotPaused { agent_id: String },

    /// Any other bug; the triggering pipeline is tagged as a deny and the
    /// condition surfaced to the admin.
    #[error("internal error: {0}")]
    Internal(String),
}
