use thiserror::Error;

/// Error kinds surfaced by the replay core, per the recovery policy in §7:
/// signal/network-domain errors recover locally, structural and arithmetic
/// invariants are fatal to the containing replay only.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Loader returned empty data or the network call failed. Non-fatal to
    /// an optimizer sweep: the caller records a `-inf` score and continues.
    #[error("data unavailable for {symbol} [{from}, {to}]: {reason}")]
    DataUnavailable {
        symbol: String,
        from: i64,
        to: i64,
        reason: String,
    },

    /// A row violated the candle invariants (`low <= min(open,close) <=
    /// max(open,close) <= high`, `low > 0`, boundary alignment). The row is
    /// dropped with a warning; this never aborts the loader.
    #[error("invalid candle for {symbol} at {timestamp_ms}: {reason}")]
    InvalidCandle {
        symbol: String,
        timestamp_ms: i64,
        reason: String,
    },

    /// An internal assertion failed (e.g. the candle store received a
    /// timestamp not strictly after the last one for that symbol). Fatal to
    /// the containing replay; sibling replays in a sweep are unaffected.
    #[error("invariant violation in {component}: {detail}")]
    InvariantViolation { component: String, detail: String },

    /// Unknown symbol, malformed parameter file, or similar setup fault.
    /// Aborts before any replay runs.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The result sink failed to persist an artifact. Logged; the computed
    /// result object is still returned in memory.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Cooperative shutdown was requested. Partial artifacts are flushed by
    /// the caller; this variant just carries the signal.
    #[error("replay cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;
