use thiserror::Error;

/// Top-level error type for the `homewatch-api` crate.
///
/// Covers every failure mode of the external collaborators: helper
/// processes, GPIO, the document store, and the tunnel client.
/// `homewatch-core` maps these into domain outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Helper processes ────────────────────────────────────────────
    /// The program could not be started at all (missing binary, permissions).
    #[error("failed to launch `{program}`: {reason}")]
    Launch { program: String, reason: String },

    /// The program ran but exited unsuccessfully.
    #[error("`{program}` exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    /// The program succeeded but wrote nothing to stdout.
    #[error("`{program}` produced no output")]
    NoData { program: String },

    /// No helper is configured for the requested logical source.
    #[error("no reader configured for source '{0}'")]
    UnknownSource(String),

    // ── GPIO ────────────────────────────────────────────────────────
    #[error("GPIO pin {pin}: {reason}")]
    Gpio { pin: u32, reason: String },

    // ── Document store ──────────────────────────────────────────────
    #[error("document store error in '{collection}': {message}")]
    Store { collection: String, message: String },

    // ── Tunnel ──────────────────────────────────────────────────────
    #[error("tunnel error: {0}")]
    Tunnel(String),

    // ── Data / IO ───────────────────────────────────────────────────
    /// JSON (de)serialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this failure came from a helper process that never ran to
    /// completion or ran and failed.
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::Launch { .. } | Self::ExitStatus { .. })
    }
}
