//! Structured diagnostics
//!
//! Nothing in the sync client is fatal: failures are recovered from or
//! dropped locally. Each one is logged and also published here so a host
//! can surface them (connectivity indicator, debug panel, tests).

use chrono::Utc;
use geotrackr_core::Timestamp;
use log::warn;
use std::fmt;
use tokio::sync::broadcast;

/// Which failure class a diagnostic belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Connection refused, dropped or upgrade rejected
    Transport,
    /// Handshake rejected, server ERROR frame, heartbeat timeout
    Protocol,
    /// A single inbound payload failed parsing or validation
    Decode,
    /// A notification side effect failed
    Dispatch,
    /// Polling the authoritative snapshot failed
    Refresh,
    /// Publish attempted while not connected
    PublishRejected,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Transport => "transport",
            DiagnosticKind::Protocol => "protocol",
            DiagnosticKind::Decode => "decode",
            DiagnosticKind::Dispatch => "dispatch",
            DiagnosticKind::Refresh => "refresh",
            DiagnosticKind::PublishRejected => "publish-rejected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Component or topic the failure belongs to
    pub context: String,
    pub detail: String,
    pub at: Timestamp,
}

/// Broadcast sink for diagnostics, cheap to clone
#[derive(Clone)]
pub struct Diagnostics {
    tx: broadcast::Sender<Diagnostic>,
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every diagnostic emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }

    /// Log and publish a diagnostic; never fails
    pub fn emit(&self, kind: DiagnosticKind, context: impl Into<String>, detail: impl fmt::Display) {
        let diagnostic = Diagnostic {
            kind,
            context: context.into(),
            detail: detail.to_string(),
            at: Utc::now(),
        };
        warn!(
            "[{}] {}: {}",
            diagnostic.kind, diagnostic.context, diagnostic.detail
        );
        // No receivers is fine
        let _ = self.tx.send(diagnostic);
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(256)
    }
}
