//! Processing stages of one inbound order event.

use serde::{Deserialize, Serialize};

/// How far a message got through the handler.
///
/// Stage transitions:
/// ```text
/// Received ──► Decoded ──► TraceExtracted ──► LedgerInvoked ──► ResultBuilt ──► Published ──► Acknowledged
///    └── (decode failure: dropped)                                  └── (publish failure: saga unresolved)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum ProcessingStage {
    #[default]
    Received,
    Decoded,
    TraceExtracted,
    LedgerInvoked,
    ResultBuilt,
    Published,
    /// Terminal. Deliveries are auto-acknowledged, so this only marks the end.
    Acknowledged,
}

impl ProcessingStage {
    /// The following stage, or `None` once acknowledged.
    pub fn next(&self) -> Option<ProcessingStage> {
        match self {
            ProcessingStage::Received => Some(ProcessingStage::Decoded),
            ProcessingStage::Decoded => Some(ProcessingStage::TraceExtracted),
            ProcessingStage::TraceExtracted => Some(ProcessingStage::LedgerInvoked),
            ProcessingStage::LedgerInvoked => Some(ProcessingStage::ResultBuilt),
            ProcessingStage::ResultBuilt => Some(ProcessingStage::Published),
            ProcessingStage::Published => Some(ProcessingStage::Acknowledged),
            ProcessingStage::Acknowledged => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStage::Acknowledged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStage::Received => "received",
            ProcessingStage::Decoded => "decoded",
            ProcessingStage::TraceExtracted => "trace_extracted",
            ProcessingStage::LedgerInvoked => "ledger_invoked",
            ProcessingStage::ResultBuilt => "result_built",
            ProcessingStage::Published => "published",
            ProcessingStage::Acknowledged => "acknowledged",
        }
    }
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
