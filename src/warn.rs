use std::collections::HashSet;
use std::sync::Mutex;

use lazy_static::lazy_static;

lazy_static! {
    static ref GLOBAL_LEDGER: WarningLedger = WarningLedger::new();
}

/// Set of advisory messages already emitted. Append-only, lives for the
/// whole process, starts empty.
#[derive(Debug, Default)]
pub struct WarningLedger {
    seen: Mutex<HashSet<String>>,
}

impl WarningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide ledger used by the engine.
    pub fn global() -> &'static WarningLedger {
        &GLOBAL_LEDGER
    }

    /// Logs `message` unless an identical message was logged before.
    /// Returns `true` when this call emitted it.
    pub fn warn_once(&self, message: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if seen.contains(message) {
            return false;
        }
        log::warn!("{message}");
        seen.insert(message.to_string());
        true
    }

    pub fn contains(&self, message: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(message)
    }
}

/// Emits an advisory through the global ledger.
pub fn warn_once(message: impl AsRef<str>) -> bool {
    WarningLedger::global().warn_once(message.as_ref())
}
