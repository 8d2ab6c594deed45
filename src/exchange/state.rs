//! Controller state shared between the interceptor and protocol runs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::settings::Settings;

/// Flags owned by one content runtime and passed to every handler.
///
/// `enabled` and `swap_mode` mirror the settings store and are read
/// synchronously, since a paste must be suppressed before any await.
#[derive(Debug)]
pub struct OrchestratorState {
    enabled: AtomicBool,
    swap_mode: AtomicBool,
    in_flight: AtomicBool,
}

impl OrchestratorState {
    pub fn new(settings: Settings) -> Self {
        Self {
            enabled: AtomicBool::new(settings.enabled),
            swap_mode: AtomicBool::new(settings.swap_mode_enabled),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn apply(&self, settings: &Settings) {
        self.enabled.store(settings.enabled, Ordering::Release);
        self.swap_mode
            .store(settings.swap_mode_enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn swap_mode(&self) -> bool {
        self.swap_mode.load(Ordering::Acquire)
    }

    /// Flip swap mode, returning the new value.
    pub fn toggle_swap_mode(&self) -> bool {
        !self.swap_mode.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the single in-flight slot. `None` if a run already holds it.
    pub fn try_begin(self: &Arc<Self>) -> Option<RunGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                state: Arc::clone(self),
            })
    }
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

/// Holds the in-flight slot; releases it on drop.
#[derive(Debug)]
pub struct RunGuard {
    state: Arc<OrchestratorState>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::Release);
    }
}

/// Steps of one exchange-paste run, in the order they are reached.
/// Between runs the orchestrator is idle, which shows as
/// [`OrchestratorState::is_in_flight`] returning false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Intercepted,
    ClipboardCaptured,
    CopyIssued,
    ReadAfterCopy,
    ClipboardRestoredToOriginal,
    NativePasteIssued,
    DisplacedRestored,
    NoSwap,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Intercepted => "intercepted",
            Self::ClipboardCaptured => "clipboard_captured",
            Self::CopyIssued => "copy_issued",
            Self::ReadAfterCopy => "read_after_copy",
            Self::ClipboardRestoredToOriginal => "clipboard_restored_to_original",
            Self::NativePasteIssued => "native_paste_issued",
            Self::DisplacedRestored => "displaced_restored",
            Self::NoSwap => "no_swap",
        })
    }
}
