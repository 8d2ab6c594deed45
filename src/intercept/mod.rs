//! Event interceptor: the capture-phase paste, key-down and drag
//! listeners.
//!
//! The interceptor is registered before the orchestrator and its
//! collaborators exist. Until [`EventInterceptor::initialize`] runs,
//! every event passes through to the host page; nothing is queued.

pub mod event;
pub mod keybinding;

use std::sync::{Arc, OnceLock};

use crate::exchange::state::OrchestratorState;
use crate::exchange::{ExchangeReport, Orchestrator, PendingRun};
use crate::gesture::{Gesture, GestureController};
use crate::selection::SelectionLocator;

use self::event::{DragEvent, KeyEvent, PasteEvent};
use self::keybinding::HotkeyBindings;

/// What happened to an event.
#[derive(Debug)]
pub enum Disposition {
    /// Left for the host page.
    PassThrough,
    /// Swallowed without a protocol run (another run was in flight).
    Suppressed,
    Exchanged(ExchangeReport),
    Gesture(Gesture),
}

/// Result of the synchronous half of paste handling.
pub enum PasteDispatch {
    PassThrough,
    Suppressed,
    /// A run that must be driven to completion.
    Run(PendingRun),
}

struct Ready {
    orchestrator: Arc<Orchestrator>,
    locator: Arc<SelectionLocator>,
    gestures: GestureController,
}

pub struct EventInterceptor {
    state: Arc<OrchestratorState>,
    bindings: HotkeyBindings,
    ready: OnceLock<Ready>,
}

impl EventInterceptor {
    pub fn register(state: Arc<OrchestratorState>, bindings: HotkeyBindings) -> Self {
        tracing::debug!(
            paste = %bindings.paste,
            quick_swap = %bindings.quick_swap,
            swap_mode = %bindings.swap_mode,
            "listeners registered"
        );
        Self {
            state,
            bindings,
            ready: OnceLock::new(),
        }
    }

    /// Attach the orchestrator and gesture handlers. Returns false if
    /// already initialized.
    pub fn initialize(
        &self,
        orchestrator: Arc<Orchestrator>,
        locator: Arc<SelectionLocator>,
        gestures: GestureController,
    ) -> bool {
        let fresh = self
            .ready
            .set(Ready {
                orchestrator,
                locator,
                gestures,
            })
            .is_ok();
        if fresh {
            tracing::info!("interceptor initialized");
        }
        fresh
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.get().is_some()
    }

    pub fn state(&self) -> &Arc<OrchestratorState> {
        &self.state
    }

    /// Synchronous paste handling. Suppression, if any, has happened by
    /// the time this returns.
    pub fn on_paste(&self, event: &PasteEvent) -> PasteDispatch {
        let Some(ready) = self.ready.get() else {
            tracing::trace!("paste before initialization, passing through");
            return PasteDispatch::PassThrough;
        };
        if !self.state.is_enabled() {
            tracing::debug!("disabled, normal paste");
            return PasteDispatch::PassThrough;
        }
        if !ready.locator.is_in_editor() {
            tracing::debug!("not in editor, normal paste");
            return PasteDispatch::PassThrough;
        }
        let metadata = ready.locator.metadata();
        tracing::debug!(
            source = %metadata.source,
            len = metadata.text.len(),
            range_count = metadata.range_count,
            collapsed = metadata.is_collapsed,
            anchor = ?metadata.anchor_node,
            focus = ?metadata.focus_node,
            "selection before exchange"
        );
        match ready.orchestrator.intercept(&self.state, event) {
            Some(run) => {
                tracing::debug!(run_id = %run.run_id(), document = %run.context().document, "exchange started");
                PasteDispatch::Run(run)
            }
            None => PasteDispatch::Suppressed,
        }
    }

    /// Full paste handling, driving any run to completion.
    pub async fn handle_paste(&self, event: &PasteEvent) -> Disposition {
        match self.on_paste(event) {
            PasteDispatch::PassThrough => Disposition::PassThrough,
            PasteDispatch::Suppressed => Disposition::Suppressed,
            PasteDispatch::Run(run) => Disposition::Exchanged(run.run().await),
        }
    }

    pub fn on_keydown(&self, event: &KeyEvent) -> Disposition {
        let Some(ready) = self.ready.get() else {
            return Disposition::PassThrough;
        };
        if self.bindings.paste.matches(event) {
            // The paste event follows on its own.
            tracing::trace!("paste shortcut");
            return Disposition::PassThrough;
        }
        if self.bindings.quick_swap.matches(event) && self.state.is_enabled() {
            event.flags.prevent_default();
            return Disposition::Gesture(Gesture::QuickSwap(ready.gestures.quick_swap()));
        }
        if self.bindings.swap_mode.matches(event) {
            event.flags.prevent_default();
            return Disposition::Gesture(Gesture::SwapModeToggled(
                ready.gestures.toggle_swap_mode(),
            ));
        }
        Disposition::PassThrough
    }

    pub fn on_drag_start(&self, _event: &DragEvent) -> Disposition {
        self.ready
            .get()
            .and_then(|r| r.gestures.drag_start())
            .map_or(Disposition::PassThrough, Disposition::Gesture)
    }

    pub fn on_drop(&self, event: &DragEvent) -> Disposition {
        self.ready
            .get()
            .and_then(|r| r.gestures.drop(event))
            .map_or(Disposition::PassThrough, Disposition::Gesture)
    }

    pub fn on_drag_end(&self, _event: &DragEvent) {
        if let Some(ready) = self.ready.get() {
            ready.gestures.drag_end();
        }
    }
}
