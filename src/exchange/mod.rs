//! Exchange-paste orchestrator.
//!
//! One run per intercepted paste, steal/paste/restore:
//!
//! 1. Suppress the event (synchronously, before anything else).
//! 2. Capture the original clipboard text, preferring the event payload.
//! 3. Native copy in the editor document: the selection overwrites the
//!    clipboard.
//! 4. After the copy settle wait, read the clipboard. Text that is non-empty
//!    and differs from the original is the displaced selection.
//! 5. Write the original back so the paste inserts the intended text.
//! 6. Native paste in the editor document.
//! 7. If a selection was displaced, write it onto the clipboard.
//!
//! Any failure before step 6 completes triggers exactly one plain native
//! paste so the user's paste is never eaten. Runs are mutually exclusive
//! through [`state::OrchestratorState::try_begin`]; there is no retry and
//! no cancellation.

pub mod state;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::clipboard::{ClipboardBridge, ClipboardSnapshot, SnapshotSource};
use crate::collab::{FeedbackPresenter, HistoryStore, swap_toast};
use crate::document::{DocumentResolver, EditorContext};
use crate::host::{
    CommandDelays, CommandSettle, DocumentHost, EditorSelectors, HostError, HostSet,
    NativeCommand,
};
use crate::intercept::event::PasteEvent;

use self::state::{OrchestratorState, Phase, RunGuard};

/// Tunables for one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Wait after the native copy before reading the clipboard.
    pub copy_settle: Duration,
    /// Wait after the native paste before writing the displaced text.
    pub paste_settle: Duration,
    /// Runs slower than this log a performance warning.
    pub latency_budget: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            copy_settle: Duration::from_millis(50),
            paste_settle: Duration::from_millis(10),
            latency_budget: Duration::from_millis(100),
        }
    }
}

impl ExchangeConfig {
    /// Host settle waits matching these delays.
    pub fn command_delays(&self) -> CommandDelays {
        CommandDelays {
            copy: self.copy_settle,
            paste: self.paste_settle,
        }
    }
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("original clipboard text unavailable")]
    OriginalUnavailable,
    #[error("native {0} reported failure")]
    CommandFailed(NativeCommand),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("could not restore the original clipboard text")]
    RestoreFailed,
    #[error("could not write the displaced text to the clipboard")]
    DisplacedWriteFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Swapped { displaced_text: String },
    NoSwapDetected,
    Failed { reason: ExchangeError },
}

impl fmt::Display for ExchangeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swapped { displaced_text } => write!(f, "swapped ({displaced_text:?})"),
            Self::NoSwapDetected => f.write_str("no swap detected"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Everything known about one finished run.
#[derive(Debug, Clone)]
pub struct ExchangeReport {
    pub run_id: Uuid,
    pub context: EditorContext,
    pub outcome: ExchangeOutcome,
    /// Phases reached, in order.
    pub trail: Vec<Phase>,
    /// `Some(ok)` if the degraded fallback paste was attempted.
    pub fallback_paste: Option<bool>,
    pub elapsed: Duration,
}

pub struct Orchestrator {
    documents: Arc<dyn DocumentHost>,
    settle: Arc<dyn CommandSettle>,
    bridge: ClipboardBridge,
    resolver: DocumentResolver,
    history: Arc<dyn HistoryStore>,
    feedback: Arc<dyn FeedbackPresenter>,
    config: ExchangeConfig,
}

impl Orchestrator {
    pub fn new(
        hosts: &HostSet,
        selectors: EditorSelectors,
        history: Arc<dyn HistoryStore>,
        feedback: Arc<dyn FeedbackPresenter>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            documents: hosts.documents.clone(),
            settle: hosts.settle.clone(),
            bridge: ClipboardBridge::new(hosts),
            resolver: DocumentResolver::new(hosts, selectors),
            history,
            feedback,
            config,
        }
    }

    /// Synchronous part of a run: suppress `event`, claim the in-flight
    /// slot, and resolve the editor document.
    ///
    /// Returns `None` if another run holds the slot. The event is
    /// suppressed either way and the paste is dropped.
    pub fn intercept(
        self: &Arc<Self>,
        state: &Arc<OrchestratorState>,
        event: &PasteEvent,
    ) -> Option<PendingRun> {
        event.flags.suppress();
        let Some(guard) = state.try_begin() else {
            tracing::debug!("exchange already in flight, paste dropped");
            return None;
        };
        let run_id = Uuid::new_v4();
        let context = self.resolver.resolve(event);
        tracing::trace!(%run_id, phase = %Phase::Intercepted, "phase");
        Some(PendingRun {
            orchestrator: Arc::clone(self),
            _guard: guard,
            run_id,
            context,
            event_text: event.clipboard_text.clone().filter(|t| !t.is_empty()),
            trail: vec![Phase::Intercepted],
            started: Instant::now(),
        })
    }
}

/// A run that has been intercepted and holds the in-flight slot until it
/// finishes or is dropped.
pub struct PendingRun {
    orchestrator: Arc<Orchestrator>,
    _guard: RunGuard,
    run_id: Uuid,
    context: EditorContext,
    event_text: Option<String>,
    trail: Vec<Phase>,
    started: Instant,
}

impl PendingRun {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn context(&self) -> EditorContext {
        self.context
    }

    /// Drive the run to its terminal outcome.
    pub async fn run(mut self) -> ExchangeReport {
        let (outcome, fallback_paste) = match self.exchange().await {
            Ok(Some(displaced_text)) => (ExchangeOutcome::Swapped { displaced_text }, None),
            Ok(None) => (ExchangeOutcome::NoSwapDetected, None),
            Err(reason) => {
                let fallback = self.fallback_paste();
                (ExchangeOutcome::Failed { reason }, fallback)
            }
        };

        let elapsed = self.started.elapsed();
        let run_id = self.run_id;
        match &outcome {
            ExchangeOutcome::Swapped { displaced_text } => {
                tracing::info!(%run_id, ?elapsed, len = displaced_text.len(), "exchange paste complete");
                self.notify(displaced_text);
            }
            ExchangeOutcome::NoSwapDetected => {
                tracing::debug!(%run_id, ?elapsed, "no selection displaced, plain paste");
            }
            ExchangeOutcome::Failed { reason } => {
                tracing::warn!(%run_id, error = %reason, ?fallback_paste, "exchange paste failed");
            }
        }
        let budget = self.orchestrator.config.latency_budget;
        if elapsed > budget {
            tracing::warn!(%run_id, ?elapsed, ?budget, "performance warning: exchange paste over budget");
        }

        ExchangeReport {
            run_id,
            context: self.context,
            outcome,
            trail: std::mem::take(&mut self.trail),
            fallback_paste,
            elapsed,
        }
    }

    /// Steps 2-7. `Ok(Some(text))` when `text` was displaced.
    async fn exchange(&mut self) -> Result<Option<String>, ExchangeError> {
        let orch = Arc::clone(&self.orchestrator);

        let original = match self.event_text.take() {
            Some(text) => ClipboardSnapshot::new(text, SnapshotSource::Event),
            None => orch
                .bridge
                .snapshot()
                .await
                .ok_or(ExchangeError::OriginalUnavailable)?,
        };
        self.enter(Phase::ClipboardCaptured);

        self.exec(NativeCommand::Copy)?;
        self.enter(Phase::CopyIssued);

        orch.settle.settle(NativeCommand::Copy).await;
        let after_copy = orch.bridge.read().await;
        self.enter(Phase::ReadAfterCopy);

        let displaced = after_copy
            .as_deref()
            .filter(|text| !text.is_empty() && *text != original.text)
            .map(str::to_string);

        // An unreadable clipboard may still hold the stolen selection.
        if after_copy.as_deref() != Some(original.text.as_str())
            && !orch.bridge.write(&original.text).await
        {
            return Err(ExchangeError::RestoreFailed);
        }
        self.enter(Phase::ClipboardRestoredToOriginal);

        self.exec(NativeCommand::Paste)?;
        self.enter(Phase::NativePasteIssued);

        let Some(displaced) = displaced else {
            self.enter(Phase::NoSwap);
            return Ok(None);
        };

        orch.settle.settle(NativeCommand::Paste).await;
        if !orch.bridge.write(&displaced).await {
            return Err(ExchangeError::DisplacedWriteFailed);
        }
        self.enter(Phase::DisplacedRestored);
        Ok(Some(displaced))
    }

    fn exec(&self, command: NativeCommand) -> Result<(), ExchangeError> {
        if self
            .orchestrator
            .documents
            .exec_command(self.context.document, command)?
        {
            Ok(())
        } else {
            Err(ExchangeError::CommandFailed(command))
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::trace!(run_id = %self.run_id, %phase, "phase");
        self.trail.push(phase);
    }

    fn reached(&self, phase: Phase) -> bool {
        self.trail.last().is_some_and(|p| *p >= phase)
    }

    /// Single plain paste after a failure, unless the real paste already
    /// went through.
    fn fallback_paste(&self) -> Option<bool> {
        if self.reached(Phase::NativePasteIssued) {
            return None;
        }
        let ok = match self
            .orchestrator
            .documents
            .exec_command(self.context.document, NativeCommand::Paste)
        {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(run_id = %self.run_id, error = %e, "fallback paste threw");
                false
            }
        };
        Some(ok)
    }

    /// Fire-and-forget collaborator notifications.
    fn notify(&self, displaced: &str) {
        let history = Arc::clone(&self.orchestrator.history);
        let text = displaced.to_string();
        let run_id = self.run_id;
        tokio::spawn(async move {
            if let Err(e) = history.append(&text).await {
                tracing::warn!(%run_id, error = %e, "history append failed");
            }
        });
        self.orchestrator.feedback.show(&swap_toast(displaced));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::collab::{MemoryHistory, RecordingFeedback};
    use crate::host::page::{ClipboardAccess, PageBuilder, PageHost};

    struct Fixture {
        page: Arc<PageHost>,
        orch: Arc<Orchestrator>,
        state: Arc<OrchestratorState>,
        history: Arc<MemoryHistory>,
        feedback: Arc<RecordingFeedback>,
    }

    fn fixture_with(page: PageHost, settle: Arc<dyn CommandSettle>) -> Fixture {
        let page = Arc::new(page);
        let hosts = HostSet::from_page(page.clone(), settle);
        let history = Arc::new(MemoryHistory::default());
        let feedback = Arc::new(RecordingFeedback::default());
        let orch = Arc::new(Orchestrator::new(
            &hosts,
            EditorSelectors::default(),
            history.clone(),
            feedback.clone(),
            ExchangeConfig::default(),
        ));
        Fixture {
            page,
            orch,
            state: Arc::new(OrchestratorState::default()),
            history,
            feedback,
        }
    }

    fn fixture(page: PageHost) -> Fixture {
        fixture_with(page, Arc::new(CommandDelays::default()))
    }

    fn apple_banana() -> PageBuilder {
        PageHost::builder()
            .text("an apple a day")
            .select("apple")
            .clipboard("banana")
    }

    async fn paste(f: &Fixture, event_text: Option<&str>) -> ExchangeReport {
        let ev = PasteEvent::new(None, event_text.map(str::to_string));
        let run = f.orch.intercept(&f.state, &ev).unwrap();
        assert!(ev.flags.is_default_prevented());
        assert!(ev.flags.is_propagation_stopped());
        run.run().await
    }

    #[tokio::test]
    async fn swaps_selection_and_clipboard() {
        let f = fixture(apple_banana().build());
        let report = paste(&f, Some("banana")).await;

        assert_eq!(
            report.outcome,
            ExchangeOutcome::Swapped {
                displaced_text: "apple".into()
            }
        );
        assert_eq!(f.page.text(), "an banana a day");
        assert_eq!(f.page.clipboard(), "apple");
        assert_eq!(report.fallback_paste, None);
        assert_eq!(
            report.trail,
            vec![
                Phase::Intercepted,
                Phase::ClipboardCaptured,
                Phase::CopyIssued,
                Phase::ReadAfterCopy,
                Phase::ClipboardRestoredToOriginal,
                Phase::NativePasteIssued,
                Phase::DisplacedRestored,
            ]
        );
        assert_eq!(f.feedback.shown(), ["Swapped to clipboard: apple"]);
        assert!(!f.state.is_in_flight());
    }

    #[tokio::test]
    async fn swap_appends_history_in_background() {
        let f = fixture(apple_banana().build());
        paste(&f, Some("banana")).await;
        tokio::task::yield_now().await;
        let entries = f.history.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "apple");
    }

    #[tokio::test]
    async fn reads_clipboard_when_event_has_no_text() {
        let f = fixture(apple_banana().build());
        let report = paste(&f, None).await;
        assert!(matches!(report.outcome, ExchangeOutcome::Swapped { .. }));
        assert_eq!(f.page.text(), "an banana a day");
        assert_eq!(f.page.clipboard(), "apple");
    }

    #[tokio::test]
    async fn no_selection_is_plain_paste() {
        let f = fixture(
            PageHost::builder()
                .text("an apple a day")
                .clipboard("banana")
                .build(),
        );
        let report = paste(&f, Some("banana")).await;

        assert_eq!(report.outcome, ExchangeOutcome::NoSwapDetected);
        assert_eq!(f.page.text(), "an apple a daybanana");
        assert_eq!(f.page.clipboard(), "banana");
        assert!(f.page.clipboard_writes().is_empty());
        assert_eq!(report.trail.last(), Some(&Phase::NoSwap));
        assert!(f.feedback.shown().is_empty());
    }

    #[tokio::test]
    async fn repeated_no_selection_never_touches_clipboard() {
        let f = fixture(PageHost::builder().text("x").clipboard("banana").build());
        for _ in 0..3 {
            let report = paste(&f, Some("banana")).await;
            assert_eq!(report.outcome, ExchangeOutcome::NoSwapDetected);
        }
        assert!(f.page.clipboard_writes().is_empty());
        assert_eq!(f.page.clipboard(), "banana");
        assert_eq!(f.page.text(), "xbananabananabanana");
    }

    #[tokio::test]
    async fn selection_equal_to_clipboard_is_no_swap() {
        let f = fixture(
            PageHost::builder()
                .text("same same")
                .select("same")
                .clipboard("same")
                .build(),
        );
        let report = paste(&f, Some("same")).await;
        assert_eq!(report.outcome, ExchangeOutcome::NoSwapDetected);
        assert_eq!(f.page.clipboard(), "same");
    }

    #[tokio::test]
    async fn restore_write_failure_falls_back_once() {
        let f = fixture(
            apple_banana()
                .write_access(ClipboardAccess::Denied)
                .legacy_copy(false)
                .build(),
        );
        let report = paste(&f, Some("banana")).await;

        assert_eq!(
            report.outcome,
            ExchangeOutcome::Failed {
                reason: ExchangeError::RestoreFailed
            }
        );
        assert_eq!(report.fallback_paste, Some(true));
        assert_eq!(f.page.command_count(NativeCommand::Paste), 1);
        // The copy landed but the original could not be put back.
        assert_eq!(f.page.clipboard(), "apple");
        assert_eq!(f.page.text(), "an apple a day");
        assert!(!f.state.is_in_flight());
    }

    #[tokio::test]
    async fn restore_uses_legacy_path_when_api_rejects_write() {
        let f = fixture(apple_banana().write_access(ClipboardAccess::Denied).build());
        let report = paste(&f, Some("banana")).await;

        // Legacy writes land, so the exchange still completes.
        assert!(matches!(report.outcome, ExchangeOutcome::Swapped { .. }));
        assert_eq!(f.page.text(), "an banana a day");
        assert_eq!(f.page.clipboard(), "apple");
        assert!(!f.page.scratch_attached());
    }

    #[tokio::test]
    async fn unreadable_clipboard_restores_original() {
        let f = fixture(apple_banana().read_access(ClipboardAccess::Unavailable).build());
        let report = paste(&f, Some("banana")).await;

        assert_eq!(report.outcome, ExchangeOutcome::NoSwapDetected);
        assert_eq!(f.page.text(), "an banana a day");
        assert_eq!(f.page.clipboard(), "banana");
    }

    #[tokio::test]
    async fn missing_original_fails_with_plain_paste() {
        let f = fixture(apple_banana().read_access(ClipboardAccess::Denied).build());
        let report = paste(&f, None).await;

        assert_eq!(
            report.outcome,
            ExchangeOutcome::Failed {
                reason: ExchangeError::OriginalUnavailable
            }
        );
        assert_eq!(report.fallback_paste, Some(true));
        assert_eq!(f.page.text(), "an banana a day");
        assert_eq!(f.page.clipboard(), "banana");
        assert_eq!(f.page.command_count(NativeCommand::Copy), 0);
    }

    #[tokio::test]
    async fn refused_copy_fails_with_single_fallback() {
        let f = fixture(apple_banana().refuse(NativeCommand::Copy).build());
        let report = paste(&f, Some("banana")).await;

        assert_eq!(
            report.outcome,
            ExchangeOutcome::Failed {
                reason: ExchangeError::CommandFailed(NativeCommand::Copy)
            }
        );
        assert_eq!(f.page.command_count(NativeCommand::Paste), 1);
        assert_eq!(f.page.text(), "an banana a day");
        assert_eq!(f.page.clipboard(), "banana");
    }

    #[tokio::test]
    async fn throwing_paste_attempts_fallback_once() {
        let f = fixture(apple_banana().throw_on(NativeCommand::Paste).build());
        let report = paste(&f, Some("banana")).await;

        assert!(matches!(
            report.outcome,
            ExchangeOutcome::Failed {
                reason: ExchangeError::Host(HostError::Command(_))
            }
        ));
        assert_eq!(report.fallback_paste, Some(false));
        assert_eq!(f.page.command_count(NativeCommand::Paste), 2);
        assert_eq!(f.page.clipboard(), "banana");
    }

    #[tokio::test]
    async fn displaced_write_failure_does_not_paste_twice() {
        struct FailSecondWrite {
            page: Arc<PageHost>,
            writes: Mutex<u32>,
        }

        #[async_trait]
        impl crate::host::ClipboardProvider for FailSecondWrite {
            async fn read_text(&self) -> Result<String, HostError> {
                self.page.read_text().await
            }

            async fn write_text(&self, text: &str) -> Result<(), HostError> {
                let n = {
                    let mut w = self.writes.lock().unwrap();
                    *w += 1;
                    *w
                };
                if n >= 2 {
                    return Err(HostError::Denied("clipboard write".into()));
                }
                self.page.write_text(text).await
            }
        }

        let page = Arc::new(apple_banana().legacy_copy(false).build());
        let mut hosts = HostSet::from_page(page.clone(), Arc::new(CommandDelays::default()));
        hosts.clipboard = Arc::new(FailSecondWrite {
            page: page.clone(),
            writes: Mutex::new(0),
        });
        let orch = Arc::new(Orchestrator::new(
            &hosts,
            EditorSelectors::default(),
            Arc::new(MemoryHistory::default()),
            Arc::new(RecordingFeedback::default()),
            ExchangeConfig::default(),
        ));
        let state = Arc::new(OrchestratorState::default());
        let ev = PasteEvent::new(None, Some("banana".into()));
        let report = orch.intercept(&state, &ev).unwrap().run().await;

        assert_eq!(
            report.outcome,
            ExchangeOutcome::Failed {
                reason: ExchangeError::DisplacedWriteFailed
            }
        );
        assert_eq!(report.fallback_paste, None);
        assert_eq!(page.command_count(NativeCommand::Paste), 1);
        assert_eq!(page.text(), "an banana a day");
        assert_eq!(page.clipboard(), "banana");
    }

    #[tokio::test]
    async fn default_delays_fit_latency_budget() {
        let config = ExchangeConfig::default();
        let f = fixture_with(apple_banana().build(), Arc::new(config.command_delays()));
        let report = paste(&f, Some("banana")).await;

        assert!(matches!(report.outcome, ExchangeOutcome::Swapped { .. }));
        assert!(
            report.elapsed < config.latency_budget,
            "elapsed {:?} over budget {:?}",
            report.elapsed,
            config.latency_budget
        );
    }

    #[tokio::test]
    async fn copy_not_landing_reads_stale_clipboard() {
        let f = fixture(apple_banana().copy_lands(false).build());
        let report = paste(&f, Some("banana")).await;

        assert_eq!(report.outcome, ExchangeOutcome::NoSwapDetected);
        assert_eq!(f.page.text(), "an banana a day");
        assert_eq!(f.page.clipboard(), "banana");
        assert!(f.page.clipboard_writes().is_empty());
        assert_eq!(report.fallback_paste, None);
    }

    /// Settle that blocks until the test hands out permits.
    struct Gate(Semaphore);

    #[async_trait]
    impl CommandSettle for Gate {
        async fn settle(&self, _command: NativeCommand) {
            if let Ok(permit) = self.0.acquire().await {
                permit.forget();
            }
        }
    }

    #[tokio::test]
    async fn second_paste_while_in_flight_is_dropped() {
        let gate = Arc::new(Gate(Semaphore::new(0)));
        let f = fixture_with(apple_banana().build(), gate.clone());

        let first = PasteEvent::new(None, Some("banana".into()));
        let run = f.orch.intercept(&f.state, &first).unwrap();
        let handle = tokio::spawn(run.run());

        let second = PasteEvent::new(None, Some("banana".into()));
        assert!(f.orch.intercept(&f.state, &second).is_none());
        assert!(second.flags.is_default_prevented());

        gate.0.add_permits(2);
        let report = handle.await.unwrap();

        assert!(matches!(report.outcome, ExchangeOutcome::Swapped { .. }));
        assert_eq!(f.page.command_count(NativeCommand::Copy), 1);
        assert_eq!(f.page.command_count(NativeCommand::Paste), 1);
        assert!(!f.state.is_in_flight());
    }

    #[tokio::test]
    async fn clipboard_is_original_or_displaced_after_every_run() {
        for selected in [true, false] {
            for api in [ClipboardAccess::Granted, ClipboardAccess::Unavailable] {
                let mut builder = PageHost::builder()
                    .text("an apple a day")
                    .clipboard("banana")
                    .read_access(api)
                    .write_access(api);
                if selected {
                    builder = builder.select("apple");
                }
                let f = fixture(builder.build());
                let report = paste(&f, Some("banana")).await;
                let clip = f.page.clipboard();
                assert!(
                    clip == "banana" || clip == "apple",
                    "selected={selected} api={api:?} clipboard={clip:?}"
                );
                assert!(f.page.text().contains("banana"));
                if selected && api == ClipboardAccess::Granted {
                    assert_eq!(clip, "apple");
                    assert!(matches!(report.outcome, ExchangeOutcome::Swapped { .. }));
                }
            }
        }
    }
}
