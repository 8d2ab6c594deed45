//! Secondary gestures layered on the selection primitive.
//!
//! Quick swap and drag swap compute the exchange and report it, but leave
//! the protected editor surface untouched. The swap-mode toggle flips the
//! shared flag and persists it through the settings store.

pub mod drag_swap;
pub mod quick_swap;

use std::sync::Arc;

use crate::collab::{FeedbackPresenter, SettingsStore};
use crate::exchange::state::OrchestratorState;
use crate::history::preview;
use crate::host::SelectionProvider;
use crate::intercept::event::DragEvent;
use crate::selection::SelectionLocator;
use crate::settings::SettingsPatch;

use self::drag_swap::{DragSwap, DragTracker};
use self::quick_swap::{WordFinder, WordSwap};

/// What a gesture handler did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    /// Quick swap found two words around the caret (or `None`).
    QuickSwap(Option<WordSwap>),
    /// Swap mode is now on (`true`) or off.
    SwapModeToggled(bool),
    DragStarted,
    DragSwapped(DragSwap),
}

pub struct GestureController {
    state: Arc<OrchestratorState>,
    locator: Arc<SelectionLocator>,
    selection: Arc<dyn SelectionProvider>,
    settings: Arc<dyn SettingsStore>,
    feedback: Arc<dyn FeedbackPresenter>,
    words: WordFinder,
    drag: DragTracker,
}

impl GestureController {
    pub fn new(
        state: Arc<OrchestratorState>,
        locator: Arc<SelectionLocator>,
        selection: Arc<dyn SelectionProvider>,
        settings: Arc<dyn SettingsStore>,
        feedback: Arc<dyn FeedbackPresenter>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            state,
            locator,
            selection,
            settings,
            feedback,
            words: WordFinder::new()?,
            drag: DragTracker::default(),
        })
    }

    pub fn quick_swap(&self) -> Option<WordSwap> {
        let Some(caret) = self.selection.caret_text() else {
            tracing::debug!("quick swap: no caret text");
            return None;
        };
        let Some(swap) = self.words.adjacent(&caret.text, caret.offset) else {
            tracing::debug!(offset = caret.offset, "quick swap: no adjacent words");
            return None;
        };
        tracing::debug!(left = %swap.left, right = %swap.right, span = ?swap.span, "quick swap");
        self.feedback
            .show(&format!("Swapped: {} ↔ {}", swap.left, swap.right));
        Some(swap)
    }

    /// Flip swap mode and persist it in the background.
    pub fn toggle_swap_mode(&self) -> bool {
        let on = self.state.toggle_swap_mode();
        if !on {
            self.drag.take();
        }
        self.feedback
            .show(if on { "Swap mode: ON" } else { "Swap mode: OFF" });
        let settings = Arc::clone(&self.settings);
        tokio::spawn(async move {
            if let Err(e) = settings.set(SettingsPatch::swap_mode(on)).await {
                tracing::warn!(error = %e, "failed to persist swap mode");
            }
        });
        on
    }

    fn armed(&self) -> bool {
        self.state.is_enabled() && self.state.swap_mode()
    }

    pub fn drag_start(&self) -> Option<Gesture> {
        if !self.armed() {
            return None;
        }
        let text = self.locator.selected_text()?;
        tracing::debug!(len = text.len(), "drag started");
        self.drag.start(text);
        Some(Gesture::DragStarted)
    }

    /// Handle a drop. A drop onto a different selection is suppressed and
    /// reported as a swap.
    pub fn drop(&self, event: &DragEvent) -> Option<Gesture> {
        if !self.armed() {
            self.drag.take();
            return None;
        }
        let swap = self.drag.finish(self.locator.selected_text())?;
        event.flags.prevent_default();
        self.feedback.show(&format!(
            "Swapped: \"{}\" ↔ \"{}\"",
            preview(&swap.dragged, 20),
            preview(&swap.dropped, 20)
        ));
        Some(Gesture::DragSwapped(swap))
    }

    pub fn drag_end(&self) {
        self.drag.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{MemorySettings, RecordingFeedback};
    use crate::host::page::PageHost;
    use crate::host::{CommandDelays, EditorSelectors, HostSet};

    struct Fixture {
        page: Arc<PageHost>,
        state: Arc<OrchestratorState>,
        settings: Arc<MemorySettings>,
        feedback: Arc<RecordingFeedback>,
        gestures: GestureController,
    }

    fn fixture(page: PageHost) -> Fixture {
        let page = Arc::new(page);
        let hosts = HostSet::from_page(page.clone(), Arc::new(CommandDelays::default()));
        let state = Arc::new(OrchestratorState::default());
        let settings = Arc::new(MemorySettings::default());
        let feedback = Arc::new(RecordingFeedback::default());
        let gestures = GestureController::new(
            state.clone(),
            Arc::new(SelectionLocator::new(&hosts, EditorSelectors::default())),
            hosts.selection.clone(),
            settings.clone(),
            feedback.clone(),
        )
        .unwrap();
        Fixture {
            page,
            state,
            settings,
            feedback,
            gestures,
        }
    }

    #[test]
    fn quick_swap_reports_without_mutating() {
        let f = fixture(PageHost::builder().text("hello world").build());
        f.page.set_caret(5);
        let swap = f.gestures.quick_swap().unwrap();
        assert_eq!(swap.left, "hello");
        assert_eq!(f.feedback.shown(), ["Swapped: hello ↔ world"]);
        assert_eq!(f.page.text(), "hello world");
    }

    #[test]
    fn quick_swap_without_caret_text() {
        let f = fixture(PageHost::builder().text("a b").canvas_rendered(true).build());
        assert_eq!(f.gestures.quick_swap(), None);
        assert!(f.feedback.shown().is_empty());
    }

    #[tokio::test]
    async fn toggle_persists_swap_mode() {
        let f = fixture(PageHost::builder().build());
        assert!(f.gestures.toggle_swap_mode());
        assert!(f.state.swap_mode());
        tokio::task::yield_now().await;
        assert!(f.settings.get().await.unwrap().swap_mode_enabled);
        assert_eq!(f.feedback.shown(), ["Swap mode: ON"]);
    }

    #[tokio::test]
    async fn drag_swap_requires_swap_mode() {
        let f = fixture(PageHost::builder().text("alpha beta").select("alpha").build());
        assert_eq!(f.gestures.drag_start(), None);

        f.gestures.toggle_swap_mode();
        assert_eq!(f.gestures.drag_start(), Some(Gesture::DragStarted));
        f.page.select("beta");
        let ev = DragEvent::default();
        let g = f.gestures.drop(&ev).unwrap();
        assert_eq!(
            g,
            Gesture::DragSwapped(DragSwap {
                dragged: "alpha".into(),
                dropped: "beta".into()
            })
        );
        assert!(ev.flags.is_default_prevented());
        assert_eq!(
            f.feedback.shown().last().map(String::as_str),
            Some("Swapped: \"alpha\" ↔ \"beta\"")
        );
        assert_eq!(f.page.text(), "alpha beta");
    }

    #[tokio::test]
    async fn drop_on_same_text_passes_through() {
        let f = fixture(PageHost::builder().text("alpha beta").select("alpha").build());
        f.gestures.toggle_swap_mode();
        f.gestures.drag_start();
        let ev = DragEvent::default();
        assert_eq!(f.gestures.drop(&ev), None);
        assert!(!ev.flags.is_default_prevented());
    }

    #[tokio::test]
    async fn drag_end_forgets_source() {
        let f = fixture(PageHost::builder().text("alpha beta").select("alpha").build());
        f.gestures.toggle_swap_mode();
        f.gestures.drag_start();
        f.gestures.drag_end();
        f.page.select("beta");
        assert_eq!(f.gestures.drop(&DragEvent::default()), None);
    }
}
