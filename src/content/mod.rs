//! Content runtime: everything attached to one editor page.
//!
//! Listeners are registered first and pass every event through. Once
//! the editor container appears, settings are loaded (fail-open), the
//! orchestrator and gesture handlers are built, and the interceptor is
//! initialized.

pub mod remote;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::collab::{Collaborators, load_settings};
use crate::exchange::state::OrchestratorState;
use crate::exchange::{ExchangeConfig, Orchestrator};
use crate::gesture::GestureController;
use crate::host::{EditorSelectors, HostSet};
use crate::intercept::EventInterceptor;
use crate::intercept::keybinding::{BindingError, BindingSpecs, HotkeyBindings, Platform};
use crate::selection::SelectionLocator;

use self::remote::BackgroundLink;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("invalid hotkey: {0}")]
    Binding(#[from] BindingError),
    #[error("invalid word pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub exchange: ExchangeConfig,
    pub selectors: EditorSelectors,
    pub bindings: BindingSpecs,
    /// Give up on the editor after this long.
    pub editor_wait: Duration,
    pub editor_poll: Duration,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            selectors: EditorSelectors::default(),
            bindings: BindingSpecs::default(),
            editor_wait: Duration::from_secs(10),
            editor_poll: Duration::from_millis(16),
        }
    }
}

/// Snapshot of a runtime for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStatus {
    pub enabled: bool,
    pub swap_mode_enabled: bool,
    pub initialized: bool,
    pub has_selection: bool,
    pub in_editor: bool,
}

pub struct ContentRuntime {
    hosts: HostSet,
    config: ContentConfig,
    collaborators: Collaborators,
    locator: Arc<SelectionLocator>,
    interceptor: EventInterceptor,
}

impl ContentRuntime {
    /// Register listeners. Nothing is intercepted until
    /// [`initialize`](Self::initialize) succeeds.
    pub fn register(
        hosts: HostSet,
        config: ContentConfig,
        platform: Platform,
        state: Arc<OrchestratorState>,
        collaborators: Collaborators,
    ) -> Result<Self, ContentError> {
        let bindings = HotkeyBindings::parse(&config.bindings, platform)?;
        let locator = Arc::new(SelectionLocator::new(&hosts, config.selectors.clone()));
        Ok(Self {
            interceptor: EventInterceptor::register(state, bindings),
            hosts,
            config,
            collaborators,
            locator,
        })
    }

    pub fn interceptor(&self) -> &EventInterceptor {
        &self.interceptor
    }

    /// Wait for the editor, then wire up the orchestrator. Returns false
    /// if the editor never appeared; the runtime then stays inert.
    pub async fn initialize(&self) -> Result<bool, ContentError> {
        if self.interceptor.is_initialized() {
            return Ok(true);
        }
        if !self.wait_for_editor().await {
            tracing::error!(
                selector = %self.config.selectors.editor_container,
                wait = ?self.config.editor_wait,
                "editor not found, exchange paste inactive"
            );
            return Ok(false);
        }

        let settings = load_settings(self.collaborators.settings.as_ref()).await;
        let state = self.interceptor.state();
        state.apply(&settings);

        let orchestrator = Arc::new(Orchestrator::new(
            &self.hosts,
            self.config.selectors.clone(),
            Arc::clone(&self.collaborators.history),
            Arc::clone(&self.collaborators.feedback),
            self.config.exchange,
        ));
        let gestures = GestureController::new(
            Arc::clone(state),
            Arc::clone(&self.locator),
            Arc::clone(&self.hosts.selection),
            Arc::clone(&self.collaborators.settings),
            Arc::clone(&self.collaborators.feedback),
        )?;
        self.interceptor
            .initialize(orchestrator, Arc::clone(&self.locator), gestures);
        tracing::info!(
            enabled = settings.enabled,
            swap_mode = settings.swap_mode_enabled,
            "content runtime ready"
        );
        Ok(true)
    }

    /// Poll for the editor container until it exists or the wait runs out.
    pub async fn wait_for_editor(&self) -> bool {
        let container = &self.config.selectors.editor_container;
        let documents = &self.hosts.documents;
        let poll = async {
            let mut interval = tokio::time::interval(self.config.editor_poll);
            loop {
                interval.tick().await;
                if documents.element_exists(container) {
                    return;
                }
            }
        };
        tokio::time::timeout(self.config.editor_wait, poll)
            .await
            .is_ok()
    }

    pub fn status(&self) -> ContentStatus {
        let state = self.interceptor.state();
        ContentStatus {
            enabled: state.is_enabled(),
            swap_mode_enabled: state.swap_mode(),
            initialized: self.interceptor.is_initialized(),
            has_selection: self.locator.has_selection(),
            in_editor: self.locator.is_in_editor(),
        }
    }
}

/// Collaborators backed by the background daemon at `socket`, or the
/// in-memory ones when it cannot be reached.
pub async fn connect_collaborators(
    socket: Option<&Path>,
    state: &Arc<OrchestratorState>,
) -> Collaborators {
    let Some(socket) = socket else {
        tracing::info!("no background socket, running standalone");
        return Collaborators::standalone();
    };
    match BackgroundLink::connect(socket, Arc::clone(state)).await {
        Ok(link) => Collaborators {
            settings: link.clone(),
            history: link,
            feedback: Arc::new(crate::collab::LogFeedback),
        },
        Err(e) => {
            tracing::warn!(error = %e, "background unreachable, running standalone");
            Collaborators::standalone()
        }
    }
}
