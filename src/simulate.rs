//! `smartswap simulate`: drive one content runtime against an in-memory
//! editor page and print what happened.

use std::sync::Arc;
use std::time::Duration;

use crate::cli::{ClipboardApi, SimulateArgs};
use crate::content::{ContentConfig, ContentError, ContentRuntime, connect_collaborators};
use crate::exchange::state::OrchestratorState;
use crate::exchange::ExchangeConfig;
use crate::gesture::Gesture;
use crate::host::page::{ClipboardAccess, PageHost};
use crate::collab::HistoryStore;
use crate::exchange::ExchangeOutcome;
use crate::host::HostSet;
use crate::intercept::Disposition;
use crate::intercept::event::{KeyEvent, PasteEvent};
use crate::intercept::keybinding::{BindingError, BindingSpecs, Platform, parse_chord};

#[derive(Debug, thiserror::Error)]
pub enum SimulateError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("--press {chord}: {source}")]
    Press {
        chord: String,
        source: BindingError,
    },
}

impl From<ClipboardApi> for ClipboardAccess {
    fn from(api: ClipboardApi) -> Self {
        match api {
            ClipboardApi::Granted => ClipboardAccess::Granted,
            ClipboardApi::Denied => ClipboardAccess::Denied,
            ClipboardApi::Unavailable => ClipboardAccess::Unavailable,
        }
    }
}

pub async fn run(args: SimulateArgs) -> Result<(), SimulateError> {
    let platform = Platform::current();
    let text = args.text.clone().unwrap_or_else(|| args.selection.clone());
    let page = Arc::new(
        PageHost::builder()
            .text(text)
            .select(args.selection.clone())
            .clipboard(args.clipboard.clone())
            .editor_in_frame(args.editor_in_frame)
            .canvas_rendered(args.canvas)
            .read_access(args.clipboard_api.into())
            .write_access(args.clipboard_api.into())
            .copy_lands(!args.copy_lost)
            .build(),
    );
    let config = ContentConfig {
        exchange: ExchangeConfig {
            copy_settle: Duration::from_millis(args.copy_settle_ms),
            paste_settle: Duration::from_millis(args.paste_settle_ms),
            ..ExchangeConfig::default()
        },
        bindings: BindingSpecs {
            paste: args.paste_key.clone(),
            quick_swap: args.quick_swap_key.clone(),
            swap_mode: args.swap_mode_key.clone(),
        },
        ..ContentConfig::default()
    };
    let hosts = HostSet::from_page(
        Arc::clone(&page),
        Arc::new(config.exchange.command_delays()),
    );

    let state = Arc::new(OrchestratorState::default());
    let socket = if args.background {
        crate::ipc::socket_path()
    } else {
        None
    };
    let collaborators = connect_collaborators(socket.as_deref(), &state).await;
    let history = Arc::clone(&collaborators.history);
    let runtime = ContentRuntime::register(hosts, config, platform, state, collaborators)?;
    runtime.initialize().await?;

    for chord in &args.presses {
        let parsed = parse_chord(chord, platform).map_err(|source| SimulateError::Press {
            chord: chord.clone(),
            source,
        })?;
        let event = KeyEvent::from_chord(&parsed);
        let disposition = runtime.interceptor().on_keydown(&event);
        println!("press {parsed}: {}", describe(&disposition));
    }

    let event_text = (!args.no_event_text).then(|| args.clipboard.clone());
    let event = PasteEvent::new(None, event_text);
    let disposition = runtime.interceptor().handle_paste(&event).await;

    println!("paste:     {}", describe(&disposition));
    if let Disposition::Exchanged(report) = &disposition {
        println!("run:       {} in {} ({:?})", report.run_id, report.context.document, report.elapsed);
        if let Some(ok) = report.fallback_paste {
            println!("fallback:  {}", if ok { "pasted" } else { "failed" });
        }
        if let ExchangeOutcome::Swapped { displaced_text } = &report.outcome {
            // The append is detached; let it land before the runtime exits.
            if !wait_for_history(history.as_ref(), displaced_text, HISTORY_DRAIN).await {
                tracing::warn!(limit = ?HISTORY_DRAIN, "history append not confirmed");
            }
        }
    }
    println!("document:  {:?}", page.text());
    println!("clipboard: {:?}", page.clipboard());

    let status = runtime.status();
    println!(
        "status:    enabled={} swap_mode={} initialized={} has_selection={} in_editor={}",
        status.enabled,
        status.swap_mode_enabled,
        status.initialized,
        status.has_selection,
        status.in_editor
    );
    Ok(())
}

const HISTORY_DRAIN: Duration = Duration::from_millis(500);
const HISTORY_POLL: Duration = Duration::from_millis(10);

/// Poll `history` until `text` is the newest entry or `limit` passes.
async fn wait_for_history(history: &dyn HistoryStore, text: &str, limit: Duration) -> bool {
    let poll = async {
        let mut tick = tokio::time::interval(HISTORY_POLL);
        loop {
            tick.tick().await;
            let newest = history.entries().await.ok().and_then(|e| e.into_iter().next());
            if newest.is_some_and(|e| e.text == text) {
                return;
            }
        }
    };
    tokio::time::timeout(limit, poll).await.is_ok()
}

fn describe(disposition: &Disposition) -> String {
    match disposition {
        Disposition::PassThrough => "passed through".into(),
        Disposition::Suppressed => "suppressed".into(),
        Disposition::Exchanged(report) => report.outcome.to_string(),
        Disposition::Gesture(Gesture::QuickSwap(Some(swap))) => {
            format!("quick swap {:?} <-> {:?}", swap.left, swap.right)
        }
        Disposition::Gesture(Gesture::QuickSwap(None)) => "quick swap: nothing to swap".into(),
        Disposition::Gesture(Gesture::SwapModeToggled(on)) => {
            format!("swap mode {}", if *on { "on" } else { "off" })
        }
        Disposition::Gesture(Gesture::DragStarted) => "drag started".into(),
        Disposition::Gesture(Gesture::DragSwapped(swap)) => {
            format!("drag swap {:?} <-> {:?}", swap.dragged, swap.dropped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::MemoryHistory;
    use crate::exchange::ExchangeError;
    use crate::exchange::ExchangeReport;

    #[test]
    fn describes_outcomes() {
        assert_eq!(describe(&Disposition::PassThrough), "passed through");
        assert_eq!(
            describe(&Disposition::Gesture(Gesture::SwapModeToggled(true))),
            "swap mode on"
        );
        let report = ExchangeReport {
            run_id: uuid::Uuid::nil(),
            context: crate::document::EditorContext {
                document: crate::host::DocumentHandle::new(1),
                is_nested_frame: false,
            },
            outcome: ExchangeOutcome::Failed {
                reason: ExchangeError::OriginalUnavailable,
            },
            trail: Vec::new(),
            fallback_paste: Some(true),
            elapsed: Duration::ZERO,
        };
        assert_eq!(
            describe(&Disposition::Exchanged(report)),
            "failed: original clipboard text unavailable"
        );
    }

    #[test]
    fn clipboard_api_maps_to_access() {
        assert_eq!(
            ClipboardAccess::from(ClipboardApi::Denied),
            ClipboardAccess::Denied
        );
    }

    #[tokio::test]
    async fn waits_for_detached_history_append() {
        let history = Arc::new(MemoryHistory::default());
        let writer = Arc::clone(&history);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.append("apple").await.unwrap();
        });
        assert!(wait_for_history(history.as_ref(), "apple", Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn history_wait_gives_up() {
        let history = MemoryHistory::default();
        assert!(!wait_for_history(&history, "apple", Duration::from_millis(30)).await);
    }
}
