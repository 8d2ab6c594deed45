//! Popup client: one-shot commands against the background daemon.

mod background_client;
mod format;

use crate::cli::ClientAction;
use crate::history::epoch_millis;

use background_client::BackgroundClient;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    #[error("background: {0}")]
    Background(String),
}

/// Connect, perform `action`, print the result.
pub async fn run(action: ClientAction) -> Result<(), ClientError> {
    let mut background = BackgroundClient::connect().await?;

    match action {
        ClientAction::GetState => {
            let (settings, history) = background.get_state().await?;
            format::print_settings(&settings);
            println!();
            format::print_history(&history, epoch_millis());
        }
        ClientAction::SetEnabled { on } => {
            let settings = background.set_enabled(on).await?;
            format::print_settings(&settings);
        }
        ClientAction::SetSwapMode { on } => {
            let settings = background.set_swap_mode(on).await?;
            format::print_settings(&settings);
        }
        ClientAction::History => {
            let history = background.history().await?;
            format::print_history(&history, epoch_millis());
        }
        ClientAction::ClearHistory => {
            background.clear_history().await?;
            format::print_cleared();
        }
    }

    Ok(())
}
