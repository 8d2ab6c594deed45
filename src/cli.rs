use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "smartswap", about = "Exchange paste: paste over a selection and keep it")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the background daemon that owns settings and history
    Background {
        /// Store file (default: $XDG_STATE_HOME/smartswap/store.msgpack)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Popup actions against the background daemon
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },

    /// Run one intercepted paste against an in-memory editor page
    Simulate(SimulateArgs),
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// Show settings and clipboard history
    GetState,

    /// Turn exchange paste on or off
    SetEnabled {
        #[arg(action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        on: bool,
    },

    /// Turn swap mode on or off
    SetSwapMode {
        #[arg(action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        on: bool,
    },

    /// Show clipboard history
    History,

    /// Forget clipboard history
    ClearHistory,
}

/// Clipboard API permission on the simulated page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClipboardApi {
    Granted,
    Denied,
    Unavailable,
}

#[derive(clap::Args, Debug)]
pub struct SimulateArgs {
    /// Text selected in the editor when the paste arrives
    #[arg(long)]
    pub selection: String,

    /// Clipboard text (also carried by the paste event)
    #[arg(long)]
    pub clipboard: String,

    /// Full document text (default: the selection alone)
    #[arg(long)]
    pub text: Option<String>,

    /// Key chords pressed before the paste, e.g. "Alt+S"
    #[arg(long = "press", value_name = "CHORD")]
    pub presses: Vec<String>,

    /// Put the editor inside a nested frame document
    #[arg(long)]
    pub editor_in_frame: bool,

    /// Canvas-rendered editor: selection only via the accessibility layer
    #[arg(long)]
    pub canvas: bool,

    /// Clipboard API permission for reads and writes
    #[arg(long, value_enum, default_value = "granted")]
    pub clipboard_api: ClipboardApi,

    /// Leave the clipboard text out of the paste event
    #[arg(long)]
    pub no_event_text: bool,

    /// Use the background daemon for settings and history
    #[arg(long)]
    pub background: bool,

    /// Wait after the native copy, in milliseconds
    #[arg(long, default_value_t = 50)]
    pub copy_settle_ms: u64,

    /// Wait after the native paste, in milliseconds
    #[arg(long, default_value_t = 10)]
    pub paste_settle_ms: u64,

    /// The native copy never reaches the clipboard before the read
    #[arg(long)]
    pub copy_lost: bool,

    #[arg(long, default_value = "Mod+V")]
    pub paste_key: String,

    #[arg(long, default_value = "Alt+X")]
    pub quick_swap_key: String,

    #[arg(long, default_value = "Alt+S")]
    pub swap_mode_key: String,
}
