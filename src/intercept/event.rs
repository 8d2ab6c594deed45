//! Events delivered to the capture-phase listeners.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::host::DocumentHandle;

use super::keybinding::{KeyChord, Modifiers};

/// Default-action and propagation flags shared by every event kind.
#[derive(Debug, Default)]
pub struct EventFlags {
    default_prevented: AtomicBool,
    propagation_stopped: AtomicBool,
}

impl EventFlags {
    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::Relaxed);
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.store(true, Ordering::Relaxed);
    }

    /// Both of the above: the host page never sees the event.
    pub fn suppress(&self) {
        self.prevent_default();
        self.stop_propagation();
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::Relaxed)
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.load(Ordering::Relaxed)
    }
}

/// A paste event.
#[derive(Debug, Default)]
pub struct PasteEvent {
    /// Document owning the event target, if the target is known.
    pub target: Option<DocumentHandle>,
    /// Plain text carried on the event's clipboard data.
    pub clipboard_text: Option<String>,
    pub flags: EventFlags,
}

impl PasteEvent {
    pub fn new(target: Option<DocumentHandle>, clipboard_text: Option<String>) -> Self {
        Self {
            target,
            clipboard_text,
            flags: EventFlags::default(),
        }
    }
}

/// A key-down event.
#[derive(Debug)]
pub struct KeyEvent {
    /// Key value as reported by the browser ("v", "V", "F5", "Enter").
    pub key: String,
    pub modifiers: Modifiers,
    pub flags: EventFlags,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
            flags: EventFlags::default(),
        }
    }

    /// The key-down a user would produce by pressing `chord`.
    pub fn from_chord(chord: &KeyChord) -> Self {
        Self::new(chord.key.clone(), chord.modifiers)
    }
}

/// A drag-start or drop event. The dragged or drop-target text is read
/// from the live selection when the event fires.
#[derive(Debug, Default)]
pub struct DragEvent {
    pub flags: EventFlags,
}
