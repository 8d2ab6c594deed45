//! Host page adapters.
//!
//! Everything the exchange-paste core needs from the page it runs in sits
//! behind the traits in this module: selection state, the permission-gated
//! clipboard API, documents with their native editing commands, and the
//! bounded wait after a native command. An adapter implements one or more
//! traits; [`HostSet`] composes one of each at startup.
//!
//! [`page::PageHost`] is the in-memory editor page used by `simulate` and
//! by the tests.

pub mod page;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Errors raised by host adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The clipboard API is missing from this context.
    #[error("clipboard API unavailable: {0}")]
    Unavailable(String),

    /// The clipboard API exists but the permission prompt was refused.
    #[error("permission denied: {0}")]
    Denied(String),

    /// A native command threw instead of reporting success or failure.
    #[error("native command threw: {0}")]
    Command(String),

    /// The document handle no longer refers to a live document.
    #[error("document {0} is detached")]
    Detached(DocumentHandle),
}

/// Opaque identity of a document: the top-level page or a nested frame's
/// content document. Holding one does not keep the document alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentHandle(u32);

impl DocumentHandle {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Native editing commands a document can execute against its own
/// focus and selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeCommand {
    Copy,
    Paste,
}

impl fmt::Display for NativeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Copy => "copy",
            Self::Paste => "paste",
        })
    }
}

/// Identity of a temporarily inserted scratch node (legacy clipboard path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScratchId(pub(crate) u64);

/// What the standard selection API reports for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeSelection {
    pub text: String,
    pub range_count: u32,
    pub is_collapsed: bool,
    /// Node name of the selection anchor, for diagnostics.
    pub anchor_node: Option<String>,
    /// Node name of the selection focus, for diagnostics.
    pub focus_node: Option<String>,
}

/// Text surrounding the caret, used by the quick-swap gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaretText {
    pub text: String,
    /// Byte offset of the caret within `text`, on a char boundary.
    pub offset: usize,
}

/// Axis-aligned rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// True if the two rectangles share a region of non-zero area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left < other.right()
            && other.left < self.right()
            && self.top < other.bottom()
            && other.top < self.bottom()
    }
}

/// Role of a node in the accessibility overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxRole {
    /// A leaf carrying an accessible label.
    Leaf,
    Title,
    Description,
    Paragraph,
    ListItem,
    /// Container without text of its own.
    Group,
}

/// A node inside the selection-overlay container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxNode {
    pub role: AxRole,
    pub label: Option<String>,
    pub text: String,
}

impl AxNode {
    pub fn new(role: AxRole, text: impl Into<String>) -> Self {
        Self {
            role,
            label: None,
            text: text.into(),
        }
    }

    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            role: AxRole::Leaf,
            label: Some(label.into()),
            text: String::new(),
        }
    }
}

/// A text-bearing rectangle rendered somewhere in the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    pub rect: Rect,
    pub text: String,
}

/// The accessibility representation of the current selection, exposed by
/// editors that render text outside the normal DOM.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessibilitySnapshot {
    /// Nodes inside the selection-overlay container.
    pub overlay_nodes: Vec<AxNode>,
    /// Selection highlight rectangles drawn by the overlay.
    pub highlight_rects: Vec<Rect>,
    /// Text-bearing rectangles elsewhere in the rendered page.
    pub text_boxes: Vec<TextBox>,
}

impl AccessibilitySnapshot {
    /// True if the overlay reports any selection at all.
    pub fn has_selection(&self) -> bool {
        !self.overlay_nodes.is_empty() || !self.highlight_rects.is_empty()
    }
}

/// Standard selection API plus the accessibility fallback surface.
///
/// Every call reads live state; callers never cache results across
/// event turns.
pub trait SelectionProvider: Send + Sync {
    /// Native selection of `doc`, or `None` if `doc` is not reachable.
    fn native_selection(&self, doc: DocumentHandle) -> Option<NativeSelection>;

    /// True if the native selection anchor descends from an element
    /// matching `container_selector`.
    fn anchor_within(&self, container_selector: &str) -> bool;

    /// Snapshot of the selection overlay, or `None` if no overlay
    /// container matching `overlay_selector` is present.
    fn accessibility_snapshot(&self, overlay_selector: &str) -> Option<AccessibilitySnapshot>;

    /// Text of the block containing the caret.
    fn caret_text(&self) -> Option<CaretText>;
}

/// The permission-gated asynchronous clipboard API.
#[async_trait]
pub trait ClipboardProvider: Send + Sync {
    async fn read_text(&self) -> Result<String, HostError>;

    async fn write_text(&self, text: &str) -> Result<(), HostError>;
}

/// Documents, frames, and the native commands that run inside them.
pub trait DocumentHost: Send + Sync {
    fn top_document(&self) -> DocumentHandle;

    /// Content document of the frame matching `frame_selector`. `None` if
    /// no such frame exists or its content document is not accessible.
    fn frame_document(&self, frame_selector: &str) -> Option<DocumentHandle>;

    /// Document owning the first element matching `selector`.
    fn document_of(&self, selector: &str) -> Option<DocumentHandle>;

    /// True if any reachable document contains an element matching `selector`.
    fn element_exists(&self, selector: &str) -> bool;

    /// Execute a native command in `doc`. `Ok(false)` means the document
    /// refused it (not focused, command disabled).
    fn exec_command(&self, doc: DocumentHandle, command: NativeCommand) -> Result<bool, HostError>;

    /// Insert a hidden editable node holding `text` into `doc` and select
    /// its contents.
    fn insert_scratch(&self, doc: DocumentHandle, text: &str) -> Result<ScratchId, HostError>;

    /// Detach a scratch node. Unknown ids are ignored.
    fn remove_scratch(&self, id: ScratchId);
}

/// Wait for a just-issued native command to land at the browser/OS level.
#[async_trait]
pub trait CommandSettle: Send + Sync {
    async fn settle(&self, command: NativeCommand);
}

/// Fixed, bounded delays after copy and after paste. If a command has not
/// landed by then, the next clipboard read simply observes stale content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandDelays {
    pub copy: Duration,
    pub paste: Duration,
}

#[async_trait]
impl CommandSettle for CommandDelays {
    async fn settle(&self, command: NativeCommand) {
        let delay = match command {
            NativeCommand::Copy => self.copy,
            NativeCommand::Paste => self.paste,
        };
        tokio::time::sleep(delay).await;
    }
}

/// A composed set of host adapters.
#[derive(Clone)]
pub struct HostSet {
    pub selection: Arc<dyn SelectionProvider>,
    pub clipboard: Arc<dyn ClipboardProvider>,
    pub documents: Arc<dyn DocumentHost>,
    pub settle: Arc<dyn CommandSettle>,
}

impl HostSet {
    /// Use one in-memory page for every adapter slot except `settle`.
    pub fn from_page(page: Arc<page::PageHost>, settle: Arc<dyn CommandSettle>) -> Self {
        Self {
            selection: page.clone(),
            clipboard: page.clone(),
            documents: page,
            settle,
        }
    }
}

/// Selectors identifying the editor surface inside the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSelectors {
    /// Container whose descendants are editor content.
    pub editor_container: String,
    /// Nested frames that may own the editable surface, in priority order.
    pub editor_frames: Vec<String>,
    /// Root element of the editor application.
    pub editor_root: String,
    /// Container of the accessibility selection overlay.
    pub selection_overlay: String,
}

impl Default for EditorSelectors {
    fn default() -> Self {
        Self {
            editor_container: ".kix-appview-editor".into(),
            editor_frames: vec![".docs-texteventtarget-iframe".into()],
            editor_root: ".kix-appview-editor-container".into(),
            selection_overlay: ".kix-selection-overlay".into(),
        }
    }
}
