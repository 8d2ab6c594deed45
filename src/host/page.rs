//! In-memory editor page.
//!
//! Models a host page with a top document, an optional nested editor
//! frame, one editable text surface, a system clipboard behind a
//! permission-gated API, and an optional canvas renderer that hides the
//! native selection behind an accessibility overlay. Native commands act
//! on the editor only when issued against the document that owns it.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{
    AccessibilitySnapshot, AxNode, CaretText, ClipboardProvider, DocumentHandle, DocumentHost,
    EditorSelectors, HostError, NativeCommand, NativeSelection, ScratchId, SelectionProvider,
};

/// Outcome of a clipboard API call on this page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardAccess {
    Granted,
    Denied,
    Unavailable,
}

impl ClipboardAccess {
    fn check(self, op: &str) -> Result<(), HostError> {
        match self {
            Self::Granted => Ok(()),
            Self::Denied => Err(HostError::Denied(format!("clipboard {op}"))),
            Self::Unavailable => Err(HostError::Unavailable(format!("clipboard {op}"))),
        }
    }
}

#[derive(Debug)]
struct Document {
    handle: DocumentHandle,
    /// Selector of the frame element hosting this document, `None` for
    /// the top-level document.
    frame_selector: Option<String>,
    /// Whether script can reach into this document.
    accessible: bool,
    elements: HashSet<String>,
}

#[derive(Debug)]
struct Scratch {
    id: ScratchId,
    doc: DocumentHandle,
    text: String,
}

#[derive(Debug)]
struct PageState {
    documents: Vec<Document>,
    editor_doc: DocumentHandle,
    selectors: EditorSelectors,
    text: String,
    selection: Range<usize>,
    canvas_rendered: bool,
    overlay: Option<AccessibilitySnapshot>,
    clipboard: String,
    read_access: ClipboardAccess,
    write_access: ClipboardAccess,
    legacy_copy: bool,
    copy_lands: bool,
    refused: Vec<NativeCommand>,
    throwing: Vec<NativeCommand>,
    scratch: Option<Scratch>,
    scratch_inserts: usize,
    commands: Vec<(DocumentHandle, NativeCommand)>,
    clipboard_writes: Vec<String>,
}

impl PageState {
    fn document(&self, handle: DocumentHandle) -> Option<&Document> {
        self.documents.iter().find(|d| d.handle == handle)
    }

    fn selected_text(&self) -> &str {
        &self.text[self.selection.clone()]
    }

    fn copy(&mut self, doc: DocumentHandle) -> bool {
        if let Some(scratch) = self.scratch.as_ref().filter(|s| s.doc == doc) {
            if !self.legacy_copy {
                return false;
            }
            self.clipboard = scratch.text.clone();
            return true;
        }
        if doc != self.editor_doc {
            return false;
        }
        // Copy with a collapsed selection leaves the clipboard alone.
        if !self.selection.is_empty() && self.copy_lands {
            self.clipboard = self.selected_text().to_string();
        }
        true
    }

    fn paste(&mut self, doc: DocumentHandle) -> bool {
        if doc != self.editor_doc {
            return false;
        }
        let start = self.selection.start;
        self.text.replace_range(self.selection.clone(), &self.clipboard);
        let caret = start + self.clipboard.len();
        self.selection = caret..caret;
        true
    }
}

/// An in-memory page implementing every host adapter trait except
/// command settling.
#[derive(Debug)]
pub struct PageHost {
    state: Mutex<PageState>,
    next_scratch: AtomicU64,
}

impl PageHost {
    pub fn builder() -> PageBuilder {
        PageBuilder::default()
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Full text of the editor surface.
    pub fn text(&self) -> String {
        self.state().text.clone()
    }

    /// Currently selected editor text (empty when collapsed).
    pub fn selected_text(&self) -> String {
        self.state().selected_text().to_string()
    }

    /// System clipboard content, bypassing the permission gate.
    pub fn clipboard(&self) -> String {
        self.state().clipboard.clone()
    }

    /// Replace the clipboard as an external application would.
    pub fn set_clipboard(&self, text: impl Into<String>) {
        self.state().clipboard = text.into();
    }

    /// Select the first occurrence of `needle` in the editor text.
    /// Returns false (and leaves the selection alone) if it is absent.
    pub fn select(&self, needle: &str) -> bool {
        let mut state = self.state();
        match state.text.find(needle) {
            Some(start) if !needle.is_empty() => {
                state.selection = start..start + needle.len();
                true
            }
            _ => false,
        }
    }

    /// Collapse the selection to a caret at byte `offset`, clamped to the
    /// nearest preceding char boundary.
    pub fn set_caret(&self, offset: usize) {
        let mut state = self.state();
        let mut offset = offset.min(state.text.len());
        while !state.text.is_char_boundary(offset) {
            offset -= 1;
        }
        state.selection = offset..offset;
    }

    /// Every native command issued so far, in order.
    pub fn commands(&self) -> Vec<(DocumentHandle, NativeCommand)> {
        self.state().commands.clone()
    }

    /// Count of `command` issued so far against any document.
    pub fn command_count(&self, command: NativeCommand) -> usize {
        self.state()
            .commands
            .iter()
            .filter(|(_, c)| *c == command)
            .count()
    }

    /// Every successful write through the clipboard API, in order.
    pub fn clipboard_writes(&self) -> Vec<String> {
        self.state().clipboard_writes.clone()
    }

    /// Document that owns the editable surface.
    pub fn editor_document(&self) -> DocumentHandle {
        self.state().editor_doc
    }

    /// True while a scratch node is attached to some document.
    pub fn scratch_attached(&self) -> bool {
        self.state().scratch.is_some()
    }

    /// Number of scratch nodes inserted over the page's lifetime.
    pub fn scratch_inserts(&self) -> usize {
        self.state().scratch_inserts
    }

    /// Add the editor container, as a late-loading editor would.
    pub fn mount_editor(&self) {
        let mut state = self.state();
        let (doc, container) = (state.editor_doc, state.selectors.editor_container.clone());
        if let Some(d) = state.documents.iter_mut().find(|d| d.handle == doc) {
            d.elements.insert(container);
        }
    }
}

impl SelectionProvider for PageHost {
    fn native_selection(&self, doc: DocumentHandle) -> Option<NativeSelection> {
        let state = self.state();
        let document = state.document(doc)?;
        if !document.accessible {
            return None;
        }
        if doc != state.editor_doc || state.canvas_rendered {
            return Some(NativeSelection {
                is_collapsed: true,
                ..Default::default()
            });
        }
        let text = state.selected_text().to_string();
        Some(NativeSelection {
            is_collapsed: text.is_empty(),
            text,
            range_count: 1,
            anchor_node: Some("#text".into()),
            focus_node: Some("#text".into()),
        })
    }

    fn anchor_within(&self, container_selector: &str) -> bool {
        let state = self.state();
        !state.canvas_rendered
            && state
                .document(state.editor_doc)
                .is_some_and(|d| d.accessible && d.elements.contains(container_selector))
    }

    fn accessibility_snapshot(&self, overlay_selector: &str) -> Option<AccessibilitySnapshot> {
        let state = self.state();
        if !state.canvas_rendered || overlay_selector != state.selectors.selection_overlay {
            return None;
        }
        if let Some(overlay) = &state.overlay {
            return Some(overlay.clone());
        }
        if state.selection.is_empty() {
            return None;
        }
        Some(AccessibilitySnapshot {
            overlay_nodes: vec![AxNode::labeled(state.selected_text())],
            ..Default::default()
        })
    }

    fn caret_text(&self) -> Option<CaretText> {
        let state = self.state();
        if state.canvas_rendered {
            return None;
        }
        Some(CaretText {
            text: state.text.clone(),
            offset: state.selection.start,
        })
    }
}

#[async_trait]
impl ClipboardProvider for PageHost {
    async fn read_text(&self) -> Result<String, HostError> {
        let state = self.state();
        state.read_access.check("read")?;
        Ok(state.clipboard.clone())
    }

    async fn write_text(&self, text: &str) -> Result<(), HostError> {
        let mut state = self.state();
        state.write_access.check("write")?;
        state.clipboard = text.to_string();
        state.clipboard_writes.push(text.to_string());
        Ok(())
    }
}

impl DocumentHost for PageHost {
    fn top_document(&self) -> DocumentHandle {
        DocumentHandle::new(1)
    }

    fn frame_document(&self, frame_selector: &str) -> Option<DocumentHandle> {
        self.state()
            .documents
            .iter()
            .find(|d| d.frame_selector.as_deref() == Some(frame_selector))
            .filter(|d| d.accessible)
            .map(|d| d.handle)
    }

    fn document_of(&self, selector: &str) -> Option<DocumentHandle> {
        self.state()
            .documents
            .iter()
            .find(|d| d.accessible && d.elements.contains(selector))
            .map(|d| d.handle)
    }

    fn element_exists(&self, selector: &str) -> bool {
        self.document_of(selector).is_some()
    }

    fn exec_command(&self, doc: DocumentHandle, command: NativeCommand) -> Result<bool, HostError> {
        let mut state = self.state();
        if state.document(doc).is_none() {
            return Err(HostError::Detached(doc));
        }
        state.commands.push((doc, command));
        if state.throwing.contains(&command) {
            return Err(HostError::Command(format!("{command} threw")));
        }
        if state.refused.contains(&command) {
            return Ok(false);
        }
        Ok(match command {
            NativeCommand::Copy => state.copy(doc),
            NativeCommand::Paste => state.paste(doc),
        })
    }

    fn insert_scratch(&self, doc: DocumentHandle, text: &str) -> Result<ScratchId, HostError> {
        let mut state = self.state();
        if state.document(doc).is_none() {
            return Err(HostError::Detached(doc));
        }
        let id = ScratchId(self.next_scratch.fetch_add(1, Ordering::Relaxed));
        state.scratch = Some(Scratch {
            id,
            doc,
            text: text.to_string(),
        });
        state.scratch_inserts += 1;
        Ok(id)
    }

    fn remove_scratch(&self, id: ScratchId) {
        let mut state = self.state();
        if state.scratch.as_ref().is_some_and(|s| s.id == id) {
            state.scratch = None;
        }
    }
}

/// Builder for [`PageHost`].
#[derive(Debug)]
pub struct PageBuilder {
    selectors: EditorSelectors,
    text: String,
    selected: Option<String>,
    clipboard: String,
    editor_in_frame: bool,
    frame_accessible: bool,
    editor_mounted: bool,
    canvas_rendered: bool,
    overlay: Option<AccessibilitySnapshot>,
    read_access: ClipboardAccess,
    write_access: ClipboardAccess,
    legacy_copy: bool,
    copy_lands: bool,
    refused: Vec<NativeCommand>,
    throwing: Vec<NativeCommand>,
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self {
            selectors: EditorSelectors::default(),
            text: String::new(),
            selected: None,
            clipboard: String::new(),
            editor_in_frame: false,
            frame_accessible: true,
            editor_mounted: true,
            canvas_rendered: false,
            overlay: None,
            read_access: ClipboardAccess::Granted,
            write_access: ClipboardAccess::Granted,
            legacy_copy: true,
            copy_lands: true,
            refused: Vec::new(),
            throwing: Vec::new(),
        }
    }
}

impl PageBuilder {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Select the first occurrence of `needle` once built.
    pub fn select(mut self, needle: impl Into<String>) -> Self {
        self.selected = Some(needle.into());
        self
    }

    pub fn clipboard(mut self, text: impl Into<String>) -> Self {
        self.clipboard = text.into();
        self
    }

    /// Put the editable surface inside a nested frame document.
    pub fn editor_in_frame(mut self, in_frame: bool) -> Self {
        self.editor_in_frame = in_frame;
        self
    }

    /// Whether the editor frame's content document is reachable.
    pub fn frame_accessible(mut self, accessible: bool) -> Self {
        self.frame_accessible = accessible;
        self
    }

    /// Whether the editor container exists yet. See
    /// [`PageHost::mount_editor`].
    pub fn editor_mounted(mut self, mounted: bool) -> Self {
        self.editor_mounted = mounted;
        self
    }

    /// Render through a canvas: the native selection reports nothing and
    /// only the accessibility overlay reflects the selection.
    pub fn canvas_rendered(mut self, canvas: bool) -> Self {
        self.canvas_rendered = canvas;
        self
    }

    /// Override the overlay snapshot reported while canvas-rendered.
    pub fn overlay(mut self, overlay: AccessibilitySnapshot) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn read_access(mut self, access: ClipboardAccess) -> Self {
        self.read_access = access;
        self
    }

    pub fn write_access(mut self, access: ClipboardAccess) -> Self {
        self.write_access = access;
        self
    }

    /// Whether the legacy copy of a scratch node reaches the clipboard.
    pub fn legacy_copy(mut self, works: bool) -> Self {
        self.legacy_copy = works;
        self
    }

    /// Whether a native copy of the editor selection reaches the
    /// clipboard before the next read.
    pub fn copy_lands(mut self, lands: bool) -> Self {
        self.copy_lands = lands;
        self
    }

    /// Make `command` report failure.
    pub fn refuse(mut self, command: NativeCommand) -> Self {
        self.refused.push(command);
        self
    }

    /// Make `command` throw.
    pub fn throw_on(mut self, command: NativeCommand) -> Self {
        self.throwing.push(command);
        self
    }

    pub fn build(self) -> PageHost {
        let top = DocumentHandle::new(1);
        let mut top_elements = HashSet::from([self.selectors.editor_root.clone()]);
        let mut documents = Vec::new();
        let editor_doc = if self.editor_in_frame {
            let frame = DocumentHandle::new(2);
            top_elements.extend(self.selectors.editor_frames.iter().cloned());
            documents.push(Document {
                handle: frame,
                frame_selector: self.selectors.editor_frames.first().cloned(),
                accessible: self.frame_accessible,
                elements: HashSet::new(),
            });
            frame
        } else {
            top
        };
        documents.insert(
            0,
            Document {
                handle: top,
                frame_selector: None,
                accessible: true,
                elements: top_elements,
            },
        );

        if self.editor_mounted {
            if let Some(doc) = documents.iter_mut().find(|d| d.handle == editor_doc) {
                doc.elements.insert(self.selectors.editor_container.clone());
            }
        }

        let selection = self
            .selected
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|needle| self.text.find(needle).map(|i| i..i + needle.len()))
            .unwrap_or(self.text.len()..self.text.len());

        PageHost {
            state: Mutex::new(PageState {
                documents,
                editor_doc,
                selectors: self.selectors,
                text: self.text,
                selection,
                canvas_rendered: self.canvas_rendered,
                overlay: self.overlay,
                clipboard: self.clipboard,
                read_access: self.read_access,
                write_access: self.write_access,
                legacy_copy: self.legacy_copy,
                copy_lands: self.copy_lands,
                refused: self.refused,
                throwing: self.throwing,
                scratch: None,
                scratch_inserts: 0,
                commands: Vec::new(),
                clipboard_writes: Vec::new(),
            }),
            next_scratch: AtomicU64::new(1),
        }
    }
}
