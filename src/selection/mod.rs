//! Selection locator.
//!
//! Answers "what text, if any, is selected right now" against two
//! representations of the editor: the native selection API (top-level
//! document first, then the editor frames) and, when those report
//! nothing, the accessibility overlay via [`accessibility::ExtractionChain`].
//!
//! Every query reads live host state. A [`Selection`] is a value computed
//! for one event turn and must not be held across an await.

pub mod accessibility;

use std::fmt;

use crate::host::{DocumentHandle, EditorSelectors, HostSet, NativeSelection};

use self::accessibility::ExtractionChain;

/// Which representation produced the selected text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Native,
    Accessibility,
    None,
}

impl fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Accessibility => "accessibility",
            Self::None => "none",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub text: String,
    pub source: SelectionSource,
    pub is_collapsed: bool,
}

impl Selection {
    fn none() -> Self {
        Self {
            text: String::new(),
            source: SelectionSource::None,
            is_collapsed: true,
        }
    }

    fn native(sel: NativeSelection) -> Self {
        Self {
            text: sel.text,
            source: SelectionSource::Native,
            is_collapsed: false,
        }
    }
}

/// Diagnostic description of the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMetadata {
    pub text: String,
    pub source: SelectionSource,
    pub range_count: u32,
    pub is_collapsed: bool,
    pub anchor_node: Option<String>,
    pub focus_node: Option<String>,
    pub in_editor: bool,
}

pub struct SelectionLocator {
    hosts: HostSet,
    selectors: EditorSelectors,
    chain: ExtractionChain,
}

impl SelectionLocator {
    pub fn new(hosts: &HostSet, selectors: EditorSelectors) -> Self {
        Self {
            hosts: hosts.clone(),
            selectors,
            chain: ExtractionChain::default(),
        }
    }

    /// Resolve the current selection.
    pub fn locate(&self) -> Selection {
        if let Some(sel) = self.native_in(self.hosts.documents.top_document()) {
            return Selection::native(sel);
        }
        for frame in &self.selectors.editor_frames {
            if let Some(sel) = self
                .hosts
                .documents
                .frame_document(frame)
                .and_then(|doc| self.native_in(doc))
            {
                return Selection::native(sel);
            }
        }
        let extracted = self
            .hosts
            .selection
            .accessibility_snapshot(&self.selectors.selection_overlay)
            .and_then(|snap| self.chain.extract(&snap));
        match extracted {
            Some((strategy, text)) => {
                tracing::debug!(strategy, "selection found in accessibility overlay");
                Selection {
                    text,
                    source: SelectionSource::Accessibility,
                    is_collapsed: false,
                }
            }
            None => Selection::none(),
        }
    }

    /// Native selection of `doc` if it carries non-blank text.
    fn native_in(&self, doc: DocumentHandle) -> Option<NativeSelection> {
        self.hosts
            .selection
            .native_selection(doc)
            .filter(|sel| !sel.text.trim().is_empty())
    }

    pub fn has_selection(&self) -> bool {
        self.locate().source != SelectionSource::None
    }

    pub fn selected_text(&self) -> Option<String> {
        let sel = self.locate();
        (sel.source != SelectionSource::None).then_some(sel.text)
    }

    /// Permissive "is the user working in the editor" check.
    ///
    /// A caret with no selection cannot be told apart from focus elsewhere
    /// on the page, so the mere presence of the editor container counts.
    pub fn is_in_editor(&self) -> bool {
        let container = &self.selectors.editor_container;
        self.hosts.selection.anchor_within(container)
            || self
                .hosts
                .selection
                .accessibility_snapshot(&self.selectors.selection_overlay)
                .is_some_and(|snap| snap.has_selection())
            || self.hosts.documents.element_exists(container)
    }

    pub fn metadata(&self) -> SelectionMetadata {
        let native = self
            .hosts
            .selection
            .native_selection(self.hosts.documents.top_document())
            .unwrap_or_default();
        let located = self.locate();
        SelectionMetadata {
            text: located.text,
            source: located.source,
            range_count: native.range_count,
            is_collapsed: located.is_collapsed,
            anchor_node: native.anchor_node,
            focus_node: native.focus_node,
            in_editor: self.is_in_editor(),
        }
    }
}
