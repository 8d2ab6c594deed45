//! Document resolver.
//!
//! Native copy and paste only act on the document that owns focus and the
//! editable surface; issued anywhere else they silently do nothing. The
//! resolver picks that document for each intercepted event.

use std::sync::Arc;

use crate::host::{DocumentHandle, DocumentHost, EditorSelectors, HostSet};
use crate::intercept::event::PasteEvent;

/// The document owning one interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorContext {
    pub document: DocumentHandle,
    pub is_nested_frame: bool,
}

pub struct DocumentResolver {
    documents: Arc<dyn DocumentHost>,
    selectors: EditorSelectors,
}

impl DocumentResolver {
    pub fn new(hosts: &HostSet, selectors: EditorSelectors) -> Self {
        Self {
            documents: hosts.documents.clone(),
            selectors,
        }
    }

    /// Resolve the editor document for `event`, in priority order:
    /// the event target's document, an accessible editor frame, the
    /// document holding the editor root, then the top-level document.
    pub fn resolve(&self, event: &PasteEvent) -> EditorContext {
        let top = self.documents.top_document();
        let document = event
            .target
            .or_else(|| {
                self.selectors
                    .editor_frames
                    .iter()
                    .find_map(|frame| self.documents.frame_document(frame))
            })
            .or_else(|| self.documents.document_of(&self.selectors.editor_root))
            .unwrap_or(top);
        let ctx = EditorContext {
            document,
            is_nested_frame: document != top,
        };
        tracing::trace!(document = %ctx.document, nested = ctx.is_nested_frame, "editor document resolved");
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandDelays;
    use crate::host::page::PageHost;

    fn resolver(page: PageHost) -> DocumentResolver {
        let hosts = HostSet::from_page(Arc::new(page), Arc::new(CommandDelays::default()));
        DocumentResolver::new(&hosts, EditorSelectors::default())
    }

    #[test]
    fn event_target_wins() {
        let r = resolver(PageHost::builder().editor_in_frame(true).build());
        let ev = PasteEvent::new(Some(DocumentHandle::new(1)), None);
        let ctx = r.resolve(&ev);
        assert_eq!(ctx.document, DocumentHandle::new(1));
        assert!(!ctx.is_nested_frame);
    }

    #[test]
    fn accessible_editor_frame_next() {
        let r = resolver(PageHost::builder().editor_in_frame(true).build());
        let ctx = r.resolve(&PasteEvent::default());
        assert_eq!(ctx.document, DocumentHandle::new(2));
        assert!(ctx.is_nested_frame);
    }

    #[test]
    fn inaccessible_frame_falls_back_to_editor_root() {
        let r = resolver(
            PageHost::builder()
                .editor_in_frame(true)
                .frame_accessible(false)
                .build(),
        );
        let ctx = r.resolve(&PasteEvent::default());
        assert_eq!(ctx.document, DocumentHandle::new(1));
        assert!(!ctx.is_nested_frame);
    }

    #[test]
    fn top_document_last_resort() {
        struct Bare;
        impl DocumentHost for Bare {
            fn top_document(&self) -> DocumentHandle {
                DocumentHandle::new(7)
            }
            fn frame_document(&self, _: &str) -> Option<DocumentHandle> {
                None
            }
            fn document_of(&self, _: &str) -> Option<DocumentHandle> {
                None
            }
            fn element_exists(&self, _: &str) -> bool {
                false
            }
            fn exec_command(
                &self,
                _: DocumentHandle,
                _: crate::host::NativeCommand,
            ) -> Result<bool, crate::host::HostError> {
                Ok(false)
            }
            fn insert_scratch(
                &self,
                doc: DocumentHandle,
                _: &str,
            ) -> Result<crate::host::ScratchId, crate::host::HostError> {
                Err(crate::host::HostError::Detached(doc))
            }
            fn remove_scratch(&self, _: crate::host::ScratchId) {}
        }
        let r = DocumentResolver {
            documents: Arc::new(Bare),
            selectors: EditorSelectors::default(),
        };
        assert_eq!(
            r.resolve(&PasteEvent::default()).document,
            DocumentHandle::new(7)
        );
    }
}
