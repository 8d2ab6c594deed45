//! Accessibility-overlay text extraction.
//!
//! Canvas-rendered editors keep the native selection empty and describe
//! the selection through an overlay built for assistive technology. Each
//! [`ExtractionStrategy`] reads one shape of that overlay; an
//! [`ExtractionChain`] tries them in a fixed priority order and returns
//! the first non-empty result.

use crate::host::{AccessibilitySnapshot, AxRole};

/// One heuristic for pulling selected text out of an overlay snapshot.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Extracted text, or `None` if this strategy found nothing.
    /// Implementations return raw fragments; the chain normalizes.
    fn extract(&self, snapshot: &AccessibilitySnapshot) -> Option<String>;
}

/// Accessible labels on leaf nodes.
#[derive(Debug, Default)]
pub struct LabeledLeaves;

impl ExtractionStrategy for LabeledLeaves {
    fn name(&self) -> &'static str {
        "labeled-leaves"
    }

    fn extract(&self, snapshot: &AccessibilitySnapshot) -> Option<String> {
        join_fragments(
            snapshot
                .overlay_nodes
                .iter()
                .filter(|n| n.role == AxRole::Leaf)
                .filter_map(|n| n.label.as_deref()),
        )
    }
}

/// Title and description nodes.
#[derive(Debug, Default)]
pub struct TitleAndDescription;

impl ExtractionStrategy for TitleAndDescription {
    fn name(&self) -> &'static str {
        "title-description"
    }

    fn extract(&self, snapshot: &AccessibilitySnapshot) -> Option<String> {
        join_fragments(
            snapshot
                .overlay_nodes
                .iter()
                .filter(|n| matches!(n.role, AxRole::Title | AxRole::Description))
                .map(|n| n.label.as_deref().unwrap_or(&n.text)),
        )
    }
}

/// Structural paragraph and list-item nodes.
#[derive(Debug, Default)]
pub struct StructuralBlocks;

impl ExtractionStrategy for StructuralBlocks {
    fn name(&self) -> &'static str {
        "structural-blocks"
    }

    fn extract(&self, snapshot: &AccessibilitySnapshot) -> Option<String> {
        join_fragments(
            snapshot
                .overlay_nodes
                .iter()
                .filter(|n| matches!(n.role, AxRole::Paragraph | AxRole::ListItem))
                .map(|n| n.text.as_str()),
        )
    }
}

/// Text boxes that overlap any selection highlight rectangle, in reading
/// order (top to bottom, then left to right).
#[derive(Debug, Default)]
pub struct GeometricOverlap;

impl ExtractionStrategy for GeometricOverlap {
    fn name(&self) -> &'static str {
        "geometric-overlap"
    }

    fn extract(&self, snapshot: &AccessibilitySnapshot) -> Option<String> {
        let mut hits: Vec<_> = snapshot
            .text_boxes
            .iter()
            .filter(|b| snapshot.highlight_rects.iter().any(|h| h.overlaps(&b.rect)))
            .collect();
        hits.sort_by(|a, b| {
            a.rect
                .top
                .total_cmp(&b.rect.top)
                .then(a.rect.left.total_cmp(&b.rect.left))
        });
        join_fragments(hits.into_iter().map(|b| b.text.as_str()))
    }
}

fn join_fragments<'a>(fragments: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined = fragments
        .filter(|f| !f.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Ordered chain of extraction strategies.
pub struct ExtractionChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl ExtractionChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Normalized text from the first strategy that yields any, tagged
    /// with that strategy's name.
    pub fn extract(&self, snapshot: &AccessibilitySnapshot) -> Option<(&'static str, String)> {
        self.strategies.iter().find_map(|s| {
            let text = normalize(&s.extract(snapshot)?);
            if text.is_empty() {
                return None;
            }
            tracing::trace!(strategy = s.name(), "accessibility text extracted");
            Some((s.name(), text))
        })
    }
}

impl Default for ExtractionChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(LabeledLeaves),
            Box::new(TitleAndDescription),
            Box::new(StructuralBlocks),
            Box::new(GeometricOverlap),
        ])
    }
}

impl std::fmt::Debug for ExtractionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}
