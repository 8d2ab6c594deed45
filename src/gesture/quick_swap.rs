//! Adjacent-word lookup for the quick-swap gesture.

use regex::Regex;

/// The words immediately left and right of the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordSwap {
    pub left: String,
    pub right: String,
    /// Byte range in the source text from the start of `left` to the end
    /// of `right`.
    pub span: std::ops::Range<usize>,
}

#[derive(Debug, Clone)]
pub struct WordFinder {
    word: Regex,
}

impl WordFinder {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            word: Regex::new(r"\S+")?,
        })
    }

    /// Nearest word ending at or before `caret` and nearest word starting
    /// at or after it. With the caret inside a word, that word is skipped.
    pub fn adjacent(&self, text: &str, caret: usize) -> Option<WordSwap> {
        let mut left = None;
        let mut right = None;
        for m in self.word.find_iter(text) {
            if m.end() <= caret {
                left = Some(m);
            } else if m.start() >= caret && right.is_none() {
                right = Some(m);
            }
        }
        let (left, right) = (left?, right?);
        Some(WordSwap {
            left: left.as_str().to_string(),
            right: right.as_str().to_string(),
            span: left.start()..right.end(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finder() -> WordFinder {
        WordFinder::new().unwrap()
    }

    /// `text` with the two words exchanged and the gap between them kept.
    fn swapped(text: &str, swap: &WordSwap) -> String {
        let gap = swap.span.start + swap.left.len()..swap.span.end - swap.right.len();
        format!(
            "{}{}{}{}{}",
            &text[..swap.span.start],
            swap.right,
            &text[gap],
            swap.left,
            &text[swap.span.end..]
        )
    }

    #[test]
    fn caret_between_words() {
        let text = "hello world";
        let swap = finder().adjacent(text, 5).unwrap();
        assert_eq!(swap.left, "hello");
        assert_eq!(swap.right, "world");
        assert_eq!(swapped(text, &swap), "world hello");
    }

    #[test]
    fn caret_inside_word_uses_neighbours() {
        let text = "one two three";
        // Caret inside "two".
        let swap = finder().adjacent(text, 5).unwrap();
        assert_eq!((swap.left.as_str(), swap.right.as_str()), ("one", "three"));
        assert_eq!(swapped(text, &swap), "three two one");
    }

    #[test]
    fn keeps_punctuation_and_gap() {
        let text = "a,  b.";
        let swap = finder().adjacent(text, 2).unwrap();
        assert_eq!(swapped(text, &swap), "b.  a,");
    }

    #[test]
    fn needs_two_words() {
        assert_eq!(finder().adjacent("single", 3), None);
        assert_eq!(finder().adjacent("left only", 9), None);
        assert_eq!(finder().adjacent("", 0), None);
    }
}
