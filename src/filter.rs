//! Content filter applied to outgoing messages before storage.

/// Result of filtering one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered {
    pub content: String,
    /// True when part of the text was replaced, so the UI can warn the sender.
    pub rewritten: bool,
}

pub trait ContentFilter: Send + Sync {
    fn apply(&self, text: &str) -> Filtered;
}

/// Replaces each blocked word (whole-word, case-insensitive) with asterisks
/// of the same length.
#[derive(Debug, Default)]
pub struct WordListFilter {
    words: Vec<String>,
}

impl WordListFilter {
    pub fn new(words: Vec<String>) -> Self {
        Self {
            words: words.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn flush_word(&self, out: &mut String, word: &mut String, rewritten: &mut bool) {
        if word.is_empty() {
            return;
        }
        let lower = word.to_lowercase();
        if self.words.iter().any(|w| *w == lower) {
            out.extend(std::iter::repeat('*').take(word.chars().count()));
            *rewritten = true;
        } else {
            out.push_str(word);
        }
        word.clear();
    }
}

impl ContentFilter for WordListFilter {
    fn apply(&self, text: &str) -> Filtered {
        if self.words.is_empty() {
            return Filtered {
                content: text.to_string(),
                rewritten: false,
            };
        }

        let mut out = String::with_capacity(text.len());
        let mut word = String::new();
        let mut rewritten = false;
        for ch in text.chars() {
            if ch.is_alphanumeric() {
                word.push(ch);
            } else {
                self.flush_word(&mut out, &mut word, &mut rewritten);
                out.push(ch);
            }
        }
        self.flush_word(&mut out, &mut word, &mut rewritten);

        Filtered {
            content: out,
            rewritten,
        }
    }
}
