//! Recursive character splitting with overlap.
//!
//! Text is cut on the coarsest separator present (paragraphs, then lines, then
//! words, then characters). Small pieces are packed back together up to
//! `chunk_size`, carrying roughly `chunk_overlap` characters from the end of one
//! chunk into the start of the next. All lengths are measured in chars.

#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveCharacterSplitter {
    fn default() -> Self {
        Self::new(2000, 200)
    }
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators: ["\n\n", "\n", " ", ""].map(String::from).to_vec(),
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge(&good));
                good.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }
        chunks
    }

    /// Pack pieces into chunks. Separators are already attached to the pieces.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: std::collections::VecDeque<(&str, usize)> = Default::default();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }
                if !window.is_empty() {
                    if let Some(doc) = join(&window) {
                        docs.push(doc);
                    }
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        match window.pop_front() {
                            Some((_, dropped)) => total -= dropped,
                            None => break,
                        }
                    }
                }
            }
            window.push_back((piece.as_str(), len));
            total += len;
        }

        if let Some(doc) = join(&window) {
            docs.push(doc);
        }
        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join(window: &std::collections::VecDeque<(&str, usize)>) -> Option<String> {
    let text: String = window.iter().map(|(s, _)| *s).collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Split on `separator`, re-attaching it to the start of every piece after the first.
/// The empty separator splits into individual characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = text.split(separator);
    let mut out = Vec::new();
    if let Some(first) = pieces.next()
        && !first.is_empty()
    {
        out.push(first.to_string());
    }
    out.extend(pieces.map(|p| format!("{separator}{p}")));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_trimmed_chunk() {
        let splitter = RecursiveCharacterSplitter::default();
        assert_eq!(splitter.split_text("  def f():\n    return 1\n"), ["def f():\n    return 1"]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let splitter = RecursiveCharacterSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("\n\n  \n").is_empty());
    }

    #[test]
    fn paragraphs_are_packed_up_to_chunk_size() {
        let splitter = RecursiveCharacterSplitter::new(8, 0);
        let chunks = splitter.split_text("aaaa\n\nbbbb\n\ncccc");
        assert_eq!(chunks, ["aaaa", "bbbb", "cccc"]);
    }

    #[test]
    fn words_overlap_between_chunks() {
        let splitter = RecursiveCharacterSplitter::new(12, 6);
        let chunks = splitter.split_text("one two three four");
        assert_eq!(chunks, ["one two", "two three", "three four"]);
    }

    #[test]
    fn long_words_fall_back_to_characters() {
        let splitter = RecursiveCharacterSplitter::new(4, 0);
        let chunks = splitter.split_text("abcdefghij");
        assert_eq!(chunks, ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn chunks_respect_size_limit_on_large_input() {
        let text = (0..500)
            .map(|i| format!("line {i} with some words in it"))
            .collect::<Vec<_>>()
            .join("\n");
        let splitter = RecursiveCharacterSplitter::default();
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 2000));
        assert!(chunks[0].starts_with("line 0 "));
        assert!(chunks.last().unwrap().ends_with("line 499 with some words in it"));
    }

    #[test]
    fn multibyte_text_is_measured_in_chars() {
        let splitter = RecursiveCharacterSplitter::new(3, 0);
        let chunks = splitter.split_text("ééééé");
        assert_eq!(chunks, ["ééé", "éé"]);
    }
}
