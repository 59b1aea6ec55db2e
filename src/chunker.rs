//! Text splitting strategies.
//!
//! All lengths are counted in `char`s so that CJK text is measured the same
//! way as ASCII text.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_SEPARATOR: &str = "\n\n";

const RECURSIVE_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMethod {
    /// Sentence-aware packing with sentence-level overlap
    #[serde(alias = "llamaindex")]
    Sentence,
    /// Recursive character splitting over paragraph, line, word and char boundaries
    #[serde(alias = "langchain")]
    Recursive,
    /// Plain split on a caller supplied separator
    Custom,
}

impl FromStr for ChunkMethod {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sentence" | "llamaindex" => Ok(ChunkMethod::Sentence),
            "recursive" | "langchain" => Ok(ChunkMethod::Recursive),
            "custom" => Ok(ChunkMethod::Custom),
            _ => Err(ServiceError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for ChunkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkMethod::Sentence => "sentence",
            ChunkMethod::Recursive => "recursive",
            ChunkMethod::Custom => "custom",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOptions {
    pub method: ChunkMethod,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separator: String,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            method: ChunkMethod::Sentence,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl ChunkOptions {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.chunk_size == 0 {
            return Err(ServiceError::InvalidChunkParams(
                "chunkSize must be greater than 0".to_string(),
            ));
        }
        match self.method {
            ChunkMethod::Custom if self.separator.is_empty() => Err(
                ServiceError::InvalidChunkParams("separator must not be empty".to_string()),
            ),
            ChunkMethod::Sentence | ChunkMethod::Recursive
                if self.chunk_overlap >= self.chunk_size =>
            {
                Err(ServiceError::InvalidChunkParams(format!(
                    "chunkOverlap ({}) must be smaller than chunkSize ({})",
                    self.chunk_overlap, self.chunk_size
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Split `content` according to `options`.
pub fn split(content: &str, options: &ChunkOptions) -> Result<Vec<String>, ServiceError> {
    options.validate()?;

    let chunks = match options.method {
        ChunkMethod::Sentence => {
            split_sentences(content, options.chunk_size, options.chunk_overlap)
        }
        ChunkMethod::Recursive => {
            split_recursive(content, options.chunk_size, options.chunk_overlap)
        }
        ChunkMethod::Custom => split_custom(content, &options.separator),
    };
    Ok(chunks)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ';')
}

fn is_cjk_terminator(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '；')
}

/// Cut text into sentence units. Each unit keeps its trailing whitespace, so
/// concatenating the units gives back the input.
fn sentence_units(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut units = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (_, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, n)| n);

        let boundary = is_cjk_terminator(c)
            || (is_terminator(c) && next.is_none_or(char::is_whitespace))
            || (c == '\n' && next == Some('\n'));

        if boundary {
            let mut end = i + 1;
            while end < chars.len() && chars[end].1.is_whitespace() {
                end += 1;
            }
            let byte_end = chars.get(end).map_or(text.len(), |&(b, _)| b);
            units.push(&text[start..byte_end]);
            start = byte_end;
            i = end;
        } else {
            i += 1;
        }
    }
    if start < text.len() {
        units.push(&text[start..]);
    }
    units
}

/// Break a unit longer than `size` into pieces of at most `size` chars,
/// preferring whitespace boundaries.
fn split_oversized(unit: &str, size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in unit.split_inclusive(char::is_whitespace) {
        let word_len = char_len(word);
        if current_len + word_len > size && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len > size {
            let chars: Vec<char> = word.chars().collect();
            for part in chars.chunks(size) {
                let part: String = part.iter().collect();
                if part.chars().count() == size {
                    pieces.push(part);
                } else {
                    current_len = char_len(&part);
                    current = part;
                }
            }
        } else {
            current.push_str(word);
            current_len += word_len;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn split_sentences(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let units: Vec<String> = sentence_units(text)
        .into_iter()
        .flat_map(|unit| {
            if char_len(unit) > size {
                split_oversized(unit, size)
            } else {
                vec![unit.to_string()]
            }
        })
        .collect();

    let mut chunks = Vec::new();
    let mut current: VecDeque<(String, usize)> = VecDeque::new();
    let mut current_len = 0;

    let mut emit = |current: &VecDeque<(String, usize)>| {
        let chunk: String = current.iter().map(|(u, _)| u.as_str()).collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
    };

    for unit in units {
        let unit_len = char_len(&unit);

        if current_len + unit_len > size && !current.is_empty() {
            emit(&current);

            let mut carried = 0;
            let mut keep = 0;
            for (_, len) in current.iter().rev() {
                if carried + len > overlap {
                    break;
                }
                carried += len;
                keep += 1;
            }
            while current.len() > keep {
                current.pop_front();
            }
            current_len = carried;

            while current_len + unit_len > size {
                match current.pop_front() {
                    Some((_, len)) => current_len -= len,
                    None => break,
                }
            }
        }

        current.push_back((unit, unit_len));
        current_len += unit_len;
    }
    if !current.is_empty() {
        emit(&current);
    }

    chunks
}

/// Join `splits` with `separator`, packing up to `size` chars per chunk and
/// carrying up to `overlap` chars of trailing splits into the next chunk.
fn merge_splits(splits: &[String], separator: &str, size: usize, overlap: usize) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut docs = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    let join = |current: &VecDeque<&str>| {
        current
            .iter()
            .copied()
            .collect::<Vec<_>>()
            .join(separator)
            .trim()
            .to_string()
    };

    for split in splits {
        let len = char_len(split);
        let joiner = if current.is_empty() { 0 } else { separator_len };

        if total + len + joiner > size {
            if total > size {
                tracing::warn!(
                    "Created a chunk of size {}, which is longer than the specified {}",
                    total,
                    size
                );
            }
            if !current.is_empty() {
                let doc = join(&current);
                if !doc.is_empty() {
                    docs.push(doc);
                }

                while total > overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { separator_len } > size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    let dropped_joiner = if current.is_empty() { 0 } else { separator_len };
                    total -= char_len(first) + dropped_joiner;
                }
            }
        }

        current.push_back(split);
        total += len + if current.len() > 1 { separator_len } else { 0 };
    }

    let doc = join(&current);
    if !doc.is_empty() {
        docs.push(doc);
    }
    docs
}

fn split_text_recursive(
    text: &str,
    separators: &[&str],
    size: usize,
    overlap: usize,
) -> Vec<String> {
    let (index, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, s)| s.is_empty() || text.contains(**s))
        .map(|(i, s)| (i, *s))
        .unwrap_or((separators.len().saturating_sub(1), ""));
    let remaining = &separators[(index + 1).min(separators.len())..];

    let splits: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    let mut final_chunks = Vec::new();
    let mut good: Vec<String> = Vec::new();
    for split in splits {
        if char_len(&split) < size {
            good.push(split);
        } else {
            if !good.is_empty() {
                final_chunks.extend(merge_splits(&good, separator, size, overlap));
                good.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(split);
            } else {
                final_chunks.extend(split_text_recursive(&split, remaining, size, overlap));
            }
        }
    }
    if !good.is_empty() {
        final_chunks.extend(merge_splits(&good, separator, size, overlap));
    }
    final_chunks
}

fn split_recursive(text: &str, size: usize, overlap: usize) -> Vec<String> {
    split_text_recursive(text, RECURSIVE_SEPARATORS, size, overlap)
}

fn split_custom(text: &str, separator: &str) -> Vec<String> {
    text.split(separator)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(method: ChunkMethod, chunk_size: usize, chunk_overlap: usize) -> ChunkOptions {
        ChunkOptions {
            method,
            chunk_size,
            chunk_overlap,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    #[test]
    fn test_method_parsing_accepts_aliases() {
        assert_eq!("llamaindex".parse::<ChunkMethod>().unwrap(), ChunkMethod::Sentence);
        assert_eq!("LangChain".parse::<ChunkMethod>().unwrap(), ChunkMethod::Recursive);
        assert_eq!("custom".parse::<ChunkMethod>().unwrap(), ChunkMethod::Custom);
        assert!(matches!(
            "semantic".parse::<ChunkMethod>(),
            Err(ServiceError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_validation() {
        assert!(options(ChunkMethod::Sentence, 0, 0).validate().is_err());
        assert!(options(ChunkMethod::Recursive, 10, 10).validate().is_err());
        assert!(options(ChunkMethod::Custom, 10, 10).validate().is_ok());

        let mut custom = options(ChunkMethod::Custom, 10, 0);
        custom.separator.clear();
        assert!(custom.validate().is_err());
    }

    #[test]
    fn test_sentence_units_cover_input() {
        let text = "First one. Second one!\n\nThird 第三句。第四句？ Version 1.5 stays.";
        let units = sentence_units(text);
        assert_eq!(units.concat(), text);
        assert_eq!(
            units,
            vec![
                "First one. ",
                "Second one!\n\n",
                "Third 第三句。",
                "第四句？ ",
                "Version 1.5 stays."
            ]
        );
    }

    #[test]
    fn test_sentence_split_respects_size() {
        let text = "Alpha beta gamma. Delta epsilon. Zeta eta theta. Kappa.";
        let chunks = split(text, &options(ChunkMethod::Sentence, 20, 0)).unwrap();

        assert_eq!(
            chunks,
            vec!["Alpha beta gamma.", "Delta epsilon.", "Zeta eta theta.", "Kappa."]
        );
    }

    #[test]
    fn test_sentence_split_carries_overlap() {
        let text = "One. Two. Three. Four.";
        let chunks = split(text, &options(ChunkMethod::Sentence, 12, 7)).unwrap();

        assert_eq!(chunks, vec!["One. Two.", "Two. Three.", "Three. Four."]);
    }

    #[test]
    fn test_sentence_split_hard_cuts_long_words() {
        let text = "a".repeat(25);
        let chunks = split(&text, &options(ChunkMethod::Sentence, 10, 0)).unwrap();

        assert_eq!(chunks, vec!["a".repeat(10), "a".repeat(10), "a".repeat(5)]);
    }

    #[test]
    fn test_sentence_chunks_never_exceed_size() {
        let text = "自然语言处理是人工智能的一个分支。它研究人与计算机之间的交流！\n\n\
                    Embeddings map text to vectors. Retrieval finds the nearest ones; \
                    generation uses them as context.";
        for size in [8, 16, 32, 64] {
            let chunks = split(text, &options(ChunkMethod::Sentence, size, size / 4)).unwrap();
            assert!(!chunks.is_empty());
            assert!(chunks.iter().all(|c| c.chars().count() <= size), "size {size}");
        }
    }

    #[test]
    fn test_recursive_split_without_overlap() {
        let chunks = split("aaaa bbbb cccc dddd", &options(ChunkMethod::Recursive, 10, 0)).unwrap();
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc dddd"]);
    }

    #[test]
    fn test_recursive_split_with_overlap() {
        let chunks = split("aaaa bbbb cccc dddd", &options(ChunkMethod::Recursive, 10, 4)).unwrap();
        assert_eq!(chunks, vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"]);
    }

    #[test]
    fn test_recursive_split_prefers_paragraphs() {
        let text = "first paragraph\n\nsecond paragraph";
        let chunks = split(text, &options(ChunkMethod::Recursive, 20, 0)).unwrap();
        assert_eq!(chunks, vec!["first paragraph", "second paragraph"]);
    }

    #[test]
    fn test_recursive_split_falls_back_to_chars() {
        let chunks = split("abcdefgh", &options(ChunkMethod::Recursive, 3, 0)).unwrap();
        assert_eq!(chunks, vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_custom_split_trims_and_drops_empty() {
        let mut opts = options(ChunkMethod::Custom, 500, 50);
        opts.separator = "---".to_string();

        let chunks = split("  one ---two---   ---three  ", &opts).unwrap();
        assert_eq!(chunks, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        for method in [ChunkMethod::Sentence, ChunkMethod::Recursive, ChunkMethod::Custom] {
            let chunks = split("   \n\n  ", &options(method, 10, 0)).unwrap();
            assert!(chunks.is_empty(), "{method}");
        }
    }
}
