use crate::types::{AppError, Result};

/// Fixed-stride character chunker.
///
/// Windows of `chunk_size` characters start every `chunk_size - chunk_overlap`
/// characters, so consecutive chunks share `chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(AppError::InvalidInput(format!(
                "chunk overlap ({}) must be smaller than a non-zero chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;

        (0..chars.len())
            .step_by(step)
            .map(|start| {
                let end = (start + self.chunk_size).min(chars.len());
                chars[start..end].iter().collect()
            })
            .collect()
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Stable id of the `index`-th chunk of a section.
///
/// Re-ingesting the same section produces the same ids, which overwrite the
/// previous chunks in the store.
pub fn chunk_id(jurisdiction: &str, section_title: &str, index: usize) -> String {
    format!("{}_{}_{}", jurisdiction, section_title, index)
        .to_lowercase()
        .replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(500, 2)]
    #[case(451, 2)]
    #[case(450, 1)]
    #[case(1000, 3)]
    fn test_chunk_count(#[case] len: usize, #[case] expected: usize) {
        let chunker = TextChunker::default();
        let text = "a".repeat(len);
        assert_eq!(chunker.chunk(&text).len(), expected);
    }

    #[test]
    fn test_chunks_overlap() {
        let chunker = TextChunker::new(10, 3).unwrap();
        let text: String = ('a'..='z').collect();
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "hijklmnopq");
        assert_eq!(chunks[2], "opqrstuvwx");
        assert_eq!(chunks[3], "vwxyz");
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let chunker = TextChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk("Ўзбекистон");

        assert_eq!(chunks[0], "Ўзбе");
        assert_eq!(chunks[1], "екис");
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    }

    #[rstest]
    #[case(0, 0)]
    #[case(10, 10)]
    #[case(10, 11)]
    fn test_invalid_parameters(#[case] size: usize, #[case] overlap: usize) {
        assert!(matches!(
            TextChunker::new(size, overlap),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_overlap_is_allowed() {
        let chunker = TextChunker::new(5, 0).unwrap();
        assert_eq!(chunker.chunk("abcdefghij"), vec!["abcde", "fghij"]);
    }

    #[test]
    fn test_chunk_id() {
        assert_eq!(chunk_id("UK", "UKVI Overview", 0), "uk_ukvi_overview_0");
        assert_eq!(
            chunk_id("Uzbekistan", "E-Visa Portal", 12),
            "uzbekistan_e-visa_portal_12"
        );
    }
}
