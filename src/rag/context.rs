//! Context assembly and citation mapping.
//!
//! Retrieved chunks are numbered from 1 in retrieval order. The number shown
//! to the model as `[n]` is the same position the chunk's metadata takes in
//! the returned citations list, so `[n]` always resolves to `citations[n - 1]`.

use crate::llm::{Prompt, ASSISTANT_MARKER};
use crate::types::{SearchResult, SourceMetadata};

/// Answer returned when retrieval finds nothing to ground a reply on.
pub const NO_CONTEXT_ANSWER: &str = "I couldn't find any authoritative information on this topic.";

const INSTRUCTIONS: &str = "Answer the user's question based strictly on the provided context.\n\
If the answer is not in the context, state that you do not have enough specific information. \
Do not hallucinate rules.\n\
Citations: Always refer to the source number [x] when making a claim.";

/// One numbered line per chunk: `[n] {content} (Source: {url})`.
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}] {} (Source: {})",
                i + 1,
                result.document.content,
                result.document.metadata.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(persona: &str, context: &str, query: &str) -> Prompt {
    let system = format!("{}\n{}\n\nContext:\n{}", persona.trim(), INSTRUCTIONS, context);
    Prompt::new(system, query)
}

/// Strip any echoed prompt: keep the text after the last assistant marker.
pub fn extract_answer(generated: &str) -> String {
    generated
        .rsplit_once(ASSISTANT_MARKER)
        .map_or(generated, |(_, answer)| answer)
        .trim()
        .to_string()
}

pub fn citations(results: &[SearchResult]) -> Vec<SourceMetadata> {
    results
        .iter()
        .map(|result| result.document.metadata.clone())
        .collect()
}
