//! Prompt assembly: labeled source passages, conversation history, and the
//! user query under an instruction preamble.

use crate::message::Message;
use crate::types::PromptConfig;

/// A retrieved passage ready to be cited in the prompt.
#[derive(Debug, Clone)]
pub struct SourcePassage {
    /// Human-meaningful citation label, e.g. `contract.pdf#3`.
    pub label: String,
    pub content: String,
}

const GROUNDED_PREAMBLE: &str = "You are a legal document assistant. Answer the question using ONLY the \
numbered sources below. If the sources do not contain the answer, say that \
the information is not present in the provided documents. Cite the sources \
you rely on by their number, e.g. [Source 2].\n";

const NO_CONTEXT_PREAMBLE: &str = "You are a legal document assistant. No relevant passages were found in the \
uploaded documents for this question. Tell the user that no grounding \
material was found, and answer only in general terms if you answer at all.\n";

/// Build the full generation prompt.
///
/// With zero retained passages the source section is omitted entirely and the
/// preamble instructs the model to disclose the missing grounding context.
pub fn assemble(
    passages: &[SourcePassage],
    query: &str,
    history: &[Message],
    config: &PromptConfig,
) -> String {
    let mut prompt = String::new();

    if passages.is_empty() {
        prompt.push_str(NO_CONTEXT_PREAMBLE);
    } else {
        prompt.push_str(GROUNDED_PREAMBLE);
        for (index, passage) in passages.iter().enumerate() {
            let body: String = passage
                .content
                .chars()
                .take(config.max_source_len)
                .collect();
            prompt.push_str(&format!(
                "\nSource {} ({}):\n{}\n",
                index + 1,
                passage.label,
                body
            ));
        }
    }

    if !history.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        let start = history.len().saturating_sub(config.history_limit);
        for message in &history[start..] {
            prompt.push_str(&format!(
                "{}: {}\n",
                message.role.as_str().to_ascii_uppercase(),
                message.content
            ));
        }
    }

    prompt.push_str(&format!("\nUSER QUESTION: {query}\nANSWER:"));
    prompt
}
