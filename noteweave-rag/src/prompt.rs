//! Prompt assembly with a context budget.
//!
//! Retrieved documents are added best-first. Once the budget runs out the
//! lowest-ranked documents are dropped. The best match is always included,
//! cut to the budget if needed; a later document that only partly fits is
//! truncated when enough of it remains to be useful.

use crate::document::SearchResult;

/// Marker placed in the prompt when no document was retrieved.
pub const NO_CONTEXT_MARKER: &str = "[NO CONTEXT FOUND]";

/// Appended to a document cut to fit the budget.
pub const TRUNCATION_MARKER: &str = "…[truncated]";

/// A lower-ranked document is only truncated if at least this many characters survive.
pub const MIN_TRUNCATED_CHARS: usize = 200;

const INSTRUCTIONS: &str = "You are a helpful assistant answering questions about the user's \
personal knowledge base. Answer using only the context below. If the context does not contain \
the answer, say that you don't know.";

/// The outcome of [`PromptBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    /// The full prompt text.
    pub text: String,
    /// Positions (into the input results) of documents included in full or truncated.
    pub included: Vec<usize>,
    /// Positions of included documents that were truncated.
    pub truncated: Vec<usize>,
    /// Positions of documents left out for lack of budget.
    pub dropped: Vec<usize>,
}

/// Builds the question prompt from ranked search results.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_chars: usize,
    min_truncated_chars: usize,
}

impl PromptBuilder {
    /// A builder allowing `budget_chars` characters of document context.
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars, min_truncated_chars: MIN_TRUNCATED_CHARS }
    }

    /// Override the truncation floor.
    pub fn with_min_truncated_chars(mut self, chars: usize) -> Self {
        self.min_truncated_chars = chars;
        self
    }

    /// Assemble the prompt. `results` must already be ordered best-first.
    pub fn build(&self, question: &str, results: &[SearchResult]) -> BuiltPrompt {
        let mut remaining = self.budget_chars;
        let mut blocks = Vec::new();
        let mut included = Vec::new();
        let mut truncated = Vec::new();
        let mut dropped = Vec::new();

        for (pos, result) in results.iter().enumerate() {
            let content = result.document.content.trim();
            let len = content.chars().count();

            if len <= remaining {
                remaining -= len;
                blocks.push(content.to_string());
                included.push(pos);
            } else if pos == 0 || (remaining >= self.min_truncated_chars && truncated.is_empty()) {
                // The best match is always kept, however little of it fits.
                let cut: String = content.chars().take(remaining).collect();
                remaining = 0;
                blocks.push(format!("{cut}{TRUNCATION_MARKER}"));
                included.push(pos);
                truncated.push(pos);
            } else {
                remaining = 0;
                dropped.push(pos);
            }
        }

        let context = if results.is_empty() {
            NO_CONTEXT_MARKER.to_string()
        } else {
            blocks
                .iter()
                .zip(&included)
                .enumerate()
                .map(|(n, (block, &pos))| {
                    format!("[{}] {}\n{block}", n + 1, source_label(&results[pos]))
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let text =
            format!("{INSTRUCTIONS}\n\nContext:\n{context}\n\nQuestion: {question}\n\nAnswer:");
        BuiltPrompt { text, included, truncated, dropped }
    }
}

fn source_label(result: &SearchResult) -> String {
    let document = &result.document;
    match (document.title(), document.source()) {
        (Some(title), Some(source)) => format!("{title} ({source})"),
        (Some(title), None) => title.to_string(),
        (None, Some(source)) => source.to_string(),
        (None, None) => document.id.clone(),
    }
}

/// Prompt asking for a short summary of an answer and its sources.
pub fn summary_prompt(question: &str, answer: &str) -> String {
    format!(
        "Summarize the key insight of the following answer in one or two sentences.\n\n\
         Question: {question}\n\nAnswer: {answer}\n\nSummary:"
    )
}
