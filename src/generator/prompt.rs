//! Bounded prompt assembly from ranked chunks and conversation history.
use crate::retriever::RankedChunk;

pub const DEFAULT_MAX_CHARS: usize = 12_000;
pub const DEFAULT_HISTORY_TURNS: usize = 3;

const PREAMBLE: &str = "You are an expert software engineer working on a large microservices project.";
const INSTRUCTIONS: &str = "Based on the following code context, answer the question at the end. \
Be detailed and clear. If helpful, write code, list steps, trace logic, or explain connections.";

/// Text block of one chunk inside the code context.
pub fn format_snippet(chunk: &RankedChunk) -> String {
    format!(
        "File: {}\nService: {}\n---\n{}\n",
        chunk.file_path, chunk.service_name, chunk.content
    )
}

#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    /// Budget for the code context, counted in characters.
    pub max_chars: usize,
    pub history_turns: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            history_turns: DEFAULT_HISTORY_TURNS,
        }
    }
}

impl PromptBuilder {
    pub fn new(max_chars: usize, history_turns: usize) -> Self {
        Self {
            max_chars,
            history_turns,
        }
    }

    /// Snippets that fit the budget, in ranked order.
    ///
    /// Stops at the first snippet that would overflow; it is dropped whole,
    /// as is everything ranked after it.
    pub fn select_snippets(&self, chunks: &[RankedChunk]) -> Vec<String> {
        let mut selected = Vec::new();
        let mut total = 0;
        for chunk in chunks {
            let snippet = format_snippet(chunk);
            let len = snippet.chars().count();
            if total + len > self.max_chars {
                break;
            }
            total += len;
            selected.push(snippet);
        }
        selected
    }

    fn history_block(&self, history: &[(String, String)]) -> String {
        let start = history.len().saturating_sub(self.history_turns);
        history[start..]
            .iter()
            .map(|(q, a)| format!("User: {q}\nAssistant: {a}\n"))
            .collect()
    }

    pub fn build(
        &self,
        chunks: &[RankedChunk],
        question: &str,
        history: &[(String, String)],
    ) -> String {
        let context = self.select_snippets(chunks).join("\n");
        let history = self.history_block(history);

        let prompt = format!(
            "{PREAMBLE}\n\n{history}\n{INSTRUCTIONS}\n\n\
             --- Code Context Start ---\n{context}\n--- Code Context End ---\n\n\
             Question: {question}\nAnswer:"
        );
        prompt.trim().to_string()
    }
}
