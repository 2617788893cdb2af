//! Conversational session: retrieval, prompt assembly and generation with a
//! rolling question/answer history.
use std::io::{BufRead, Write};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::db::VectorStore;
use crate::embedder::Embedder;
use crate::generator::{GenerateError, Generator, PromptBuilder};
use crate::retriever::{RetrieveError, Retriever};

pub const GREETING: &str = "Ask questions about the codebase. Type 'exit' to quit.";
pub const FAREWELL: &str = "Goodbye!";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

fn is_exit_command(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

pub struct Assistant<'a, E, S, G>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
    G: Generator + ?Sized,
{
    retriever: Retriever<'a, E, S>,
    generator: &'a G,
    prompt: PromptBuilder,
    top_k: usize,
    max_depth: usize,
    service_filter: Option<String>,
    history: Vec<(String, String)>,
}

impl<'a, E, S, G> Assistant<'a, E, S, G>
where
    E: Embedder + ?Sized,
    S: VectorStore + ?Sized,
    G: Generator + ?Sized,
{
    pub fn new(retriever: Retriever<'a, E, S>, generator: &'a G) -> Self {
        Self {
            retriever,
            generator,
            prompt: PromptBuilder::default(),
            top_k: 5,
            max_depth: 2,
            service_filter: None,
            history: Vec::new(),
        }
    }

    /// Wires retrieval and prompt limits from `config`.
    pub fn from_config(embedder: &'a E, store: &'a S, generator: &'a G, config: &Config) -> Self {
        let retriever = Retriever::new(embedder, store)
            .with_related_limit(config.retrieval.related_limit)
            .with_score_decay(config.retrieval.score_decay);

        Self::new(retriever, generator)
            .with_prompt(PromptBuilder::new(
                config.generation.max_prompt_chars,
                config.generation.history_turns,
            ))
            .with_search(config.retrieval.search_top_k, config.retrieval.max_depth)
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    #[must_use]
    pub fn with_search(mut self, top_k: usize, max_depth: usize) -> Self {
        self.top_k = top_k;
        self.max_depth = max_depth;
        self
    }

    /// Restricts the initial similarity search to one service.
    #[must_use]
    pub fn with_service(mut self, service: Option<String>) -> Self {
        self.service_filter = service;
        self
    }

    pub fn history(&self) -> &[(String, String)] {
        &self.history
    }

    /// Answers one question and records the exchange.
    ///
    /// History is only extended when generation succeeds.
    pub fn ask(&mut self, question: &str) -> Result<String, ChatError> {
        let chunks = self.retriever.query(
            question,
            self.top_k,
            self.max_depth,
            self.service_filter.as_deref(),
        )?;
        debug!("retrieved {} chunks for question", chunks.len());

        let prompt = self.prompt.build(&chunks, question, &self.history);
        let answer = self.generator.generate(&prompt)?;

        self.history.push((question.to_string(), answer.clone()));
        Ok(answer)
    }

    /// Line-oriented loop until `exit`/`quit` or end of input.
    ///
    /// Blank lines are ignored. Retrieval and generation errors end the
    /// session.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<(), ChatError> {
        writeln!(output, "{GREETING}\n")?;

        let mut line = String::new();
        loop {
            write!(output, "You: ")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(output)?;
                break;
            }

            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if is_exit_command(question) {
                writeln!(output, "{FAREWELL}")?;
                break;
            }

            let answer = self.ask(question)?;
            writeln!(output, "\nAssistant:\n{answer}\n")?;
        }

        info!("chat ended after {} exchanges", self.history.len());
        Ok(())
    }
}
