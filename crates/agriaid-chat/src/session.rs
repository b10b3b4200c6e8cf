//! One farmer's conversation: context enrichment, prompt assembly, dispatch.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agriaid_context::{crop_hint, prepare_context, GatherReport, ProviderRegistry, TopicSet};
use agriaid_providers::{FetchRequest, Location};

use crate::llm::{GenerationBackend, GenerationError};

/// Entries sent to the model per prompt (the pending message included).
pub const HISTORY_WINDOW: usize = 10;

/// Stored and returned in place of an empty completion.
pub const FALLBACK_REPLY: &str = "I apologize, I couldn't generate a response. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// How the completion is requested.
pub enum Dispatch<'a> {
    SingleShot,
    /// Each fragment is handed to the sink as it arrives.
    Streaming(&'a mut dyn FnMut(&str)),
}

#[derive(Debug, Clone)]
pub struct Reply {
    /// What was appended to history (the fallback when the model said nothing).
    pub text: String,
    pub fallback: bool,
    pub topics: TopicSet,
    pub report: GatherReport,
}

/// Flatten the newest entries into `role: content` lines.
///
/// `pending` is the message about to be sent; it counts against the window.
pub fn build_prompt(history: &[Message], pending: &Message) -> String {
    let keep = HISTORY_WINDOW.saturating_sub(1);
    let start = history.len().saturating_sub(keep);
    history[start..]
        .iter()
        .chain(std::iter::once(pending))
        .map(|m| format!("{}: {}\n", m.role, m.content))
        .collect()
}

pub struct ConversationSession {
    backend: Box<dyn GenerationBackend>,
    registry: ProviderRegistry,
    history: Vec<Message>,
    interrupt: Arc<AtomicBool>,
}

impl ConversationSession {
    pub fn new(backend: Box<dyn GenerationBackend>, registry: ProviderRegistry) -> Self {
        Self {
            backend,
            registry,
            history: Vec::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn backend(&self) -> &dyn GenerationBackend {
        self.backend.as_ref()
    }

    /// Raising this flag cancels the turn in progress. It is cleared at the
    /// start of every turn.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Run one turn. History changes only when this returns `Ok`.
    pub fn chat(
        &mut self,
        input: &str,
        location: &Location,
        dispatch: Dispatch<'_>,
    ) -> Result<Reply, GenerationError> {
        self.interrupt.store(false, Ordering::SeqCst);

        let crop = crop_hint(self.history.last().map(|m| m.content.as_str()), input);
        let request = FetchRequest::for_location(location).with_crop(crop);
        let prepared = prepare_context(&self.registry, input, &request);

        let pending = Message::user(format!("{input}\n\n{}", prepared.text));
        let prompt = build_prompt(&self.history, &pending);

        let generated = match dispatch {
            Dispatch::SingleShot => {
                let text = self.backend.generate(&prompt)?;
                if self.interrupt.load(Ordering::SeqCst) {
                    return Err(GenerationError::Interrupted);
                }
                text
            }
            Dispatch::Streaming(sink) => self.drain_stream(&prompt, sink)?,
        };

        let fallback = generated.trim().is_empty();
        let text = if fallback {
            tracing::warn!(backend = %self.backend.describe(), "empty completion; using fallback reply");
            FALLBACK_REPLY.to_string()
        } else {
            generated
        };

        self.history.push(pending);
        self.history.push(Message::assistant(text.clone()));

        Ok(Reply {
            text,
            fallback,
            topics: prepared.topics,
            report: prepared.report,
        })
    }

    fn drain_stream(
        &self,
        prompt: &str,
        sink: &mut dyn FnMut(&str),
    ) -> Result<String, GenerationError> {
        let mut stream = self.backend.stream(prompt)?;
        let mut full = String::new();
        while let Some(fragment) = stream.next_or_interrupt(&self.interrupt) {
            let fragment = fragment?;
            sink(&fragment);
            full.push_str(&fragment);
        }
        Ok(full)
    }
}
