//! Context assembler — composes the bounded chat prompt
//!
//! The prompt is an explicit ordered concatenation of named sections, so the
//! final order is fixed by construction rather than by insertion tricks:
//! persona, retrieved knowledge, retrieved memory, stored history, then the
//! caller's conversation with its newest message last.
//!
//! The three gathers (knowledge, memory, history) are independent reads and
//! run concurrently; content bounding is left to the model options' token
//! ceiling.

use crate::config::RagConfig;
use crate::error::NutriaError;
use crate::history::ChatHistory;
use crate::inference::{ChatRole, PromptMessage};
use crate::models::StoredMessage;
use crate::retrieve::{Corpus, Retriever};

/// Fixed persona instruction that always opens the prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are a personal nutrition assistant. \
Use the provided context and the user's remembered preferences to give \
accurate, practical dietary guidance. Be concise and specific.";

const CONTEXT_HEADER: &str = "Relevant Context:";
const MEMORY_HEADER: &str = "User Memory:";

/// The gathered inputs for one prompt, before assembly.
#[derive(Debug, Default)]
pub struct ContextSections {
    pub knowledge: Vec<String>,
    pub memory: Vec<String>,
    pub history: Vec<StoredMessage>,
}

#[derive(Clone)]
pub struct ContextAssembler {
    retriever: Retriever,
    history: ChatHistory,
    config: RagConfig,
}

impl ContextAssembler {
    pub fn new(retriever: Retriever, history: ChatHistory, config: RagConfig) -> Self {
        Self {
            retriever,
            history,
            config,
        }
    }

    /// Build the full prompt for a chat turn.
    ///
    /// Both retrievals use the content of the conversation's last message as
    /// the query; an empty conversation degenerates to an empty query, which
    /// is a boundary case rather than an error.
    pub async fn build_chat_prompt(
        &self,
        user_id: &str,
        conversation: &[PromptMessage],
    ) -> Result<Vec<PromptMessage>, NutriaError> {
        let query = conversation
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let (knowledge, memory, history) = tokio::try_join!(
            self.retriever.retrieve(
                Corpus::Knowledge,
                query,
                None,
                Some(self.config.context_top_k as i64),
            ),
            self.retriever.retrieve(
                Corpus::Memory,
                query,
                Some(user_id),
                Some(self.config.memory_top_k as i64),
            ),
            self.history
                .last_messages(user_id, Some(self.config.history_depth as i64)),
        )?;

        let sections = ContextSections {
            knowledge,
            memory,
            history,
        };

        Ok(assemble(sections, conversation))
    }
}

/// Concatenate the named sections in their fixed precedence order.
pub fn assemble(sections: ContextSections, conversation: &[PromptMessage]) -> Vec<PromptMessage> {
    let mut prompt = Vec::with_capacity(3 + sections.history.len() + conversation.len());

    prompt.push(PromptMessage::system(SYSTEM_INSTRUCTION));
    prompt.push(PromptMessage::system(format!(
        "{}\n{}",
        CONTEXT_HEADER,
        sections.knowledge.join("\n")
    )));
    prompt.push(PromptMessage::system(format!(
        "{}\n{}",
        MEMORY_HEADER,
        sections.memory.join("\n")
    )));

    for message in &sections.history {
        prompt.push(PromptMessage {
            role: ChatRole::parse(&message.role),
            content: message.content.clone(),
        });
    }

    prompt.extend_from_slice(conversation);
    prompt
}

// ============================================================================
// TESTS
// ============================================================================
