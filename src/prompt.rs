//! Prompt assembly.
//!
//! A request is always `[system, history.., user(input)]`. History is passed
//! through verbatim; nothing is truncated or summarized.

use crate::llm::Message;

/// Build the ordered message list for one completion request.
#[must_use]
pub fn assemble(system_prompt: &str, history: &[Message], new_input: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt));
    messages.extend_from_slice(history);
    messages.push(Message::user(new_input));
    messages
}
