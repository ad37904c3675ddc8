//! Presentation seams
//!
//! The session never formats or transports output itself. A [`Renderer`]
//! shows values and notices; a [`MessageSource`] feeds REPL sessions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::executor::Val;

/// Receives everything an invocation shows to the user
#[async_trait]
pub trait Renderer: Send {
    /// Show a produced value
    ///
    /// The return value is sent back into the program as the continuation
    /// value and becomes `_`.
    async fn render(&mut self, value: &Val) -> Option<Val>;

    /// Show a plain notice (errors, banners, status lines)
    async fn render_text(&mut self, text: &str);
}

/// A chat message seen while a REPL session waits for input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub author: String,
    pub channel_id: u64,
    pub content: String,
}

impl IncomingMessage {
    pub fn new(author: impl Into<String>, channel_id: u64, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            channel_id,
            content: content.into(),
        }
    }

    pub fn to_val(&self) -> Val {
        let mut obj = std::collections::BTreeMap::new();
        obj.insert("author".to_string(), Val::from(self.author.as_str()));
        obj.insert("channel_id".to_string(), Val::Num(self.channel_id as f64));
        obj.insert("content".to_string(), Val::from(self.content.as_str()));
        Val::Obj(obj)
    }
}

/// Stream of incoming messages; `None` means the source is closed
#[async_trait]
pub trait MessageSource: Send {
    async fn next_message(&mut self) -> Option<IncomingMessage>;
}
