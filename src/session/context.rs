//! Invocation context
//!
//! What the presentation layer knows about the command being run, turned
//! into the bindings and substitutions an invocation starts with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::compiler::Substitutions;
use crate::executor::Val;
use crate::scope::Bindings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MentionKind {
    User,
    Channel,
    Role,
}

impl MentionKind {
    /// Stem of the pseudo-variable a mention is bound to
    fn binding_stem(self) -> &'static str {
        match self {
            MentionKind::User => "__user_mention",
            MentionKind::Channel => "__channel_mention",
            MentionKind::Role => "__role_mention",
        }
    }
}

/// A chat entity referenced in the message, e.g. `<@123>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub kind: MentionKind,
    /// Literal text of the mention as it appears in the message
    pub token: String,
    /// What the mention resolves to
    pub value: Val,
}

impl Mention {
    pub fn new(kind: MentionKind, token: impl Into<String>, value: Val) -> Self {
        Self {
            kind,
            token: token.into(),
            value,
        }
    }
}

/// The command invocation the code came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InvocationContext {
    pub author: String,
    pub channel: String,
    pub channel_id: u64,
    /// Full text of the triggering message
    pub message: String,
    #[serde(default)]
    pub guild: Option<String>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
}

impl InvocationContext {
    pub fn new(author: impl Into<String>, channel: impl Into<String>, channel_id: u64) -> Self {
        Self {
            author: author.into(),
            channel: channel.into(),
            channel_id,
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_guild(mut self, guild: impl Into<String>) -> Self {
        self.guild = Some(guild.into());
        self
    }

    pub fn with_mention(mut self, mention: Mention) -> Self {
        self.mentions.push(mention);
        self
    }

    /// Label used in the task registry
    pub fn describe(&self) -> String {
        format!("{} in #{}", self.author, self.channel)
    }

    /// The context as a Flow object
    pub fn to_val(&self) -> Val {
        let mut obj = BTreeMap::new();
        obj.insert("author".to_string(), Val::from(self.author.as_str()));
        obj.insert("channel".to_string(), Val::from(self.channel.as_str()));
        obj.insert("channel_id".to_string(), Val::Num(self.channel_id as f64));
        obj.insert("message".to_string(), Val::from(self.message.as_str()));
        obj.insert(
            "guild".to_string(),
            self.guild.clone().map(Val::Str).unwrap_or(Val::Null),
        );
        Val::Obj(obj)
    }

    /// Context fields under `prefix`: author, channel, guild, message, msg, ctx
    pub fn bindings(&self, prefix: &str) -> Bindings {
        let guild = self.guild.clone().map(Val::Str).unwrap_or(Val::Null);
        let fields = [
            ("author", Val::from(self.author.as_str())),
            ("channel", Val::from(self.channel.as_str())),
            ("guild", guild),
            ("message", Val::from(self.message.as_str())),
            ("msg", Val::from(self.message.as_str())),
            ("ctx", self.to_val()),
        ];
        fields
            .into_iter()
            .map(|(name, value)| (format!("{}{}", prefix, name), value))
            .collect()
    }

    /// Pseudo-variables for the mentions, with the matching substitutions
    ///
    /// Mentions are numbered per kind in message order.
    pub fn mention_bindings(&self) -> (Bindings, Substitutions) {
        let mut bindings = Bindings::new();
        let mut substitutions = Substitutions::new();
        let mut counters: BTreeMap<&'static str, usize> = BTreeMap::new();

        for mention in &self.mentions {
            let stem = mention.kind.binding_stem();
            let counter = counters.entry(stem).or_default();
            let name = format!("{}_{}", stem, counter);
            *counter += 1;

            substitutions.push(mention.token.clone(), name.clone());
            bindings.insert(name, mention.value.clone());
        }

        (bindings, substitutions)
    }
}
