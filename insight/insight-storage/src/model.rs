//! Scripted model client for tests and offline runs.

use async_trait::async_trait;
use insight_core::prelude::*;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One scripted rule: when the prompt contains `when`, answer or fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRule {
    pub when: String,
    #[serde(flatten)]
    pub reply: ModelReply,
}

/// What a matching rule does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelReply {
    Respond(String),
    Fail(String),
}

/// A prompt the model received.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCall {
    pub agent_id: String,
    pub prompt: String,
    pub context_index: String,
}

/// Model client that answers from substring rules, first match wins.
///
/// Unmatched prompts get the default reply, or fail when none is set. Every
/// call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    rules: RwLock<Vec<ModelRule>>,
    default_reply: RwLock<Option<String>>,
    calls: Mutex<Vec<ModelCall>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<ModelRule>, default_reply: Option<String>) -> Self {
        Self {
            rules: RwLock::new(rules),
            default_reply: RwLock::new(default_reply),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer `response` to prompts containing `needle`
    pub fn respond_when(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.write().push(ModelRule {
            when: needle.into(),
            reply: ModelReply::Respond(response.into()),
        });
        self
    }

    /// Fail prompts containing `needle`
    pub fn fail_when(self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.write().push(ModelRule {
            when: needle.into(),
            reply: ModelReply::Fail(message.into()),
        });
        self
    }

    pub fn with_default(self, response: impl Into<String>) -> Self {
        *self.default_reply.write() = Some(response.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded prompts containing `needle`
    pub fn calls_containing(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.prompt.contains(needle))
            .count()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn call_model(&self, agent_id: &str, prompt: &str, context_index: &str) -> Result<String> {
        self.calls.lock().push(ModelCall {
            agent_id: agent_id.to_string(),
            prompt: prompt.to_string(),
            context_index: context_index.to_string(),
        });

        let matched = self
            .rules
            .read()
            .iter()
            .find(|rule| prompt.contains(&rule.when))
            .map(|rule| rule.reply.clone());

        match matched {
            Some(ModelReply::Respond(text)) => Ok(text),
            Some(ModelReply::Fail(message)) => Err(InsightError::model_call(message)),
            None => {
                debug!("No scripted rule matched prompt for {}", context_index);
                self.default_reply
                    .read()
                    .clone()
                    .ok_or_else(|| InsightError::model_call("no scripted response for prompt"))
            }
        }
    }
}
