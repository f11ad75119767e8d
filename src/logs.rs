use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Message substituted for every llm-category log entry.
pub const LLM_REDACTION: &str = "[LLM interaction redacted]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Browser,
    Action,
    Llm,
    Error,
    Agent,
    Cache,
}

/// Extra context attached to a log line. Serialized only when non-empty.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Auxiliary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<Value>,
}

impl Auxiliary {
    fn is_empty(&self) -> bool {
        self.url.is_none() && self.execution_time.is_none()
    }
}

/// One public-safe log event, as returned in the agent response.
#[derive(Debug, Clone, Serialize)]
pub struct PublicLogLine {
    pub category: LogCategory,
    pub message: String,
    /// ISO-8601, always present.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<Auxiliary>,
}

/// In-memory log collector for one request. Clones share the same buffer,
/// so the sink can be handed to the agent and the handler at the same time.
///
/// Redaction happens at insertion: llm-category entries keep only the fixed
/// placeholder message and lose their auxiliary data, no matter what was
/// passed in.
#[derive(Clone, Default)]
pub struct LogSink {
    inner: Arc<Mutex<Vec<PublicLogLine>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, category: LogCategory, message: impl Into<String>) {
        self.push_with(category, message, None);
    }

    pub fn push_with(
        &self,
        category: LogCategory,
        message: impl Into<String>,
        auxiliary: Option<Auxiliary>,
    ) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = if category == LogCategory::Llm {
            PublicLogLine {
                category,
                message: LLM_REDACTION.to_string(),
                timestamp,
                auxiliary: None,
            }
        } else {
            PublicLogLine {
                category,
                message: message.into(),
                timestamp,
                auxiliary: auxiliary.filter(|a| !a.is_empty()),
            }
        };

        let mut lines = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(line);
    }

    /// Take all collected lines out of the sink.
    pub fn drain(&self) -> Vec<PublicLogLine> {
        let mut lines = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_entries_are_redacted() {
        let sink = LogSink::new();
        sink.push(LogCategory::Llm, "prompt: the secret sauce");
        sink.push_with(
            LogCategory::Llm,
            "completion body",
            Some(Auxiliary {
                url: Some("https://api.openai.com".into()),
                execution_time: None,
            }),
        );

        let lines = sink.drain();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line.category, LogCategory::Llm);
            assert_eq!(line.message, LLM_REDACTION);
            assert!(line.auxiliary.is_none());
        }
    }

    #[test]
    fn non_llm_entries_keep_their_message() {
        let sink = LogSink::new();
        sink.push(LogCategory::Action, "fill my-text");
        let lines = sink.drain();
        assert_eq!(lines[0].message, "fill my-text");
        assert!(!lines[0].timestamp.is_empty());
    }

    #[test]
    fn empty_auxiliary_is_omitted() {
        let sink = LogSink::new();
        sink.push_with(LogCategory::Browser, "navigated", Some(Auxiliary::default()));
        sink.push_with(
            LogCategory::Browser,
            "navigated",
            Some(Auxiliary {
                url: Some("https://example.com".into()),
                execution_time: Some(serde_json::json!(120)),
            }),
        );

        let lines = sink.drain();
        assert!(lines[0].auxiliary.is_none());
        let aux = lines[1].auxiliary.as_ref().unwrap();
        assert_eq!(aux.url.as_deref(), Some("https://example.com"));

        let json = serde_json::to_value(&lines[1]).unwrap();
        assert_eq!(json["auxiliary"]["executionTime"], 120);
        assert_eq!(json["category"], "browser");
    }

    #[test]
    fn clones_share_the_same_buffer() {
        let sink = LogSink::new();
        let clone = sink.clone();
        clone.push(LogCategory::Agent, "from the clone");
        assert_eq!(sink.drain().len(), 1);
    }

    #[test]
    fn drain_empties_the_sink() {
        let sink = LogSink::new();
        sink.push(LogCategory::Cache, "hit");
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.drain().is_empty());
    }
}
