use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::form::ActionRecord;
use crate::logs::{LogCategory, LogSink};
use crate::page::Page;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = r#"You are a browser automation agent working on a single web form. You issue ONE step at a time as JSON.

Available actions:
- {"action":"Click","selector":"button[type=\"submit\"]"}
- {"action":"TypeInto","selector":"input[name=\"my-text\"]","text":"value"}
- {"action":"Wait","ms":500}
- {"action":"Done","summary":"what was accomplished"}

Rules:
1. Return ONLY a single JSON object per response. No markdown, no explanation.
2. Target elements with CSS selectors taken from the form field listing you are shown.
3. After each action you will be shown the updated page state. Decide your next step from it.
4. When the task is accomplished (the confirmation page is visible), use Done with a short summary.
5. If an action fails, try one alternative, then use Done explaining what happened."#;

/// Bounds for one agent run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    /// Hard ceiling on LLM decisions for one request.
    pub max_steps: u32,
    /// Pause between consecutive browser actions.
    pub action_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-5".to_string(),
            max_steps: 8,
            action_delay: Duration::from_millis(500),
        }
    }
}

/// One step as decided by the LLM.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action")]
pub enum AgentAction {
    Click { selector: String },
    TypeInto { selector: String, text: String },
    Wait { ms: u64 },
    Done { summary: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Wall time spent waiting on the LLM, in milliseconds.
    pub inference_time_ms: u64,
}

/// What the agent run produced. An LLM failure never fails the request;
/// it surfaces here as `success: false`.
#[derive(Debug, Serialize)]
pub struct AgentOutcome {
    pub success: bool,
    pub message: String,
    pub completed: bool,
    pub usage: AgentUsage,
    pub actions: Vec<ActionRecord>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Strip markdown code fences the model sometimes wraps JSON in.
fn strip_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// LLM-driven action executor: observe the page, ask the model for the next
/// step, perform it, repeat. Bounded by `max_steps` with an inter-action
/// delay. Every exchange goes through the log sink (and is redacted there).
pub struct ComputerUseAgent {
    client: reqwest::Client,
    api_key: String,
    config: AgentConfig,
    sink: LogSink,
}

impl ComputerUseAgent {
    pub fn new(api_key: impl Into<String>, config: AgentConfig, sink: LogSink) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            config,
            sink,
        }
    }

    pub async fn execute(&self, page: &Page, instruction: &str) -> AgentOutcome {
        let mut usage = AgentUsage::default();
        let mut actions = Vec::new();
        let mut conversation = vec![
            json!({ "role": "system", "content": SYSTEM_PROMPT }),
            json!({ "role": "user", "content": format!("Task: {instruction}") }),
        ];

        for step in 0..self.config.max_steps {
            match self.observe(page).await {
                Ok(observation) => {
                    conversation.push(json!({ "role": "user", "content": observation }));
                }
                Err(e) => {
                    self.sink
                        .push(LogCategory::Error, format!("observation failed: {e}"));
                    return AgentOutcome {
                        success: false,
                        message: format!("Agent could not observe the page: {e}"),
                        completed: false,
                        usage,
                        actions,
                    };
                }
            }

            let content = match self.decide(&conversation, &mut usage).await {
                Ok(content) => content,
                Err(e) => {
                    self.sink
                        .push(LogCategory::Error, format!("LLM call failed: {e}"));
                    return AgentOutcome {
                        success: false,
                        message: format!("Agent stopped after LLM failure: {e}"),
                        completed: false,
                        usage,
                        actions,
                    };
                }
            };

            self.sink.push(LogCategory::Llm, content.clone());
            conversation.push(json!({ "role": "assistant", "content": content }));

            let action: AgentAction = match serde_json::from_str(strip_fences(&content)) {
                Ok(action) => action,
                Err(e) => {
                    tracing::warn!(step, error = %e, "unparseable agent step");
                    self.sink
                        .push(LogCategory::Error, format!("unparseable agent step: {e}"));
                    conversation.push(json!({
                        "role": "user",
                        "content": format!("ERROR: your last reply was not a single valid action JSON object ({e}). Reply with exactly one action."),
                    }));
                    continue;
                }
            };

            if let AgentAction::Done { summary } = action {
                self.sink.push(LogCategory::Agent, format!("done: {summary}"));
                return AgentOutcome {
                    success: true,
                    message: summary,
                    completed: true,
                    usage,
                    actions,
                };
            }

            let (record, outcome) = self.perform(page, &action).await;
            if let Err(ref e) = outcome {
                self.sink
                    .push(LogCategory::Error, format!("action failed: {e}"));
                conversation.push(json!({
                    "role": "user",
                    "content": format!("ERROR from last action: {e}"),
                }));
            } else {
                self.sink
                    .push(LogCategory::Action, format!("{} {}", record.kind, record.field));
            }
            actions.push(record);

            tokio::time::sleep(self.config.action_delay).await;
        }

        AgentOutcome {
            success: false,
            message: format!(
                "Agent did not finish within {} steps",
                self.config.max_steps
            ),
            completed: false,
            usage,
            actions,
        }
    }

    /// Current page state as shown to the model: URL, title, and the form
    /// field listing.
    async fn observe(&self, page: &Page) -> Result<String> {
        let url = page.url().await?;
        let title = page.title().await?;
        let fields = page.get_form_fields().await?;
        let fields_json = serde_json::to_string_pretty(&fields)?;
        Ok(format!(
            "Page URL: {url}\nTitle: {title}\n\nForm fields:\n{fields_json}\n\nWhat is your next step?"
        ))
    }

    async fn decide(&self, conversation: &[serde_json::Value], usage: &mut AgentUsage) -> Result<String> {
        let started = Instant::now();
        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.config.model,
                "messages": conversation,
                "temperature": 0.2,
            }))
            .send()
            .await?;
        usage.inference_time_ms += started.elapsed().as_millis() as u64;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown API error");
            return Err(Error::Llm(format!("OpenAI API error ({status}): {message}")));
        }

        let parsed: ChatResponse = serde_json::from_value(body)?;
        if let Some(chat_usage) = parsed.usage {
            usage.input_tokens += chat_usage.prompt_tokens;
            usage.output_tokens += chat_usage.completion_tokens;
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Llm("no content in LLM response".into()))
    }

    async fn perform(&self, page: &Page, action: &AgentAction) -> (ActionRecord, Result<()>) {
        match action {
            AgentAction::Click { selector } => {
                let outcome = page.click(selector).await;
                let mut record = ActionRecord::new("click", selector, selector.as_str());
                record.success = Some(outcome.is_ok());
                (record, outcome)
            }
            AgentAction::TypeInto { selector, text } => {
                let outcome = page.type_text(selector, text).await;
                let mut record = ActionRecord::new("type", selector, text.as_str());
                record.success = Some(outcome.is_ok());
                (record, outcome)
            }
            AgentAction::Wait { ms } => {
                // Cap so a confused model can't stall the request.
                let ms = (*ms).min(5_000);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                (ActionRecord::new("wait", "page", ms), Ok(()))
            }
            AgentAction::Done { .. } => unreachable!("Done is handled by the loop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_action_variant() {
        let click: AgentAction =
            serde_json::from_str(r#"{"action":"Click","selector":"button[type=\"submit\"]"}"#)
                .unwrap();
        assert_eq!(
            click,
            AgentAction::Click {
                selector: r#"button[type="submit"]"#.into()
            }
        );

        let type_into: AgentAction = serde_json::from_str(
            r#"{"action":"TypeInto","selector":"input[name=\"my-text\"]","text":"hi"}"#,
        )
        .unwrap();
        assert!(matches!(type_into, AgentAction::TypeInto { .. }));

        let wait: AgentAction = serde_json::from_str(r#"{"action":"Wait","ms":250}"#).unwrap();
        assert_eq!(wait, AgentAction::Wait { ms: 250 });

        let done: AgentAction =
            serde_json::from_str(r#"{"action":"Done","summary":"submitted"}"#).unwrap();
        assert_eq!(
            done,
            AgentAction::Done {
                summary: "submitted".into()
            }
        );
    }

    #[test]
    fn unknown_action_fails_to_parse() {
        assert!(serde_json::from_str::<AgentAction>(r#"{"action":"Explode"}"#).is_err());
    }

    #[test]
    fn strip_fences_handles_plain_and_fenced_json() {
        assert_eq!(strip_fences(r#"{"action":"Wait","ms":1}"#), r#"{"action":"Wait","ms":1}"#);
        assert_eq!(
            strip_fences("```json\n{\"action\":\"Wait\",\"ms\":1}\n```"),
            r#"{"action":"Wait","ms":1}"#
        );
        assert_eq!(
            strip_fences("```\n{\"action\":\"Wait\",\"ms\":1}\n```"),
            r#"{"action":"Wait","ms":1}"#
        );
    }

    #[test]
    fn chat_response_tolerates_missing_usage() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{\"action\":\"Done\",\"summary\":\"ok\"}"}}]}"#,
        )
        .unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.choices.len(), 1);
    }
}
