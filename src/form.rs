use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::page::Page;

/// The public demo form this service drives.
pub const FORM_URL: &str = "https://www.selenium.dev/selenium/web/web-form.html";
/// URL fragment identifying the confirmation page.
pub const SUBMITTED_URL_FRAGMENT: &str = "submitted-form.html";
/// Texts that must be visible on the confirmation page.
pub const CONFIRMATION_HEADING: &str = "Form submitted";
pub const CONFIRMATION_MESSAGE: &str = "Received!";

pub const TEXT_INPUT: &str = r#"input[name="my-text"]"#;
pub const PASSWORD_INPUT: &str = r#"input[name="my-password"]"#;
pub const TEXTAREA: &str = r#"textarea[name="my-textarea"]"#;
pub const SELECT: &str = r#"select[name="my-select"]"#;
pub const DEFAULT_CHECKBOX: &str = "#my-check-2";
pub const COLOR_INPUT: &str = r#"input[type="color"][name="my-colors"]"#;
pub const DATE_INPUT: &str = r#"input[name="my-date"]"#;
pub const RANGE_INPUT: &str = r#"input[type="range"][name="my-range"]"#;
pub const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

/// Request body shared by both routes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebFormRequest {
    pub text: Option<String>,
    pub password: Option<String>,
    pub textarea: Option<String>,
    pub select: Option<SelectChoice>,
    pub check_default_checkbox: Option<bool>,
    pub radio: Option<RadioChoice>,
    /// "#RRGGBB"
    pub color: Option<String>,
    /// "YYYY-MM-DD"
    pub date: Option<String>,
    pub range: Option<f64>,
    pub wait_after_submit_ms: Option<u64>,
}

impl WebFormRequest {
    pub fn wait_after_submit(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.wait_after_submit_ms.unwrap_or(2_000))
    }
}

/// Option labels of the form's `<select>`, with their wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SelectChoice {
    One,
    Two,
    Three,
}

impl SelectChoice {
    /// The value the form encodes into the query string for this label.
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::One => "One",
            Self::Two => "Two",
            Self::Three => "Three",
        }
    }
}

/// The two labeled radio options on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioChoice {
    Default,
    Checked,
}

impl RadioChoice {
    pub fn selector(self) -> &'static str {
        match self {
            Self::Default => "#my-radio-1",
            Self::Checked => "#my-radio-2",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Checked => "checked",
        }
    }
}

/// One performed form operation, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub field: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_value: Option<String>,
}

impl ActionRecord {
    pub fn new(kind: &str, field: &str, value: impl Into<Value>) -> Self {
        Self {
            kind: kind.to_string(),
            field: field.to_string(),
            value: value.into(),
            success: None,
            final_value: None,
        }
    }
}

/// Fill the form field by field. Textual fields and the stubborn controls
/// (color, date, range) are set by direct value assignment with synthetic
/// input/change events; `dispatch_blur` additionally fires blur, which the
/// agent route uses to force framework-level reactivity. The checkbox is
/// toggled only when its current state differs from the requested one.
///
/// Does not submit; see [`submit`].
pub async fn fill_form(
    page: &Page,
    body: &WebFormRequest,
    dispatch_blur: bool,
) -> Result<Vec<ActionRecord>> {
    let mut actions = Vec::new();

    if let Some(ref text) = body.text {
        page.set_value_with_events(TEXT_INPUT, text, dispatch_blur).await?;
        actions.push(ActionRecord::new("fill", "text", text.as_str()));
    }

    if let Some(ref password) = body.password {
        page.set_value_with_events(PASSWORD_INPUT, password, dispatch_blur).await?;
        actions.push(ActionRecord::new("fill", "password", "[REDACTED]"));
    }

    if let Some(ref textarea) = body.textarea {
        page.set_value_with_events(TEXTAREA, textarea, dispatch_blur).await?;
        actions.push(ActionRecord::new("fill", "textarea", textarea.as_str()));
    }

    if let Some(select) = body.select {
        page.select_option(SELECT, select.wire_value()).await?;
        actions.push(ActionRecord::new("select", "select", select.label()));
    }

    if let Some(want) = body.check_default_checkbox {
        let now = page.is_checked(DEFAULT_CHECKBOX).await?;
        if now != want {
            page.click(DEFAULT_CHECKBOX).await?;
        }
        let kind = if want { "check" } else { "uncheck" };
        actions.push(ActionRecord::new(kind, "default-checkbox", want));
    }

    if let Some(radio) = body.radio {
        if !page.is_checked(radio.selector()).await? {
            page.click(radio.selector()).await?;
        }
        actions.push(ActionRecord::new("radio", "radio", radio.label()));
    }

    if let Some(ref color) = body.color {
        page.set_value_with_events(COLOR_INPUT, color, dispatch_blur).await?;
        actions.push(ActionRecord::new("color", "color", color.as_str()));
    }

    if let Some(ref date) = body.date {
        page.wait_for_selector(DATE_INPUT).await?;
        page.set_value_with_events(DATE_INPUT, date, dispatch_blur).await?;
        // Read back what actually landed in the control.
        let final_value = page.value_of(DATE_INPUT).await?;
        let mut record = ActionRecord::new("date", "date", date.as_str());
        record.success = Some(final_value == *date);
        record.final_value = Some(final_value);
        actions.push(record);
    }

    if let Some(range) = body.range {
        let rendered = range.to_string();
        page.set_value_with_events(RANGE_INPUT, &rendered, dispatch_blur).await?;
        actions.push(ActionRecord::new("range", "range", range));
    }

    Ok(actions)
}

/// Click the form's submit button.
pub async fn submit(page: &Page) -> Result<ActionRecord> {
    page.click(SUBMIT_BUTTON).await?;
    Ok(ActionRecord::new("click", "submit", "submit-button"))
}

/// Summarize the requested field values as a natural-language instruction
/// for the agent.
pub fn build_instruction(body: &WebFormRequest) -> String {
    let mut clauses = Vec::new();

    if let Some(ref text) = body.text {
        clauses.push(format!("the text input should contain \"{text}\""));
    }
    if body.password.is_some() {
        clauses.push("the password field should be filled in".to_string());
    }
    if let Some(ref textarea) = body.textarea {
        clauses.push(format!("the textarea should contain \"{textarea}\""));
    }
    if let Some(select) = body.select {
        clauses.push(format!("the dropdown should have \"{}\" selected", select.label()));
    }
    if let Some(want) = body.check_default_checkbox {
        let state = if want { "checked" } else { "unchecked" };
        clauses.push(format!("the default checkbox should be {state}"));
    }
    if let Some(radio) = body.radio {
        clauses.push(format!("the \"{}\" radio option should be selected", radio.label()));
    }
    if let Some(ref color) = body.color {
        clauses.push(format!("the color picker should be set to {color}"));
    }
    if let Some(ref date) = body.date {
        clauses.push(format!("the date picker should be set to {date}"));
    }
    if let Some(range) = body.range {
        clauses.push(format!("the range slider should be at {range}"));
    }

    format!(
        "You are on the Selenium demo web form, which has already been filled in. \
         Verify that {}. Correct any field that does not match, then click the \
         Submit button and finish once the confirmation page appears.",
        clauses.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_labels_map_to_wire_values() {
        assert_eq!(SelectChoice::One.wire_value(), "1");
        assert_eq!(SelectChoice::Two.wire_value(), "2");
        assert_eq!(SelectChoice::Three.wire_value(), "3");
    }

    #[test]
    fn request_body_accepts_camel_case_fields() {
        let body: WebFormRequest = serde_json::from_str(
            r#"{
                "text": "hello",
                "select": "Two",
                "checkDefaultCheckbox": true,
                "radio": "checked",
                "waitAfterSubmitMs": 500
            }"#,
        )
        .unwrap();
        assert_eq!(body.text.as_deref(), Some("hello"));
        assert_eq!(body.select, Some(SelectChoice::Two));
        assert_eq!(body.check_default_checkbox, Some(true));
        assert_eq!(body.radio, Some(RadioChoice::Checked));
        assert_eq!(body.wait_after_submit(), std::time::Duration::from_millis(500));
    }

    #[test]
    fn wait_after_submit_defaults_to_two_seconds() {
        let body = WebFormRequest::default();
        assert_eq!(body.wait_after_submit(), std::time::Duration::from_millis(2_000));
    }

    #[test]
    fn action_record_omits_unset_outcome_fields() {
        let record = ActionRecord::new("fill", "text", "abc");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "fill");
        assert_eq!(json["field"], "text");
        assert_eq!(json["value"], "abc");
        assert!(json.get("success").is_none());
        assert!(json.get("finalValue").is_none());
    }

    #[test]
    fn instruction_mentions_requested_values() {
        let body = WebFormRequest {
            text: Some("hello".into()),
            select: Some(SelectChoice::Two),
            date: Some("2025-09-12".into()),
            ..Default::default()
        };
        let instruction = build_instruction(&body);
        assert!(instruction.contains("\"hello\""));
        assert!(instruction.contains("Two"));
        assert!(instruction.contains("2025-09-12"));
        assert!(instruction.contains("Submit"));
    }

    #[test]
    fn instruction_never_contains_the_password() {
        let body = WebFormRequest {
            text: Some("hello".into()),
            password: Some("s3cret".into()),
            ..Default::default()
        };
        assert!(!build_instruction(&body).contains("s3cret"));
    }
}
