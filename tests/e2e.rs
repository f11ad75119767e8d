//! Full-stack tests against the live demo form. They need a local Chrome and
//! network access, so they are ignored by default:
//!
//!     cargo test --test e2e -- --ignored

use webform_agent::config::Settings;
use webform_agent::form::{
    fill_form, submit, RadioChoice, SelectChoice, WebFormRequest, CONFIRMATION_HEADING,
    CONFIRMATION_MESSAGE, FORM_URL, SUBMITTED_URL_FRAGMENT,
};
use webform_agent::logs::LLM_REDACTION;
use webform_agent::server::{router, AppState};
use webform_agent::validate::validate_submission;
use webform_agent::Browser;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn submit_and_validate(body: &WebFormRequest) -> (String, String, Vec<String>) {
    let browser = Browser::builder()
        .headless(true)
        .viewport(1920, 1080)
        .build()
        .await
        .expect("Failed to launch browser");

    let page = browser.new_page(FORM_URL).await.expect("Failed to open page");

    fill_form(&page, body, false).await.expect("Failed to fill form");
    submit(&page).await.expect("Failed to submit");

    let url = page
        .wait_for_url_contains(SUBMITTED_URL_FRAGMENT, Duration::from_secs(15))
        .await
        .expect("Did not reach confirmation page");
    page.wait_for_text(CONFIRMATION_HEADING, Duration::from_secs(10))
        .await
        .expect("Confirmation heading not visible");
    page.wait_for_text(CONFIRMATION_MESSAGE, Duration::from_secs(10))
        .await
        .expect("Confirmation message not visible");

    let assertions = validate_submission(&url, body).expect("Failed to validate");
    let title = page.title().await.expect("Failed to get title");
    browser.close().await.expect("Failed to close browser");

    (title, url, assertions.mismatches)
}

#[tokio::test]
#[ignore = "requires a local Chrome and network access"]
async fn submits_fully_populated_form() {
    let body = WebFormRequest {
        text: Some("hello form".into()),
        password: Some("password456789".into()),
        textarea: Some("a longer message".into()),
        select: Some(SelectChoice::Two),
        check_default_checkbox: Some(true),
        radio: Some(RadioChoice::Checked),
        color: Some("#ffff00".into()),
        date: Some("2025-09-12".into()),
        range: Some(3.0),
        wait_after_submit_ms: Some(0),
    };

    let (title, url, mismatches) = submit_and_validate(&body).await;
    assert!(mismatches.is_empty(), "mismatches: {mismatches:?}");
    assert!(title.contains("Web form"), "title was: {title}");
    assert!(url.contains("submitted-form.html"), "url was: {url}");
}

#[tokio::test]
#[ignore = "requires a local Chrome and network access"]
async fn submits_with_only_required_text() {
    let body = WebFormRequest {
        text: Some("minimal".into()),
        wait_after_submit_ms: Some(0),
        ..Default::default()
    };

    let (_, url, mismatches) = submit_and_validate(&body).await;
    assert!(mismatches.is_empty(), "mismatches: {mismatches:?}");
    assert!(url.contains("submitted-form.html"));
}

#[tokio::test]
#[ignore = "requires a local Chrome and network access"]
async fn unchecked_default_checkbox_yields_one_my_check_param() {
    let body = WebFormRequest {
        text: Some("checkbox off".into()),
        check_default_checkbox: Some(false),
        wait_after_submit_ms: Some(0),
        ..Default::default()
    };

    let (_, url, mismatches) = submit_and_validate(&body).await;
    assert!(mismatches.is_empty(), "mismatches: {mismatches:?}");
    let count = url.matches("my-check=").count();
    assert_eq!(count, 1, "url was: {url}");
}

#[tokio::test]
#[ignore = "requires a local Chrome and network access"]
async fn absent_radio_is_left_untouched() {
    let browser = Browser::builder()
        .headless(true)
        .viewport(1920, 1080)
        .build()
        .await
        .expect("Failed to launch browser");

    let page = browser.new_page(FORM_URL).await.expect("Failed to open page");
    let body = WebFormRequest {
        text: Some("no radio".into()),
        ..Default::default()
    };
    let actions = fill_form(&page, &body, false).await.expect("Failed to fill form");

    assert!(
        actions.iter().all(|a| a.kind != "radio"),
        "actions: {actions:?}"
    );
    // The page's own default stays in place.
    assert!(page.is_checked("#my-radio-1").await.expect("Failed to read radio"));
    browser.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires a local Chrome, network access, and OPENAI_API_KEY"]
async fn agent_route_reports_actions_and_redacted_logs() {
    dotenvy::dotenv().ok();
    let app = router(AppState {
        settings: Arc::new(Settings::from_env()),
    });

    let request = Request::builder()
        .method("POST")
        .uri("/selenium/webform/agent")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({
                "text": "agent hello",
                "select": "Three",
                "date": "2025-09-12",
                "waitAfterSubmitMs": 0
            })
            .to_string(),
        ))
        .expect("request");

    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");

    assert_eq!(body["ok"], true, "body: {body}");
    assert!(
        body["url"]
            .as_str()
            .expect("url")
            .contains(SUBMITTED_URL_FRAGMENT),
        "body: {body}"
    );

    let actions = body["agent"]["actions"].as_array().expect("actions array");
    assert!(!actions.is_empty(), "no actions recorded: {body}");
    let logs = body["agent"]["logs"].as_array().expect("logs array");
    assert!(!logs.is_empty(), "no logs recorded: {body}");
    for log in logs {
        if log["category"] == "llm" {
            assert_eq!(log["message"], LLM_REDACTION, "log: {log}");
        }
    }
}
