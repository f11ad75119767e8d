use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::agent::{AgentConfig, AgentUsage, ComputerUseAgent};
use crate::browser::Browser;
use crate::config::{RuntimeEnv, Settings};
use crate::error::{Error, Result};
use crate::form::{
    build_instruction, fill_form, submit, ActionRecord, WebFormRequest, CONFIRMATION_HEADING,
    CONFIRMATION_MESSAGE, FORM_URL, SUBMITTED_URL_FRAGMENT, SUBMIT_BUTTON,
};
use crate::logs::{Auxiliary, LogCategory, LogSink, PublicLogLine};
use crate::page::Page;
use crate::screenshot::{FsScreenshotStore, ScreenshotMetadata, ScreenshotStatus, ScreenshotStore};
use crate::validate::{validate_submission, Assertions};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(15);
const TEXT_TIMEOUT: Duration = Duration::from_secs(10);
const FALLBACK_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Viewport for the deterministic route.
const FORM_VIEWPORT: (u32, u32) = (1920, 1080);
/// Smaller viewport recommended for computer-use agents.
const AGENT_VIEWPORT: (u32, u32) = (1024, 768);

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/selenium/webform", post(webform))
        .route("/selenium/webform/agent", post(webform_agent))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebFormResponse {
    pub ok: bool,
    pub request_id: String,
    pub title: String,
    pub url: String,
    pub assertions: Assertions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
}

#[derive(Serialize)]
pub struct AgentReport {
    pub success: bool,
    pub message: String,
    pub completed: bool,
    pub usage: AgentUsage,
    pub actions: Vec<ActionRecord>,
    pub logs: Vec<PublicLogLine>,
}

#[derive(Serialize)]
pub struct AgentWebFormResponse {
    #[serde(flatten)]
    pub base: WebFormResponse,
    pub agent: AgentReport,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "ok": false, "error": message.into() }))).into_response()
}

fn has_text(body: &WebFormRequest) -> bool {
    body.text.as_deref().is_some_and(|t| !t.is_empty())
}

/// Deterministic route: direct element interactions, no LLM involvement.
async fn webform(State(state): State<AppState>, Json(body): Json<WebFormRequest>) -> Response {
    let request_id = Uuid::new_v4().to_string();

    if !has_text(&body) {
        return error_response(StatusCode::BAD_REQUEST, "text is required");
    }
    if state.settings.openai_api_key.is_none() {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "OPENAI_API_KEY is missing");
    }

    tracing::info!(%request_id, "webform request");
    match run_webform(&state.settings, &request_id, &body).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::error!(%request_id, error = %e, "webform request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Agent route: deterministic fills plus an LLM-driven review-and-submit
/// pass, with redacted structured logs in the response.
async fn webform_agent(State(state): State<AppState>, Json(body): Json<WebFormRequest>) -> Response {
    let request_id = Uuid::new_v4().to_string();

    if !has_text(&body) {
        return error_response(StatusCode::BAD_REQUEST, "text is required");
    }
    let Some(api_key) = state.settings.openai_api_key.clone() else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "OPENAI_API_KEY is missing");
    };

    tracing::info!(%request_id, "webform agent request");
    match run_webform_agent(&state.settings, &request_id, &body, &api_key).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::error!(%request_id, error = %e, "webform agent request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Final page state shared by both routes.
struct Submission {
    title: String,
    url: String,
    assertions: Assertions,
    screenshot: Option<Vec<u8>>,
}

async fn open_browser(settings: &Settings, viewport: (u32, u32)) -> Result<Browser> {
    match settings.runtime_env {
        RuntimeEnv::Local => {
            Browser::builder()
                .headless(true)
                .viewport(viewport.0, viewport.1)
                .build()
                .await
        }
        RuntimeEnv::Browserbase => {
            let project_id = settings.browserbase_project_id.as_deref().ok_or_else(|| {
                Error::Config("BROWSERBASE_PROJECT_ID is required for BROWSERBASE environment".into())
            })?;
            let api_key = settings.browserbase_api_key.as_deref().ok_or_else(|| {
                Error::Config("BROWSERBASE_API_KEY is required for BROWSERBASE environment".into())
            })?;
            Browser::connect_browserbase(
                project_id,
                api_key,
                viewport,
                Duration::from_secs(30),
            )
            .await
        }
    }
}

async fn run_webform(
    settings: &Settings,
    request_id: &str,
    body: &WebFormRequest,
) -> Result<WebFormResponse> {
    let capture = settings.screenshot_dir.is_some();
    let browser = open_browser(settings, FORM_VIEWPORT).await?;
    let driven = drive_deterministic(&browser, body, capture).await;
    let closed = browser.close().await;
    if let Err(e) = closed {
        tracing::warn!(error = %e, "browser close failed");
    }
    let submission = driven?;

    let screenshot_url = persist_screenshot(
        settings,
        request_id,
        "webform",
        &submission,
    )
    .await;

    Ok(WebFormResponse {
        ok: submission.assertions.ok(),
        request_id: request_id.to_string(),
        title: submission.title,
        url: submission.url,
        assertions: submission.assertions,
        screenshot_url,
    })
}

async fn drive_deterministic(
    browser: &Browser,
    body: &WebFormRequest,
    capture: bool,
) -> Result<Submission> {
    let page = browser.new_page(FORM_URL).await?;
    fill_form(&page, body, false).await?;
    submit(&page).await?;
    confirm(&page).await?;
    finish(&page, body, capture).await
}

async fn run_webform_agent(
    settings: &Settings,
    request_id: &str,
    body: &WebFormRequest,
    api_key: &str,
) -> Result<AgentWebFormResponse> {
    let capture = settings.screenshot_dir.is_some();
    let sink = LogSink::new();
    let browser = open_browser(settings, AGENT_VIEWPORT).await?;
    let driven = drive_agent(&browser, settings, body, api_key, &sink, capture).await;
    if let Err(e) = browser.close().await {
        tracing::warn!(error = %e, "browser close failed");
    }
    let (submission, agent) = driven?;

    let screenshot_url = persist_screenshot(
        settings,
        request_id,
        "webform-agent",
        &submission,
    )
    .await;

    Ok(AgentWebFormResponse {
        base: WebFormResponse {
            ok: submission.assertions.ok(),
            request_id: request_id.to_string(),
            title: submission.title,
            url: submission.url,
            assertions: submission.assertions,
            screenshot_url,
        },
        agent,
    })
}

async fn drive_agent(
    browser: &Browser,
    settings: &Settings,
    body: &WebFormRequest,
    api_key: &str,
    sink: &LogSink,
    capture: bool,
) -> Result<(Submission, AgentReport)> {
    let page = browser.new_page(FORM_URL).await?;
    sink.push_with(
        LogCategory::Browser,
        "navigated to the web form",
        Some(Auxiliary {
            url: Some(FORM_URL.to_string()),
            execution_time: None,
        }),
    );

    let mut actions: Vec<ActionRecord> = Vec::new();
    let (fill_ok, fill_error) = match fill_form(&page, body, true).await {
        Ok(records) => {
            for record in &records {
                sink.push(LogCategory::Action, format!("{} {}", record.kind, record.field));
            }
            actions.extend(records);
            (true, None)
        }
        Err(e) => {
            sink.push(LogCategory::Error, format!("deterministic fill failed: {e}"));
            (false, Some(e.to_string()))
        }
    };

    let instruction = build_instruction(body);
    let agent = ComputerUseAgent::new(
        api_key,
        AgentConfig {
            model: settings.model.clone(),
            ..Default::default()
        },
        sink.clone(),
    );
    let outcome = agent.execute(&page, &instruction).await;
    actions.extend(outcome.actions);

    if confirm(&page).await.is_err() {
        sink.push(
            LogCategory::Error,
            "confirmation page not detected, attempting manual submit",
        );
        if let Ok(bytes) = page.screenshot().await {
            sink.push(
                LogCategory::Browser,
                format!("debug screenshot captured ({} bytes)", bytes.len()),
            );
        }

        let on_confirmation = page
            .url()
            .await
            .map(|u| u.contains(SUBMITTED_URL_FRAGMENT))
            .unwrap_or(false);
        if !on_confirmation && page.click(SUBMIT_BUTTON).await.is_ok() {
            actions.push(ActionRecord::new("click", "submit", "fallback-submit"));
            match page
                .wait_for_url_contains(SUBMITTED_URL_FRAGMENT, FALLBACK_SUBMIT_TIMEOUT)
                .await
            {
                Ok(_) => sink.push(LogCategory::Browser, "manual submission succeeded"),
                Err(e) => sink.push(LogCategory::Error, format!("manual submission failed: {e}")),
            }
        }
    }

    let submission = finish(&page, body, capture).await?;

    let success = fill_ok && outcome.success;
    let message = match fill_error {
        Some(error) => format!("Form filling failed: {error}"),
        None => outcome.message,
    };

    Ok((
        submission,
        AgentReport {
            success,
            message,
            completed: outcome.completed,
            usage: outcome.usage,
            actions,
            logs: sink.drain(),
        },
    ))
}

/// Wait out the navigation to the confirmation page and its two fixed texts.
async fn confirm(page: &Page) -> Result<()> {
    page.wait_for_url_contains(SUBMITTED_URL_FRAGMENT, NAVIGATION_TIMEOUT)
        .await?;
    page.wait_for_text(CONFIRMATION_HEADING, TEXT_TIMEOUT).await?;
    page.wait_for_text(CONFIRMATION_MESSAGE, TEXT_TIMEOUT).await?;
    Ok(())
}

/// Validate the final URL, honor the post-submit wait, and collect the
/// page title (and screenshot, when persistence is configured).
async fn finish(page: &Page, body: &WebFormRequest, capture: bool) -> Result<Submission> {
    let url = page.url().await?;
    let assertions = validate_submission(&url, body)?;
    tokio::time::sleep(body.wait_after_submit()).await;
    let title = page.title().await?;
    let screenshot = if capture { page.screenshot().await.ok() } else { None };
    Ok(Submission {
        title,
        url,
        assertions,
        screenshot,
    })
}

async fn persist_screenshot(
    settings: &Settings,
    request_id: &str,
    handler: &str,
    submission: &Submission,
) -> Option<String> {
    let dir = settings.screenshot_dir.as_ref()?;
    let png = submission.screenshot.as_deref()?;
    let status = if submission.assertions.ok() {
        ScreenshotStatus::Success
    } else {
        ScreenshotStatus::Error
    };
    let store = FsScreenshotStore::new(dir);
    let metadata = ScreenshotMetadata {
        request_id: request_id.to_string(),
        handler: handler.to_string(),
        status,
    };
    match store.save(png, &metadata).await {
        Ok(saved) => Some(saved.url),
        Err(e) => {
            tracing::warn!(error = %e, "screenshot persistence failed");
            None
        }
    }
}
