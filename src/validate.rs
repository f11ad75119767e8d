use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::form::WebFormRequest;

/// Outcome of diffing the confirmation page's query parameters against the
/// requested field values. Mismatches are data, not errors: the request still
/// succeeds, it just reports `ok: false`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertions {
    pub url_values_ok: bool,
    pub mismatches: Vec<String>,
}

impl Assertions {
    pub fn ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Convert "YYYY-MM-DD" to the locale form "MM/DD/YYYY".
fn to_locale_date(iso: &str) -> Option<String> {
    let mut parts = iso.splitn(3, '-');
    let year = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?;
    Some(format!("{month}/{day}/{year}"))
}

/// Parse the confirmation URL and compare each requested field's value
/// against the observed query parameter, accumulating human-readable
/// mismatch strings rather than halting on the first failure.
pub fn validate_submission(final_url: &str, body: &WebFormRequest) -> Result<Assertions> {
    let url = Url::parse(final_url)
        .map_err(|e| Error::NavigationError(format!("Invalid final URL {final_url}: {e}")))?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let get = |key: &str| -> Option<&str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    let mut mismatches = Vec::new();
    let mut expect_eq = |key: &str, expected: Option<&str>| {
        let Some(expected) = expected else { return };
        let actual = get(key);
        if actual != Some(expected) {
            mismatches.push(format!(
                "{key}: expected \"{expected}\", got \"{}\"",
                actual.unwrap_or("null")
            ));
        }
    };

    expect_eq("my-text", body.text.as_deref());
    expect_eq("my-password", body.password.as_deref());
    expect_eq("my-textarea", body.textarea.as_deref());
    expect_eq("my-select", body.select.map(|s| s.wire_value()));
    expect_eq("my-colors", body.color.as_deref());

    let range_rendered = body.range.map(|r| r.to_string());
    expect_eq("my-range", range_rendered.as_deref());

    // The form serializes the date either as ISO or as MM/DD/YYYY depending
    // on the browser environment; both count as a match.
    if let Some(ref date) = body.date {
        let locale = to_locale_date(date);
        match get("my-date") {
            Some(actual) if actual == date || Some(actual) == locale.as_deref() => {}
            Some(actual) => mismatches.push(format!(
                "my-date: expected \"{date}\" or \"{}\", got \"{actual}\"",
                locale.unwrap_or_default()
            )),
            None => mismatches.push(format!("my-date: expected \"{date}\", got null")),
        }
    }

    // Two same-named checkboxes, one checked by default. Toggling the default
    // one on yields two my-check parameters; leaving it off yields one.
    if let Some(want) = body.check_default_checkbox {
        let count = pairs.iter().filter(|(k, _)| k == "my-check").count();
        let expected_count = if want { 2 } else { 1 };
        if count != expected_count {
            mismatches.push(format!(
                "my-check count: expected {expected_count}, got {count}"
            ));
        }
    }

    Ok(Assertions {
        url_values_ok: mismatches.is_empty(),
        mismatches,
    })
}
