use std::collections::HashMap;

use chrono::{DateTime, Utc};
use url::{Host, Url};

use crate::error::CheckError;
use crate::types::{SiteFilters, URL_MAX_LEN};

/// Schemes accepted for a site URL.
const ALLOWED_SCHEMES: [&str; 4] = ["http", "https", "ftp", "ftps"];

/// Extract and validate the mandatory `url` parameter. Unknown parameters
/// are rejected before anything else, one message per name.
pub fn site_url(params: &HashMap<String, String>) -> Result<String, CheckError> {
    reject_unknown(params, &["url"])?;
    let raw = required(params, "url")?;
    let failures = url_failures(raw);
    if failures.is_empty() {
        Ok(raw.to_string())
    } else {
        Err(CheckError::Validation(failures))
    }
}

/// Parse the optional listing filters. Each known field is validated in
/// turn; leftover unknown names are rejected only after every known field
/// passes.
pub fn site_filters(params: &HashMap<String, String>) -> Result<SiteFilters, CheckError> {
    let filters = SiteFilters {
        contains_profanity: optional_bool(params, "contains_profanity")?,
        last_check_after: optional_datetime(params, "last_check_after")?,
        last_status_update_after: optional_datetime(params, "last_status_update_after")?,
    };
    reject_unknown(
        params,
        &[
            "contains_profanity",
            "last_check_after",
            "last_status_update_after",
        ],
    )?;
    Ok(filters)
}

fn reject_unknown(params: &HashMap<String, String>, known: &[&str]) -> Result<(), CheckError> {
    let mut unknown: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|name| !known.contains(name))
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    Err(CheckError::Validation(
        unknown
            .into_iter()
            .map(|name| format!("Unknown parameter '{name}'."))
            .collect(),
    ))
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, CheckError> {
    let value = params.get(name).ok_or_else(|| {
        CheckError::Validation(vec![format!("Parameter '{name}' is required.")])
    })?;
    if value.is_empty() {
        return Err(CheckError::Validation(vec![format!(
            "Parameter '{name}' must not be blank."
        )]));
    }
    Ok(value)
}

fn present<'a>(
    params: &'a HashMap<String, String>,
    name: &str,
) -> Result<Option<&'a str>, CheckError> {
    match params.get(name) {
        None => Ok(None),
        Some(value) if value.is_empty() => Err(CheckError::Validation(vec![format!(
            "Parameter '{name}' must not be blank."
        )])),
        Some(value) => Ok(Some(value)),
    }
}

/// Every syntax violation for a candidate site URL, collected together so
/// the client sees them all at once.
fn url_failures(raw: &str) -> Vec<String> {
    let mut failures = Vec::new();
    if !is_valid_site_url(raw) {
        failures.push("Enter a valid URL.".to_string());
    }
    let length = raw.chars().count();
    if length > URL_MAX_LEN {
        failures.push(format!(
            "Ensure this value has at most {URL_MAX_LEN} characters (it has {length})."
        ));
    }
    failures
}

fn is_valid_site_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return false;
    }
    match url.host() {
        // Bare hostnames like "asdf" are not site URLs; require a dot,
        // except for localhost.
        Some(Host::Domain(domain)) => {
            domain == "localhost"
                || (domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'))
        }
        Some(_) => true,
        None => false,
    }
}

fn optional_bool(
    params: &HashMap<String, String>,
    name: &str,
) -> Result<Option<bool>, CheckError> {
    let Some(value) = present(params, name)? else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(Some(true)),
        "false" | "0" => Ok(Some(false)),
        _ => Err(CheckError::Validation(vec![format!(
            "Parameter '{name}' must be a boolean."
        )])),
    }
}

fn optional_datetime(
    params: &HashMap<String, String>,
    name: &str,
) -> Result<Option<DateTime<Utc>>, CheckError> {
    let Some(value) = present(params, name)? else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| Some(parsed.with_timezone(&Utc)))
        .map_err(|_| {
            CheckError::Validation(vec![format!(
                "Parameter '{name}' must be an RFC 3339 datetime."
            )])
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    fn messages(err: CheckError) -> Vec<String> {
        match err {
            CheckError::Validation(messages) => messages,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn missing_url_is_required() {
        let err = site_url(&params(&[])).unwrap_err();
        assert_eq!(messages(err), vec!["Parameter 'url' is required."]);
    }

    #[test]
    fn blank_url_is_rejected() {
        let err = site_url(&params(&[("url", "")])).unwrap_err();
        assert_eq!(messages(err), vec!["Parameter 'url' must not be blank."]);
    }

    #[test]
    fn bare_hostname_is_not_a_valid_url() {
        let err = site_url(&params(&[("url", "https://asdf")])).unwrap_err();
        assert_eq!(messages(err), vec!["Enter a valid URL."]);
    }

    #[test]
    fn oversized_invalid_url_reports_both_violations() {
        let raw = format!("https://{}", "a".repeat(2014));
        assert_eq!(raw.chars().count(), 2022);
        let err = site_url(&params(&[("url", &raw)])).unwrap_err();
        assert_eq!(
            messages(err),
            vec![
                "Enter a valid URL.",
                "Ensure this value has at most 2000 characters (it has 2022).",
            ]
        );
    }

    #[test]
    fn unknown_parameters_are_rejected_first() {
        let err = site_url(&params(&[("b", "2"), ("a", "1")])).unwrap_err();
        assert_eq!(
            messages(err),
            vec!["Unknown parameter 'a'.", "Unknown parameter 'b'."]
        );
    }

    #[test]
    fn dotted_hosts_localhost_and_ips_are_valid() {
        for raw in [
            "https://www.example.com/path?x=1",
            "http://localhost:8000/",
            "http://127.0.0.1:9/page",
        ] {
            assert_eq!(site_url(&params(&[("url", raw)])).unwrap(), raw);
        }
    }

    #[test]
    fn unsupported_schemes_are_invalid() {
        let err = site_url(&params(&[("url", "file:///etc/passwd")])).unwrap_err();
        assert_eq!(messages(err), vec!["Enter a valid URL."]);
    }

    #[test]
    fn verdict_filter_parses_booleans_loosely() {
        let filters = site_filters(&params(&[("contains_profanity", "True")])).unwrap();
        assert_eq!(filters.contains_profanity, Some(true));
        let filters = site_filters(&params(&[("contains_profanity", "0")])).unwrap();
        assert_eq!(filters.contains_profanity, Some(false));

        let err = site_filters(&params(&[("contains_profanity", "banana")])).unwrap_err();
        assert_eq!(
            messages(err),
            vec!["Parameter 'contains_profanity' must be a boolean."]
        );
    }

    #[test]
    fn listing_field_errors_precede_unknown_rejection() {
        let err = site_filters(&params(&[("contains_profanity", "banana"), ("extra", "1")]))
            .unwrap_err();
        assert_eq!(
            messages(err),
            vec!["Parameter 'contains_profanity' must be a boolean."]
        );

        let err = site_filters(&params(&[("contains_profanity", "true"), ("extra", "1")]))
            .unwrap_err();
        assert_eq!(messages(err), vec!["Unknown parameter 'extra'."]);
    }

    #[test]
    fn timestamp_filters_parse_rfc3339() {
        let filters =
            site_filters(&params(&[("last_check_after", "2024-05-01T12:00:00Z")])).unwrap();
        assert_eq!(
            filters.last_check_after.unwrap().to_rfc3339(),
            "2024-05-01T12:00:00+00:00"
        );

        let err = site_filters(&params(&[("last_status_update_after", "yesterday")])).unwrap_err();
        assert_eq!(
            messages(err),
            vec!["Parameter 'last_status_update_after' must be an RFC 3339 datetime."]
        );
    }
}
