//! Probe Client and Outcome Record.
//!
//! One operation: issue a single HTTP request and classify the result into a
//! [`ProbeOutcome`]. The client never returns an `Err` for a network-level
//! failure — those are encoded in the outcome itself so the scheduler's
//! one-probe-one-outcome invariant holds regardless of what happened on the
//! wire.

use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::{Method, DEFAULT_HEADER_NAME, DEFAULT_HEADER_VALUE};

/// Immutable record of one probe. Its row projection for the remote store is
/// the ordered tuple `(url, method, request_timestamp, regex_check_required,
/// contains_regex, contains_exception, status_code, response_timestamp,
/// regex, exception)`.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub url: String,
    pub method: Method,
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
    pub status_code: Option<i32>,
    pub regex_check_required: bool,
    pub regex: Option<String>,
    pub contains_regex: bool,
    pub contains_exception: bool,
    pub exception: Option<String>,
}

/// Programmer error: invalid input to `probe()`, never produces an outcome.
#[derive(Debug, thiserror::Error)]
pub enum ProbeInputError {
    #[error("timeout must be greater than zero")]
    NonPositiveTimeout,
}

/// Performs one HTTP request and classifies the outcome. Cheap to clone;
/// wraps a pooled `reqwest::Client`.
#[derive(Clone)]
pub struct ProbeClient {
    client: reqwest::Client,
}

impl ProbeClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn probe(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
        regex_required: bool,
        regex: Option<&str>,
    ) -> Result<ProbeOutcome, ProbeInputError> {
        if timeout.is_zero() {
            return Err(ProbeInputError::NonPositiveTimeout);
        }

        let request_timestamp = Utc::now();
        let reqwest_method = match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::HEAD => reqwest::Method::HEAD,
            Method::OPTION => reqwest::Method::OPTIONS,
        };

        let result = self
            .client
            .request(reqwest_method, url)
            .header(DEFAULT_HEADER_NAME, DEFAULT_HEADER_VALUE)
            .timeout(timeout)
            .send()
            .await;

        let outcome = match result {
            Ok(response) => {
                let status_code = response.status().as_u16() as i32;
                match response.text().await {
                    Ok(body) => {
                        let contains_regex = regex_required
                            && regex
                                .and_then(|pattern| Regex::new(pattern).ok())
                                .map(|re| re.is_match(&body))
                                .unwrap_or(false);
                        ProbeOutcome {
                            url: url.to_string(),
                            method,
                            request_timestamp,
                            response_timestamp: Utc::now(),
                            status_code: Some(status_code),
                            regex_check_required: regex_required,
                            regex: regex.map(str::to_string),
                            contains_regex,
                            contains_exception: false,
                            exception: None,
                        }
                    }
                    Err(e) => Self::failure(
                        url,
                        method,
                        request_timestamp,
                        regex_required,
                        regex,
                        format!("body read failed: {e}"),
                    ),
                }
            }
            Err(e) => Self::failure(
                url,
                method,
                request_timestamp,
                regex_required,
                regex,
                e.to_string(),
            ),
        };

        Ok(outcome)
    }

    fn failure(
        url: &str,
        method: Method,
        request_timestamp: DateTime<Utc>,
        regex_required: bool,
        regex: Option<&str>,
        exception: String,
    ) -> ProbeOutcome {
        ProbeOutcome {
            url: url.to_string(),
            method,
            request_timestamp,
            response_timestamp: Utc::now(),
            status_code: None,
            regex_check_required: regex_required,
            regex: regex.map(str::to_string),
            contains_regex: false,
            contains_exception: true,
            exception: Some(exception),
        }
    }
}

impl Default for ProbeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn healthy_get_has_no_exception() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = ProbeClient::new();
        let outcome = client
            .probe(Method::GET, &server.uri(), Duration::from_secs(5), false, None)
            .await
            .unwrap();

        assert_eq!(outcome.status_code, Some(200));
        assert!(!outcome.contains_exception);
        assert!(!outcome.contains_regex);
    }

    #[tokio::test]
    async fn regex_match_is_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello world"))
            .mount(&server)
            .await;

        let client = ProbeClient::new();
        let outcome = client
            .probe(
                Method::GET,
                &server.uri(),
                Duration::from_secs(5),
                true,
                Some("hello"),
            )
            .await
            .unwrap();

        assert!(outcome.contains_regex);
    }

    #[tokio::test]
    async fn regex_mismatch_on_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = ProbeClient::new();
        let outcome = client
            .probe(
                Method::GET,
                &server.uri(),
                Duration::from_secs(5),
                true,
                Some("x"),
            )
            .await
            .unwrap();

        assert!(!outcome.contains_regex);
        assert_eq!(outcome.status_code, Some(204));
    }

    #[tokio::test]
    async fn transport_failure_yields_exception_outcome() {
        let client = ProbeClient::new();
        let outcome = client
            .probe(
                Method::GET,
                "http://127.0.0.1:1",
                Duration::from_millis(200),
                false,
                None,
            )
            .await
            .unwrap();

        assert!(outcome.contains_exception);
        assert!(outcome.status_code.is_none());
        assert!(outcome.exception.is_some());
    }

    #[tokio::test]
    async fn zero_timeout_is_a_programmer_error() {
        let client = ProbeClient::new();
        let err = client
            .probe(Method::GET, "https://example.com", Duration::ZERO, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeInputError::NonPositiveTimeout));
    }
}
