//! Best-effort HTTP probes against the local API server.
//!
//! A probe never fails the deployment: every transport error, timeout or
//! non-JSON response becomes a `HealthOutcome::Failed` value.

use std::error::Error as _;

use log::warn;
use serde_json::Value;

use super::spec::HealthProbe;

/// Longest slice of a non-JSON body quoted back to the operator.
const MAX_QUOTED_BODY: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub enum HealthOutcome {
    /// The endpoint answered with a JSON document.
    Json { status: u16, body: Value },
    /// Unreachable, timed out, or answered with something that is not JSON.
    Failed { reason: String },
    /// The probe was not attempted.
    Skipped { reason: String },
}

impl HealthOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthOutcome::Json { status, .. } if (200..300).contains(status))
    }

    /// Operator-facing rendering: pretty JSON, or a one-line reason.
    pub fn render(&self) -> String {
        match self {
            HealthOutcome::Json { status, body } => {
                let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
                format!("HTTP {status}\n{pretty}")
            }
            HealthOutcome::Failed { reason } => format!("unavailable: {reason}"),
            HealthOutcome::Skipped { reason } => format!("skipped: {reason}"),
        }
    }
}

/// GET `probe.url` and parse the body as JSON.
pub async fn probe(client: &reqwest::Client, probe: &HealthProbe) -> HealthOutcome {
    let mut request = client.get(&probe.url).timeout(probe.timeout);
    if let Some(token) = &probe.auth_token {
        request = request.header("X-Auth-Token", token);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let reason = error_chain(&e);
            warn!("Probe {} failed: {}", probe.url, reason);
            return HealthOutcome::Failed { reason };
        }
    };

    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            let reason = format!("HTTP {status}, body unreadable: {}", error_chain(&e));
            warn!("Probe {} failed: {}", probe.url, reason);
            return HealthOutcome::Failed { reason };
        }
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(body) => HealthOutcome::Json { status, body },
        Err(_) => {
            let quoted: String = text.chars().take(MAX_QUOTED_BODY).collect();
            let reason = format!("HTTP {status}, non-JSON body: {}", quoted.trim());
            warn!("Probe {} failed: {}", probe.url, reason);
            HealthOutcome::Failed { reason }
        }
    }
}

/// reqwest hides the interesting part (refused, timed out) in the source chain.
fn error_chain(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_2xx_json_is_healthy() {
        let ok = HealthOutcome::Json {
            status: 200,
            body: json!({"status": "ok"}),
        };
        let unauthorized = HealthOutcome::Json {
            status: 401,
            body: json!({"error": "unauthorized"}),
        };
        assert!(ok.is_healthy());
        assert!(!unauthorized.is_healthy());
        assert!(!HealthOutcome::Failed { reason: "refused".into() }.is_healthy());
    }

    #[test]
    fn render_pretty_prints_json() {
        let outcome = HealthOutcome::Json {
            status: 200,
            body: json!({"status": "ok", "db_exists": true}),
        };
        let rendered = outcome.render();
        assert!(rendered.starts_with("HTTP 200\n{"));
        assert!(rendered.contains("\n  \"status\": \"ok\""));
    }

    #[tokio::test]
    async fn invalid_url_is_a_failed_outcome() {
        let client = reqwest::Client::new();
        let outcome = probe(&client, &HealthProbe::new("not a url")).await;
        assert!(matches!(outcome, HealthOutcome::Failed { .. }));
    }
}
