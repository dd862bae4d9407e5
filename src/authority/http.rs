//! Blocking HTTP client for the lifecycle authority.
//!
//! Wire format:
//! - `POST {base}/dumps/states` with `{"ids":[1,2]}` answers `{"1":"completed"}`.
//! - `POST {base}/prune` answers `{"id":42}`, or `204 No Content` / `{"id":null}`
//!   / `null` when nothing is prunable.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::authority::{EvictionTarget, LifecycleAuthority};
use crate::core::config::AuthorityConfig;
use crate::core::errors::{JanitorError, Result};

const STATES_OP: &str = "states";
const PRUNE_OP: &str = "prune";

#[derive(Debug, Serialize)]
struct StatesRequest<'a> {
    ids: &'a [i64],
}

#[derive(Debug, Deserialize)]
struct PruneResponse {
    id: Option<i64>,
}

/// Authority reached over HTTP. Every request carries the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    base_url: String,
    http: Client,
}

impl HttpAuthority {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| JanitorError::Authority {
                operation: "connect",
                details: error.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &AuthorityConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    fn post_json<B: Serialize>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, String)> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .map_err(|error| transport_error(operation, &error))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(JanitorError::AuthorityStatus {
                operation,
                status: status.as_u16(),
            });
        }
        let text = resp
            .text()
            .map_err(|error| transport_error(operation, &error))?;
        Ok((status, text))
    }
}

impl LifecycleAuthority for HttpAuthority {
    fn states(&self, ids: &[i64]) -> Result<HashMap<i64, String>> {
        let (_, body) = self.post_json(STATES_OP, "/dumps/states", &StatesRequest { ids })?;
        parse_states_body(&body)
    }

    fn prune(&self) -> Result<EvictionTarget> {
        let (status, body) = self.post_json(PRUNE_OP, "/prune", &serde_json::json!({}))?;
        if status == StatusCode::NO_CONTENT {
            return Ok(EvictionTarget::exhausted());
        }
        parse_prune_body(&body)
    }
}

fn transport_error(operation: &'static str, error: &reqwest::Error) -> JanitorError {
    JanitorError::Authority {
        operation,
        details: error.to_string(),
    }
}

fn parse_states_body(body: &str) -> Result<HashMap<i64, String>> {
    serde_json::from_str(body).map_err(|error| JanitorError::Authority {
        operation: STATES_OP,
        details: format!("malformed response: {error}"),
    })
}

fn parse_prune_body(body: &str) -> Result<EvictionTarget> {
    if body.trim().is_empty() {
        return Ok(EvictionTarget::exhausted());
    }
    let parsed: Option<PruneResponse> =
        serde_json::from_str(body).map_err(|error| JanitorError::Authority {
            operation: PRUNE_OP,
            details: format!("malformed response: {error}"),
        })?;
    Ok(match parsed.and_then(|resp| resp.id) {
        Some(id) => EvictionTarget::prunable(id),
        None => EvictionTarget::exhausted(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one HTTP exchange and hand back the raw request.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut buf = [0_u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let content_length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (base, handle)
    }

    fn client(base: &str) -> HttpAuthority {
        HttpAuthority::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn states_posts_ids_and_parses_string_keys() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", r#"{"1":"completed","2":"errored"}"#);
        let states = client(&base).states(&[1, 2, 3]).unwrap();
        let request = server.join().unwrap();

        assert!(request.starts_with("POST /dumps/states"));
        assert!(request.contains(r#"{"ids":[1,2,3]}"#));
        assert_eq!(states.len(), 2);
        assert_eq!(states[&1], "completed");
        assert_eq!(states[&2], "errored");
        assert!(!states.contains_key(&3));
    }

    #[test]
    fn prune_returns_target_id() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", r#"{"id":42}"#);
        let target = client(&base).prune().unwrap();
        let request = server.join().unwrap();
        assert!(request.starts_with("POST /prune"));
        assert_eq!(target, EvictionTarget::prunable(42));
    }

    #[test]
    fn prune_no_content_means_exhausted() {
        let (base, server) = serve_once("HTTP/1.1 204 No Content", "");
        let target = client(&base).prune().unwrap();
        server.join().unwrap();
        assert!(!target.prunable);
    }

    #[test]
    fn server_error_maps_to_status_error() {
        let (base, server) = serve_once("HTTP/1.1 503 Service Unavailable", "{}");
        let err = client(&base).states(&[1]).expect_err("503 must fail");
        server.join().unwrap();
        assert!(matches!(
            err,
            JanitorError::AuthorityStatus {
                operation: "states",
                status: 503
            }
        ));
    }

    #[test]
    fn unreachable_authority_is_a_transport_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = client(&format!("http://127.0.0.1:{port}"))
            .prune()
            .expect_err("nothing listens on the port");
        assert_eq!(err.code(), "BJ-2201");
    }

    #[test]
    fn prune_body_variants() {
        assert_eq!(parse_prune_body("").unwrap(), EvictionTarget::exhausted());
        assert_eq!(parse_prune_body("null").unwrap(), EvictionTarget::exhausted());
        assert_eq!(
            parse_prune_body(r#"{"id":null}"#).unwrap(),
            EvictionTarget::exhausted()
        );
        assert_eq!(
            parse_prune_body(r#"{"id":7}"#).unwrap(),
            EvictionTarget::prunable(7)
        );
        assert!(parse_prune_body("[1]").is_err());
    }

    #[test]
    fn malformed_states_body_is_rejected() {
        let err = parse_states_body(r#"{"one":"completed"}"#).expect_err("non-integer key");
        assert_eq!(err.code(), "BJ-2201");
        assert!(parse_states_body("{}").unwrap().is_empty());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HttpAuthority::new("http://api:3186/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url, "http://api:3186");
    }
}
