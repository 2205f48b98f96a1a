// JSON-over-HTTP transport with a small bounded retry loop.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::HttpSettings;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{method} {url} failed after {attempts} attempt(s): {last}")]
    Exhausted {
        method: &'static str,
        url: String,
        attempts: u32,
        last: String,
    },
}

/// The only network seam adapters see.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError>;
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    retries: u32,
    backoff: (f64, f64),
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            client,
            retries: settings.retries,
            backoff: (settings.backoff_min_secs, settings.backoff_max_secs),
        })
    }

    /// First try plus retries.
    fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    async fn send_once(&self, req: reqwest::RequestBuilder) -> Result<Value, String> {
        let res = req
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = res.status();
        if status != reqwest::StatusCode::OK {
            let body = res.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(format!("{}: {}", status.as_u16(), snippet));
        }
        res.json::<Value>().await.map_err(|e| e.to_string())
    }

    async fn with_retries<F>(&self, method: &'static str, url: &str, build: F) -> Result<Value, TransportError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let attempts = self.attempts();
        let mut last = String::new();
        for attempt in 1..=attempts {
            match self.send_once(build()).await {
                Ok(v) => {
                    debug!(method, url, attempt, "request ok");
                    return Ok(v);
                }
                Err(e) => {
                    warn!(method, url, attempt, error = %e, "request failed");
                    last = e;
                }
            }
            if attempt < attempts {
                let secs = rand::thread_rng().gen_range(self.backoff.0..=self.backoff.1);
                tokio::time::sleep(Duration::from_secs_f64(secs)).await;
            }
        }
        Err(TransportError::Exhausted { method, url: url.to_string(), attempts, last })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        self.with_retries("GET", url, || self.client.get(url)).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, TransportError> {
        self.with_retries("POST", url, || self.client.post(url).json(body)).await
    }
}

/// Canned responses keyed by URL, for adapter tests.
#[cfg(test)]
pub(crate) mod fixture {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FixtureTransport {
        responses: HashMap<String, Value>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FixtureTransport {
        pub fn with(mut self, url: &str, body: Value) -> Self {
            self.responses.insert(url.to_string(), body);
            self
        }

        fn lookup(&self, method: &'static str, url: &str) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses.get(url).cloned().ok_or_else(|| TransportError::Exhausted {
                method,
                url: url.to_string(),
                attempts: 1,
                last: "404: no fixture".into(),
            })
        }
    }

    #[async_trait::async_trait]
    impl Transport for FixtureTransport {
        async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
            self.lookup("GET", url)
        }

        async fn post_json(&self, url: &str, _body: &Value) -> Result<Value, TransportError> {
            self.lookup("POST", url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_from_defaults() {
        let t = HttpTransport::new(&HttpSettings::default()).unwrap();
        assert_eq!(t.retries, 2);
        assert_eq!(t.backoff, (0.4, 1.6));
    }

    #[test]
    fn test_attempts_saturate() {
        let settings = HttpSettings { retries: u32::MAX, ..Default::default() };
        let t = HttpTransport::new(&settings).unwrap();
        assert_eq!(t.attempts(), u32::MAX);
    }

    #[tokio::test]
    async fn test_unreachable_host_exhausts_retries() {
        let settings = HttpSettings {
            retries: 1,
            backoff_min_secs: 0.0,
            backoff_max_secs: 0.0,
            connect_timeout_secs: 1,
            request_timeout_secs: 1,
            ..Default::default()
        };
        let t = HttpTransport::new(&settings).unwrap();
        // port 9 (discard) on localhost is normally closed
        let err = t.get_json("http://127.0.0.1:9/markets").await.unwrap_err();
        match err {
            TransportError::Exhausted { attempts, method, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(method, "GET");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
