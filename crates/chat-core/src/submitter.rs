use crate::generator::MessageRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;

pub type SubmitFuture<'a> =
    Pin<Box<dyn std::future::Future<Output = Result<SendOutcome>> + Send + 'a>>;

/// Why a send did not reach the transport layer's far side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Other,
}

impl From<&reqwest::Error> for TransportErrorKind {
    fn from(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendStatus {
    /// 2xx with a JSON body; the body is kept but not inspected.
    Delivered(serde_json::Value),
    /// Non-2xx HTTP status.
    Rejected(u16),
    /// 2xx whose body was not valid JSON.
    BadBody,
    Transport(TransportErrorKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub status: SendStatus,
    pub latency_ms: u64,
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, SendStatus::Delivered(_))
    }
}

/// Trait for message submission adapters
pub trait MessageSubmitter: Send + Sync {
    fn name(&self) -> &'static str;

    fn submit<'a>(&'a self, message: &'a MessageRecord) -> SubmitFuture<'a>;
}

/// In-process submitter: sleeps for a fixed delay, then succeeds unless the
/// 1-based call number was marked to fail.
pub struct MockSubmitter {
    delay_ms: u64,
    fail_calls: HashSet<u64>,
    fail_all: bool,
    calls: AtomicU64,
}

impl MockSubmitter {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            fail_calls: HashSet::new(),
            fail_all: false,
            calls: AtomicU64::new(0),
        }
    }

    pub fn failing_calls(mut self, calls: impl IntoIterator<Item = u64>) -> Self {
        self.fail_calls.extend(calls);
        self
    }

    /// Every call resolves as a connection failure.
    pub fn unreachable(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MessageSubmitter for MockSubmitter {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn submit<'a>(&'a self, message: &'a MessageRecord) -> SubmitFuture<'a> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }

            let status = if self.fail_all {
                SendStatus::Transport(TransportErrorKind::Connect)
            } else if self.fail_calls.contains(&call) {
                SendStatus::Rejected(500)
            } else {
                SendStatus::Delivered(serde_json::to_value(message)?)
            };

            Ok(SendOutcome {
                status,
                latency_ms: self.delay_ms,
            })
        })
    }
}

/// HTTP/JSON submitter for the message store's `POST /message`.
pub struct HttpJsonSubmitter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpJsonSubmitter {
    pub fn new(base_url: &str, timeout_ms: Option<u64>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/message", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl MessageSubmitter for HttpJsonSubmitter {
    fn name(&self) -> &'static str {
        "http"
    }

    fn submit<'a>(&'a self, message: &'a MessageRecord) -> SubmitFuture<'a> {
        Box::pin(async move {
            let start = Instant::now();

            // .json() sets Content-Type: application/json
            let status = match self.client.post(&self.endpoint).json(message).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<serde_json::Value>().await {
                        Ok(body) => SendStatus::Delivered(body),
                        Err(_) => SendStatus::BadBody,
                    }
                }
                Ok(response) => SendStatus::Rejected(response.status().as_u16()),
                Err(e) => SendStatus::Transport(TransportErrorKind::from(&e)),
            };

            Ok(SendOutcome {
                status,
                latency_ms: start.elapsed().as_millis() as u64,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::Arc;

    fn record() -> MessageRecord {
        MessageRecord {
            from: "User0".into(),
            to: "User1".into(),
            content: "Hey User1! How are you doing?".into(),
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_submitter_delivered() {
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/message",
            post(move |Json(body): Json<MessageRecord>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::CREATED, Json(body))
                }
            }),
        );
        let base = serve(app).await;

        let submitter = HttpJsonSubmitter::new(&format!("{}/", base), Some(5_000)).unwrap();
        assert_eq!(submitter.endpoint(), format!("{}/message", base));

        let outcome = submitter.submit(&record()).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(
            outcome.status,
            SendStatus::Delivered(serde_json::to_value(record()).unwrap())
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_submitter_rejected() {
        let app = Router::new().route(
            "/message",
            post(|| async { (StatusCode::BAD_REQUEST, Json(serde_json::json!({"errors": []}))) }),
        );
        let base = serve(app).await;

        let submitter = HttpJsonSubmitter::new(&base, None).unwrap();
        let outcome = submitter.submit(&record()).await.unwrap();
        assert!(!outcome.is_success());
        assert_eq!(outcome.status, SendStatus::Rejected(400));
    }

    #[tokio::test]
    async fn test_http_submitter_undecodable_body() {
        let app = Router::new().route("/message", post(|| async { "not json" }));
        let base = serve(app).await;

        let submitter = HttpJsonSubmitter::new(&base, None).unwrap();
        let outcome = submitter.submit(&record()).await.unwrap();
        assert_eq!(outcome.status, SendStatus::BadBody);
    }

    #[tokio::test]
    async fn test_http_submitter_unreachable_is_outcome_not_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let submitter = HttpJsonSubmitter::new(&format!("http://{}", addr), Some(2_000)).unwrap();
        let outcome = submitter.submit(&record()).await.unwrap();
        assert!(matches!(outcome.status, SendStatus::Transport(_)));
    }

    #[tokio::test]
    async fn test_mock_submitter_failing_calls() {
        let submitter = MockSubmitter::new(0).failing_calls([2]);
        let message = record();

        assert!(submitter.submit(&message).await.unwrap().is_success());
        assert_eq!(
            submitter.submit(&message).await.unwrap().status,
            SendStatus::Rejected(500)
        );
        assert!(submitter.submit(&message).await.unwrap().is_success());
        assert_eq!(submitter.calls(), 3);
    }
}
