//! Request handling of the hosted tutor function as a library: the JSON
//! contract that [`super::EdgeFunctionGateway`] speaks, without an HTTP server.
//! Embedders mount it behind their own endpoint; the gateway tests round-trip
//! through it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::ChatGateway;
use crate::error::TutorError;

/// Incoming tutor request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TutorRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// JSON body of a tutor response: `{response}` or `{error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyBody {
    Reply { response: String },
    Error { error: String },
}

/// Status code plus body, as the tutor function would send them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: ProxyBody,
}

impl ProxyResponse {
    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: ProxyBody::Error {
                error: message.to_string(),
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// # Errors
    ///
    /// Returns the serializer error, which cannot happen for these bodies.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.body)
    }
}

/// The tutor function's request handling, minus the HTTP server.
#[derive(Clone)]
pub struct TutorProxy {
    gateway: Arc<dyn ChatGateway>,
}

impl TutorProxy {
    #[must_use]
    pub fn new(gateway: Arc<dyn ChatGateway>) -> Self {
        Self { gateway }
    }

    /// Handle a raw JSON request body.
    pub async fn handle_json(&self, body: &str) -> ProxyResponse {
        match serde_json::from_str::<TutorRequest>(body) {
            Ok(request) => self.handle(request).await,
            Err(err) => {
                error!(error = %err, "unreadable tutor request");
                ProxyResponse::error(500, "Internal server error")
            }
        }
    }

    /// Only a missing or empty message is refused here; anything else,
    /// whitespace included, is forwarded verbatim.
    pub async fn handle(&self, request: TutorRequest) -> ProxyResponse {
        let Some(message) = request.message.as_deref().filter(|m| !m.is_empty()) else {
            return ProxyResponse::error(400, "Message is required");
        };

        match self.gateway.ask(message).await {
            Ok(response) => ProxyResponse {
                status: 200,
                body: ProxyBody::Reply { response },
            },
            Err(TutorError::EmptyMessage) => ProxyResponse::error(400, "Message is required"),
            Err(TutorError::NotConfigured) => {
                error!("tutor credentials missing");
                ProxyResponse::error(500, "AI service not configured")
            }
            Err(TutorError::Upstream { status, message }) => {
                warn!(status, %message, "model call failed");
                ProxyResponse::error(status, "AI service error")
            }
            Err(other) => {
                error!(error = %other, "tutor request failed");
                ProxyResponse::error(500, "Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::tutor::FALLBACK_REPLY;

    enum Canned {
        Reply(&'static str),
        NotConfigured,
        Upstream(u16),
        Decode,
    }

    #[async_trait]
    impl ChatGateway for Canned {
        async fn ask(&self, message: &str) -> Result<String, TutorError> {
            match self {
                Canned::Reply(text) => Ok(format!("{text}: {message}")),
                Canned::NotConfigured => Err(TutorError::NotConfigured),
                Canned::Upstream(status) => Err(TutorError::Upstream {
                    status: *status,
                    message: "quota".into(),
                }),
                Canned::Decode => Err(TutorError::Decode("bad".into())),
            }
        }
    }

    fn proxy(gateway: Canned) -> TutorProxy {
        TutorProxy::new(Arc::new(gateway))
    }

    #[tokio::test]
    async fn missing_or_empty_message_is_a_bad_request() {
        let p = proxy(Canned::Reply(FALLBACK_REPLY));
        for body in [r"{}", r#"{"message":""}"#, r#"{"message":null}"#] {
            let res = p.handle_json(body).await;
            assert_eq!(res.status, 400, "{body}");
            assert_eq!(res.to_json().unwrap(), r#"{"error":"Message is required"}"#);
        }
    }

    #[tokio::test]
    async fn message_reaches_the_gateway_untrimmed() {
        let p = proxy(Canned::Reply("echo"));
        let res = p.handle_json(r#"{"message":"   "}"#).await;
        assert_eq!(res.to_json().unwrap(), r#"{"response":"echo:    "}"#);
        let res = p.handle_json(r#"{"message":"  why?\n"}"#).await;
        assert_eq!(res.to_json().unwrap(), r#"{"response":"echo:   why?\n"}"#);
    }

    #[tokio::test]
    async fn reply_is_wrapped() {
        let res = proxy(Canned::Reply("echo"))
            .handle_json(r#"{"message":"hi"}"#)
            .await;
        assert!(res.is_success());
        assert_eq!(res.to_json().unwrap(), r#"{"response":"echo: hi"}"#);
    }

    #[tokio::test]
    async fn gateway_failures_map_to_statuses() {
        let req = r#"{"message":"hi"}"#;
        assert_eq!(
            proxy(Canned::NotConfigured).handle_json(req).await,
            ProxyResponse::error(500, "AI service not configured")
        );
        assert_eq!(
            proxy(Canned::Upstream(429)).handle_json(req).await,
            ProxyResponse::error(429, "AI service error")
        );
        assert_eq!(
            proxy(Canned::Decode).handle_json(req).await,
            ProxyResponse::error(500, "Internal server error")
        );
        assert_eq!(
            proxy(Canned::Decode).handle_json("not json").await,
            ProxyResponse::error(500, "Internal server error")
        );
    }
}
