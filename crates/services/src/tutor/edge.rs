use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::ChatGateway;
use super::proxy::ProxyBody;
use crate::error::TutorError;

#[derive(Clone, Debug)]
pub struct EdgeFunctionConfig {
    pub url: String,
    /// Public key sent as bearer token and `apikey` header, when the host wants one.
    pub anon_key: Option<String>,
}

impl EdgeFunctionConfig {
    /// Reads `PREP_TUTOR_URL` and the optional `PREP_TUTOR_ANON_KEY`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let url = env::var("PREP_TUTOR_URL").ok()?;
        if url.trim().is_empty() {
            return None;
        }
        let anon_key = env::var("PREP_TUTOR_ANON_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Some(Self { url, anon_key })
    }
}

/// Posts `{message}` to a hosted tutor function.
#[derive(Clone)]
pub struct EdgeFunctionGateway {
    client: Client,
    config: EdgeFunctionConfig,
}

impl EdgeFunctionGateway {
    #[must_use]
    pub fn new(config: EdgeFunctionConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[derive(Serialize)]
struct EdgeRequest<'a> {
    message: &'a str,
}

#[async_trait]
impl ChatGateway for EdgeFunctionGateway {
    async fn ask(&self, message: &str) -> Result<String, TutorError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&EdgeRequest { message });
        if let Some(key) = &self.config.anon_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        debug!(url = %self.config.url, "calling tutor function");
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        interpret(status, &body)
    }
}

/// Map a tutor function response onto a reply or an error.
fn interpret(status: u16, body: &str) -> Result<String, TutorError> {
    let parsed = serde_json::from_str::<ProxyBody>(body);
    match (status, parsed) {
        (200..=299, Ok(ProxyBody::Reply { response })) => Ok(response),
        (200..=299, Ok(ProxyBody::Error { error })) => Err(TutorError::Upstream { status, message: error }),
        (200..=299, Err(err)) => Err(TutorError::Decode(err.to_string())),
        (_, Ok(ProxyBody::Error { error })) => {
            warn!(status, %error, "tutor function error");
            Err(TutorError::Upstream { status, message: error })
        }
        (_, _) => {
            warn!(status, "tutor function error without a readable body");
            Err(TutorError::Upstream {
                status,
                message: "AI service error".into(),
            })
        }
    }
}
