//! AI tutor chat: gateways to the model, the edge-function contract and
//! persisted chat history.

mod completions;
mod edge;
mod proxy;
mod service;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TutorError;

pub use completions::{CompletionsConfig, CompletionsGateway, TUTOR_INSTRUCTIONS};
pub use edge::{EdgeFunctionConfig, EdgeFunctionGateway};
pub use proxy::{ProxyBody, ProxyResponse, TutorProxy, TutorRequest};
pub use service::{HISTORY_LIMIT, TutorService};

/// Reply used when the model answers with nothing.
pub const FALLBACK_REPLY: &str = "Sorry, I could not generate a response.";

/// Something that can answer one tutor message.
///
/// Only the latest user message is sent; earlier history stays local.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// # Errors
    ///
    /// Returns `TutorError` when the gateway is unconfigured or the call fails.
    async fn ask(&self, message: &str) -> Result<String, TutorError>;
}

/// Pick a gateway from the environment.
///
/// `PREP_TUTOR_URL` routes through the hosted tutor function; otherwise the
/// completions endpoint configured by `PREP_AI_*` is called directly.
#[must_use]
pub fn gateway_from_env() -> Arc<dyn ChatGateway> {
    match EdgeFunctionConfig::from_env() {
        Some(config) => Arc::new(EdgeFunctionGateway::new(config)),
        None => Arc::new(CompletionsGateway::from_env()),
    }
}
