//! Outbound webhook dispatch.
//!
//! The request's `type` field selects a data-mapping entry; its url and data
//! templates are rendered against the request params and posted as JSON. A
//! non-JSON success response is still a success, captured as raw text. Send
//! failures are never swallowed here; the orchestrator surfaces them.

use crate::config::{WebhookConfig, WebhookTarget};
use crate::error::Error;
use crate::generators;
use crate::template::{Params, TemplateEngine};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Discriminator assumed when the request does not carry a `type` field.
pub const DEFAULT_DISCRIMINATOR: &str = "user_created";

pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    /// Build a dispatcher with a bounded request timeout. Expiry is reported
    /// as a transport failure like any other send error.
    pub fn new(timeout: Duration) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Select, render, and fire the webhook for this request.
    pub async fn dispatch(
        &self,
        config: &WebhookConfig,
        engine: &TemplateEngine,
        params: &Params,
    ) -> Result<Value, Error> {
        let (target, discriminator) = select_target(config, params)?;
        debug!("dispatching webhook for type {discriminator}");

        let webhook_params = augment_params(params);

        let url = engine.render_string(&target.url, &webhook_params);
        let data = engine.render(&target.data, &webhook_params);

        let response = self
            .client
            .post(&url)
            .json(&data)
            .send()
            .await
            .map_err(|e| Error::Transport {
                url: url.clone(),
                payload: data.clone(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let text = response.text().await.map_err(|e| Error::Transport {
            url: url.clone(),
            payload: data.clone(),
            message: e.to_string(),
        })?;

        let body = interpret_response(status, &content_type, &text);
        info!("webhook delivered to {url} (status {status})");
        Ok(body)
    }
}

/// Outbound templates additionally see the dispatch time under
/// `current_timestamp`, as an ISO-8601 string. The `{$current_timestamp}`
/// generator marker keeps its epoch form.
fn augment_params(params: &Params) -> Params {
    let mut augmented = params.clone();
    augmented.insert(
        "current_timestamp".to_string(),
        Value::String(generators::iso_timestamp()),
    );
    augmented
}

/// Resolve the discriminator and its data-mapping entry. Fails with a client
/// error listing the configured discriminators before any call is issued.
fn select_target<'a>(
    config: &'a WebhookConfig,
    params: &Params,
) -> Result<(&'a WebhookTarget, String), Error> {
    let discriminator = params
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_DISCRIMINATOR)
        .to_string();

    match config.data_mapping.get(&discriminator) {
        Some(target) => Ok((target, discriminator)),
        None => Err(Error::UnknownDiscriminator {
            given: discriminator,
            available: config.data_mapping.keys().cloned().collect(),
        }),
    }
}

/// JSON responses are parsed; everything else is captured verbatim.
fn interpret_response(status: u16, content_type: &str, text: &str) -> Value {
    if content_type.contains("application/json") {
        if let Ok(parsed) = serde_json::from_str(text) {
            return parsed;
        }
    }
    json!({
        "status": status,
        "content_type": content_type,
        "text": text,
    })
}
