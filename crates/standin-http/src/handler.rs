//! Request Orchestrator.
//!
//! Composes the pipeline per request: match the route, gather and validate
//! params, fire the declared side effect, then synthesize the response.
//! The flow is Received -> Matched -> Validated -> SideEffected? -> Rendered
//! -> Responded; schema failures, routing misses, and webhook transport
//! failures exit to Rejected. A redirect short-circuits straight to Responded
//! instead of rendering the declared body.

use crate::config::MethodConfig;
use crate::dispatch::{build_redirect_url, WebhookDispatcher};
use crate::error::Error;
use crate::matcher::match_route;
use crate::registry::RouteTable;
use crate::repeat;
use crate::template::{Params, TemplateEngine};
use crate::validator::validate;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Paths browsers probe unprompted; answered empty instead of routed.
const BROWSER_NOISE_PATHS: [&str; 4] = [
    "/favicon.ico",
    "/robots.txt",
    "/sitemap.xml",
    "/humans.txt",
];

/// One inbound request, as handed over by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct SynthRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// The synthesized answer for the transport layer to encode.
#[derive(Debug, Clone)]
pub struct SynthResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Option<Value>,
    /// Set when the route short-circuited into a redirect.
    pub location: Option<String>,
}

impl SynthResponse {
    pub fn json(status: u16, content_type: &str, body: Value) -> Self {
        Self {
            status,
            content_type: content_type.to_string(),
            body: Some(body),
            location: None,
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            content_type: String::new(),
            body: None,
            location: None,
        }
    }

    pub fn redirect(location: String) -> Self {
        Self {
            status: 307,
            content_type: String::new(),
            body: None,
            location: Some(location),
        }
    }

    pub fn from_error(err: &Error) -> Self {
        Self::json(err.status_code(), "application/json", err.to_body())
    }
}

pub struct RequestOrchestrator {
    table: RouteTable,
    engine: Arc<TemplateEngine>,
    webhooks: Arc<WebhookDispatcher>,
    /// When true, in-flight webhooks survive an aborted inbound request.
    detach_webhooks: bool,
}

impl RequestOrchestrator {
    pub fn new(
        table: RouteTable,
        engine: Arc<TemplateEngine>,
        webhooks: Arc<WebhookDispatcher>,
        detach_webhooks: bool,
    ) -> Self {
        Self {
            table,
            engine,
            webhooks,
            detach_webhooks,
        }
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    pub async fn process(&self, request: SynthRequest) -> SynthResponse {
        match self.run(&request).await {
            Ok(response) => response,
            Err(err) => {
                if err.is_client_error() {
                    debug!("{} {} rejected: {err}", request.method, request.path);
                } else {
                    error!("{} {} failed: {err}", request.method, request.path);
                }
                SynthResponse::from_error(&err)
            }
        }
    }

    async fn run(&self, request: &SynthRequest) -> Result<SynthResponse, Error> {
        if BROWSER_NOISE_PATHS.contains(&request.path.as_str()) {
            debug!("skipping browser request: {}", request.path);
            return Ok(SynthResponse::no_content());
        }

        info!("received request: {} {}", request.method, request.path);
        let matched = match_route(&self.table, &request.path, &request.method)?;
        let config = matched.config;

        let mut params = self.gather_params(request, config)?;
        // Path parameters fill in behind body/query values on name collision.
        for (name, value) in matched.path_params {
            params
                .entry(name)
                .or_insert_with(|| Value::String(value));
        }

        if let Some(schema) = &config.request_schema {
            validate(&Value::Object(params.clone()), schema)?;
        }
        debug!(
            "request params for {} {}: {}",
            request.method,
            request.path,
            serde_json::Value::Object(params.clone())
        );

        if config.webhook_enabled() {
            self.fire_webhook(config, &params).await?;
        }

        if config.redirect_enabled() {
            if let Some(redirect) = &config.redirect {
                let url = build_redirect_url(redirect, &self.engine, &params);
                return Ok(SynthResponse::redirect(url));
            }
        }

        let response = self.render_response(config, &params);
        info!("answered {} {}", request.method, request.path);
        Ok(response)
    }

    /// Params come from the body for schema-carrying mutation methods, and
    /// from the query string otherwise.
    fn gather_params(
        &self,
        request: &SynthRequest,
        config: &MethodConfig,
    ) -> Result<Params, Error> {
        let takes_body = matches!(request.method.as_str(), "POST" | "PUT" | "PATCH");
        if !takes_body || config.request_schema.is_none() {
            return Ok(request
                .query
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect());
        }

        let expected = config
            .request_schema
            .as_ref()
            .map(|s| s.to_value())
            .unwrap_or(Value::Null);
        let content_type = request
            .headers
            .get("content-type")
            .map(String::as_str)
            .unwrap_or("");

        if content_type.contains("application/x-www-form-urlencoded") {
            return Ok(parse_form(&request.body));
        }
        if content_type.contains("multipart/form-data") {
            return Err(Error::BadRequest {
                message: "multipart bodies are not supported".to_string(),
                received: request.body.clone(),
                expected,
            });
        }

        let parsed: Value =
            serde_json::from_str(&request.body).map_err(|e| Error::BadRequest {
                message: e.to_string(),
                received: request.body.clone(),
                expected: expected.clone(),
            })?;
        match parsed {
            Value::Object(map) => Ok(map),
            other => Err(Error::BadRequest {
                message: format!("expected a JSON object body, got {other}"),
                received: request.body.clone(),
                expected,
            }),
        }
    }

    async fn fire_webhook(&self, config: &MethodConfig, params: &Params) -> Result<(), Error> {
        let Some(webhook) = config.webhook.clone() else {
            return Ok(());
        };

        if self.detach_webhooks {
            // Spawned so the call runs to completion even if the inbound
            // request is aborted mid-flight.
            let dispatcher = self.webhooks.clone();
            let engine = self.engine.clone();
            let params = params.clone();
            let handle = tokio::spawn(async move {
                dispatcher.dispatch(&webhook, &engine, &params).await
            });
            match handle.await {
                Ok(result) => result.map(|_| ()),
                Err(e) => Err(Error::Transport {
                    url: String::new(),
                    payload: Value::Null,
                    message: format!("webhook task failed: {e}"),
                }),
            }
        } else {
            self.webhooks
                .dispatch(&webhook, &self.engine, params)
                .await
                .map(|_| ())
        }
    }

    fn render_response(&self, config: &MethodConfig, params: &Params) -> SynthResponse {
        let Some(template) = &config.response else {
            return SynthResponse::no_content();
        };

        let repeat_items = config.repeat_items();
        let body = if repeat_items.is_empty() {
            self.engine.render(template, params)
        } else {
            repeat::expand(repeat_items, &self.engine, params, template)
        };
        SynthResponse::json(200, &config.content_type, body)
    }
}

fn parse_form(body: &str) -> Params {
    let mut params = Params::new();
    for pair in body.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key).unwrap_or_default().to_string();
        // '+' means space in form encoding; rewrite before percent-decoding.
        let value = urlencoding::decode(&value.replace('+', " "))
            .unwrap_or_default()
            .to_string();
        params.insert(key, Value::String(value));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{Generators, SequenceRegistry};
    use crate::registry::merge;
    use assert_json_diff::assert_json_include;
    use serde_json::json;
    use std::time::Duration;

    fn orchestrator(routes_yaml: &str) -> RequestOrchestrator {
        let declarations: Vec<crate::config::RouteDeclaration> = routes_yaml
            .split("---")
            .filter(|s| !s.trim().is_empty())
            .map(|s| serde_yaml::from_str(s).unwrap())
            .collect();
        let table = merge(declarations).unwrap();
        let engine = Arc::new(TemplateEngine::new(Generators::new(
            "http://hooks.local".to_string(),
            Arc::new(SequenceRegistry::new()),
        )));
        let webhooks = Arc::new(WebhookDispatcher::new(Duration::from_secs(1)).unwrap());
        RequestOrchestrator::new(table, engine, webhooks, false)
    }

    fn get(path: &str) -> SynthRequest {
        SynthRequest {
            method: "GET".to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn post_json(path: &str, body: Value) -> SynthRequest {
        SynthRequest {
            method: "POST".to_string(),
            path: path.to_string(),
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: body.to_string(),
            ..Default::default()
        }
    }

    const TOKEN_ROUTE: &str = r#"
path: /oauth/token
methods:
  - method: POST
    request_schema:
      required: ["grant_type"]
      properties:
        grant_type:
          type: str
          enum: ["authorization_code", "password"]
      allOf:
        - if:
            properties:
              grant_type:
                const: "authorization_code"
          then:
            required: ["code"]
    response:
      access_token: "{$access_token}"
      expires_in:
        value: "3600"
        type: int
"#;

    #[tokio::test]
    async fn test_browser_noise_is_answered_empty() {
        let o = orchestrator(TOKEN_ROUTE);
        let response = o.process(get("/favicon.ico")).await;
        assert_eq!(response.status, 204);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let o = orchestrator(TOKEN_ROUTE);
        let response = o.process(get("/missing")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_wrong_method_is_method_not_allowed() {
        let o = orchestrator(TOKEN_ROUTE);
        let response = o.process(get("/oauth/token")).await;
        assert_eq!(response.status, 405);
    }

    #[tokio::test]
    async fn test_valid_body_renders_response() {
        let o = orchestrator(TOKEN_ROUTE);
        let response = o
            .process(post_json(
                "/oauth/token",
                json!({"grant_type": "authorization_code", "code": "xyz"}),
            ))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");
        let body = response.body.unwrap();
        assert_eq!(body["expires_in"], json!(3600));
        assert!(body["access_token"].as_str().unwrap().contains('-'));
    }

    #[tokio::test]
    async fn test_schema_violation_is_rejected_with_details() {
        let o = orchestrator(TOKEN_ROUTE);
        let response = o
            .process(post_json(
                "/oauth/token",
                json!({"grant_type": "authorization_code"}),
            ))
            .await;
        assert_eq!(response.status, 400);
        let body = response.body.unwrap();
        assert!(body["message"].as_str().unwrap().contains("code"));
        assert_json_include!(
            actual: body,
            expected: json!({"received_data": {"grant_type": "authorization_code"}})
        );
        assert!(body["expected_format"].is_object());
    }

    #[tokio::test]
    async fn test_unparseable_body_is_bad_request() {
        let o = orchestrator(TOKEN_ROUTE);
        let mut request = post_json("/oauth/token", json!({}));
        request.body = "{not json".to_string();
        let response = o.process(request).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body.unwrap()["received_data"], "{not json");
    }

    #[tokio::test]
    async fn test_form_encoded_body_validates_like_json() {
        let o = orchestrator(TOKEN_ROUTE);
        let request = SynthRequest {
            method: "POST".to_string(),
            path: "/oauth/token".to_string(),
            headers: [(
                "content-type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )]
            .into_iter()
            .collect(),
            body: "grant_type=password&username=u&password=p".to_string(),
            ..Default::default()
        };
        let response = o.process(request).await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_path_params_feed_the_template() {
        let o = orchestrator(
            r#"
path: /items/{item_id}
methods:
  - method: GET
    response:
      id: "{item_id}"
      echo: "{verbose}"
"#,
        );
        let mut request = get("/items/42");
        request.query.insert("verbose".to_string(), "yes".to_string());
        let response = o.process(request).await;
        let body = response.body.unwrap();
        assert_eq!(body["id"], "42");
        assert_eq!(body["echo"], "yes");
    }

    #[tokio::test]
    async fn test_query_param_shadows_path_param() {
        let o = orchestrator(
            r#"
path: /items/{id}
methods:
  - method: GET
    response:
      id: "{id}"
"#,
        );
        let mut request = get("/items/42");
        request.query.insert("id".to_string(), "override".to_string());
        let response = o.process(request).await;
        assert_eq!(response.body.unwrap()["id"], "override");
    }

    #[tokio::test]
    async fn test_redirect_short_circuits_response_body() {
        let o = orchestrator(
            r#"
path: /login
methods:
  - method: GET
    response:
      never: "rendered"
    redirect:
      enabled: true
      url: "https://auth.example.com/cb"
      parameters:
        - name: state
          value: "{state}"
"#,
        );
        let mut request = get("/login");
        request.query.insert("state".to_string(), "s1".to_string());
        let response = o.process(request).await;
        assert_eq!(response.status, 307);
        assert!(response.body.is_none());
        assert_eq!(
            response.location.unwrap(),
            "https://auth.example.com/cb?state=s1"
        );
    }

    #[tokio::test]
    async fn test_unknown_webhook_discriminator_never_calls_out() {
        let o = orchestrator(
            r#"
path: /events
methods:
  - method: GET
    response: {ok: true}
    webhook:
      enabled: true
      data_mapping:
        user_created:
          url: "http://127.0.0.1:1/unreachable"
          data: {event: created}
"#,
        );
        let mut request = get("/events");
        request.query.insert("type".to_string(), "mystery".to_string());
        let response = o.process(request).await;
        assert_eq!(response.status, 400);
        let body = response.body.unwrap();
        assert_eq!(body["available_types"], json!(["user_created"]));
    }

    #[tokio::test]
    async fn test_webhook_transport_failure_is_surfaced() {
        let o = orchestrator(
            r#"
path: /events
methods:
  - method: GET
    response: {ok: true}
    webhook:
      enabled: true
      data_mapping:
        user_created:
          url: "http://127.0.0.1:1/unreachable"
          data: {event: created}
"#,
        );
        let response = o.process(get("/events")).await;
        assert_eq!(response.status, 500);
        let body = response.body.unwrap();
        assert_eq!(body["webhook_url"], "http://127.0.0.1:1/unreachable");
        assert_eq!(body["webhook_data"]["event"], "created");
    }

    #[tokio::test]
    async fn test_repeat_spec_drives_response_shape() {
        let o = orchestrator(
            r#"
path: /v1/chats
methods:
  - method: GET
    response:
      chats:
        users: ["{$session_id}"]
    extra:
      repeat:
        items:
          - name: chats
            count: "2"
          - name: chats.users
            count: "{limit}"
"#,
        );
        let mut request = get("/v1/chats");
        request.query.insert("limit".to_string(), "3".to_string());
        let response = o.process(request).await;
        let chats = response.body.unwrap()["chats"].as_array().unwrap().clone();
        assert_eq!(chats.len(), 2);
        for chat in &chats {
            assert_eq!(chat["users"].as_array().unwrap().len(), 3);
        }
    }

    #[tokio::test]
    async fn test_route_without_response_template_is_no_content() {
        let o = orchestrator("path: /void\nmethods:\n  - method: GET\n");
        let response = o.process(get("/void")).await;
        assert_eq!(response.status, 204);
    }

    #[test]
    fn test_parse_form_decodes_pairs() {
        let params = parse_form("name=ann%20b&age=30&flag");
        assert_eq!(params["name"], "ann b");
        assert_eq!(params["age"], "30");
        assert_eq!(params["flag"], "");
    }
}
