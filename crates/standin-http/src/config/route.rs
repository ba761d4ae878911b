//! Route declaration shapes.
//!
//! A route declaration pairs a path template (with optional `{param}`
//! segments) with one behavior block per HTTP method: request schema,
//! response template, optional webhook or redirect side effect, and an
//! optional repeat spec for synthesizing nested collections.

use super::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One raw route declaration, as handed over by a declaration source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteDeclaration {
    pub path: String,
    #[serde(default)]
    pub methods: Vec<MethodConfig>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// Declared behavior for one (path, method) pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MethodConfig {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_schema: Option<Schema>,
    /// Response template: scalar, object, or array, possibly containing
    /// typed leaves and `{name}` / `{$function}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<RedirectConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraConfig>,
}

/// Webhook side effect: a discriminator-keyed mapping of call targets.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub data_mapping: BTreeMap<String, WebhookTarget>,
}

/// One webhook target: a url template and a data template.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookTarget {
    pub url: String,
    pub data: serde_json::Value,
}

/// Redirect side effect: a url template plus ordered query parameters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RedirectConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<RedirectParameter>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedirectParameter {
    pub name: String,
    pub value: String,
}

/// Extension block on a method config. Only `repeat` is recognized.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtraConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatConfig>,
}

/// Hierarchical repeat spec: each item names a nesting level with a dotted
/// path and a count expression (template-rendered before parsing).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepeatConfig {
    #[serde(default)]
    pub items: Vec<RepeatItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepeatItem {
    pub name: String,
    pub count: String,
}

impl MethodConfig {
    pub fn webhook_enabled(&self) -> bool {
        self.webhook.as_ref().map(|w| w.enabled).unwrap_or(false)
    }

    pub fn redirect_enabled(&self) -> bool {
        self.redirect.as_ref().map(|r| r.enabled).unwrap_or(false)
    }

    pub fn repeat_items(&self) -> &[RepeatItem] {
        self.extra
            .as_ref()
            .and_then(|e| e.repeat.as_ref())
            .map(|r| r.items.as_slice())
            .unwrap_or(&[])
    }
}
