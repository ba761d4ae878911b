//! Template Engine: variable substitution and typed value coercion.
//!
//! Rendering is two-phase with a fixed order. Phase 1 walks the whole value
//! tree and rewrites string leaves: every `{name}` placeholder becomes the
//! stringified param value, every `{$function}` marker becomes a generated
//! value (unmatched placeholders stay verbatim). Phase 2 then walks the
//! substituted tree and collapses typed leaves (`value`+`type` objects) into
//! coerced scalars. Phase 1 must complete first because a typed leaf's
//! `value` field may itself contain placeholders.
//!
//! Coercion is lenient: a failed coercion falls back to the phase-1 string
//! instead of failing the whole render, and bumps an observable counter.

use crate::generators::Generators;
use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Substitution parameters: request body/query/path values by name.
pub type Params = Map<String, Value>;

pub struct TemplateEngine {
    generators: Generators,
    coercion_fallbacks: AtomicU64,
}

impl TemplateEngine {
    pub fn new(generators: Generators) -> Self {
        Self {
            generators,
            coercion_fallbacks: AtomicU64::new(0),
        }
    }

    /// Render a template value against request params: substitute, then coerce.
    pub fn render(&self, template: &Value, params: &Params) -> Value {
        let substituted = self.substitute(template, params);
        self.coerce(substituted)
    }

    /// Phase 1 only, for url templates and other plain strings.
    pub fn render_string(&self, template: &str, params: &Params) -> String {
        self.substitute_string(template, params)
    }

    /// How many typed-leaf coercions have silently fallen back so far.
    pub fn coercion_fallbacks(&self) -> u64 {
        self.coercion_fallbacks.load(Ordering::Relaxed)
    }

    pub fn generators(&self) -> &Generators {
        &self.generators
    }

    fn substitute(&self, value: &Value, params: &Params) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.substitute(v, params)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items.iter().map(|item| self.substitute(item, params)).collect(),
            ),
            Value::String(s) => Value::String(self.substitute_string(s, params)),
            other => other.clone(),
        }
    }

    fn substitute_string(&self, template: &str, params: &Params) -> String {
        let mut result = template.to_string();
        for (name, value) in params {
            let placeholder = format!("{{{name}}}");
            if result.contains(&placeholder) {
                result = result.replace(&placeholder, &stringify(value));
            }
        }
        for name in Generators::NAMES {
            let marker = format!("{{${name}}}");
            if result.contains(&marker) {
                if let Some(generated) = self.generators.resolve(name) {
                    result = result.replace(&marker, &generated);
                }
            }
        }
        result
    }

    fn coerce(&self, value: Value) -> Value {
        match value {
            Value::Object(map) if is_typed_leaf(&map) => self.coerce_leaf(map),
            Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, self.coerce(v))).collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.coerce(item)).collect())
            }
            other => other,
        }
    }

    /// Typed leaves are terminal: their content is not recursed after
    /// transformation.
    fn coerce_leaf(&self, map: Map<String, Value>) -> Value {
        let raw = map.get("value").cloned().unwrap_or(Value::Null);
        let declared = map.get("type").and_then(|t| t.as_str()).unwrap_or("");
        let format = map.get("format").and_then(|f| f.as_str());

        match coerce_scalar(&raw, declared, format) {
            Some(coerced) => coerced,
            None => {
                self.coercion_fallbacks.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "typed-leaf coercion to {declared} failed for {raw:?}, keeping substituted value"
                );
                raw
            }
        }
    }
}

fn is_typed_leaf(map: &Map<String, Value>) -> bool {
    map.contains_key("value") && map.contains_key("type")
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Closed match over the declared type vocabulary. None means fallback.
fn coerce_scalar(raw: &Value, declared: &str, format: Option<&str>) -> Option<Value> {
    match declared {
        "int" => match raw {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(raw.clone()),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        "float" => match raw {
            Value::Number(_) => Some(raw.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        "bool" => match raw {
            Value::Bool(_) => Some(raw.clone()),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        "str" => Some(Value::String(stringify(raw))),
        "datetime" => coerce_datetime(raw, format),
        _ => None,
    }
}

/// Accepts a numeric epoch or an ISO-8601 string. With a `format` and a
/// numeric-looking value, the epoch is formatted with that pattern.
fn coerce_datetime(raw: &Value, format: Option<&str>) -> Option<Value> {
    let parsed: DateTime<Utc> = match raw {
        Value::Number(n) => DateTime::from_timestamp(n.as_f64()? as i64, 0)?,
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(epoch) = trimmed.parse::<f64>() {
                DateTime::from_timestamp(epoch as i64, 0)?
            } else {
                DateTime::parse_from_rfc3339(trimmed).ok()?.with_timezone(&Utc)
            }
        }
        _ => return None,
    };
    let rendered = match format {
        Some(pattern) => parsed.format(pattern).to_string(),
        None => parsed.to_rfc3339(),
    };
    Some(Value::String(rendered))
}
