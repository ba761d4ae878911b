//! Redirect URL building.
//!
//! Each declared `{name, value}` pair is rendered against the request params
//! and the generator registry, then URL-encoded into the target's query
//! string. Value substitution uses the same placeholder/function syntax as
//! response templates.

use crate::config::RedirectConfig;
use crate::template::{Params, TemplateEngine};
use tracing::info;

/// Render the fully qualified redirect URL for this request.
pub fn build_redirect_url(
    config: &RedirectConfig,
    engine: &TemplateEngine,
    params: &Params,
) -> String {
    let base = engine.render_string(&config.url, params);

    if config.parameters.is_empty() {
        return base;
    }

    let query: Vec<String> = config
        .parameters
        .iter()
        .map(|parameter| {
            let value = engine.render_string(&parameter.value, params);
            format!(
                "{}={}",
                urlencoding::encode(&parameter.name),
                urlencoding::encode(&value)
            )
        })
        .collect();

    let url = format!("{base}?{}", query.join("&"));
    info!("built redirect url: {url}");
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{Generators, SequenceRegistry};
    use serde_json::json;
    use std::sync::Arc;

    fn engine() -> TemplateEngine {
        TemplateEngine::new(Generators::new(
            "http://hooks.local".to_string(),
            Arc::new(SequenceRegistry::new()),
        ))
    }

    fn config(yaml: &str) -> RedirectConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn params(value: serde_json::Value) -> Params {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_parameters_are_rendered_and_encoded() {
        let config = config(
            r#"
enabled: true
url: "https://auth.example.com/callback"
parameters:
  - name: state
    value: "{state}"
  - name: note
    value: "hello {name}"
"#,
        );
        let url = build_redirect_url(
            &config,
            &engine(),
            &params(json!({"state": "abc123", "name": "ann b"})),
        );
        assert_eq!(
            url,
            "https://auth.example.com/callback?state=abc123&note=hello%20ann%20b"
        );
    }

    #[test]
    fn test_generator_functions_in_values() {
        let config = config(
            r#"
enabled: true
url: "{$webhook_url}/return"
parameters:
  - name: code
    value: "{$verification_code}"
"#,
        );
        let url = build_redirect_url(&config, &engine(), &Params::new());
        assert!(url.starts_with("http://hooks.local/return?code="));
        let code = url.rsplit('=').next().unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_parameter_order_is_preserved() {
        let config = config(
            r#"
enabled: true
url: "https://x/cb"
parameters:
  - name: b
    value: "2"
  - name: a
    value: "1"
"#,
        );
        let url = build_redirect_url(&config, &engine(), &Params::new());
        assert_eq!(url, "https://x/cb?b=2&a=1");
    }

    #[test]
    fn test_no_parameters_returns_bare_url() {
        let config = config("enabled: true\nurl: \"https://x/cb\"\n");
        assert_eq!(
            build_redirect_url(&config, &engine(), &Params::new()),
            "https://x/cb"
        );
    }
}
