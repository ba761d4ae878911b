//! Declarative request-schema shapes.
//!
//! A schema is recursive: `properties` maps field names to sub-schemas, and
//! `required` may use dotted names to address nested object fields. `allOf`
//! carries conditional rules (`if` a set of fields equals given constants,
//! `then` additional fields are required).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(
        rename = "enum",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(rename = "allOf", default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<ConditionalRule>,
}

/// One `allOf` entry: a conjunction of const comparisons gating extra
/// required fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionalRule {
    #[serde(rename = "if")]
    pub if_clause: IfClause,
    #[serde(rename = "then")]
    pub then_clause: ThenClause,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IfClause {
    #[serde(default)]
    pub properties: BTreeMap<String, ConstMatch>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConstMatch {
    #[serde(rename = "const")]
    pub const_value: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ThenClause {
    #[serde(default)]
    pub required: Vec<String>,
}

impl Schema {
    /// The schema as a plain JSON value, for error bodies.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_with_conditionals() {
        let yaml = r#"
type: object
required: ["grant_type", "client_id"]
properties:
  grant_type:
    type: str
    enum: ["authorization_code", "password", "refresh_token"]
  client_id:
    type: str
allOf:
  - if:
      properties:
        grant_type:
          const: "authorization_code"
    then:
      required: ["code"]
  - if:
      properties:
        grant_type:
          const: "password"
    then:
      required: ["username", "password"]
"#;
        let schema: Schema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.required, vec!["grant_type", "client_id"]);
        assert_eq!(
            schema.properties["grant_type"]
                .enum_values
                .as_ref()
                .unwrap()
                .len(),
            3
        );
        assert_eq!(schema.all_of.len(), 2);
        assert_eq!(
            schema.all_of[0].if_clause.properties["grant_type"].const_value,
            serde_json::json!("authorization_code")
        );
        assert_eq!(schema.all_of[1].then_clause.required, vec!["username", "password"]);
    }

    #[test]
    fn test_parse_nested_properties() {
        let yaml = r#"
required: ["user", "user.name"]
properties:
  user:
    properties:
      name:
        type: str
      age:
        type: int
"#;
        let schema: Schema = serde_yaml::from_str(yaml).unwrap();
        let user = &schema.properties["user"];
        assert_eq!(user.properties["age"].schema_type.as_deref(), Some("int"));
    }
}
