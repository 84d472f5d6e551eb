//! Builds the nested template context (`Args`/`Config`/`Request`/`Response`)
//! a tool's endpoint, header, and body templates render against, and
//! normalizes raw JSON argument values into the stable types templates
//! expect: integer-valued floats become ints, JSON-shaped strings are
//! parsed into objects/arrays.

use std::collections::HashMap;

use relay_state::ToolConfig;
use serde_json::{Map, Value};

/// Recursively normalizes a JSON value: integer-valued floats demote to
/// ints, and strings that look like a JSON object or array get parsed into
/// one so templates can traverse them with `safeGet` instead of re-parsing.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    return Value::from(f as i64);
                }
            }
            value.clone()
        }
        Value::String(s) => {
            let trimmed = s.trim();
            let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
                || (trimmed.starts_with('[') && trimmed.ends_with(']'));
            if looks_like_json {
                if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                    return normalize_value(&parsed);
                }
            }
            value.clone()
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), normalize_value(v));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Resolves one argument's final value: the caller-supplied value if
/// present, else the tool's declared default, else `Null`.
pub fn resolve_args(tool: &ToolConfig, arguments: &Value) -> HashMap<String, Value> {
    let supplied = arguments.as_object();
    let mut resolved = HashMap::with_capacity(tool.args.len());
    for arg in &tool.args {
        let raw = supplied
            .and_then(|m| m.get(&arg.name))
            .cloned()
            .or_else(|| arg.default.clone())
            .unwrap_or(Value::Null);
        resolved.insert(arg.name.clone(), normalize_value(&raw));
    }
    resolved
}

/// The `Response` sub-context, populated only once phase 6 has a body to
/// work with; empty (both fields absent) during every earlier phase.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ResponseContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The full render context handed to every handlebars template in a tool
/// call: `env` is deliberately not a field here, since it is a lookup
/// function rather than a pre-populated map — it is exposed as the `env`
/// helper instead, resolved at render time against the process
/// environment.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    pub args: Value,
    pub config: Value,
    pub request: Value,
    pub response: ResponseContext,
}

impl TemplateContext {
    pub fn new(args: HashMap<String, Value>, config: &HashMap<String, Value>, request: Value) -> Self {
        let args_value = Value::Object(args.into_iter().collect());
        let config_value = Value::Object(
            config
                .iter()
                .map(|(k, v)| (k.clone(), normalize_value(v)))
                .collect(),
        );
        Self {
            args: args_value,
            config: config_value,
            request,
            response: ResponseContext::default(),
        }
    }

    pub fn with_response(mut self, body: String, data: Option<Value>) -> Self {
        self.response = ResponseContext {
            body: Some(body),
            data,
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_valued_float_is_demoted_to_int() {
        let normalized = normalize_value(&Value::from(4.0_f64));
        assert_eq!(normalized, Value::from(4_i64));
    }

    #[test]
    fn fractional_float_is_left_alone() {
        let normalized = normalize_value(&Value::from(4.5_f64));
        assert_eq!(normalized, Value::from(4.5_f64));
    }

    #[test]
    fn json_looking_string_is_parsed_into_an_object() {
        let normalized = normalize_value(&Value::String(r#"{"a": 1}"#.to_string()));
        assert_eq!(normalized, serde_json::json!({"a": 1}));
    }

    #[test]
    fn plain_string_is_left_alone() {
        let normalized = normalize_value(&Value::String("hello".to_string()));
        assert_eq!(normalized, Value::String("hello".to_string()));
    }

    #[test]
    fn missing_argument_falls_back_to_declared_default() {
        let tool = ToolConfig {
            name: "t".to_string(),
            method: "GET".to_string(),
            endpoint: "http://example.test".to_string(),
            headers: Default::default(),
            args: vec![relay_state::ToolArg {
                name: "limit".to_string(),
                position: relay_state::ArgPosition::Query,
                arg_type: "number".to_string(),
                required: false,
                default: Some(Value::from(10)),
                description: None,
            }],
            request_body: None,
            response_body: None,
            proxy: None,
            description: None,
        };
        let resolved = resolve_args(&tool, &Value::Null);
        assert_eq!(resolved.get("limit"), Some(&Value::from(10)));
    }
}
