//! Phases 3–5 of the HTTP tool pipeline: renders the endpoint, headers, and
//! body, guards the resolved endpoint against the egress allow-list, and
//! dispatches the request.

use relay_egress_acl::EgressAllowList;
use relay_state::{ArgPosition, ToolConfig};
use serde_json::Value;

use crate::context::TemplateContext;
use crate::error::ToolPipelineError;
use crate::helpers::TemplateEngine;

fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
        other => other.to_string().trim_matches('"').to_string(),
    }
}

/// Renders `endpoint` against a context whose `Path`-position args have
/// been percent-escaped, so a `/` or `?` smuggled in an argument value
/// can't reshape the request path or inject a query string.
fn render_endpoint(
    engine: &TemplateEngine,
    tool: &ToolConfig,
    context: &TemplateContext,
) -> Result<String, ToolPipelineError> {
    let mut escaped_args = context.args.as_object().cloned().unwrap_or_default();
    for arg in tool.args.iter().filter(|a| a.position == ArgPosition::Path) {
        if let Some(value) = escaped_args.get(&arg.name).cloned() {
            let plain = value_to_plain_string(&value);
            escaped_args.insert(arg.name.clone(), Value::String(urlencoding::encode(&plain).into_owned()));
        }
    }
    let mut escaped_context = context.clone();
    escaped_context.args = Value::Object(escaped_args);
    engine
        .render(&tool.endpoint, &escaped_context)
        .map_err(|source| ToolPipelineError::Template {
            field: "endpoint".to_string(),
            source,
        })
}

/// Renders and dispatches the tool's HTTP request: templated endpoint,
/// headers, query/form/body arguments, guarded by the egress allow-list
/// before anything is sent.
pub async fn execute(
    client: &reqwest::Client,
    tool: &ToolConfig,
    engine: &TemplateEngine,
    context: &TemplateContext,
    allow_list: &EgressAllowList,
) -> Result<reqwest::Response, ToolPipelineError> {
    let endpoint = render_endpoint(engine, tool, context)?;

    relay_egress_acl::validate_endpoint(&endpoint, allow_list).await?;

    let method = reqwest::Method::from_bytes(tool.method.to_uppercase().as_bytes())
        .map_err(|_| ToolPipelineError::RequestBuild(format!("invalid http method {}", tool.method)))?;
    let mut builder = client.request(method, &endpoint);

    for (name, template) in &tool.headers {
        let rendered = engine
            .render(template, context)
            .map_err(|source| ToolPipelineError::Template {
                field: format!("header {name}"),
                source,
            })?;
        builder = builder.header(name, rendered);
    }

    let args_obj = context.args.as_object().cloned().unwrap_or_default();

    let query_pairs: Vec<(String, String)> = tool
        .args
        .iter()
        .filter(|a| a.position == ArgPosition::Query)
        .filter_map(|a| args_obj.get(&a.name).map(|v| (a.name.clone(), value_to_plain_string(v))))
        .collect();
    if !query_pairs.is_empty() {
        builder = builder.query(&query_pairs);
    }

    let form_args: Vec<_> = tool
        .args
        .iter()
        .filter(|a| a.position == ArgPosition::FormData)
        .collect();

    if !form_args.is_empty() {
        let mut form = reqwest::multipart::Form::new();
        for arg in form_args {
            if let Some(value) = args_obj.get(&arg.name) {
                form = form.text(arg.name.clone(), value_to_plain_string(value));
            }
        }
        builder = builder.multipart(form);
    } else if let Some(template) = &tool.request_body {
        let rendered = engine
            .render(template, context)
            .map_err(|source| ToolPipelineError::Template {
                field: "request_body".to_string(),
                source,
            })?;
        builder = builder
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(rendered);
    } else {
        let body_args: serde_json::Map<String, Value> = tool
            .args
            .iter()
            .filter(|a| a.position == ArgPosition::Body)
            .filter_map(|a| args_obj.get(&a.name).cloned().map(|v| (a.name.clone(), v)))
            .collect();
        if !body_args.is_empty() {
            builder = builder.json(&Value::Object(body_args));
        }
    }

    Ok(builder.send().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_tool() -> ToolConfig {
        ToolConfig {
            name: "get_repo".to_string(),
            method: "GET".to_string(),
            endpoint: "https://example.test/repos/{{args.owner}}".to_string(),
            headers: Default::default(),
            args: vec![relay_state::ToolArg {
                name: "owner".to_string(),
                position: ArgPosition::Path,
                arg_type: "string".to_string(),
                required: true,
                default: None,
                description: None,
            }],
            request_body: None,
            response_body: None,
            proxy: None,
            description: None,
        }
    }

    #[test]
    fn path_argument_with_slash_is_percent_escaped() {
        let tool = path_tool();
        let engine = TemplateEngine::new();
        let args = crate::context::resolve_args(&tool, &serde_json::json!({"owner": "a/b"}));
        let context = TemplateContext::new(args, &Default::default(), Value::Null);
        let rendered = render_endpoint(&engine, &tool, &context).unwrap();
        assert_eq!(rendered, "https://example.test/repos/a%2Fb");
    }
}
