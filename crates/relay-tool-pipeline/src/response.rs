//! Phase 6: the Image → Audio → Text response handler chain.

use base64::Engine;
use relay_protocol::content::ContentBlock;
use relay_protocol::tools::CallToolResult;
use relay_state::ToolConfig;
use serde_json::Value;

use crate::context::TemplateContext;
use crate::error::ToolPipelineError;
use crate::helpers::TemplateEngine;

pub async fn handle_response(
    response: reqwest::Response,
    tool: &ToolConfig,
    engine: &TemplateEngine,
    context: TemplateContext,
) -> Result<CallToolResult, ToolPipelineError> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Ok(CallToolResult::error(format!(
            "tool endpoint returned {status}: {body}"
        )));
    }

    if let Some(mime) = content_type.strip_prefix("image/").map(|_| content_type.clone()) {
        let bytes = response.bytes().await?;
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        return Ok(CallToolResult::ok(vec![ContentBlock::image(data, mime)]));
    }

    if let Some(mime) = content_type.strip_prefix("audio/").map(|_| content_type.clone()) {
        let bytes = response.bytes().await?;
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        return Ok(CallToolResult::ok(vec![ContentBlock::audio(data, mime)]));
    }

    let body = response.text().await.unwrap_or_default();
    let text = match &tool.response_body {
        Some(template) => {
            let data: Option<Value> = serde_json::from_str(&body).ok();
            let context = context.with_response(body, data);
            engine
                .render(template, &context)
                .map_err(|source| ToolPipelineError::Template {
                    field: "response_body".to_string(),
                    source,
                })?
        }
        None => String::new(),
    };

    Ok(CallToolResult::ok(vec![ContentBlock::text(text)]))
}
