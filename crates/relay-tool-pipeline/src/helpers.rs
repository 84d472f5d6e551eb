//! Custom handlebars helpers: `env`, `add`, `fromJSON`/`toJSON`,
//! `safeGet`/`safeGetOr`, and a handful of sprig-style string utilities.
//! Each implements `call_inner` rather than `call` so it renders correctly
//! both as a standalone `{{helper args}}` and nested as a subexpression,
//! e.g. `{{safeGet "a.b" (fromJSON request.body)}}`.

use handlebars::{Context, Handlebars, Helper, HelperDef, RenderContext, RenderError, ScopedJson};
use serde_json::Value;

fn missing(name: &str, index: usize) -> RenderError {
    RenderError::new(format!("{name}: missing argument at position {index}"))
}

struct EnvHelper;
impl HelperDef for EnvHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let key = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| missing("env", 0))?;
        Ok(ScopedJson::Derived(Value::String(
            std::env::var(key).unwrap_or_default(),
        )))
    }
}

struct AddHelper;
impl HelperDef for AddHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let sum: f64 = h.params().iter().filter_map(|p| p.value().as_f64()).sum();
        let value = if sum.fract() == 0.0 {
            Value::from(sum as i64)
        } else {
            Value::from(sum)
        };
        Ok(ScopedJson::Derived(value))
    }
}

struct FromJsonHelper {
    must: bool,
}
impl HelperDef for FromJsonHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let raw = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| missing("fromJSON", 0))?;
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Ok(ScopedJson::Derived(value)),
            Err(e) if self.must => Err(RenderError::new(format!("mustFromJson: {e}"))),
            Err(_) => Ok(ScopedJson::Derived(Value::Null)),
        }
    }
}

struct ToJsonHelper;
impl HelperDef for ToJsonHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let value = h.param(0).ok_or_else(|| missing("toJSON", 0))?.value();
        let rendered = serde_json::to_string(value).map_err(|e| RenderError::new(e.to_string()))?;
        Ok(ScopedJson::Derived(Value::String(rendered)))
    }
}

/// Dot-path traversal over a JSON value (`"a.b.0.c"` indexes object keys
/// and array positions alike). Returns `None` on the first missing
/// segment rather than erroring, so a missing key is nil, not an error.
fn traverse<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

struct SafeGetHelper;
impl HelperDef for SafeGetHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let path = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| missing("safeGet", 0))?;
        let data = h.param(1).ok_or_else(|| missing("safeGet", 1))?.value();
        Ok(ScopedJson::Derived(
            traverse(data, path).cloned().unwrap_or(Value::Null),
        ))
    }
}

struct SafeGetOrHelper;
impl HelperDef for SafeGetOrHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let path = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| missing("safeGetOr", 0))?;
        let data = h.param(1).ok_or_else(|| missing("safeGetOr", 1))?.value();
        let default = h.param(2).ok_or_else(|| missing("safeGetOr", 2))?.value();
        Ok(ScopedJson::Derived(
            traverse(data, path).cloned().unwrap_or_else(|| default.clone()),
        ))
    }
}

struct UpperHelper;
impl HelperDef for UpperHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let text = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| missing("upper", 0))?;
        Ok(ScopedJson::Derived(Value::String(text.to_uppercase())))
    }
}

struct LowerHelper;
impl HelperDef for LowerHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let text = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| missing("lower", 0))?;
        Ok(ScopedJson::Derived(Value::String(text.to_lowercase())))
    }
}

struct TrimHelper;
impl HelperDef for TrimHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let text = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| missing("trim", 0))?;
        Ok(ScopedJson::Derived(Value::String(text.trim().to_string())))
    }
}

struct DefaultHelper;
impl HelperDef for DefaultHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let fallback = h.param(0).ok_or_else(|| missing("default", 0))?.value();
        let value = h.param(1).map(|p| p.value()).unwrap_or(&Value::Null);
        let is_empty =
            matches!(value, Value::Null) || matches!(value, Value::String(s) if s.is_empty());
        Ok(ScopedJson::Derived(if is_empty {
            fallback.clone()
        } else {
            value.clone()
        }))
    }
}

/// Wraps a handlebars registry pre-loaded with the gateway's custom
/// helpers, strict mode on so a missing variable fails the render instead
/// of silently emitting an empty string.
#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_helper("env", Box::new(EnvHelper));
        handlebars.register_helper("add", Box::new(AddHelper));
        handlebars.register_helper("fromJSON", Box::new(FromJsonHelper { must: false }));
        handlebars.register_helper("mustFromJson", Box::new(FromJsonHelper { must: true }));
        handlebars.register_helper("toJSON", Box::new(ToJsonHelper));
        handlebars.register_helper("safeGet", Box::new(SafeGetHelper));
        handlebars.register_helper("safeGetOr", Box::new(SafeGetOrHelper));
        handlebars.register_helper("upper", Box::new(UpperHelper));
        handlebars.register_helper("lower", Box::new(LowerHelper));
        handlebars.register_helper("trim", Box::new(TrimHelper));
        handlebars.register_helper("default", Box::new(DefaultHelper));
        Self { handlebars }
    }

    pub fn render(
        &self,
        template: &str,
        context: &impl serde::Serialize,
    ) -> Result<String, handlebars::RenderError> {
        self.handlebars.render_template(template, context)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_helper_reads_process_environment() {
        unsafe {
            std::env::set_var("RELAY_TEST_TEMPLATE_VAR", "hello");
        }
        let engine = TemplateEngine::new();
        let rendered = engine
            .render("{{env \"RELAY_TEST_TEMPLATE_VAR\"}}", &json!({}))
            .unwrap();
        assert_eq!(rendered, "hello");
    }

    #[test]
    fn add_helper_sums_and_keeps_integers_whole() {
        let engine = TemplateEngine::new();
        let rendered = engine.render("{{add 2 3}}", &json!({})).unwrap();
        assert_eq!(rendered, "5");
    }

    #[test]
    fn safe_get_returns_empty_on_miss() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render("{{safeGet \"a.missing\" data}}", &json!({"data": {"a": {"b": 1}}}))
            .unwrap();
        assert_eq!(rendered, "");
    }

    #[test]
    fn safe_get_or_falls_back_to_default() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render(
                "{{safeGetOr \"a.missing\" data \"fallback\"}}",
                &json!({"data": {"a": {"b": 1}}}),
            )
            .unwrap();
        assert_eq!(rendered, "fallback");
    }

    #[test]
    fn from_json_parses_embedded_document() {
        let engine = TemplateEngine::new();
        let rendered = engine
            .render(
                "{{safeGet \"id\" (fromJSON raw)}}",
                &json!({"raw": "{\"id\": 42}"}),
            )
            .unwrap();
        assert_eq!(rendered, "42");
    }

    #[test]
    fn sprig_string_helpers_transform_text() {
        let engine = TemplateEngine::new();
        assert_eq!(engine.render("{{upper \"ok\"}}", &json!({})).unwrap(), "OK");
        assert_eq!(engine.render("{{lower \"OK\"}}", &json!({})).unwrap(), "ok");
        assert_eq!(engine.render("{{trim \"  ok  \"}}", &json!({})).unwrap(), "ok");
        assert_eq!(
            engine.render("{{default \"fallback\" missing}}", &json!({})).unwrap(),
            "fallback"
        );
    }
}
