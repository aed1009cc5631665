//! Page templates and the per-page compiled form.
//!
//! Templates use minijinja syntax and render against the page's data. A
//! compiled template additionally exposes:
//!
//! - one function per registered event name, e.g. `{{ increment(1) }}`,
//!   which renders the JavaScript call that reports the event back to the
//!   server. The call is safe both in double-quoted event attributes such as
//!   `onclick="..."` and inside `<script>` blocks.
//! - `client()`, which renders the bootstrap `<script>` tag.
//! - the globals `Event` and `Request`, placeholders that may be passed to an
//!   emitter to mirror a handler's signature. They are dropped from the
//!   literal arguments because the client and server supply them.

use std::path::Path;
use std::sync::Arc;

use minijinja::value::{Object, ObjectRepr, Rest, Value};
use minijinja::{Environment, ErrorKind};
use serde::Serialize;

use crate::client;
use crate::error::SetupError;

const TEMPLATE_NAME: &str = "reflex.html";

/// Uncompiled template source.
#[derive(Debug, Clone)]
pub struct Template {
    source: Arc<str>,
}

impl Template {
    pub fn parse(text: impl Into<String>) -> Self {
        Self {
            source: Arc::from(text.into()),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SetupError::Io(path.to_path_buf(), e))?;
        Ok(Self::parse(text))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compile the source with one emitter per event name.
    pub fn compile<'a>(
        &self,
        events: impl IntoIterator<Item = &'a str>,
    ) -> Result<CompiledTemplate, minijinja::Error> {
        CompiledTemplate::compile(&self.source, events)
    }
}

/// Placeholder values that stand in for arguments the emitter must not encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgMarker {
    Event,
    Request,
}

impl Object for ArgMarker {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }
}

/// A template bound to a page's event names. Compiled once, rendered per update.
pub struct CompiledTemplate {
    env: Environment<'static>,
}

impl CompiledTemplate {
    pub fn compile<'a>(
        source: &str,
        events: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_global("Event", Value::from_object(ArgMarker::Event));
        env.add_global("Request", Value::from_object(ArgMarker::Request));
        for name in events {
            let event_name = name.to_string();
            env.add_function(name.to_string(), move |args: Rest<Value>| {
                emitter_call(&event_name, &args.0)
            });
        }
        env.add_function("client", || Value::from_safe_string(client::inject()));
        env.add_template_owned(TEMPLATE_NAME, source.to_string())?;
        Ok(Self { env })
    }

    /// Execute the template against the current data.
    pub fn render<S: Serialize>(&self, data: &S) -> Result<String, minijinja::Error> {
        self.env.get_template(TEMPLATE_NAME)?.render(data)
    }
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate").finish_non_exhaustive()
    }
}

/// Build `reflex.event(event, 'name'[, [args...]]);`.
///
/// The result is marked safe: it never contains `"`, `<`, `>` or `&`, so it
/// can go verbatim into a `<script>` block or a double-quoted attribute.
fn emitter_call(name: &str, args: &[Value]) -> Result<Value, minijinja::Error> {
    let mut literals = Vec::with_capacity(args.len());
    for arg in args {
        if arg.downcast_object_ref::<ArgMarker>().is_none() {
            literals.push(to_json(arg)?);
        }
    }

    let mut js = String::from("reflex.event(event, ");
    write_js_string(&mut js, name);
    if !literals.is_empty() {
        js.push_str(", ");
        write_js(&mut js, &serde_json::Value::Array(literals));
    }
    js.push_str(");");
    Ok(Value::from_safe_string(js))
}

fn to_json(value: &Value) -> Result<serde_json::Value, minijinja::Error> {
    serde_json::to_value(value).map_err(|e| {
        minijinja::Error::new(ErrorKind::InvalidOperation, "cannot encode emitter arguments")
            .with_source(e)
    })
}

/// JSON-shaped JavaScript literal with single-quoted strings.
fn write_js(out: &mut String, value: &serde_json::Value) {
    use serde_json::Value as Json;

    match value {
        Json::String(s) => write_js_string(out, s),
        Json::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_js(out, item);
            }
            out.push(']');
        }
        Json::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_js_string(out, key);
                out.push(':');
                write_js(out, item);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_js_string(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\'' | '"' | '<' | '>' | '&' | '\u{2028}' | '\u{2029}' => {
                out.push_str(&format!("\\u{:04x}", c as u32))
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(source: &str, events: &[&str], data: serde_json::Value) -> String {
        CompiledTemplate::compile(source, events.iter().copied())
            .unwrap()
            .render(&data)
            .unwrap()
    }

    #[test]
    fn renders_data() {
        let out = render("<p>{{ Count }}</p>", &[], json!({"Count": 4}));
        assert_eq!(out, "<p>4</p>");
    }

    #[test]
    fn emitter_without_args_omits_array() {
        let out = render("{{ increment() }}", &["increment"], json!({}));
        assert_eq!(out, "reflex.event(event, 'increment');");
    }

    #[test]
    fn emitter_encodes_literals_as_json() {
        let out = render(r#"{{ add(1, "two", true) }}"#, &["add"], json!({}));
        assert_eq!(
            out,
            "reflex.event(event, 'add', [1,'two',true]);"
        );
    }

    #[test]
    fn emitter_drops_event_and_request_markers() {
        let out = render("{{ add(Event, 5, Request) }}", &["add"], json!({}));
        assert_eq!(out, "reflex.event(event, 'add', [5]);");

        let only_markers = render("{{ add(Event, Request) }}", &["add"], json!({}));
        assert_eq!(only_markers, "reflex.event(event, 'add');");
    }

    #[test]
    fn emitter_can_encode_data_values() {
        let out = render("{{ pick(item) }}", &["pick"], json!({"item": {"id": 7}}));
        assert_eq!(out, "reflex.event(event, 'pick', [{'id':7}]);");
    }

    #[test]
    fn emitter_is_executable_inside_script() {
        let out = render(
            "<script>var f = function (event) { {{ add(2) }} };</script>",
            &["add"],
            json!({}),
        );
        assert_eq!(
            out,
            "<script>var f = function (event) { reflex.event(event, 'add', [2]); };</script>"
        );
    }

    #[test]
    fn emitter_escapes_markup_and_quotes_in_literals() {
        let out = render(
            r#"<a onclick="{{ say(text) }}">x</a>"#,
            &["say"],
            json!({"text": "it's <b>\"bold\"</b> & more\n"}),
        );
        assert_eq!(
            out,
            r#"<a onclick="reflex.event(event, 'say', ['it\u0027s \u003cb\u003e\u0022bold\u0022\u003c/b\u003e \u0026 more\n']);">x</a>"#
        );
    }

    #[test]
    fn client_injects_script_unescaped() {
        let out = render("{{ client() }}", &[], json!({}));
        assert!(out.starts_with("<script type=\"text/javascript\">"));
    }

    #[test]
    fn syntax_error_fails_compile() {
        let err = CompiledTemplate::compile("{% if %}", std::iter::empty()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
    }

    #[test]
    fn unregistered_event_function_fails_render() {
        let compiled = CompiledTemplate::compile("{{ nope() }}", std::iter::empty()).unwrap();
        assert!(compiled.render(&json!({})).is_err());
    }

    #[test]
    fn render_is_deterministic() {
        let compiled = CompiledTemplate::compile(
            r#"<div id="app" onclick="{{ go(1) }}">{{ a }} {{ b }}</div>"#,
            ["go"],
        )
        .unwrap();
        let data = json!({"a": 1, "b": [1, 2]});
        assert_eq!(compiled.render(&data).unwrap(), compiled.render(&data).unwrap());
    }

    #[test]
    fn from_file_reads_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<div id=\"app\">{{ x }}</div>").unwrap();
        let template = Template::from_file(&path).unwrap();
        assert_eq!(template.source(), "<div id=\"app\">{{ x }}</div>");
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let err = Template::from_file("/definitely/not/here.html").unwrap_err();
        assert!(matches!(err, SetupError::Io(..)));
    }
}
