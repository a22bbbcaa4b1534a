//! Escaping and HTML-construction helpers available to every template.
//!
//! The plain functions (`escape_text`, `attr`, ...) are usable from Rust.
//! [`HelperApi::standard`] registers them, under the names templates call
//! them by, as the outermost tier of variable resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::runtime::value::{is_truthy, to_text};

/// Result returned by a helper function.
pub type HelperResult = Result<Value, HelperError>;

/// Failure reported by a helper function.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct HelperError(pub String);

impl HelperError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A function callable from template expressions.
#[derive(Clone)]
pub struct Helper(Arc<dyn Fn(&[Value]) -> HelperResult + Send + Sync>);

impl Helper {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> HelperResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> HelperResult {
        (self.0)(args)
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Helper(..)")
    }
}

/// Named helper functions forming the API tier.
#[derive(Debug, Clone, Default)]
pub struct HelperApi {
    helpers: BTreeMap<String, Helper>,
}

impl HelperApi {
    /// An API with no helpers at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in helpers.
    pub fn standard() -> Self {
        let mut api = Self::empty();
        api.register("escapeText", helper_escape_text);
        api.register("e", helper_escape_text);
        api.register("escapeAttr", helper_escape_attr);
        api.register("ea", helper_escape_attr);
        api.register("attr", helper_attr);
        api.register("showIf", helper_show_if);
        api.register("dynalist", helper_dynalist);
        api.register("sprintf", helper_sprintf);
        api
    }

    /// Register (or replace) a helper.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> HelperResult + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Helper::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.helpers.keys().map(String::as_str)
    }
}

/// Escape `& < > " ' /` as HTML entities.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape double quotes for use inside a double-quoted attribute value.
pub fn escape_attr(s: &str) -> String {
    s.replace('"', "&quot;")
}

/// Render `name="value"`, or nothing when the value is empty.
///
/// Non-string values are stringified first, so `attr("width", 100)` gives
/// `width="100"`. `args` are substituted into `?` placeholders of `value`
/// (see [`sprintf`]). When `value` is null or empty, `default` is used
/// instead, unformatted.
pub fn attr(name: &str, value: &Value, args: &[Value], default: Option<&Value>) -> String {
    let v = if value.is_null() || value.as_str() == Some("") {
        default.map(to_text).unwrap_or_default()
    } else {
        sprintf(&to_text(value), args)
    };
    if v.is_empty() {
        String::new()
    } else {
        format!("{name}=\"{}\"", escape_attr(&v))
    }
}

/// Inline style hiding an element unless `test` holds.
pub fn show_if(test: bool) -> &'static str {
    if test {
        ""
    } else {
        "style=\"display:none\""
    }
}

/// Keys of `map` with truthy values, in map order, joined by `sep`.
pub fn dynalist(map: &Map<String, Value>, sep: &str) -> String {
    map.iter()
        .filter(|(_, v)| is_truthy(v))
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Replace `?` placeholders, left to right, with `values`.
///
/// When the template holds more `?` than there are values, only the last
/// `values.len()` of them are placeholders and the leading ones stay literal,
/// so `/x?id=?` with one value keeps its query separator. Extra values are
/// ignored.
pub fn sprintf(template: &str, values: &[Value]) -> String {
    let marks = template.matches('?').count();
    let mut literal = marks.saturating_sub(values.len());
    let mut values = values.iter();
    let mut out = String::with_capacity(template.len());
    for c in template.chars() {
        if c != '?' {
            out.push(c);
        } else if literal > 0 {
            literal -= 1;
            out.push(c);
        } else if let Some(v) = values.next() {
            out.push_str(&to_text(v));
        }
    }
    out
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

fn helper_escape_text(args: &[Value]) -> HelperResult {
    Ok(Value::String(escape_text(&to_text(arg(args, 0)))))
}

fn helper_escape_attr(args: &[Value]) -> HelperResult {
    Ok(Value::String(escape_attr(&to_text(arg(args, 0)))))
}

fn helper_attr(args: &[Value]) -> HelperResult {
    let name = arg(args, 0)
        .as_str()
        .ok_or_else(|| HelperError::msg("attr expects an attribute name"))?;
    let values = match arg(args, 2) {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        single => vec![single.clone()],
    };
    let default = args.get(3).filter(|v| !v.is_null());
    Ok(Value::String(attr(name, arg(args, 1), &values, default)))
}

fn helper_show_if(args: &[Value]) -> HelperResult {
    Ok(Value::String(show_if(is_truthy(arg(args, 0))).to_string()))
}

fn helper_dynalist(args: &[Value]) -> HelperResult {
    let sep = match arg(args, 1) {
        Value::Null => " ".to_string(),
        other => to_text(other),
    };
    Ok(Value::String(match arg(args, 0) {
        Value::Object(map) => dynalist(map, &sep),
        _ => String::new(),
    }))
}

fn helper_sprintf(args: &[Value]) -> HelperResult {
    Ok(Value::String(match arg(args, 0) {
        Value::String(template) => sprintf(template, args.get(1..).unwrap_or_default()),
        _ => String::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> String {
        let api = HelperApi::standard();
        api.get(name)
            .unwrap()
            .call(args)
            .unwrap()
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(
            escape_text(r#"<a href="/x">'&'</a>"#),
            "&lt;a href=&quot;&#x2F;x&quot;&gt;&#39;&amp;&#39;&lt;&#x2F;a&gt;"
        );
    }

    #[test]
    fn test_escape_text_output_has_no_raw_specials() {
        let escaped = escape_text("& < > \" ' / plain");
        for c in ['<', '>', '"', '\'', '/'] {
            assert!(!escaped.contains(c), "{c} survived escaping");
        }
        assert!(escaped.split('&').skip(1).all(|rest| rest.contains(';')));
    }

    #[test]
    fn test_escape_text_double_escapes_ampersand() {
        assert_eq!(escape_text("&lt;"), "&amp;lt;");
    }

    #[test]
    fn test_escape_attr_only_touches_quotes() {
        assert_eq!(escape_attr(r#"a "b" <c>"#), "a &quot;b&quot; <c>");
    }

    #[test]
    fn test_attr_falls_back_to_default() {
        assert_eq!(attr("class", &json!(""), &[], Some(&json!("btn"))), r#"class="btn""#);
    }

    #[test]
    fn test_attr_omitted_when_empty() {
        assert_eq!(attr("class", &json!(null), &[], None), "");
        assert_eq!(attr("class", &json!(""), &[], Some(&json!(""))), "");
    }

    #[test]
    fn test_attr_interpolates_args() {
        assert_eq!(
            attr("href", &json!("/x?id=?"), &[json!(5)], None),
            r#"href="/x?id=5""#
        );
        assert_eq!(
            attr("title", &json!(r#"say "?""#), &[json!("hi")], None),
            r#"title="say &quot;hi&quot;""#
        );
    }

    #[test]
    fn test_attr_stringifies_non_string_values() {
        assert_eq!(attr("width", &json!(100), &[], None), r#"width="100""#);
        assert_eq!(attr("checked", &json!(true), &[], None), r#"checked="true""#);
        assert_eq!(attr("width", &json!(null), &[], Some(&json!(0))), r#"width="0""#);
    }

    #[test]
    fn test_placeholders_next_to_word_characters() {
        assert_eq!(sprintf("width:?px", &[json!(5)]), "width:5px");
        assert_eq!(
            attr("style", &json!("width:?px"), &[json!(5)], None),
            r#"style="width:5px""#
        );
        assert_eq!(attr("id", &json!("item-?a"), &[json!(3)], None), r#"id="item-3a""#);
        assert_eq!(
            sprintf("/x?id=?&page=?", &[json!(5), json!(2)]),
            "/x?id=5&page=2"
        );
    }

    #[test]
    fn test_show_if() {
        assert_eq!(show_if(true), "");
        assert!(show_if(false).contains("display:none"));
    }

    #[test]
    fn test_dynalist_preserves_order() {
        let map = json!({"a": true, "b": false, "c": true});
        assert_eq!(dynalist(map.as_object().unwrap(), " "), "a c");
        assert_eq!(call("dynalist", &[map.clone()]), "a c");
        assert_eq!(call("dynalist", &[map, json!(",")]), "a,c");
    }

    #[test]
    fn test_sprintf() {
        assert_eq!(sprintf("? + ? = ?", &[json!(1), json!(2), json!(3)]), "1 + 2 = 3");
        assert_eq!(sprintf("a ? b ?", &[json!("x")]), "a ? b x");
        assert_eq!(sprintf("? ?", &[json!(1), json!(2), json!(3)]), "1 2");
        assert_eq!(sprintf("what?", &[]), "what?");
        assert_eq!(call("sprintf", &[json!(42), json!(1)]), "");
    }

    #[test]
    fn test_helper_aliases() {
        assert_eq!(call("e", &[json!("<b>")]), "&lt;b&gt;");
        assert_eq!(call("ea", &[json!("\"")]), "&quot;");
        assert_eq!(call("escapeText", &[json!(null)]), "");
    }

    #[test]
    fn test_attr_helper_requires_name() {
        let api = HelperApi::standard();
        let result = api.get("attr").unwrap().call(&[json!(1), json!("x")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_register_custom_helper() {
        let mut api = HelperApi::empty();
        api.register("upper", |args: &[Value]| {
            Ok(Value::String(to_text(arg(args, 0)).to_uppercase()))
        });
        assert!(api.contains("upper"));
        assert!(!api.contains("e"));
        assert_eq!(api.get("upper").unwrap().call(&[json!("ab")]).unwrap(), json!("AB"));
    }
}
