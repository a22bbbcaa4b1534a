//! Render orchestration and the public operations of the crate.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::TemplateCache;
use crate::codegen::{self, Instruction};
use crate::config::{Context, EngineConfig};
use crate::error::{ConfigError, TemplateError, TemplateResult, ANONYMOUS_TEMPLATE};
use crate::helpers::{HelperApi, HelperResult};
use crate::loader::{FsLoader, TemplateLoader};
use crate::macros::MacroSet;
use crate::scanner::TagScanner;
use crate::script::{self, SyntaxError};
use crate::template::CompiledTemplate;

/// A configured template compiler with its own cache.
///
/// ```
/// use scriptlet::Engine;
/// use serde_json::json;
///
/// let engine = Engine::default();
/// let html = engine.render("Hi <%= name %>!", &json!({"name": "<b>"})).unwrap();
/// assert_eq!(html, "Hi &lt;b&gt;!");
/// ```
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    scanner: TagScanner,
    macros: MacroSet,
    api: HelperApi,
    cache: TemplateCache,
    loader: Arc<dyn TemplateLoader>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default()).expect("default tag markers are valid")
    }
}

impl Engine {
    /// Build an engine with the standard helpers, the built-in macros and a
    /// filesystem loader.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let scanner = TagScanner::new(&config.open, &config.close)?;
        Ok(Self {
            config,
            scanner,
            macros: MacroSet::default(),
            api: HelperApi::standard(),
            cache: TemplateCache::new(),
            loader: Arc::new(FsLoader::new()),
        })
    }

    /// Replace the loader used by [`Engine::render_file`].
    pub fn with_loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// Swap in a new configuration.
    ///
    /// Templates compiled earlier, cached or not, keep the tag markers they
    /// were compiled with. The new context applies to every later render.
    pub fn configure(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        self.scanner = TagScanner::new(&config.open, &config.close)?;
        tracing::debug!(
            open = %config.open,
            close = %config.close,
            context_values = config.context.values().len(),
            "Engine reconfigured"
        );
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.config.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.config.context
    }

    pub fn api(&self) -> &HelperApi {
        &self.api
    }

    /// Register (or replace) a helper in the API tier.
    pub fn register_helper<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> HelperResult + Send + Sync + 'static,
    {
        self.api.register(name, f);
    }

    /// Macros applied to statement tags of templates compiled from now on.
    pub fn macros_mut(&mut self) -> &mut MacroSet {
        &mut self.macros
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Compile without touching the cache.
    pub fn compile(&self, text: &str) -> TemplateResult<CompiledTemplate> {
        self.compile_named(ANONYMOUS_TEMPLATE, text)
    }

    fn compile_named(&self, name: &str, text: &str) -> TemplateResult<CompiledTemplate> {
        let segments = self.scanner.scan(text);
        let instructions =
            codegen::generate(&segments, &self.macros, self.scanner.open(), name)?;
        let program = script::parse_program(&instructions)
            .map_err(|e| syntax_error(name, &instructions, e))?;
        tracing::debug!(
            template = name,
            instructions = instructions.len(),
            "Compiled template"
        );
        Ok(CompiledTemplate::new(name.to_string(), instructions, program))
    }

    /// Compile `text` (uncached) and render it with `data` as scope.
    pub fn render(&self, text: &str, data: &Value) -> TemplateResult<String> {
        let template = self.compile(text)?;
        self.execute(&template, data)
    }

    /// Render `text` through the cache under `key`.
    ///
    /// Once `key` is cached, `text` is ignored.
    pub fn render_cached(&self, key: &str, text: &str, data: &Value) -> TemplateResult<String> {
        let template = self.get_or_compile(key, text)?;
        self.execute(&template, data)
    }

    /// Cached template for `key`, compiling `text` only on a miss.
    pub fn get_or_compile(&self, key: &str, text: &str) -> TemplateResult<Arc<CompiledTemplate>> {
        self.cache
            .get_or_compile(key, || self.compile_named(key, text))
    }

    /// Compile `text` and store it under `key`, replacing any previous entry.
    pub fn precompile(&self, key: &str, text: &str) -> TemplateResult<Arc<CompiledTemplate>> {
        let template = self.compile_named(key, text)?;
        Ok(self.cache.insert(key, template))
    }

    /// Render a template stored by [`Engine::precompile`] or another cached call.
    pub fn render_template(&self, key: &str, data: &Value) -> TemplateResult<String> {
        let template = self
            .cache
            .get(key)
            .ok_or_else(|| TemplateError::not_found(key))?;
        self.execute(&template, data)
    }

    /// Load `locator` through the loader, then render it cached by locator.
    pub async fn render_file(&self, locator: &str, data: &Value) -> TemplateResult<String> {
        tracing::debug!(locator, "Loading template");
        let text = self
            .loader
            .load(locator)
            .await
            .map_err(|e| TemplateError::load(locator, e))?;
        let template = self.get_or_compile(locator, &text)?;
        self.execute(&template, data)
    }

    /// [`Engine::render_file`], delivering the outcome to `callback` exactly once.
    pub async fn render_file_with<F>(&self, locator: &str, data: &Value, callback: F)
    where
        F: FnOnce(TemplateResult<String>),
    {
        callback(self.render_file(locator, data).await);
    }

    /// Render a compiled template with the current context and helpers.
    pub fn execute(&self, template: &CompiledTemplate, data: &Value) -> TemplateResult<String> {
        template.render(data, &self.config.context, &self.api)
    }
}

fn syntax_error(name: &str, instructions: &[Instruction], error: SyntaxError) -> TemplateError {
    tracing::debug!(
        template = name,
        line = error.line,
        listing = %codegen::listing(instructions),
        "Template failed to compile"
    );
    TemplateError::Syntax {
        template: name.to_string(),
        line: error.line,
        message: error.message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::loader::MemoryLoader;
    use serde_json::json;

    #[test]
    fn test_render_without_tags_is_identity() {
        let engine = Engine::default();
        let text = "plain 'quoted' \\ text\r\nline two\u{2028}";
        assert_eq!(engine.render(text, &json!({})).unwrap(), text);
        assert_eq!(engine.render("", &json!(null)).unwrap(), "");
    }

    #[test]
    fn test_render_escapes_output() {
        let engine = Engine::default();
        let out = engine.render("Hi <%= name %>!", &json!({"name": "<b>"})).unwrap();
        assert_eq!(out, "Hi &lt;b&gt;!");
    }

    #[test]
    fn test_render_for_in() {
        let engine = Engine::default();
        let out = engine
            .render(
                "<% for (x in items) { %><%= x %>,<% } %>",
                &json!({"items": [1, 2, 3]}),
            )
            .unwrap();
        assert_eq!(out, "1,2,3,");
    }

    #[test]
    fn test_comment_tags_render_nothing() {
        let engine = Engine::default();
        let out = engine.render("a<%# note %>b<%  %>c", &json!({})).unwrap();
        assert_eq!(out, "abc");
    }

    #[test]
    fn test_unknown_tag_type() {
        let engine = Engine::default();
        let err = engine.render("<%! foo %>", &json!({})).unwrap_err();
        match err {
            TemplateError::UnknownTagType { marker, open, .. } => {
                assert_eq!(marker, "!");
                assert_eq!(open, "<%");
            }
            other => panic!("Expected UnknownTagType, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tag_names_cache_key() {
        let engine = Engine::default();
        let err = engine.precompile("pages/index", "<%! x %>").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown template tag '<%!' in pages/index"
        );
        assert!(err.is_compile_error());
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let engine = Engine::default();
        let err = engine.compile("ok\nstill ok\n<% if (a { %>").unwrap_err();
        match err {
            TemplateError::Syntax { template, line, .. } => {
                assert_eq!(template, ANONYMOUS_TEMPLATE);
                assert_eq!(line, 3);
            }
            other => panic!("Expected Syntax, got {other:?}"),
        }
    }

    #[test]
    fn test_evaluation_error() {
        let engine = Engine::default();
        let err = engine.render("<%= nope %>", &json!({})).unwrap_err();
        assert!(!err.is_compile_error());
        match err {
            TemplateError::Evaluation { source, .. } => {
                assert_eq!(source, EvalError::UndefinedVariable { name: "nope".to_string() });
            }
            other => panic!("Expected Evaluation, got {other:?}"),
        }
    }

    #[test]
    fn test_precompile_and_render_template() {
        let engine = Engine::default();
        let compiled = engine.precompile("greet", "Hello <%= who %>").unwrap();
        assert_eq!(compiled.name(), "greet");
        assert_eq!(
            engine.render_template("greet", &json!({"who": "a"})).unwrap(),
            "Hello a"
        );
        assert_eq!(
            engine.render_template("greet", &json!({"who": "b"})).unwrap(),
            "Hello b"
        );
        let again = engine.cache().get("greet").unwrap();
        assert!(Arc::ptr_eq(&compiled, &again));
    }

    #[test]
    fn test_render_template_unknown_key() {
        let engine = Engine::default();
        let err = engine.render_template("missing", &json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::TemplateNotFound { ref key } if key == "missing"));
    }

    #[test]
    fn test_precompile_overwrites() {
        let engine = Engine::default();
        engine.precompile("k", "one").unwrap();
        engine.precompile("k", "two").unwrap();
        assert_eq!(engine.render_template("k", &json!({})).unwrap(), "two");
    }

    #[test]
    fn test_render_cached_ignores_new_text() {
        let engine = Engine::default();
        assert_eq!(engine.render_cached("k", "first", &json!({})).unwrap(), "first");
        assert_eq!(engine.render_cached("k", "second", &json!({})).unwrap(), "first");
        engine.clear_cache();
        assert_eq!(engine.render_cached("k", "second", &json!({})).unwrap(), "second");
    }

    #[test]
    fn test_compile_is_uncached() {
        let engine = Engine::default();
        engine.compile("x").unwrap();
        engine.render("y", &json!({})).unwrap();
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_reconfigure_keeps_compiled_markers() {
        let mut engine = Engine::default();
        engine.precompile("old", "<%= a %>").unwrap();
        engine
            .configure(EngineConfig::default().with_markers("{{", "}}"))
            .unwrap();

        let data = json!({"a": 1});
        assert_eq!(engine.render_template("old", &data).unwrap(), "1");
        assert_eq!(engine.render("{{= a }}|<%= a %>", &data).unwrap(), "1|<%= a %>");
    }

    #[test]
    fn test_configure_rejects_empty_markers() {
        let mut engine = Engine::default();
        let err = engine
            .configure(EngineConfig::default().with_markers("", "%>"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMarkers(_)));
        assert_eq!(engine.render("<%= 1 %>", &json!({})).unwrap(), "1");
    }

    #[test]
    fn test_context_is_read_at_render_time() {
        let mut engine = Engine::default();
        engine.precompile("site", "<%= site %>").unwrap();
        engine.context_mut().insert("site", "a.org");
        assert_eq!(engine.render_template("site", &json!({})).unwrap(), "a.org");

        let mut context = Context::new();
        context.insert("site", "b.org");
        engine
            .configure(EngineConfig::default().with_context(context))
            .unwrap();
        assert_eq!(engine.render_template("site", &json!({})).unwrap(), "b.org");
        assert_eq!(
            engine.render_template("site", &json!({"site": "scope"})).unwrap(),
            "scope"
        );
    }

    #[test]
    fn test_register_helper() {
        let mut engine = Engine::default();
        engine.register_helper("upper", |args: &[Value]| {
            Ok(json!(args
                .first()
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_uppercase()))
        });
        assert_eq!(engine.render("<%= upper(x) %>", &json!({"x": "ab"})).unwrap(), "AB");
    }

    #[test]
    fn test_custom_macro() {
        let mut engine = Engine::default();
        engine
            .macros_mut()
            .push(crate::macros::MacroRule::new(r"\bunless\s*\(", "if (!").unwrap());
        let out = engine
            .render("<% unless (hidden) { %>shown<% } %>", &json!({"hidden": false}))
            .unwrap();
        assert_eq!(out, "shown");
    }

    #[test]
    fn test_listing() {
        let engine = Engine::default();
        let template = engine.compile("a'\n<%= x %><% y = 1 %><%# c %>").unwrap();
        assert_eq!(
            template.listing(),
            "append('a\\'\\n');\nappend(escapeText(x));\nappend('');\ny = 1\nappend('');\n// comment\nappend('');"
        );
    }

    #[tokio::test]
    async fn test_render_file_with_memory_loader() {
        let engine = Engine::default()
            .with_loader(MemoryLoader::new().with("page", "<p><%= body %></p>"));
        let out = engine.render_file("page", &json!({"body": "hi"})).await.unwrap();
        assert_eq!(out, "<p>hi</p>");
        assert!(engine.cache().contains("page"));
    }

    #[tokio::test]
    async fn test_render_file_load_failure() {
        let engine = Engine::default().with_loader(MemoryLoader::new());
        let err = engine.render_file("nope", &json!({})).await.unwrap_err();
        match err {
            TemplateError::Load { locator, source } => {
                assert_eq!(locator, "nope");
                assert_eq!(source.to_string(), "no template registered for 'nope'");
            }
            other => panic!("Expected Load, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_render_file_with_callback() {
        let engine = Engine::default().with_loader(MemoryLoader::new().with("t", "<%= n %>"));
        let mut calls = Vec::new();
        engine
            .render_file_with("t", &json!({"n": 7}), |result| calls.push(result))
            .await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].as_ref().unwrap(), "7");

        let mut failed = None;
        engine
            .render_file_with("t", &json!({}), |result| failed = Some(result))
            .await;
        assert!(matches!(failed, Some(Err(TemplateError::Evaluation { .. }))));
    }
}
