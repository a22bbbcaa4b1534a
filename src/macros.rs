//! Textual rewrite rules applied to statement tags before parsing.
//!
//! Rules are plain regex substitutions run in list order over the whole tag
//! content. They do not understand the code they rewrite: a pattern can match
//! inside an unrelated expression, and the rewritten text is only checked
//! when the template's statements are parsed.

use regex::Regex;

/// Iterate an array with `for (name in expr)`.
///
/// Expands to an index loop with `_name` (counter) and `__name` (length)
/// alongside the element binding. The expression ends at the first `)`.
pub const FOR_IN_PATTERN: &str = r"for\s*\(\s*(\w+)\s+in\s+(.+?)\)";

pub const FOR_IN_REPLACEMENT: &str =
    "for (var _${1} = 0, __${1} = (${2}).length, ${1}; ${1} = (${2})[_${1}], _${1} < __${1}; ++_${1})";

/// One pattern/replacement pair.
#[derive(Debug, Clone)]
pub struct MacroRule {
    pattern: Regex,
    replacement: String,
}

impl MacroRule {
    /// Build a rule; `replacement` may reference capture groups as `${1}`.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    /// Replace every match in `code`.
    pub fn apply(&self, code: &str) -> String {
        self.pattern
            .replace_all(code, self.replacement.as_str())
            .into_owned()
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Ordered list of rules.
#[derive(Debug, Clone)]
pub struct MacroSet {
    rules: Vec<MacroRule>,
}

impl MacroSet {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; it runs after every rule already present.
    pub fn push(&mut self, rule: MacroRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[MacroRule] {
        &self.rules
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Run every rule over `code`, in order.
    pub fn apply(&self, code: &str) -> String {
        self.rules
            .iter()
            .fold(code.to_string(), |code, rule| rule.apply(&code))
    }
}

impl Default for MacroSet {
    /// The built-in `for (name in expr)` rule.
    fn default() -> Self {
        let for_in = MacroRule::new(FOR_IN_PATTERN, FOR_IN_REPLACEMENT)
            .expect("built-in for-in macro pattern is valid");
        Self {
            rules: vec![for_in],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_in_rewrite() {
        let macros = MacroSet::default();
        assert_eq!(
            macros.apply("for (item in items) {"),
            "for (var _item = 0, __item = (items).length, item; item = (items)[_item], _item < __item; ++_item) {"
        );
    }

    #[test]
    fn test_for_in_member_expression() {
        let macros = MacroSet::default();
        let out = macros.apply("for(row in page.rows)");
        assert!(out.contains("__row = (page.rows).length"));
        assert!(out.contains("row = (page.rows)[_row]"));
    }

    #[test]
    fn test_c_style_for_untouched() {
        let macros = MacroSet::default();
        let code = "for (var i = 0; i < 3; i++) {";
        assert_eq!(macros.apply(code), code);
    }

    #[test]
    fn test_rewrites_every_occurrence() {
        let macros = MacroSet::default();
        let out = macros.apply("for (a in xs) { for (b in ys) {");
        assert!(out.contains("__a = (xs).length"));
        assert!(out.contains("__b = (ys).length"));
    }

    #[test]
    fn test_rules_run_in_order() {
        let mut macros = MacroSet::empty();
        macros.push(MacroRule::new(r"\bunless\b", "if not").unwrap());
        macros.push(MacroRule::new(r"if not \((.+?)\)", "if (!(${1}))").unwrap());
        assert_eq!(macros.apply("unless (done) {"), "if (!(done)) {");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(MacroRule::new("(unclosed", "x").is_err());
    }
}
