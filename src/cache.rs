//! Compiled-template cache keyed by caller-chosen strings.
//!
//! Entries are never evicted automatically and never checked for staleness:
//! a key that is already present is returned as is, whatever source text the
//! caller passes alongside it. `insert` overwrites.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::TemplateResult;
use crate::template::CompiledTemplate;

/// Shared map from cache key to compiled template.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: DashMap<String, Arc<CompiledTemplate>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CompiledTemplate>> {
        let hit = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        if hit.is_some() {
            tracing::trace!(key, "Template cache hit");
        }
        hit
    }

    /// Return the entry for `key`, compiling and storing it on a miss.
    ///
    /// `compile` runs outside any lock. Two callers racing on the same key may
    /// both compile; the first stored result wins and is returned to both.
    pub fn get_or_compile<F>(&self, key: &str, compile: F) -> TemplateResult<Arc<CompiledTemplate>>
    where
        F: FnOnce() -> TemplateResult<CompiledTemplate>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        tracing::debug!(key, "Template cache miss");
        let compiled = Arc::new(compile()?);
        let entry = self.entries.entry(key.to_string()).or_insert(compiled);
        Ok(Arc::clone(entry.value()))
    }

    /// Store `template` under `key`, replacing any previous entry.
    pub fn insert(&self, key: &str, template: CompiledTemplate) -> Arc<CompiledTemplate> {
        let template = Arc::new(template);
        self.entries.insert(key.to_string(), Arc::clone(&template));
        template
    }

    pub fn remove(&self, key: &str) -> Option<Arc<CompiledTemplate>> {
        self.entries.remove(key).map(|(_, template)| template)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
