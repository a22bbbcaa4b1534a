//! The compiled, reusable form of a template.

use serde_json::Value;

use crate::codegen::{self, Instruction};
use crate::config::Context;
use crate::error::{TemplateError, TemplateResult};
use crate::helpers::HelperApi;
use crate::runtime;
use crate::script::Program;

/// A compiled template.
///
/// Immutable once built: rendering holds no per-call state on the template,
/// so one instance can be shared and rendered any number of times. The tag
/// pattern and macros in effect at compile time are baked into it.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    name: String,
    instructions: Vec<Instruction>,
    program: Program,
}

impl CompiledTemplate {
    pub(crate) fn new(name: String, instructions: Vec<Instruction>, program: Program) -> Self {
        Self {
            name,
            instructions,
            program,
        }
    }

    /// Cache key, locator, or `<anonymous>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The generated instructions, one per line.
    pub fn listing(&self) -> String {
        codegen::listing(&self.instructions)
    }

    /// Execute with `scope` as per-call data.
    ///
    /// Either the full output is returned or an error; there is no partial
    /// output.
    pub fn render(
        &self,
        scope: &Value,
        context: &Context,
        api: &HelperApi,
    ) -> TemplateResult<String> {
        runtime::run(&self.program, scope, context, api).map_err(|source| {
            TemplateError::Evaluation {
                template: self.name.clone(),
                source,
            }
        })
    }
}
