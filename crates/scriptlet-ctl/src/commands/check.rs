//! `check`: compile template files without rendering them.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use scriptlet::{Engine, EngineConfig};

use crate::output;

/// Returns whether every template compiled.
pub(crate) fn handle_check_command(
    config: EngineConfig,
    templates: &[PathBuf],
    listing: bool,
) -> anyhow::Result<bool> {
    let engine = Engine::new(config)?;
    let mut failures = 0;

    output::header(format!("Checking {} template(s):", templates.len()));
    for path in templates {
        match check_template(&engine, path) {
            Ok(instructions) => {
                output::status_icon(true, path.display());
                if listing {
                    output::dim(instructions);
                }
            }
            Err(e) => {
                failures += 1;
                output::status_icon(false, format!("{}: {e:#}", path.display()));
            }
        }
    }

    if failures == 0 {
        output::success("All templates compiled");
    } else {
        output::error(format!("{failures} of {} template(s) failed", templates.len()));
    }
    Ok(failures == 0)
}

/// Compile one file, returning its instruction listing.
fn check_template(engine: &Engine, path: &Path) -> anyhow::Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let template = engine.precompile(&path.display().to_string(), &text)?;
    Ok(template.listing())
}
