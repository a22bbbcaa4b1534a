//! `render`: render one template file with JSON data.

use std::path::Path;

use anyhow::Context as _;
use scriptlet::{Engine, EngineConfig, FsLoader};
use serde_json::{Map, Value};

use crate::output;

pub(crate) async fn handle_render_command(
    config: EngineConfig,
    template: &Path,
    data: Option<&Path>,
    out_path: Option<&Path>,
) -> anyhow::Result<()> {
    let data = match data {
        Some(path) => read_data(path)?,
        None => Value::Object(Map::new()),
    };

    let engine = Engine::new(config)?.with_loader(FsLoader::new());
    let locator = template.to_string_lossy();
    let rendered = engine.render_file(&locator, &data).await?;

    match out_path {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            output::success(format!("Rendered {} to {}", template.display(), path.display()));
        }
        None => output::raw(&rendered)?,
    }
    Ok(())
}

fn read_data(path: &Path) -> anyhow::Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse data file {} as JSON", path.display()))
}
