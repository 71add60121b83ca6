//! List the registered sync models.

use crate::error::Result;
use crate::sync::{ModelConfig, Registry};
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct ModelInfo<'a> {
    name: &'a str,
    remote_model: &'a str,
    priority: i64,
    import: bool,
    export: bool,
    include_inactive: bool,
}

impl<'a> From<&'a ModelConfig> for ModelInfo<'a> {
    fn from(config: &'a ModelConfig) -> Self {
        Self {
            name: config.name,
            remote_model: config.remote_model,
            priority: config.priority,
            import: config.import.is_some(),
            export: config.export.is_some(),
            include_inactive: config.include_inactive,
        }
    }
}

/// Execute the models command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let registry = Registry::builtin();
    let mut models: Vec<ModelInfo<'_>> = registry.iter().map(ModelInfo::from).collect();
    models.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(b.name)));

    if json {
        println!("{}", serde_json::to_string(&models)?);
        return Ok(());
    }

    println!("Models ({}):", models.len());
    println!();
    for model in &models {
        let directions = match (model.import, model.export) {
            (true, true) => "import, export",
            (true, false) => "import",
            (false, true) => "export",
            (false, false) => "-",
        };
        let remote = if model.remote_model == model.name {
            String::new()
        } else {
            format!(" -> {}", model.remote_model)
        };
        println!(
            "  {:>3} {}{} {}",
            model.priority.to_string().dimmed(),
            model.name.bold(),
            remote,
            format!("[{directions}]").dimmed()
        );
    }

    Ok(())
}
