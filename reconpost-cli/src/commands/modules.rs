//! `reconpost modules` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use reconpost_core::config::ReconpostConfig;
use reconpost_core::{ModuleDescriptor, TargetType};

use crate::cli::ModulesArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `modules` command.
pub async fn execute(
    args: ModulesArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = ReconpostConfig::load_or_default(config_path).await?;
    let registry = reconpost_modules::default_registry(&config.modules)?;
    let filter = args
        .target_type
        .as_deref()
        .map(str::parse::<TargetType>)
        .transpose()?;

    info!(count = registry.count(), "listing modules");
    writer.render(&ModulesReport::new(registry.list(), filter))?;
    Ok(())
}

/// Registered modules, optionally filtered by target type.
#[derive(Debug, Serialize)]
pub struct ModulesReport {
    pub modules: Vec<ModuleDescriptor>,
}

impl ModulesReport {
    pub fn new(modules: Vec<ModuleDescriptor>, filter: Option<TargetType>) -> Self {
        let modules = match filter {
            Some(kind) => modules.into_iter().filter(|m| m.applies_to(kind)).collect(),
            None => modules,
        };
        Self { modules }
    }
}

impl Render for ModulesReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.modules.is_empty() {
            writeln!(w, "{}", "No modules registered.".yellow())?;
            return Ok(());
        }

        writeln!(w, "{:<14} {:<22} {:<18} Description", "ID", "Name", "Targets")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for m in &self.modules {
            let targets: Vec<&str> = m.target_types.iter().map(TargetType::as_str).collect();
            writeln!(
                w,
                "{:<14} {:<22} {:<18} {}",
                m.id.bold(),
                m.name,
                targets.join(","),
                m.description
            )?;
        }
        writeln!(w)?;
        writeln!(w, "{} module(s)", self.modules.len())?;
        Ok(())
    }
}
