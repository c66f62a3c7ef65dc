/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Command implementations for the twiglet CLI
//!
//! Each command module handles its CLI arguments and delegates to
//! twiglet-template for compiling and rendering.

pub mod check;
pub mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;
use twiglet_template::{EngineConfig, Environment, FileSystemResolver, Template};

/// Arguments that locate a template and configure the engine.
#[derive(Debug, Args)]
pub struct TemplateArgs {
    /// Template file to compile
    pub template: PathBuf,

    /// Directory that template references resolve against
    /// (defaults to the template's directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// TOML file with engine settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Fail on undefined variables and attributes
    #[arg(long)]
    pub strict: bool,
}

impl TemplateArgs {
    /// Load the engine configuration, applying command-line overrides.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str::<EngineConfig>(&text)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => EngineConfig::default(),
        };
        if self.strict {
            config.strict_variables = true;
        }
        Ok(config)
    }

    /// The template root and the template's reference below it.
    pub fn locate(&self) -> Result<(PathBuf, String)> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => self
                .template
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        let relative = self.template.strip_prefix(&root).with_context(|| {
            format!(
                "Template {} is not inside root {}",
                self.template.display(),
                root.display()
            )
        })?;
        let reference = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok((root, reference))
    }

    /// Build an environment and compile the template.
    pub fn compile(&self) -> Result<Template> {
        let config = self.engine_config()?;
        let (root, reference) = self.locate()?;
        debug!(root = %root.display(), reference = %reference, "compiling template");

        let env = Environment::new(config)
            .context("Invalid configuration")?
            .with_resolver(FileSystemResolver::new(root));
        env.load(&reference)
            .with_context(|| format!("Failed to compile {}", self.template.display()))
    }
}

/// Print compile warnings to stderr.
pub fn report_diagnostics(template: &Template) {
    for diagnostic in template.diagnostics().iter() {
        eprintln!("{}", diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(template: &str, root: Option<&str>) -> TemplateArgs {
        TemplateArgs {
            template: PathBuf::from(template),
            root: root.map(PathBuf::from),
            config: None,
            strict: false,
        }
    }

    #[test]
    fn test_locate_defaults_to_template_directory() {
        let (root, reference) = args("site/pages/index.twig", None).locate().unwrap();
        assert_eq!(root, PathBuf::from("site/pages"));
        assert_eq!(reference, "index.twig");
    }

    #[test]
    fn test_locate_with_root() {
        let (_, reference) = args("site/pages/index.twig", Some("site")).locate().unwrap();
        assert_eq!(reference, "pages/index.twig");
    }

    #[test]
    fn test_locate_outside_root_fails() {
        assert!(args("other/index.twig", Some("site")).locate().is_err());
    }

    #[test]
    fn test_strict_flag_overrides_config() {
        let mut args = args("index.twig", None);
        args.strict = true;
        assert!(args.engine_config().unwrap().strict_variables);
    }
}
