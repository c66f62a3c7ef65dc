/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render command implementation
 */

//! Render command implementation.
//!
//! Compiles a template from disk, renders it with JSON data and writes the
//! result to stdout or a file. Compile warnings are printed to stderr.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;
use twiglet_template::Context;

use super::{TemplateArgs, report_diagnostics};

/// Arguments for the render command
#[derive(Debug, Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub template: TemplateArgs,

    /// JSON file with template variables ('-' reads stdin)
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Write output to FILE instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the render command
pub fn execute(args: RenderArgs) -> Result<()> {
    let template = args.template.compile()?;
    report_diagnostics(&template);

    let context = load_context(args.data.as_ref())?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            template
                .render_to(&context, &mut out)
                .with_context(|| format!("Failed to render {}", args.template.template.display()))?;
            out.flush()?;
            info!(output = %path.display(), "rendered template");
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            template
                .render_to(&context, &mut out)
                .with_context(|| format!("Failed to render {}", args.template.template.display()))?;
            out.flush()?;
        }
    }
    Ok(())
}

/// Read the template variables. Without a data file the context is empty.
fn load_context(path: Option<&PathBuf>) -> Result<Context> {
    let Some(path) = path else {
        return Ok(Context::new());
    };

    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read data from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read data file {}", path.display()))?
    };

    let data: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    match Context::from_serialize(&data)? {
        Some(context) => Ok(context),
        None => anyhow::bail!(
            "Data in {} must be a JSON object, got {}",
            path.display(),
            json_type(&data)
        ),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
