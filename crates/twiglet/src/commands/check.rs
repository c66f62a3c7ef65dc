/*
 * check.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Check command: compile a template and report warnings.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::{TemplateArgs, report_diagnostics};

/// Arguments for the check command
#[derive(Debug, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub template: TemplateArgs,

    /// Treat warnings as errors
    #[arg(long)]
    pub deny_warnings: bool,
}

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    let template = args.template.compile()?;
    report_diagnostics(&template);

    let warnings = template.diagnostics().len();
    if args.deny_warnings && warnings > 0 {
        anyhow::bail!(
            "{} produced {} warning(s)",
            args.template.template.display(),
            warnings
        );
    }

    info!(template = %args.template.template.display(), warnings, "template compiled");
    Ok(())
}
