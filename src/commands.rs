//! `generate` and `show`.
//!
//! Both build the full diagram before producing any output, so a failed run
//! leaves no report file and prints nothing to stdout.

use crate::azure::{login, ArmGateway, PolicyGateway};
use crate::cli::{Cli, Command};
use crate::config::Settings;
use crate::error::{AzDocsError, Result};
use crate::output::{render_listing, render_markdown};
use crate::processing::PolicyDiagram;
use colored::Colorize;
use std::io::Write;
use std::path::Path;

/// Entry point for a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let credential = login()?;
    let gateway = ArmGateway::new(credential, Settings::from_env());
    match cli.command {
        Command::Generate { output } => generate(gateway, &cli.base_mgmt_group, &output).await,
        Command::Show => {
            let stdout = std::io::stdout();
            show(gateway, &cli.base_mgmt_group, &mut stdout.lock()).await
        }
    }
}

/// Build the diagram and write the markdown report to `output`.
pub async fn generate<G: PolicyGateway>(gateway: G, base: &str, output: &Path) -> Result<()> {
    let diagram = build(gateway, base).await?;

    eprintln!("{}", "Generating documentation".green());
    let doc = render_markdown(&diagram)?;
    std::fs::write(output, doc).map_err(|source| AzDocsError::Io {
        path: output.display().to_string(),
        source,
    })?;

    log::info!("report written to {}", output.display());
    eprintln!("Documentation generated: {}", output.display().to_string().blue());
    Ok(())
}

/// Build the diagram and write the entity listing to `out`.
pub async fn show<G: PolicyGateway, W: Write>(gateway: G, base: &str, out: &mut W) -> Result<()> {
    let diagram = build(gateway, base).await?;
    let listing = render_listing(&diagram)?;
    out.write_all(listing.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|source| AzDocsError::Io {
            path: "<stdout>".to_string(),
            source,
        })
}

async fn build<G: PolicyGateway>(gateway: G, base: &str) -> Result<PolicyDiagram<G>> {
    let mut diagram = PolicyDiagram::new(gateway);
    diagram.initialize(base).await?;
    Ok(diagram)
}
