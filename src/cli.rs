use crate::config::DEFAULT_OUTPUT_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "az-docs",
    version,
    about = "A way to generate compliance documentation based on your Azure tenant",
    long_about = "az-docs walks a management-group hierarchy, collects policy assignments and definitions, and documents which definitions are in use."
)]
pub struct Cli {
    /// The base management group to generate docs from
    #[arg(short = 'm', long = "base-mgmt-group", value_name = "NAME")]
    pub base_mgmt_group: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate the markdown documentation file
    Generate {
        /// The output file to write the docs to
        #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,
    },
    /// Show the entities available
    Show,
}
