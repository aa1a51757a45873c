use std::path::PathBuf;

use clap::{
    Parser, Subcommand, ValueHint,
    builder::{Styles, styling::AnsiColor},
    crate_authors, crate_description, crate_version,
};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[clap(
    version = crate_version!(),
    author = crate_authors!(),
    about = crate_description!(),
    styles = Styles::styled()
        .header(AnsiColor::BrightMagenta.on_default().bold().underline())
        .usage(AnsiColor::BrightMagenta.on_default().bold().underline())
        .literal(AnsiColor::BrightCyan.on_default().bold())
        .placeholder(AnsiColor::BrightCyan.on_default().bold())
        .valid(AnsiColor::BrightGreen.on_default())
        .invalid(AnsiColor::BrightYellow.on_default())
        .error(AnsiColor::BrightRed.on_default())
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Set the log level
    #[arg(short, long, value_name = "LEVEL", env = "BUNDLE_LOG", global = true)]
    pub log: Option<LevelFilter>,

    /// Display the time taken for each operation
    #[arg(short, long, global = true)]
    pub time: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a bundle manifest's schemas and tasks and report diagnostics
    #[command(alias = "v")]
    Validate {
        /// Path to the bundle manifest (a `bundle.toml` file or its directory)
        #[arg(value_hint = ValueHint::AnyPath)]
        manifest: PathBuf,
    },

    /// Validate an IR instance file against one of the bundle's schemas
    #[command(alias = "i")]
    CheckInstance {
        #[arg(value_hint = ValueHint::AnyPath)]
        manifest: PathBuf,

        /// Name of the schema to validate against
        #[arg(long)]
        schema: String,

        /// Path to the serialized IR instance
        #[arg(value_hint = ValueHint::FilePath)]
        instance: PathBuf,
    },

    /// Run a named task from the bundle against a serialized IR instance
    #[command(alias = "r")]
    Run {
        /// Path to the bundle manifest (a `bundle.toml` file or its directory)
        #[arg(value_hint = ValueHint::AnyPath)]
        manifest: PathBuf,

        /// Name of the schema the instance conforms to
        #[arg(long)]
        schema: String,

        /// Name of the task to run
        #[arg(long)]
        task: String,

        /// Path to the serialized IR instance to run the task against
        #[arg(value_hint = ValueHint::FilePath)]
        instance: PathBuf,
    },
}
