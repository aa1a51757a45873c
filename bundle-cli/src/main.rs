mod cli;
mod error;
mod manifest;
mod run;

use std::fmt;
use std::process::ExitCode;
use std::time::Instant;

use bundle_engine::{Diagnostics, Severity};
use clap::Parser;
use colored::Colorize;
use tracing::{Event, Level, Subscriber, level_filters::LevelFilter};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, format::Writer};
use tracing_subscriber::registry::LookupSpan;

use crate::cli::{Cli, Command};
use crate::error::CliError;

fn main() -> ExitCode {
    let start_time = Instant::now();
    let Cli { command, log, time } = Cli::parse();

    if let Some(level) = log {
        start_logging(level, start_time);
    }

    let mut diagnostics = Diagnostics::new();
    let result = match command {
        Command::Validate { manifest } => {
            let mut bundle = match manifest::load_bundle(&manifest) {
                Ok(bundle) => bundle,
                Err(error) => return report_cli_error(error),
            };
            if bundle.validate(&mut diagnostics) {
                Ok(None)
            } else {
                Err(CliError::ValidationFailed)
            }
        }
        Command::CheckInstance { manifest, schema, instance } => {
            let mut bundle = match manifest::load_bundle(&manifest) {
                Ok(bundle) => bundle,
                Err(error) => return report_cli_error(error),
            };
            run::load_and_validate_instance(&mut bundle, &schema, &instance, &mut diagnostics).map(|_| None)
        }
        Command::Run { manifest, schema, task, instance } => {
            let mut bundle = match manifest::load_bundle(&manifest) {
                Ok(bundle) => bundle,
                Err(error) => return report_cli_error(error),
            };
            run::run_task(&mut bundle, &schema, &task, &instance, &mut diagnostics).map(Some)
        }
    };

    print_diagnostics(&diagnostics);

    if time {
        let elapsed = start_time.elapsed();
        println!("{}", format!("total time: {:.3}ms", elapsed.as_secs_f64() * 1000.0).dimmed());
    }

    match result {
        Ok(Some(output)) => {
            print!("{}", String::from_utf8_lossy(&output));
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(error) => report_cli_error(error),
    }
}

fn report_cli_error(error: CliError) -> ExitCode {
    eprintln!("{} {error}", "error:".red().bold());
    ExitCode::FAILURE
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for record in diagnostics.records() {
        let label = match record.id.severity() {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
        };
        eprintln!("{label}: {record}");
    }
}

fn start_logging(level: LevelFilter, start_time: Instant) {
    tracing_subscriber::fmt()
        .with_env_filter(format!("none,bundle_engine={level},bundle_cli={level}"))
        .event_format(LogFormatter { start_time })
        .init();
}

struct LogFormatter {
    start_time: Instant,
}

impl<S, N> FormatEvent<S, N> for LogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, context: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let elapsed = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let level = event.metadata().level();
        let scopes = context
            .event_scope()
            .map(|scope| scope.from_root().collect::<Vec<_>>())
            .unwrap_or_default();

        let (emoji, colorized_level) = match *level {
            Level::ERROR => ("🕱", "ERROR".red().bold()),
            Level::WARN => ("⚠", "WARN".yellow().bold()),
            Level::INFO => ("🛈", "INFO".blue().bold()),
            Level::DEBUG => ("🕷", "DEBUG".green().bold()),
            Level::TRACE => ("🖙", "TRACE".cyan().bold()),
        };

        write!(writer, "{} {}  {:5}", format!("{elapsed:.3}ms").dimmed(), emoji, colorized_level)?;

        if !scopes.is_empty() {
            let span_names = scopes.iter().map(|span| span.metadata().name()).collect::<Vec<_>>();
            write!(writer, " {}", span_names.join("::").bold())?;
        }

        write!(writer, " ")?;
        context.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
