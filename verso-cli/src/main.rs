//! Verso CLI - apply versioned change logs from the command line.

use clap::Parser;
use clap::error::ErrorKind;

use verso_cli::cli::Cli;
use verso_cli::config::{Config, Settings};
use verso_cli::error::CliResult;
use verso_cli::{logging, output, run};
use verso_core::{EXIT_FAILURE, EXIT_SUCCESS};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_FAILURE,
            };
            std::process::exit(code);
        }
    };

    match execute(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::newline();
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(EXIT_FAILURE);
        }
    }
}

async fn execute(cli: Cli) -> CliResult<i32> {
    logging::init(cli.verbose);

    if !cli.no_banner {
        output::banner();
    }

    let config = Config::discover(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, &config)?;

    output::kv("Change log", &settings.changelog.display().to_string());
    output::kv("Database type", &settings.db_type.to_string());
    if settings.update_checksums {
        output::info("Checksums of modified changesets will be refreshed");
    }

    let log = run::load_change_log(&settings)?;
    let tracker = run::apply(&settings, &log).await;

    output::summary(&tracker);
    Ok(tracker.exit_code())
}
