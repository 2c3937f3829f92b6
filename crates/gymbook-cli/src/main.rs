//! Gymbook CLI: book a Free Fitness slot from the command line
//!
//! ## Usage
//!
//! ```bash
//! gymbook book -u USER -p PASS -d 14 -m 3 -s 2 --wait-midnight --remember
//! gymbook book                     # reuse remembered values
//! gymbook countdown --follow       # live HH:MM:SS until midnight
//! gymbook settings                 # show remembered values
//! gymbook settings clear
//! ```

use clap::Parser;
use gymbook::{Clock, RunConfig, RunOutcome, SystemClock};
use gymbook_cli::{
    countdown_text, BookArgs, BookingRequest, BookingRunner, Cli, CliConfig, CliResult, Commands,
    CountdownArgs, Reporter, SettingsAction, SettingsArgs, Settings, Verbosity, COUNTDOWN_TICK,
    EXIT_CANCELED,
};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match run(cli, &config) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            Reporter::new(config.color.should_color(), false).failure(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: &CliConfig) -> CliResult<u8> {
    match cli.command {
        Commands::Book(args) => run_book(config, &args),
        Commands::Countdown(args) => run_countdown(config, &args),
        Commands::Settings(args) => run_settings(config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_settings_path(cli.settings.clone())
}

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn reporter(config: &CliConfig) -> Reporter {
    Reporter::new(config.color.should_color(), config.verbosity.is_quiet())
}

fn run_book(config: &CliConfig, args: &BookArgs) -> CliResult<u8> {
    let settings = Settings::load(&config.settings_path);
    let request = BookingRequest::resolve(args, &settings)?;
    if args.remember {
        request.to_settings().save(&config.settings_path);
    }
    let run_config = request.run_config()?;
    tracing::debug!(date = %request.target, slot = %request.slot, "booking requested");

    let runner = BookingRunner::new(reporter(config));
    let outcome = runtime()?.block_on(async {
        let cancel = runner.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
        book(&runner, args, run_config).await
    })?;
    runner.finish(outcome)
}

#[cfg(feature = "browser")]
async fn book(runner: &BookingRunner, args: &BookArgs, config: RunConfig) -> CliResult<RunOutcome> {
    let launcher = gymbook::ChromiumLauncher::new(gymbook_cli::launch_options(args));
    Ok(runner.run(launcher, config).await)
}

#[cfg(not(feature = "browser"))]
async fn book(
    _runner: &BookingRunner,
    _args: &BookArgs,
    _config: RunConfig,
) -> CliResult<RunOutcome> {
    Err(gymbook_cli::CliError::config(
        "built without browser support; rebuild with --features browser",
    ))
}

fn run_countdown(config: &CliConfig, args: &CountdownArgs) -> CliResult<u8> {
    if !args.follow {
        println!("{}", countdown_text(&SystemClock));
        return Ok(0);
    }

    let reporter = reporter(config);
    runtime()?.block_on(async {
        let remaining = Duration::from_secs_f64(SystemClock.seconds_until_midnight());
        let midnight = tokio::time::sleep(remaining);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(midnight, ctrl_c);
        let mut ticks = tokio::time::interval(COUNTDOWN_TICK);

        reporter.start_countdown();
        let code = loop {
            tokio::select! {
                _ = &mut ctrl_c => break EXIT_CANCELED,
                () = &mut midnight => break 0,
                _ = ticks.tick() => reporter.tick_countdown(),
            }
        };
        reporter.stop_countdown();
        if code == 0 {
            reporter.status("Midnight.");
        }
        Ok(code)
    })
}

fn run_settings(config: &CliConfig, args: &SettingsArgs) -> CliResult<u8> {
    let path = &config.settings_path;
    match args.action.unwrap_or(SettingsAction::Show) {
        SettingsAction::Show => {
            let settings = Settings::load(path);
            if settings.is_empty() {
                println!("No saved settings at {}", path.display());
            } else {
                println!("Settings from {}:", path.display());
                for (key, value) in settings.display_entries() {
                    println!("  {key:<16} {value}");
                }
            }
        }
        SettingsAction::Clear => {
            if Settings::clear(path)? {
                println!("Removed {}", path.display());
            } else {
                println!("No saved settings at {}", path.display());
            }
        }
    }
    Ok(0)
}
