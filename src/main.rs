mod cli;
mod commands;
mod config;
mod dotfiles;
mod lock;
mod output;
mod packages;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

use config::Config;
use output::OutputFormat;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub output: OutputFormat,
    pub config_dir: PathBuf,
    pub home: PathBuf,
    pub config: Config,
}

impl Context {
    /// Resolve directories and load the config
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_dir = paths::config_dir()?;
        let home = paths::home_dir()?;
        let config = Config::load(&config_dir)?;
        log::debug!(
            "Config dir {}, home {}",
            config_dir.display(),
            home.display()
        );
        Ok(Self {
            quiet: cli.quiet,
            output: cli.output,
            config_dir,
            home,
            config,
        })
    }

    /// Cancellation context bounded by the configured operation timeout
    pub fn operation(&self) -> reconcile::Context {
        reconcile::Context::with_deadline_in(self.config.operation_timeout())
    }

    /// Whether to draw progress bars and chatter
    pub fn interactive_output(&self) -> bool {
        !self.quiet && !self.output.is_structured()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "hearth", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context::load(&cli)?;

    match cli.command {
        Command::Status(args) => commands::status::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Install(args) => commands::install::run(&ctx, &args),
        Command::Uninstall(args) => commands::uninstall::run(&ctx, &args),
        Command::Dot(cmd) => commands::dot::run(&ctx, cmd),
        Command::Diff(args) => commands::diff::run(&ctx, args.name.as_deref()),
        Command::Search(args) => commands::search::run(&ctx, &args),
        Command::Info(args) => commands::info::run(&ctx, &args),
        Command::Completions { .. } => Ok(()),
    }
}
