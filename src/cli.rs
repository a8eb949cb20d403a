use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "hearth")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Keep your packages and dotfiles in the state you declared", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show managed, missing and untracked packages and dotfiles
    Status(StatusArgs),

    /// Install missing packages and deploy missing or drifted dotfiles
    Apply(ApplyArgs),

    /// Install packages and record them in the lock
    Install(InstallArgs),

    /// Uninstall packages and drop them from the lock
    Uninstall(UninstallArgs),

    /// Manage dotfile sources
    #[command(subcommand)]
    Dot(DotCommand),

    /// Show how deployed dotfiles differ from their sources
    Diff(DiffArgs),

    /// Search package managers for a package
    Search(SearchArgs),

    /// Show details about a package
    Info(InfoArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Restrict a command to one domain
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct DomainArgs {
    /// Only packages
    #[arg(long, conflicts_with = "dotfiles")]
    pub packages: bool,

    /// Only dotfiles
    #[arg(long)]
    pub dotfiles: bool,
}

impl DomainArgs {
    pub fn includes_packages(&self) -> bool {
        !self.dotfiles || self.packages
    }

    pub fn includes_dotfiles(&self) -> bool {
        !self.packages || self.dotfiles
    }
}

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub domains: DomainArgs,

    /// List untracked items instead of only counting them
    #[arg(short, long)]
    pub unmanaged: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub domains: DomainArgs,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct InstallArgs {
    /// Packages, optionally prefixed with their manager (`cargo:ripgrep`)
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Manager for packages without a prefix (defaults to `default_manager`)
    #[arg(short, long)]
    pub manager: Option<String>,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct UninstallArgs {
    /// Packages, optionally prefixed with their manager (`npm:typescript`)
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Manager for packages without a prefix (defaults to the one in the lock)
    #[arg(short, long)]
    pub manager: Option<String>,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum DotCommand {
    /// Copy dotfiles from home into the config directory
    Add {
        /// Paths under home (`~/.zshrc`, `.config/nvim`)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Show what would change without changing anything
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Stop managing dotfiles (deployed files are left in place)
    #[command(alias = "remove")]
    Rm {
        /// Dotfile names or paths (`.zshrc`, `~/.config/nvim`)
        #[arg(required = true)]
        names: Vec<String>,

        /// Show what would change without changing anything
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
}

#[derive(Args)]
pub struct DiffArgs {
    /// Only this dotfile (`.zshrc`, `~/.config/nvim/init.lua`)
    pub name: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Text to search for, optionally prefixed with a manager (`brew:ripgrep`)
    pub query: String,

    /// Only search this manager
    #[arg(short, long)]
    pub manager: Option<String>,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Package, optionally prefixed with its manager (`npm:typescript`)
    pub package: String,

    /// Manager to ask (defaults to the one in the lock, then any that has it installed)
    #[arg(short, long)]
    pub manager: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_domain_flags() {
        let both = DomainArgs::default();
        assert!(both.includes_packages() && both.includes_dotfiles());

        let packages = DomainArgs {
            packages: true,
            dotfiles: false,
        };
        assert!(packages.includes_packages());
        assert!(!packages.includes_dotfiles());

        let dotfiles = DomainArgs {
            packages: false,
            dotfiles: true,
        };
        assert!(!dotfiles.includes_packages());
        assert!(dotfiles.includes_dotfiles());
    }

    #[test]
    fn test_domain_flags_conflict() {
        assert!(Cli::try_parse_from(["hearth", "status", "--packages", "--dotfiles"]).is_err());
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from(["hearth", "-o", "json", "install", "jq", "cargo:ripgrep", "-m", "brew"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        let Command::Install(args) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(args.packages, ["jq", "cargo:ripgrep"]);
        assert_eq!(args.manager.as_deref(), Some("brew"));
        assert!(!args.dry_run);
    }

    #[test]
    fn test_install_requires_packages() {
        assert!(Cli::try_parse_from(["hearth", "install"]).is_err());
    }

    #[test]
    fn test_parse_dot_rm_alias() {
        let cli = Cli::try_parse_from(["hearth", "dot", "remove", ".zshrc", "--dry-run"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Dot(DotCommand::Rm { dry_run: true, .. })
        ));
    }

    #[test]
    fn test_parse_search_and_info() {
        let cli = Cli::try_parse_from(["hearth", "search", "ripgrep", "--manager", "cargo"]).unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query, "ripgrep");
        assert_eq!(args.manager.as_deref(), Some("cargo"));

        let cli = Cli::try_parse_from(["hearth", "info", "npm:typescript"]).unwrap();
        let Command::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert_eq!(args.package, "npm:typescript");
        assert!(args.manager.is_none());

        assert!(Cli::try_parse_from(["hearth", "search"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["hearth", "status", "-vv", "--output", "yaml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, OutputFormat::Yaml);
    }
}
