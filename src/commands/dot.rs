use anyhow::{Context as _, Result};

use super::{load_dotfiles, report};
use crate::Context as AppContext;
use crate::cli::DotCommand;
use crate::dotfiles::ops;

pub fn run(app: &AppContext, cmd: DotCommand) -> Result<()> {
    let resource = load_dotfiles(app)?;
    let ctx = app.operation().with_timeout(app.config.dotfile_timeout());
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;

    match cmd {
        DotCommand::Add { paths, dry_run } => {
            let results = ops::add(&ctx, &resource, &paths, &cwd, dry_run);
            report(app, "dot add", dry_run, &results)
        }
        DotCommand::Rm { names, dry_run } => {
            let results = ops::remove(&ctx, &resource, &names, &cwd, dry_run);
            report(app, "dot rm", dry_run, &results)
        }
    }
}
