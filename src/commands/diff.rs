//! `hearth diff`: what `apply` would change in deployed dotfiles

use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use serde::Serialize;
use similar::TextDiff;
use std::fs;
use std::path::Path;

use reconcile::{Item, ItemState, reconcile_resource};

use super::load_dotfiles;
use crate::Context as AppContext;
use crate::dotfiles::DotfileResource;
use crate::output;
use crate::paths;
use crate::ui;

/// Lines of unchanged context around each hunk
const CONTEXT_LINES: usize = 3;

/// Difference between one deployed dotfile and its source
#[derive(Debug, Serialize)]
pub struct FileDiff {
    pub name: String,
    pub state: ItemState,
    /// Unified diff from deployed to source, `None` when either is binary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

pub fn run(app: &AppContext, name: Option<&str>) -> Result<()> {
    let resource = load_dotfiles(app)?;
    let ctx = app.operation().with_timeout(app.config.dotfile_timeout());
    let items = reconcile_resource(&ctx, &resource).context("Failed to reconcile dotfiles")?;

    let wanted = match name {
        Some(input) => Some(item_name(input, &resource)?),
        None => None,
    };
    let diffs = collect(&resource, &items, wanted.as_deref())?;

    if app.output.is_structured() {
        return output::print(app.output, &diffs);
    }

    if diffs.is_empty() {
        ui::success("Deployed dotfiles match their sources");
        return Ok(());
    }
    for diff in &diffs {
        display(diff);
    }
    Ok(())
}

/// Item name for a user-supplied dotfile path (`~/.zshrc`, `.zshrc`)
fn item_name(input: &str, resource: &DotfileResource) -> Result<String> {
    let home = resource.home();
    let absolute = paths::resolve_in_home(input, home, home)?;
    let relative = absolute
        .strip_prefix(paths::normalize(home))
        .with_context(|| format!("{} is outside the home directory", absolute.display()))?;
    Ok(relative.display().to_string())
}

/// Diffs for drifted and missing dotfiles, or for the one named
pub(crate) fn collect(resource: &DotfileResource, items: &[Item], wanted: Option<&str>) -> Result<Vec<FileDiff>> {
    let selected: Vec<&Item> = match wanted {
        Some(name) => {
            let Some(item) = items.iter().find(|i| i.name == name) else {
                bail!("'{name}' is not a managed dotfile");
            };
            if item.state == ItemState::Untracked {
                bail!("'{name}' is not a managed dotfile");
            }
            vec![item]
        }
        None => items
            .iter()
            .filter(|i| matches!(i.state, ItemState::Degraded | ItemState::Missing))
            .collect(),
    };

    selected
        .into_iter()
        .map(|item| file_diff(resource, item))
        .collect()
}

fn file_diff(resource: &DotfileResource, item: &Item) -> Result<FileDiff> {
    let expected = resource.source_content(item)?;
    let deployed = match item.path.as_deref() {
        Some(path) if path.is_file() => read(path)?,
        _ => Vec::new(),
    };

    let diff = match (std::str::from_utf8(&deployed), std::str::from_utf8(&expected)) {
        (Ok(old), Ok(new)) => Some(unified(&item.name, old, new)),
        _ => None,
    };
    Ok(FileDiff {
        name: item.name.clone(),
        state: item.state,
        diff,
    })
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Unified diff from the deployed file to what a deploy would write
pub(crate) fn unified(name: &str, deployed: &str, expected: &str) -> String {
    TextDiff::from_lines(deployed, expected)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&format!("~/{name} (deployed)"), &format!("~/{name} (source)"))
        .to_string()
}

fn display(diff: &FileDiff) {
    ui::section(&format!("~/{} ({})", diff.name, diff.state));
    let Some(text) = &diff.diff else {
        ui::dim("binary files differ");
        return;
    };
    if text.is_empty() {
        ui::dim("(files are identical)");
        return;
    }
    for line in text.lines() {
        let colored = match line.chars().next() {
            Some('@') => line.cyan(),
            Some('-') if !line.starts_with("---") => line.red(),
            Some('+') if !line.starts_with("+++") => line.green(),
            _ => line.normal(),
        };
        println!("  {colored}");
    }
}
