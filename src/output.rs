//! Output formats: a human table or a JSON/YAML document

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns with colors
    #[default]
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Whether output is a document for other programs to read
    pub fn is_structured(self) -> bool {
        !matches!(self, Self::Table)
    }
}

/// Serialize `value` as a JSON or YAML document
pub fn render<T: Serialize>(format: OutputFormat, value: &T) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("Failed to serialize output as JSON")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(value).context("Failed to serialize output as YAML")
        }
        OutputFormat::Table => anyhow::bail!("table output is rendered by the command"),
    }
}

/// Print `value` as a JSON or YAML document on stdout
pub fn print<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    let document = render(format, value)?;
    println!("{}", document.trim_end());
    Ok(())
}

/// Left-aligned text columns
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }

    fn format_line(cells: &[String], widths: &[usize]) -> String {
        let last = cells.len().saturating_sub(1);
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i == last {
                    cell.clone()
                } else {
                    format!("{cell:<width$}", width = widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    }

    /// Plain rendering, one line per row after the header
    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut lines = vec![Self::format_line(&self.headers, &widths)];
        lines.extend(self.rows.iter().map(|row| Self::format_line(row, &widths)));
        lines.join("\n")
    }

    pub fn print(&self) {
        let rendered = self.render();
        let mut lines = rendered.lines();
        if let Some(header) = lines.next() {
            println!("  {}", header.bold());
        }
        for line in lines {
            println!("  {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_render_json() {
        let value = BTreeMap::from([("name", "jq")]);
        let json = render(OutputFormat::Json, &value).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["name"], "jq");
    }

    #[test]
    fn test_render_yaml() {
        let value = BTreeMap::from([("name", "jq")]);
        assert_eq!(render(OutputFormat::Yaml, &value).unwrap(), "name: jq\n");
    }

    #[test]
    fn test_render_table_format_is_error() {
        assert!(render(OutputFormat::Table, &1).is_err());
        assert!(!OutputFormat::Table.is_structured());
        assert!(OutputFormat::Json.is_structured());
    }

    #[test]
    fn test_table_alignment() {
        let mut table = Table::new(&["NAME", "STATE"]);
        table.row(vec!["ripgrep".into(), "missing".into()]);
        table.row(vec!["jq".into(), "managed".into()]);

        assert_eq!(
            table.render(),
            "NAME     STATE\nripgrep  missing\njq       managed"
        );
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new(&["NAME"]);
        assert!(table.is_empty());
        assert_eq!(table.render(), "NAME");
    }
}
