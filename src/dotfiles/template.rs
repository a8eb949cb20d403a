//! Template rendering for `.tmpl` sources
//!
//! Variables come from `<config>/.hearth/local.yaml` (machine-local, not
//! meant to be committed), plus `env` (the process environment) and `home`.
//! Referencing an undefined variable is an error.

use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tera::Tera;

use super::filter::INTERNAL_DIR;

/// Local variables file inside [`INTERNAL_DIR`]
pub const LOCAL_VARS_FILE: &str = "local.yaml";

#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    context: tera::Context,
}

impl TemplateRenderer {
    pub fn local_vars_path(config_dir: &Path) -> PathBuf {
        config_dir.join(INTERNAL_DIR).join(LOCAL_VARS_FILE)
    }

    /// Build a renderer from the local variables file, if there is one
    pub fn load(config_dir: &Path, home: &Path) -> Result<Self> {
        let path = Self::local_vars_path(config_dir);
        let vars = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Could not read {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid template variables in {}", path.display()))?
        } else {
            log::debug!("No template variables at {}", path.display());
            serde_yaml::Value::Null
        };
        Self::with_vars(&vars, home)
    }

    /// Build a renderer from an already parsed variables document
    pub fn with_vars(vars: &serde_yaml::Value, home: &Path) -> Result<Self> {
        let mut context = match vars {
            serde_yaml::Value::Null => tera::Context::new(),
            serde_yaml::Value::Mapping(_) => tera::Context::from_serialize(vars)
                .context("Template variables could not be converted")?,
            _ => bail!("Template variables must be a mapping of names to values"),
        };

        let env: BTreeMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        context.insert("env", &env);
        context.insert("home", &home.display().to_string());
        Ok(Self { context })
    }

    /// Render template text; `name` only labels errors
    pub fn render_str(&self, name: &str, content: &str) -> Result<String> {
        Tera::one_off(content, &self.context, false)
            .map_err(|e| anyhow::anyhow!("{}", error_chain(&e)))
            .with_context(|| format!("Failed to render template {name}"))
    }

    /// Read and render a template file
    pub fn render_file(&self, path: &Path) -> Result<Vec<u8>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        self.render_str(&path.display().to_string(), &content)
            .map(String::into_bytes)
    }
}

/// Flatten tera's nested error sources into one line
fn error_chain(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn renderer(yaml: &str) -> TemplateRenderer {
        let vars: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        TemplateRenderer::with_vars(&vars, Path::new("/home/me")).unwrap()
    }

    #[test]
    fn test_renders_local_vars() {
        let r = renderer("email: me@example.com\ngit:\n  signing: true\n");
        let out = r
            .render_str("gitconfig", "email = {{ email }}\n{% if git.signing %}sign{% endif %}")
            .unwrap();
        assert_eq!(out, "email = me@example.com\nsign");
    }

    #[test]
    fn test_home_and_env() {
        let r = renderer("");
        assert_eq!(r.render_str("t", "{{ home }}/bin").unwrap(), "/home/me/bin");
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(r.render_str("t", "{{ env.PATH }}").unwrap(), path);
    }

    #[test]
    fn test_undefined_variable_fails() {
        let r = renderer("name: x\n");
        let err = r.render_str("gitconfig", "{{ missing }}").unwrap_err();
        assert!(format!("{err:#}").contains("gitconfig"));
    }

    #[test]
    fn test_no_html_escaping() {
        let r = renderer("cmd: \"a && b <c>\"\n");
        assert_eq!(r.render_str("t", "{{ cmd }}").unwrap(), "a && b <c>");
    }

    #[test]
    fn test_non_mapping_vars_rejected() {
        let vars: serde_yaml::Value = serde_yaml::from_str("- a\n- b\n").unwrap();
        assert!(TemplateRenderer::with_vars(&vars, Path::new("/h")).is_err());
    }

    #[test]
    fn test_load_from_config_dir() {
        let dir = TempDir::new().unwrap();
        let vars = TemplateRenderer::local_vars_path(dir.path());
        fs::create_dir_all(vars.parent().unwrap()).unwrap();
        fs::write(&vars, "user: alex\n").unwrap();

        let r = TemplateRenderer::load(dir.path(), Path::new("/h")).unwrap();
        assert_eq!(r.render_str("t", "hi {{ user }}").unwrap(), "hi alex");
    }

    #[test]
    fn test_load_without_vars_file() {
        let dir = TempDir::new().unwrap();
        let r = TemplateRenderer::load(dir.path(), Path::new("/h")).unwrap();
        assert_eq!(r.render_str("t", "plain").unwrap(), "plain");
    }
}
