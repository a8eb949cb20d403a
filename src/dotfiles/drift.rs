//! Content drift detection for deployed dotfiles

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reconcile::DriftComparator;

use super::template::TemplateRenderer;

/// Hex SHA-256 of a file's content
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hex SHA-256 of in-memory content
pub fn hash_bytes(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Compares a deployed file against its source by SHA-256.
///
/// Template sources are rendered first, so the comparison is against what
/// a deploy would write.
pub struct HashComparator {
    source: PathBuf,
    destination: PathBuf,
    renderer: Option<Arc<TemplateRenderer>>,
}

impl HashComparator {
    pub fn new(source: PathBuf, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
            renderer: None,
        }
    }

    pub fn template(source: PathBuf, destination: PathBuf, renderer: Arc<TemplateRenderer>) -> Self {
        Self {
            source,
            destination,
            renderer: Some(renderer),
        }
    }

    fn expected_hash(&self) -> reconcile::Result<String> {
        match &self.renderer {
            Some(renderer) => renderer
                .render_file(&self.source)
                .map(|content| hash_bytes(&content))
                .map_err(|e| reconcile::Error::scan(self.source.display().to_string(), e)),
            None => Ok(hash_file(&self.source)?),
        }
    }
}

impl DriftComparator for HashComparator {
    fn compare(&self) -> reconcile::Result<bool> {
        if !self.destination.is_file() {
            return Ok(false);
        }
        let expected = self.expected_hash()?;
        let actual = hash_file(&self.destination)?;
        Ok(expected == actual)
    }

    fn describe(&self) -> String {
        format!("sha256 {} <-> {}", self.source.display(), self.destination.display())
    }
}
