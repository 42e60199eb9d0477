//! Input discovery and lazily-read source files

use crate::error::{IngestError, Result};
use crate::ingestion::encoding::{DecodedText, EncodingResolver, ResolvedEncoding};
use std::path::{Path, PathBuf};
use tracing::info;

/// One input file. Bytes are read on first use and encoding is resolved once.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    bytes: Option<Vec<u8>>,
    encoding: Option<ResolvedEncoding>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bytes: None,
            encoding: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn encoding(&self) -> Option<&ResolvedEncoding> {
        self.encoding.as_ref()
    }

    pub fn bytes(&mut self) -> Result<&[u8]> {
        if self.bytes.is_none() {
            self.bytes = Some(std::fs::read(&self.path)?);
        }
        Ok(self.bytes.as_deref().unwrap_or_default())
    }

    /// Resolve the encoding and return the decoded text.
    pub fn decode(&mut self, resolver: &EncodingResolver) -> Result<String> {
        let path = self.path.clone();
        let decoded: DecodedText = resolver
            .resolve(self.bytes()?)
            .ok_or(IngestError::NoEncodingResolved { path })?;

        info!(
            file = %self.file_name(),
            encoding = %decoded.encoding.name,
            confidence = decoded.encoding.confidence,
            "encoding resolved"
        );
        self.encoding = Some(decoded.encoding);
        // Raw bytes are no longer needed once decoded.
        self.bytes = None;
        Ok(decoded.text)
    }
}

/// List files in `dir` whose names match `pattern`, sorted by path.
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::Discovery(format!(
            "input directory {} does not exist",
            dir.display()
        )));
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/{}", escaped.trim_end_matches('/'), pattern);

    let mut files = Vec::new();
    for entry in glob::glob(&full).map_err(|e| IngestError::Discovery(e.to_string()))? {
        let path = entry.map_err(|e| IngestError::Discovery(e.to_string()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    info!(dir = %dir.display(), pattern, count = files.len(), "found input files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_matches_pattern_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.csv"), "x\n1\n").unwrap();
        std::fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let files = discover(dir.path(), "*.csv").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let err = discover(Path::new("/definitely/not/here"), "*.csv").unwrap_err();
        assert!(matches!(err, IngestError::Discovery(_)));
    }

    #[test]
    fn test_source_file_decode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin.csv");
        std::fs::write(&path, b"name\ncaf\xe9\n").unwrap();

        let mut source = SourceFile::new(&path);
        let text = source.decode(&EncodingResolver::new()).unwrap();
        assert_eq!(text, "name\ncafé\n");
        assert_eq!(source.encoding().unwrap().name, "iso-8859-1");
    }
}
