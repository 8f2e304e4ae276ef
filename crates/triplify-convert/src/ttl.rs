//! Turtle source files: validation, triple counting and preview.
//!
//! A ttl upload is not converted — it is validated with a real parser and
//! shipped whole to the store.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use oxttl::TurtleParser;
use triplify_common::{Result, TriplifyError};

/// Lines shown by the preview endpoint.
const PREVIEW_LINES: usize = 100;

pub struct TtlFile {
    path: PathBuf,
    pub name: String,
}

impl TtlFile {
    pub fn open(path: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            name: name.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the whole file, returning its triple count.
    pub fn validate(&self) -> Result<u64> {
        let file = std::fs::File::open(&self.path)?;
        let mut count = 0u64;
        for triple in TurtleParser::new().for_reader(BufReader::new(file)) {
            triple.map_err(|e| TriplifyError::Turtle(format!("{}: {}", self.name, e)))?;
            count += 1;
        }
        Ok(count)
    }

    /// First lines of the file, raw.
    pub fn preview(&self) -> Result<String> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .take(PREVIEW_LINES)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    pub fn line_count(&self) -> Result<u64> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content.lines().count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(content: &str) -> (tempfile::TempDir, TtlFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.ttl");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, TtlFile::open(&path, "data.ttl"))
    }

    #[test]
    fn valid_turtle_is_counted() {
        let (_d, file) = fixture(
            "@prefix ex: <http://example.org/> .\n\
             ex:a ex:knows ex:b .\n\
             ex:b ex:knows ex:c , ex:d .\n",
        );
        assert_eq!(file.validate().unwrap(), 3);
    }

    #[test]
    fn broken_turtle_is_an_error() {
        let (_d, file) = fixture("this is { not turtle .\n");
        assert!(matches!(file.validate(), Err(TriplifyError::Turtle(_))));
    }

    #[test]
    fn preview_returns_the_head_of_the_file() {
        let body: String = (0..200).map(|i| format!("# line {}\n", i)).collect();
        let (_d, file) = fixture(&body);
        let preview = file.preview().unwrap();
        assert_eq!(preview.lines().count(), 100);
        assert!(preview.starts_with("# line 0"));
    }
}
