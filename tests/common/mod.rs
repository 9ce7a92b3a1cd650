#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use gt_recon::{Cell, Dataset, Row, data::CellParser};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Paths of files in `dir` (relative to the workspace) whose names start with `prefix`.
    pub fn reports(&self, dir: &str, prefix: &str) -> Vec<PathBuf> {
        let mut found = std::fs::read_dir(self.path().join(dir))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.starts_with(prefix))
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        found.sort();
        found
    }
}

/// Builds a dataset from string cells parsed with the default null tokens.
pub fn dataset(name: &str, headers: &[&str], rows: &[&[&str]]) -> Dataset {
    let parser = CellParser::default();
    let headers = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .enumerate()
        .map(|(idx, cells)| {
            Row::new(
                idx + 2,
                cells.iter().map(|c| parser.parse(c)).collect::<Vec<Cell>>(),
            )
        })
        .collect();
    Dataset::new(name, &headers, rows).expect("valid dataset")
}
