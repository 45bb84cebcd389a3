#![allow(dead_code)]

use reclimit::Table;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The three-row table used across the scenario tests.
pub fn people() -> Table {
    Table::from_strings(
        ["name", "age"],
        [["Alice", "30"], ["Bob", "25"], ["Cara", "abc"]],
    )
    .expect("people table")
}

/// `n` rows of `[id, value]` where every value is numeric.
pub fn numbered(n: usize) -> Table {
    let rows: Vec<Vec<String>> = (0..n)
        .map(|i| vec![format!("r{}", i), (i * 10).to_string()])
        .collect();
    Table::from_strings(["id", "value"], rows).expect("numbered table")
}

pub fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write test file");
    path
}

pub fn people_csv(dir: &TempDir) -> PathBuf {
    write_file(dir, "people.csv", b"name,age\nAlice,30\nBob,25\nCara,abc\n")
}

pub fn read_to_string(path: &Path) -> String {
    fs::read_to_string(path).expect("read test file")
}
