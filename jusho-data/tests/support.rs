use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

/// Header row written at the top of every generated location file.
pub const HEADER: &str =
    "都道府県名,市区町村名,大字町丁目名,小字,街区符号,座標系,X,Y,住居表示,緯度,経度\n";

/// Scratch directory holding generated location files.
#[derive(Debug)]
pub struct InputDir {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl InputDir {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("temporary directory {path:?} is not UTF-8"));
        Self { _dir: dir, root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Write a location file with a header followed by `rows`.
    pub fn write_rows(&self, relative: &str, rows: &[String]) -> Utf8PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|err| {
                panic!("failed to create {parent}: {err}");
            });
        }
        let mut body = String::from(HEADER);
        for row in rows {
            body.push_str(row);
        }
        fs::write(&path, body).unwrap_or_else(|err| {
            panic!("failed to write {path}: {err}");
        });
        path
    }
}

/// Render one data row in the eleven-column input layout.
pub fn location_row(
    prefecture: &str,
    municipality: &str,
    address_1: &str,
    latitude: f64,
    longitude: f64,
) -> String {
    format!("{prefecture},{municipality},{address_1},,,9,0,0,1,{latitude},{longitude}\n")
}
