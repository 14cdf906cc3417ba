//! Scratch workspaces holding location files and reference stores.

use camino::{Utf8Path, Utf8PathBuf};
use jusho_core::{LocationRecord, test_support::write_sqlite_locations};
use std::fs;
use tempfile::TempDir;

const HEADER: &str =
    "都道府県名,市区町村名,大字町丁目名,小字,街区符号,座標系,X,Y,住居表示,緯度,経度\n";

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents).expect("write test file");
}

/// Temporary directory with conventional input and database locations.
#[derive(Debug)]
pub(super) struct Workspace {
    _tmp: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
        Self { _tmp: tmp, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("store/jusho.db")
    }

    pub(super) fn input_dir(&self) -> Utf8PathBuf {
        self.root.join("input")
    }

    /// Write a location file under the input directory.
    pub(super) fn write_locations(&self, relative: &str, rows: &[&str]) -> Utf8PathBuf {
        let path = self.input_dir().join(relative);
        let mut body = String::from(HEADER);
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        write_utf8(&path, body.as_bytes());
        path
    }

    /// Populate the database with `records` directly.
    pub(super) fn seed_database(&self, records: &[LocationRecord]) {
        fs::create_dir_all(self.root.join("store")).expect("create store directory");
        write_sqlite_locations(self.database().as_std_path(), records).expect("seed database");
    }
}

pub(super) const MARUNOUCHI: &str = "東京都,千代田区,丸の内,一丁目,,9,0,0,1,35.681236,139.767125";
pub(super) const OTEMACHI: &str = "東京都,千代田区,大手町,一丁目,,9,0,0,1,35.6866,139.7640";
pub(super) const UMEDA: &str = "大阪府,大阪市北区,梅田,三丁目,,6,0,0,1,34.7025,135.4959";
pub(super) const BAD_LATITUDE: &str = "東京都,千代田区,永田町,,,9,0,0,1,north,139.7450";

pub(super) fn tokyo_records() -> Vec<LocationRecord> {
    vec![
        LocationRecord::new("東京都", "千代田区", "丸の内", 35.681236, 139.767125)
            .expect("valid record")
            .with_address_2("一丁目"),
        LocationRecord::new("東京都", "新宿区", "西新宿", 35.6896, 139.6917)
            .expect("valid record")
            .with_address_2("二丁目"),
    ]
}
