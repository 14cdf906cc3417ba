//! Ingestion coordinator.
//!
//! [`Importer`] drives parse → bulk insert → ledger for one file or for every
//! location file under a directory. Directory runs are idempotent: files with
//! a ledger entry are skipped, and a file whose insert fails leaves no entry
//! so the next run retries it from scratch. Per-file failures never stop a
//! directory run; they are collected into the [`ImportRun`] report.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use jusho_core::{CancellationToken, ReferenceStore, StoreError};
use jusho_fs::discover_files;
use log::{info, warn};
use thiserror::Error;

use crate::parse::{CsvLocationSource, ParseError};

/// Extension of location files picked up by directory runs.
pub const SOURCE_EXTENSION: &str = "csv";

/// Stage at which a file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Checking the processed-file ledger.
    Lookup,
    /// Parsing the file.
    Parse,
    /// Inserting the parsed records.
    Insert,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lookup => "lookup",
            Self::Parse => "parse",
            Self::Insert => "insert",
        })
    }
}

/// Why a file failed during a directory run.
#[derive(Debug, Error)]
pub enum FileFailure {
    /// The ledger lookup failed.
    #[error("ledger lookup failed: {0}")]
    Lookup(#[source] StoreError),
    /// The file could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The bulk insert failed and was rolled back.
    #[error("bulk insert failed: {0}")]
    Insert(#[source] StoreError),
}

impl FileFailure {
    /// Stage at which the file failed.
    pub const fn stage(&self) -> FailureStage {
        match self {
            Self::Lookup(_) => FailureStage::Lookup,
            Self::Parse(_) => FailureStage::Parse,
            Self::Insert(_) => FailureStage::Insert,
        }
    }
}

/// Terminal state of one file in a directory run.
#[derive(Debug)]
pub enum FileOutcome {
    /// A ledger entry already existed; nothing was read.
    Skipped,
    /// Records were inserted and the ledger entry written.
    Ledgered {
        /// Number of records inserted.
        records: u64,
    },
    /// Records were inserted but the ledger write failed, so a later run will
    /// import the file again.
    Unledgered {
        /// Number of records inserted.
        records: u64,
        /// Ledger write failure.
        error: StoreError,
    },
    /// The file was not imported.
    Failed(FileFailure),
}

impl FileOutcome {
    /// Records inserted for this file.
    pub const fn records(&self) -> u64 {
        match self {
            Self::Ledgered { records } | Self::Unledgered { records, .. } => *records,
            Self::Skipped | Self::Failed(_) => 0,
        }
    }

    /// Whether the file's records were inserted.
    pub const fn is_processed(&self) -> bool {
        matches!(self, Self::Ledgered { .. } | Self::Unledgered { .. })
    }
}

/// Outcome for one discovered file.
#[derive(Debug)]
pub struct FileReport {
    /// File identifier as discovered.
    pub path: Utf8PathBuf,
    /// Terminal state.
    pub outcome: FileOutcome,
}

/// Aggregate counts for one directory run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Files whose records were inserted.
    pub processed: usize,
    /// Files that failed at any stage.
    pub failed: usize,
    /// Files skipped because they were already ledgered.
    pub skipped: usize,
    /// Records inserted across all processed files.
    pub total_records: u64,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files processed, {} files failed, {} files skipped, {} total records imported",
            self.processed, self.failed, self.skipped, self.total_records
        )
    }
}

/// Report for one directory run, in discovery order.
#[derive(Debug, Default)]
pub struct ImportRun {
    /// Per-file outcomes.
    pub files: Vec<FileReport>,
    /// Whether the run stopped early because of cancellation.
    pub cancelled: bool,
}

impl ImportRun {
    /// Aggregate counts over every file.
    pub fn summary(&self) -> ImportSummary {
        self.files
            .iter()
            .fold(ImportSummary::default(), |mut summary, report| {
                match &report.outcome {
                    FileOutcome::Skipped => summary.skipped += 1,
                    FileOutcome::Failed(_) => summary.failed += 1,
                    outcome => {
                        summary.processed += 1;
                        summary.total_records += outcome.records();
                    }
                }
                summary
            })
    }

    /// Reports for files that failed.
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|report| matches!(report.outcome, FileOutcome::Failed(_)))
    }
}

/// Result of a verified single-file import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleFileReport {
    /// Imported file.
    pub path: Utf8PathBuf,
    /// Records inserted from the file.
    pub records: u64,
    /// Rows in the store after the import.
    pub total_rows: u64,
}

impl fmt::Display for SingleFileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records imported from {}, {} rows in store",
            self.records, self.path, self.total_rows
        )
    }
}

/// Fatal ingestion errors.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The input directory could not be walked.
    #[error("failed to discover location files under {path}: {source}")]
    Discover {
        /// Directory root.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Single-file mode could not parse its input.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Single-file mode could not insert its records.
    #[error("failed to import {path}: {source}")]
    Insert {
        /// Imported file.
        path: Utf8PathBuf,
        /// Store failure.
        #[source]
        source: StoreError,
    },
    /// Post-import verification could not query the store.
    #[error("failed to verify import of {path}: {source}")]
    Verify {
        /// Imported file.
        path: Utf8PathBuf,
        /// Store failure.
        #[source]
        source: StoreError,
    },
    /// The store holds fewer rows than were just inserted.
    #[error("verification of {path} failed: expected at least {expected} rows, found {found}")]
    RowCountMismatch {
        /// Imported file.
        path: Utf8PathBuf,
        /// Rows inserted.
        expected: u64,
        /// Rows counted afterwards.
        found: u64,
    },
    /// The store returned no sample row after a non-empty import.
    #[error("verification of {path} failed: no stored row could be read back")]
    MissingSample {
        /// Imported file.
        path: Utf8PathBuf,
    },
}

/// Sequential ingestion coordinator owning a reference store.
#[derive(Debug)]
pub struct Importer<S> {
    store: S,
    cancellation: CancellationToken,
}

impl<S: ReferenceStore> Importer<S> {
    /// Coordinate imports into `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cancellation: CancellationToken::new(),
        }
    }

    /// Stop directory runs before the next file once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Borrow the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Release the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Import every location file under `root`.
    ///
    /// Discovery failures are fatal; everything after that is reported per
    /// file in the returned [`ImportRun`].
    pub fn import_directory(&mut self, root: &Utf8Path) -> Result<ImportRun, ImportError> {
        let files =
            discover_files(root, SOURCE_EXTENSION).map_err(|source| ImportError::Discover {
                path: root.to_path_buf(),
                source,
            })?;
        info!("discovered {} location files under {root}", files.len());

        let mut run = ImportRun::default();
        for path in files {
            if self.cancellation.is_cancelled() {
                warn!("import cancelled before {path}");
                run.cancelled = true;
                break;
            }
            let outcome = self.import_discovered(&path);
            let interrupted = matches!(
                &outcome,
                FileOutcome::Failed(FileFailure::Insert(err)) if err.is_cancelled()
            );
            run.files.push(FileReport { path, outcome });
            if interrupted {
                run.cancelled = true;
                break;
            }
        }

        let summary = run.summary();
        info!("{summary}");
        Ok(run)
    }

    fn import_discovered(&mut self, path: &Utf8Path) -> FileOutcome {
        match self.store.is_file_processed(path.as_str()) {
            Ok(true) => {
                info!("skipping {path}: already processed");
                return FileOutcome::Skipped;
            }
            Ok(false) => {}
            Err(err) => return failed(path, FileFailure::Lookup(err)),
        }

        let records = match CsvLocationSource::new(path).read_all() {
            Ok(records) => records,
            Err(err) => return failed(path, FileFailure::Parse(err)),
        };

        let inserted = match self.store.bulk_insert(&records) {
            Ok(inserted) => inserted,
            Err(err) => return failed(path, FileFailure::Insert(err)),
        };

        match self.store.mark_file_processed(path.as_str(), inserted) {
            Ok(()) => {
                info!("imported {inserted} records from {path}");
                FileOutcome::Ledgered { records: inserted }
            }
            Err(error) => {
                warn!("imported {inserted} records from {path} but could not record it: {error}");
                FileOutcome::Unledgered {
                    records: inserted,
                    error,
                }
            }
        }
    }

    /// Import one file unconditionally and verify the store afterwards.
    ///
    /// The ledger is neither consulted nor written. Every failure is fatal.
    pub fn import_file(&mut self, path: &Utf8Path) -> Result<SingleFileReport, ImportError> {
        let records = CsvLocationSource::new(path).read_all()?;
        info!("parsed {} records from {path}", records.len());

        let inserted =
            self.store
                .bulk_insert(&records)
                .map_err(|source| ImportError::Insert {
                    path: path.to_path_buf(),
                    source,
                })?;

        let total_rows = self.verify(path, inserted)?;
        info!("imported {inserted} records from {path}; store holds {total_rows} rows");
        Ok(SingleFileReport {
            path: path.to_path_buf(),
            records: inserted,
            total_rows,
        })
    }

    fn verify(&self, path: &Utf8Path, expected: u64) -> Result<u64, ImportError> {
        let verify_error = |source| ImportError::Verify {
            path: path.to_path_buf(),
            source,
        };
        let found = self.store.count_rows().map_err(verify_error)?;
        if found < expected {
            return Err(ImportError::RowCountMismatch {
                path: path.to_path_buf(),
                expected,
                found,
            });
        }
        if expected > 0 && self.store.sample_row().map_err(verify_error)?.is_none() {
            return Err(ImportError::MissingSample {
                path: path.to_path_buf(),
            });
        }
        Ok(found)
    }
}

fn failed(path: &Utf8Path, failure: FileFailure) -> FileOutcome {
    warn!("{} failed for {path}: {failure}", failure.stage());
    FileOutcome::Failed(failure)
}
