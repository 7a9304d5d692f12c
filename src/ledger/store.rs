use crate::error::LedgerError;
use crate::ledger::document::{DateKey, Document, ParseAnomaly, ParseOutcome, TextBlock};
use crate::ledger::format::format_block;
use crate::ledger::merge::UpsertOutcome;
use crate::ledger::record::BookingRecord;
use crate::ledger::resolve::{CloudDownloader, MediaResolver, ResolvedMedia, prepare_media_folder};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const LOCK_WAIT: Duration = Duration::from_secs(30);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub ledger_file: PathBuf,
    pub date_key: String,
    pub sequence: u64,
    pub outcome: UpsertOutcome,
    pub dropped_segments: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct RecordApplied {
    pub apply: ApplyOutcome,
    pub media_folder: PathBuf,
    pub media: ResolvedMedia,
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub dropped: Vec<ParseAnomaly>,
    pub rewritten: bool,
    pub dates: usize,
    pub entries: usize,
}

/// Exclusive advisory lock on `<ledger>.lock`, held until dropped.
struct LedgerLock {
    file: File,
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The persisted ledger file. Every mutation is load, parse, merge,
/// serialize, write under one lock.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    ledger_file: PathBuf,
}

impl LedgerStore {
    pub fn new(ledger_file: impl Into<PathBuf>) -> Self {
        Self {
            ledger_file: ledger_file.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.ledger_file
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .ledger_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.ledger_file.with_file_name(name)
    }

    fn ensure_parent(&self) -> Result<PathBuf> {
        let parent = match self.ledger_file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        Ok(parent)
    }

    fn lock(&self) -> Result<LedgerLock> {
        self.ensure_parent()?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("failed to open {}", lock_path.display()))?;

        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(LedgerLock { file }),
                Err(err) if started.elapsed() >= LOCK_WAIT => {
                    return Err(LedgerError::LockUnavailable(format!(
                        "{} still held after {}s: {err}",
                        lock_path.display(),
                        LOCK_WAIT.as_secs()
                    ))
                    .into());
                }
                Err(_) => thread::sleep(LOCK_POLL_INTERVAL),
            }
        }
    }

    /// Current ledger text; a missing file reads as empty.
    pub fn read_text(&self) -> Result<String> {
        match fs::read_to_string(&self.ledger_file) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read {}", self.ledger_file.display())),
        }
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let parent = self.ensure_parent()?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        tmp.write_all(text.as_bytes())
            .with_context(|| format!("failed to write temp file in {}", parent.display()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.ledger_file)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to write {}", self.ledger_file.display()))?;
        Ok(())
    }

    fn report_anomalies(&self, anomalies: &[ParseAnomaly]) {
        for anomaly in anomalies {
            tracing::warn!(
                ledger = %self.ledger_file.display(),
                line = anomaly.line(),
                kind = anomaly.kind(),
                "dropped ledger segment: {anomaly}"
            );
        }
    }

    /// Parse the ledger, logging every dropped segment.
    pub fn load(&self) -> Result<ParseOutcome> {
        let outcome = Document::parse(&self.read_text()?);
        self.report_anomalies(&outcome.anomalies);
        Ok(outcome)
    }

    /// Upsert one entry and rewrite the whole file.
    pub fn apply_block(&self, date_key: DateKey, block: TextBlock) -> Result<ApplyOutcome> {
        let _lock = self.lock()?;
        let ParseOutcome {
            mut document,
            anomalies,
        } = self.load()?;

        let sequence = block.sequence();
        let outcome = document.upsert(date_key, block);
        let text = document.serialize();
        self.write_text(&text)?;

        tracing::info!(
            ledger = %self.ledger_file.display(),
            date = %date_key,
            sequence,
            outcome = outcome.as_str(),
            "ledger entry applied"
        );
        Ok(ApplyOutcome {
            ledger_file: self.ledger_file.clone(),
            date_key: date_key.to_string(),
            sequence,
            outcome,
            dropped_segments: anomalies.len(),
            sha256: sha256_hex(&text),
        })
    }

    /// Resolve the record's media into `save_dir`, render it and merge it.
    pub fn apply(
        &self,
        record: &BookingRecord,
        downloader: &dyn CloudDownloader,
        save_dir: &Path,
    ) -> Result<RecordApplied> {
        let fields = record.fields()?;
        let date_key = record.date_key()?;
        let media_folder = prepare_media_folder(save_dir, record)?;
        tracing::info!(
            seq = record.seq,
            rid = %record.rid,
            folder = %media_folder.display(),
            "saving booking record"
        );

        let media = MediaResolver::new(downloader).resolve_all(record.seq, &fields, &media_folder);
        let block = format_block(record, &fields, &media);
        let apply = self.apply_block(date_key, block)?;
        Ok(RecordApplied {
            apply,
            media_folder,
            media,
        })
    }

    /// Rewrite the ledger in canonical form, dropping unreadable segments.
    pub fn rewrite_canonical(&self) -> Result<RepairOutcome> {
        let _lock = self.lock()?;
        let text = self.read_text()?;
        let ParseOutcome {
            document,
            anomalies,
        } = Document::parse(&text);
        self.report_anomalies(&anomalies);

        let canonical = document.serialize();
        let rewritten = canonical != text && !(text.trim().is_empty() && canonical.is_empty());
        if rewritten {
            self.write_text(&canonical)?;
        }
        Ok(RepairOutcome {
            dropped: anomalies,
            rewritten,
            dates: document.date_count(),
            entries: document.entry_count(),
        })
    }
}
