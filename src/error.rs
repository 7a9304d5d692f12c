use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("booking record invalid: {0}")]
    InvalidRecord(String),
    #[error("ledger date key invalid: {0}")]
    InvalidDateKey(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("cloud downloader unavailable: {0}")]
    DownloaderUnavailable(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("ledger export failed: {0}")]
    ExportFailed(String),
    #[error("ledger lock unavailable: {0}")]
    LockUnavailable(String),
}
