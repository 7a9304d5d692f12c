use crate::error::LedgerError;
use crate::ledger::config::DownloaderConfig;
use crate::ledger::record::{BookingFields, BookingRecord, Upload};
use crate::ledger::util::{run_command_with_optional_timeout, sanitize_file_stem};
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const DOWNLOAD_FAILED: &str = "download failed";
pub const NOT_REQUIRED: &str = "not required";

/// Cover source answers as the survey platform words them.
const UPLOAD_HERE: &str = "此处上传";
const CLOUD_ATTACHED: &str = "已附在云盘链接中";
const CLOUD_FILE_NAME_MARKER: &str = "文件名：:";
const NO_UPLOAD_NEEDED: &str = "无需上传";

const DOWNLOADER_SCRIPT: &str = "thu_cloud_download.py";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Local(PathBuf),
    DownloadFailed,
    NotRequired,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::DownloadFailed => f.write_str(DOWNLOAD_FAILED),
            Self::NotRequired => f.write_str(NOT_REQUIRED),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub video: Resolution,
    pub portrait_cover: Resolution,
    pub landscape_cover: Resolution,
}

/// Fetches a cloud-share link into `folder/file_name`.
pub trait CloudDownloader {
    fn download(&self, link: &str, folder: &Path, file_name: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShareKind {
    File,
    Folder,
}

/// Runs the external cloud-downloader script.
#[derive(Debug, Clone)]
pub struct ScriptDownloader {
    script_dir: Option<PathBuf>,
    python_bin: Option<PathBuf>,
    timeout_secs: u64,
    cloud_base_url: String,
}

impl ScriptDownloader {
    pub fn from_config(cfg: &DownloaderConfig) -> Self {
        Self {
            script_dir: cfg.script_dir.as_ref().map(PathBuf::from),
            python_bin: cfg.python_bin.as_ref().map(PathBuf::from),
            timeout_secs: cfg.timeout_secs,
            cloud_base_url: cfg.cloud_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn share_kind(&self, link: &str) -> Result<ShareKind> {
        let link = link.trim();
        if link.starts_with(&format!("{}/d/", self.cloud_base_url)) {
            return Ok(ShareKind::Folder);
        }
        if link.starts_with(&format!("{}/f/", self.cloud_base_url)) {
            return Ok(ShareKind::File);
        }
        Err(LedgerError::DownloadFailed(format!(
            "link `{link}` is neither a file nor a folder share under {}",
            self.cloud_base_url
        ))
        .into())
    }

    fn script_dir(&self) -> Result<&Path> {
        let dir = self.script_dir.as_deref().ok_or_else(|| {
            LedgerError::DownloaderUnavailable(
                "set LEDGER_DOWNLOADER_DIR or [downloader].script_dir".to_string(),
            )
        })?;
        if !dir.join(DOWNLOADER_SCRIPT).is_file() {
            return Err(LedgerError::DownloaderUnavailable(format!(
                "{} not found in {}",
                DOWNLOADER_SCRIPT,
                dir.display()
            ))
            .into());
        }
        Ok(dir)
    }

    fn interpreter(&self, script_dir: &Path) -> Result<PathBuf> {
        if let Some(bin) = &self.python_bin {
            return Ok(bin.clone());
        }
        let venv = if cfg!(windows) {
            script_dir.join(".venv").join("Scripts").join("python.exe")
        } else {
            script_dir.join(".venv").join("bin").join("python")
        };
        if venv.is_file() {
            return Ok(venv);
        }
        which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| {
                LedgerError::DownloaderUnavailable(format!(
                    "no python interpreter in {} or PATH",
                    venv.display()
                ))
                .into()
            })
    }
}

fn largest_mp4(folder: &Path) -> Result<Option<PathBuf>> {
    let mut best: Option<(u64, PathBuf)> = None;
    for entry in
        fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let is_mp4 = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
        if !is_mp4 || !path.is_file() {
            continue;
        }
        let size = entry.metadata()?.len();
        match &best {
            Some((best_size, _)) if size <= *best_size => {}
            _ => best = Some((size, path)),
        }
    }
    Ok(best.map(|(_, path)| path))
}

impl CloudDownloader for ScriptDownloader {
    fn download(&self, link: &str, folder: &Path, file_name: &str) -> Result<PathBuf> {
        let kind = self.share_kind(link)?;
        let script_dir = self.script_dir()?;
        let python = self.interpreter(script_dir)?;

        let mut cmd = Command::new(&python);
        cmd.current_dir(script_dir)
            .env("PYTHONIOENCODING", "utf-8")
            .arg(script_dir.join(DOWNLOADER_SCRIPT))
            .arg("-l")
            .arg(link.trim());
        match kind {
            ShareKind::File => {
                cmd.arg("-s").arg(folder).arg("-n").arg(file_name);
            }
            ShareKind::Folder => {
                let parent = folder.parent().unwrap_or(folder);
                let name = folder
                    .file_name()
                    .context("media folder has no final component")?;
                cmd.arg("-s").arg(parent).arg("-n").arg(name);
            }
        }
        cmd.arg("-y");

        tracing::debug!(link = %link, folder = %folder.display(), "running cloud downloader");
        let output = run_command_with_optional_timeout(&mut cmd, Some(self.timeout_secs))
            .with_context(|| format!("failed to run `{}`", python.display()))?;
        tracing::debug!(
            stdout = %String::from_utf8_lossy(&output.stdout),
            "cloud downloader finished"
        );
        if !output.status.success() {
            return Err(LedgerError::DownloadFailed(format!(
                "downloader exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }

        let target = folder.join(file_name);
        if kind == ShareKind::Folder {
            let Some(largest) = largest_mp4(folder)? else {
                return Err(LedgerError::DownloadFailed(format!(
                    "no .mp4 file found in {}",
                    folder.display()
                ))
                .into());
            };
            if largest != target {
                fs::rename(&largest, &target).with_context(|| {
                    format!(
                        "failed to rename {} to {}",
                        largest.display(),
                        target.display()
                    )
                })?;
            }
        }
        Ok(target)
    }
}

/// Create (or reuse) the media folder for `record` under `save_dir`.
pub fn prepare_media_folder(save_dir: &Path, record: &BookingRecord) -> Result<PathBuf> {
    let folder = save_dir.join(record.media_folder_name()?);
    if folder.exists() {
        tracing::warn!(
            seq = record.seq,
            folder = %folder.display(),
            "media folder already exists; files in it may be overwritten"
        );
    }
    fs::create_dir_all(&folder).with_context(|| format!("failed to create {}", folder.display()))?;
    Ok(folder)
}

fn decode_payload(raw: &str) -> Result<Vec<u8>> {
    let raw = raw.trim();
    let data = match raw.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(rest, |(_, data)| data),
        None => raw,
    };
    STANDARD
        .decode(data.trim())
        .context("cover payload is not valid base64")
}

/// Turns upload answers into local files or sentinels. Failures are logged
/// and never escape.
pub struct MediaResolver<'a> {
    downloader: &'a dyn CloudDownloader,
}

impl<'a> MediaResolver<'a> {
    pub fn new(downloader: &'a dyn CloudDownloader) -> Self {
        Self { downloader }
    }

    pub fn resolve_all(&self, seq: u64, fields: &BookingFields, folder: &Path) -> ResolvedMedia {
        let stem = format!("{seq}-{}", sanitize_file_stem(&fields.short_title));

        // Folder shares may carry the cover files, so the video goes first.
        let video = self.resolve_video(seq, &fields.video_link, folder, &format!("{stem}.mp4"));
        let portrait_cover = self.resolve_cover(
            seq,
            &fields.portrait_cover_source,
            &fields.portrait_cover_upload,
            folder,
            &format!("{stem}-cover1.jpg"),
        );
        let landscape_cover = self.resolve_cover(
            seq,
            &fields.landscape_cover_source,
            &fields.landscape_cover_upload,
            folder,
            &format!("{stem}-cover2.jpg"),
        );

        ResolvedMedia {
            video,
            portrait_cover,
            landscape_cover,
        }
    }

    fn resolve_video(&self, seq: u64, link: &str, folder: &Path, file_name: &str) -> Resolution {
        if link.trim().is_empty() {
            tracing::warn!(seq, "record has no video link");
            return Resolution::DownloadFailed;
        }
        match self.downloader.download(link, folder, file_name) {
            Ok(path) => Resolution::Local(path),
            Err(err) => {
                tracing::warn!(
                    seq,
                    link = %link,
                    error = %format!("{err:#}"),
                    "video download failed"
                );
                Resolution::DownloadFailed
            }
        }
    }

    fn resolve_cover(
        &self,
        seq: u64,
        source: &str,
        upload: &Upload,
        folder: &Path,
        file_name: &str,
    ) -> Resolution {
        let source = source.trim();
        let target = folder.join(file_name);

        if source == UPLOAD_HERE {
            let Some(payload) = upload.payload_base64.as_deref() else {
                tracing::warn!(
                    seq,
                    file = %upload.file_name,
                    "cover upload has no captured payload"
                );
                return Resolution::DownloadFailed;
            };
            let written = decode_payload(payload).and_then(|bytes| {
                fs::write(&target, bytes)
                    .with_context(|| format!("failed to write {}", target.display()))
            });
            return match written {
                Ok(()) => Resolution::Local(target),
                Err(err) => {
                    tracing::warn!(
                        seq,
                        file = %upload.file_name,
                        error = %format!("{err:#}"),
                        "cover upload could not be saved"
                    );
                    Resolution::DownloadFailed
                }
            };
        }

        if source.starts_with(CLOUD_ATTACHED) {
            let original_name = source
                .rsplit(CLOUD_FILE_NAME_MARKER)
                .next()
                .unwrap_or_default()
                .trim();
            let original = folder.join(original_name);
            if original_name.is_empty() || !original.is_file() {
                tracing::warn!(
                    seq,
                    expected = %original.display(),
                    "cover named in cloud share not found; keeping original path"
                );
                return Resolution::Local(original);
            }
            return match fs::rename(&original, &target) {
                Ok(()) => Resolution::Local(target),
                Err(err) => {
                    tracing::warn!(
                        seq,
                        from = %original.display(),
                        error = %err,
                        "cover rename failed"
                    );
                    Resolution::DownloadFailed
                }
            };
        }

        if !source.ends_with(NO_UPLOAD_NEEDED) {
            tracing::debug!(seq, source = %source, "cover source needs no file");
        }
        Resolution::NotRequired
    }
}
