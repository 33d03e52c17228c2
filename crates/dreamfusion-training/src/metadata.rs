//! Run metadata.
//!
//! The training loop may write a structured `run_metadata.json`; older runs
//! only leave their text log behind, so the same record can be rebuilt by
//! matching known log lines.

use crate::error::{TrainingError, TrainingResult};
use crate::layout::WorkspaceLayout;
use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use std::sync::LazyLock;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

static WORKSPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Trainer: df \| .+ \| .+ \| .+ \| (.+)").expect("valid regex"));
static ITERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"load at epoch \d+, global step (\d+)").expect("valid regex"));
static EPOCH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Epoch (\d+)/\d+").expect("valid regex"));
static CHECKPOINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Latest checkpoint is (.+)").expect("valid regex"));
static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[INFO\] Trainer: df \| (.+?) \|").expect("valid regex"));
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"training takes (\d+\.\d+) minutes").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Workspace name with underscores shown as spaces.
    pub workspace: String,
    pub iters: u64,
    pub epochs: u64,
    /// File name of the selected checkpoint.
    pub checkpoint: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// Training time reported by the trainer, in minutes.
    pub duration: f64,
    pub start_lr: f64,
    pub end_lr: f64,
}

fn missing(what: &str) -> TrainingError {
    TrainingError::Metadata(format!("no `{what}` line in log"))
}

fn first<'a>(re: &Regex, text: &'a str, what: &str) -> TrainingResult<&'a str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end())
        .ok_or_else(|| missing(what))
}

fn last<'a>(re: &Regex, text: &'a str, what: &str) -> TrainingResult<&'a str> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .last()
        .map(|m| m.as_str().trim_end())
        .ok_or_else(|| missing(what))
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> TrainingResult<T> {
    raw.parse::<T>().map_err(|_| TrainingError::Metadata(format!("invalid {what}: {raw:?}")))
}

fn parse_timestamp(raw: &str, what: &str) -> TrainingResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| TrainingError::Metadata(format!("invalid {what} {raw:?}: {e}")))
}

fn epoch_lr(text: &str, epoch: u64) -> TrainingResult<f64> {
    let re = Regex::new(&format!(r"Start Training .+ Epoch {epoch}/\d+, lr=(\d+\.\d+)"))
        .map_err(|e| TrainingError::Metadata(e.to_string()))?;
    let raw = first(&re, text, &format!("Start Training ... Epoch {epoch}"))?;
    parse_number(raw, "learning rate")
}

impl RunMetadata {
    /// Rebuild metadata from a trainer log.
    ///
    /// Start and end times are the first and last trainer banners, the epoch
    /// count is the last `Epoch N/M` seen, everything else is the first match.
    pub fn scrape(text: &str) -> TrainingResult<Self> {
        let workspace = first(&WORKSPACE_RE, text, "Trainer: df")?.replace('_', " ");
        let iters = parse_number(first(&ITERS_RE, text, "global step")?, "global step")?;
        let epochs: u64 = parse_number(last(&EPOCH_RE, text, "Epoch N/M")?, "epoch")?;
        let checkpoint = first(&CHECKPOINT_RE, text, "Latest checkpoint is")?
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let start_time = parse_timestamp(first(&TIMESTAMP_RE, text, "Trainer: df")?, "start time")?;
        let end_time = parse_timestamp(last(&TIMESTAMP_RE, text, "Trainer: df")?, "end time")?;
        let duration = parse_number(first(&DURATION_RE, text, "training takes")?, "duration")?;
        let start_lr = epoch_lr(text, 1)?;
        let end_lr = epoch_lr(text, epochs)?;

        Ok(Self { workspace, iters, epochs, checkpoint, start_time, end_time, duration, start_lr, end_lr })
    }

    pub fn scrape_file(path: &Path) -> TrainingResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::scrape(&text)
    }

    /// Structured record when it is newer than the log, otherwise the scraped log.
    ///
    /// A run that reuses the workspace appends to the log, so a record left by
    /// an earlier export never describes it.
    pub fn load(layout: &WorkspaceLayout) -> TrainingResult<Self> {
        let structured = layout.metadata_path();
        let log = layout.log_path();
        if is_newer(&structured, &log) {
            tracing::debug!(path = %structured.display(), "using structured run metadata");
            let bytes = std::fs::read(&structured)?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
        if structured.is_file() {
            tracing::debug!(path = %structured.display(), "structured run metadata is older than the log");
        }
        Self::scrape_file(&log)
    }

    pub fn write_json(&self, path: &Path) -> TrainingResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Wall time between the first and last trainer banner.
    pub fn elapsed(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Checkpoint name up to its first `.`; validation renders share this prefix.
    pub fn checkpoint_stem(&self) -> &str {
        self.checkpoint.split('.').next().unwrap_or_default()
    }

    /// Human-readable block appended to the log.
    pub fn render(&self) -> String {
        let mut out = String::from("\n\nAttributes from file:\n");
        let _ = writeln!(out, "workspace: {}", self.workspace);
        let _ = writeln!(out, "iters: {}", self.iters);
        let _ = writeln!(out, "epochs: {}", self.epochs);
        let _ = writeln!(out, "checkpoint: {}", self.checkpoint);
        let _ = writeln!(out, "start_time: {}", self.start_time.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "end_time: {}", self.end_time.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "time: {}", format_elapsed(self.elapsed()));
        let _ = writeln!(out, "duration: {:?}", self.duration);
        let _ = writeln!(out, "start_lr: {:?}", self.start_lr);
        let _ = writeln!(out, "end_lr: {:?}", self.end_lr);
        out
    }

    pub fn append_to_log(&self, path: &Path) -> TrainingResult<()> {
        let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
        file.write_all(self.render().as_bytes())?;
        Ok(())
    }
}

/// True when `path` exists and was modified strictly after `than` (or `than` is missing).
fn is_newer(path: &Path, than: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(path), modified(than)) {
        (Some(record), Some(log)) => record > log,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// `H:MM:SS`, with a leading `N day(s), ` past 24 hours.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.unsigned_abs();
    let (days, rest) = (total / 86_400, total % 86_400);
    let clock = format!("{}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);
    match days {
        0 => format!("{sign}{clock}"),
        1 => format!("{sign}1 day, {clock}"),
        n => format!("{sign}{n} days, {clock}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::FileTimes;
    use std::time::SystemTime;
    use tempfile::TempDir;

    const LOG: &str = "\
[INFO] Trainer: df | 2023-01-01_00-00-00 | cuda | fp16 | trial_hamburger
[INFO] Cmdline: main.py --text a hamburger --workspace trial_hamburger -O
[INFO] Loading latest checkpoint ...
[INFO] Latest checkpoint is trial_hamburger/checkpoints/df_ep0100.pth
==> Start Training trial_hamburger Epoch 1/100, lr=0.010000 ...
==> Finished Epoch 1/100.
==> Start Training trial_hamburger Epoch 100/100, lr=0.001000 ...
==> Finished Epoch 100/100.
[INFO] training takes 9.8500 minutes.
[INFO] Trainer: df | 2023-01-01_00-10-00 | cuda | fp16 | trial_hamburger
[INFO] Latest checkpoint is trial_hamburger/checkpoints/df_ep0100.pth
[INFO] load at epoch 100, global step 10000
";

    #[test]
    fn test_scrape_extracts_embedded_values() {
        let meta = RunMetadata::scrape(LOG).unwrap();
        assert_eq!(meta.workspace, "trial hamburger");
        assert_eq!(meta.iters, 10_000);
        assert_eq!(meta.epochs, 100);
        assert_eq!(meta.checkpoint, "df_ep0100.pth");
        assert_eq!(meta.checkpoint_stem(), "df_ep0100");
        assert_eq!(meta.start_time.to_string(), "2023-01-01 00:00:00");
        assert_eq!(meta.end_time.to_string(), "2023-01-01 00:10:00");
        assert_eq!(meta.elapsed(), Duration::minutes(10));
        assert!((meta.duration - 9.85).abs() < 1e-9);
        assert!((meta.start_lr - 0.01).abs() < 1e-12);
        assert!((meta.end_lr - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_missing_pattern_is_an_error() {
        let log = LOG.replace("training takes", "training took");
        let err = RunMetadata::scrape(&log).unwrap_err();
        assert!(err.to_string().contains("training takes"));
    }

    #[test]
    fn test_render_block() {
        let rendered = RunMetadata::scrape(LOG).unwrap().render();
        assert!(rendered.starts_with("\n\nAttributes from file:\n"));
        assert!(rendered.contains("workspace: trial hamburger\n"));
        assert!(rendered.contains("time: 0:10:00\n"));
        assert!(rendered.contains("duration: 9.85\n"));
        assert!(rendered.contains("end_lr: 0.001\n"));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::seconds(3725)), "1:02:05");
        assert_eq!(format_elapsed(Duration::hours(49)), "2 days, 1:00:00");
    }

    fn set_mtime(path: &Path, secs: u64) {
        let time = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(secs);
        std::fs::File::open(path).unwrap().set_times(FileTimes::new().set_modified(time)).unwrap();
    }

    #[test]
    fn test_load_prefers_newer_structured_record() {
        let temp = TempDir::new().unwrap();
        let layout = WorkspaceLayout::new(temp.path().to_path_buf());
        std::fs::write(layout.log_path(), LOG).unwrap();

        let mut meta = RunMetadata::scrape(LOG).unwrap();
        meta.iters = 42;
        meta.write_json(&layout.metadata_path()).unwrap();
        set_mtime(&layout.log_path(), 1_000);
        set_mtime(&layout.metadata_path(), 2_000);

        assert_eq!(RunMetadata::load(&layout).unwrap().iters, 42);

        std::fs::remove_file(layout.metadata_path()).unwrap();
        assert_eq!(RunMetadata::load(&layout).unwrap().iters, 10_000);
    }

    #[test]
    fn test_load_ignores_record_older_than_log() {
        let temp = TempDir::new().unwrap();
        let layout = WorkspaceLayout::new(temp.path().to_path_buf());
        std::fs::write(layout.log_path(), LOG).unwrap();

        let mut stale = RunMetadata::scrape(LOG).unwrap();
        stale.checkpoint = "df_ep0010.pth".to_string();
        stale.write_json(&layout.metadata_path()).unwrap();

        // A later run rewrote the log.
        set_mtime(&layout.metadata_path(), 1_000);
        set_mtime(&layout.log_path(), 2_000);
        assert_eq!(RunMetadata::load(&layout).unwrap().checkpoint, "df_ep0100.pth");

        // Same timestamp: the log wins.
        set_mtime(&layout.metadata_path(), 2_000);
        assert_eq!(RunMetadata::load(&layout).unwrap().checkpoint, "df_ep0100.pth");
    }

    #[test]
    fn test_append_to_log() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log_df.txt");
        std::fs::write(&path, LOG).unwrap();
        RunMetadata::scrape(LOG).unwrap().append_to_log(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(LOG));
        assert!(text.ends_with("end_lr: 0.001\n"));
    }
}
