use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use hostwatch_core::{EventLogEntry, FeedEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

const FILE_PREFIX: &str = "events-";
const FILE_SUFFIX: &str = ".jsonl";
const DAY_FORMAT: &str = "%Y-%m-%d";

/// Appends every audit event seen on the feed to a daily JSONL file until
/// the feed closes.
pub async fn run_exporter(
    mut feed: broadcast::Receiver<FeedEvent>,
    output_dir: &str,
    retention_days: u64,
) -> Result<()> {
    let out_dir = PathBuf::from(output_dir);
    fs::create_dir_all(&out_dir)?;

    let mut state = ExportState::new(out_dir, retention_days)?;

    loop {
        match feed.recv().await {
            Ok(FeedEvent::NewEventItem(entry)) => {
                state.write_event(&entry)?;
                state.maybe_prune()?;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event exporter lagged behind the feed");
            }
            Err(RecvError::Closed) => break,
        }
    }

    debug!("event exporter stopped");
    Ok(())
}

pub(crate) struct ExportState {
    out_dir: PathBuf,
    retention_days: u64,
    current_day: NaiveDate,
    writer: BufWriter<File>,
    last_prune: Instant,
}

impl ExportState {
    pub(crate) fn new(out_dir: PathBuf, retention_days: u64) -> Result<Self> {
        let day = Utc::now().date_naive();
        let writer = Self::open_writer(&out_dir, day)?;

        Ok(Self {
            out_dir,
            retention_days,
            current_day: day,
            writer,
            last_prune: Instant::now() - Duration::from_secs(3600),
        })
    }

    fn open_writer(out_dir: &Path, day: NaiveDate) -> Result<BufWriter<File>> {
        let path = out_dir.join(log_file_name(day));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    pub(crate) fn write_event(&mut self, entry: &EventLogEntry) -> Result<()> {
        let day = entry.timestamp.date_naive();
        if day != self.current_day {
            self.writer.flush()?;
            self.writer = Self::open_writer(&self.out_dir, day)?;
            self.current_day = day;
        }

        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let latest_path = self.out_dir.join("latest-event.json");
        fs::write(latest_path, serde_json::to_vec_pretty(entry)?)?;

        Ok(())
    }

    fn maybe_prune(&mut self) -> Result<()> {
        if self.last_prune.elapsed() < Duration::from_secs(1800) {
            return Ok(());
        }
        self.last_prune = Instant::now();

        prune_old_log_files(&self.out_dir, self.retention_days, SystemTime::now())
    }
}

pub(crate) fn log_file_name(day: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}{FILE_SUFFIX}", day.format(DAY_FORMAT))
}

pub(crate) fn log_file_day(file_name: &str) -> Option<NaiveDate> {
    let day = file_name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(day, DAY_FORMAT).ok()
}

pub(crate) fn prune_old_log_files(out_dir: &Path, retention_days: u64, now: SystemTime) -> Result<()> {
    let today = DateTime::<Utc>::from(now).date_naive();
    let cutoff = today
        .checked_sub_days(Days::new(retention_days))
        .unwrap_or(today);

    for entry in fs::read_dir(out_dir)? {
        let path = entry?.path();
        let expired = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(log_file_day)
            .is_some_and(|day| day < cutoff);

        if expired {
            if let Err(err) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %err, "failed to prune event log");
            }
        }
    }

    Ok(())
}
