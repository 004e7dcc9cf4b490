use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hearth_backend::HearthTelemetry;
use hearth_commands::action::{Action, ActionKind, Room};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One attempted action and how it ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEvent {
    /// Append time.
    pub ts: DateTime<Utc>,
    /// Action kind.
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Door id (`all` for blanket actions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door: Option<String>,
    /// Device key (`kitchen.light`, `all.fan`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Whether the action took effect.
    pub success: bool,
    /// Requesting member id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    /// Denial reason or backend error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActivityEvent {
    /// Records `action` as attempted now.
    #[must_use]
    pub fn for_action(action: &Action, success: bool) -> Self {
        let door = match action.kind {
            ActionKind::DoorLockAll | ActionKind::DoorUnlockAll => Some("all".to_string()),
            _ => action.door.map(|door| door.id().to_string()),
        };
        let device = action
            .device
            .map(|device| device.key_in(action.room.unwrap_or(Room::MainHall)));
        Self {
            ts: Utc::now(),
            kind: action.kind,
            door,
            device,
            success,
            member: None,
            detail: None,
        }
    }

    /// Sets the requester.
    #[must_use]
    pub fn member(mut self, member_id: impl Into<String>) -> Self {
        self.member = Some(member_id.into());
        self
    }

    /// Sets the detail text.
    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Append-only, unbounded activity history.
///
/// Clones share the same history. With a journal file every append is also
/// written as one JSON line, and [`ActivityLog::open`] replays it.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: Arc<RwLock<Vec<ActivityEvent>>>,
    journal: Option<Arc<Journal>>,
    telemetry: Option<HearthTelemetry>,
}

#[derive(Debug)]
struct Journal {
    path: PathBuf,
    writer: Mutex<File>,
}

impl ActivityLog {
    /// Empty in-memory log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays `path` (when present) and appends to it from now on.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = Vec::new();
        if path.exists() {
            let file =
                File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            for (index, line) in BufReader::new(file).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                entries.push(serde_json::from_str(&line).with_context(|| {
                    format!("{}:{} is not an activity event", path.display(), index + 1)
                })?);
            }
        } else if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating activity directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening activity journal {}", path.display()))?;
        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
            journal: Some(Arc::new(Journal {
                path,
                writer: Mutex::new(file),
            })),
            telemetry: None,
        })
    }

    /// Mirrors every append as an `activity.appended` event.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: HearthTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Journal file, if any.
    #[must_use]
    pub fn journal_path(&self) -> Option<&Path> {
        self.journal.as_deref().map(|journal| journal.path.as_path())
    }

    /// Appends an event. Sinks that fail are reported through `tracing`; the
    /// in-memory history always receives the event.
    pub fn append(&self, event: ActivityEvent) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.write(&event) {
                tracing::warn!(error = ?err, path = %journal.path.display(), "activity journal write failed");
            }
        }
        if let Some(telemetry) = &self.telemetry {
            let payload = serde_json::to_value(&event).unwrap_or_else(|_| json!({}));
            if let Err(err) = telemetry.event("activity.appended", payload) {
                tracing::warn!(error = ?err, "activity event publish failed");
            }
        }
        self.entries.write().push(event);
    }

    /// The last `n` events, newest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<ActivityEvent> {
        self.entries.read().iter().rev().take(n).cloned().collect()
    }

    /// Every event, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ActivityEvent> {
        self.entries.read().clone()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Journal {
    fn write(&self, event: &ActivityEvent) -> Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, event)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
