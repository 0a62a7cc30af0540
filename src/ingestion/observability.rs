use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::IngestionError;

/// Severity classification used for notifier callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IngestionSeverity {
    /// Error-level event (batch aborted).
    Error,
    /// Critical error (a collaborator such as the staging buffer failed).
    Critical,
}

/// Severity of a batch-aborting error.
pub fn severity_for_error(e: &IngestionError) -> IngestionSeverity {
    match e {
        IngestionError::Staging { .. } => IngestionSeverity::Critical,
        IngestionError::Json(_)
        | IngestionError::SchemaMismatch { .. }
        | IngestionError::Profile { .. }
        | IngestionError::Config { .. } => IngestionSeverity::Error,
    }
}

/// Record category a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchCategory {
    Readings,
    Treatments,
    Food,
    Profile,
}

/// Wire shape a batch arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    Legacy,
    Typed,
}

/// Context about an ingestion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionContext {
    pub category: BatchCategory,
    pub shape: WireShape,
    /// Number of records in the incoming batch.
    pub records: usize,
}

/// Outcome of a successful ingestion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestionStats {
    /// Records handed to the staging buffer.
    pub staged: usize,
    /// Records dropped as malformed, invalid or not admitted.
    pub skipped: usize,
    /// Newest timestamp seen, 0 if none.
    pub latest: i64,
}

/// Alarms the pipeline can clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmKind {
    /// Remote data is stale.
    RemoteAlarm,
    /// Remote data is urgently stale.
    RemoteUrgentAlarm,
}

/// A fire-and-forget signal emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    DismissAlarm(AlarmKind),
    /// A line for the user-visible sync log.
    DiagnosticLog { action: String, message: String },
}

/// Notification bus interface.
///
/// Every method has a no-op default so implementors only override what they care about.
pub trait Notifier: Send + Sync {
    /// Called for alarm dismissals and diagnostic log lines.
    fn notify(&self, _notification: &Notification) {}

    /// Called when a batch completes.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when a batch is aborted by an error.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// Called when a batch failure meets the configured alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// A notifier that fans out callbacks to a list of notifiers.
#[derive(Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

impl fmt::Debug for CompositeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeNotifier")
            .field("notifiers_len", &self.notifiers.len())
            .finish()
    }
}

impl Notifier for CompositeNotifier {
    fn notify(&self, notification: &Notification) {
        for n in &self.notifiers {
            n.notify(notification);
        }
    }

    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for n in &self.notifiers {
            n.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for n in &self.notifiers {
            n.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for n in &self.notifiers {
            n.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards every event to `tracing`.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::DismissAlarm(alarm) => tracing::debug!(?alarm, "dismiss alarm"),
            Notification::DiagnosticLog { action, message } => tracing::info!(%action, %message, "sync log"),
        }
    }

    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::debug!(
            category = ?ctx.category,
            shape = ?ctx.shape,
            records = ctx.records,
            staged = stats.staged,
            skipped = stats.skipped,
            latest = stats.latest,
            "batch ingested"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::warn!(
            category = ?ctx.category,
            shape = ?ctx.shape,
            records = ctx.records,
            ?severity,
            %error,
            "batch failed"
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            category = ?ctx.category,
            shape = ?ctx.shape,
            records = ctx.records,
            ?severity,
            %error,
            "batch failure alert"
        );
    }
}

/// Appends diagnostics and failures to a local log file.
#[derive(Debug)]
pub struct FileNotifier {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileNotifier {
    /// Create a file notifier that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{} {line}", Utc::now().to_rfc3339());
        }
    }
}

impl Notifier for FileNotifier {
    fn notify(&self, notification: &Notification) {
        if let Notification::DiagnosticLog { action, message } = notification {
            self.append_line(&format!("{action} {message}"));
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append_line(&format!(
            "fail severity={:?} category={:?} shape={:?} records={} err={}",
            severity, ctx.category, ctx.shape, ctx.records, error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.append_line(&format!(
            "ALERT severity={:?} category={:?} shape={:?} records={} err={}",
            severity, ctx.category, ctx.shape, ctx.records, error
        ));
    }
}

/// Keeps notifications and failure severities in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
    successes: Mutex<Vec<(IngestionContext, IngestionStats)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn dismissed_alarms(&self) -> Vec<AlarmKind> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::DismissAlarm(kind) => Some(kind),
                Notification::DiagnosticLog { .. } => None,
            })
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<(String, String)> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::DiagnosticLog { action, message } => Some((action, message)),
                Notification::DismissAlarm(_) => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<IngestionSeverity> {
        self.failures.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn alerts(&self) -> Vec<IngestionSeverity> {
        self.alerts.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn successes(&self) -> Vec<(IngestionContext, IngestionStats)> {
        self.successes.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        if let Ok(mut v) = self.notifications.lock() {
            v.push(notification.clone());
        }
    }

    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        if let Ok(mut v) = self.successes.lock() {
            v.push((ctx.clone(), stats));
        }
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        if let Ok(mut v) = self.failures.lock() {
            v.push(severity);
        }
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &IngestionError) {
        if let Ok(mut v) = self.alerts.lock() {
            v.push(severity);
        }
    }
}
