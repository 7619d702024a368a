//! Usage: Public test helpers for integration tests (recording collaborators + internal hooks).

use crate::app::reporter::LoginReporter;
use crate::infra::browser::BrowserOpener;
use crate::shared::error::{AppError, AppResult, ErrorKind};
use crate::shared::mutex_ext::MutexExt;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterEvent {
    LoginUrl { url: String, bare: bool },
    Started(String),
    Info(String),
    Succeeded(String),
    Failed(String),
}

/// Reporter that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReporterEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReporterEvent> {
        self.events.lock_or_recover().clone()
    }

    /// The most recently reported login URL.
    pub fn last_url(&self) -> Option<String> {
        self.events
            .lock_or_recover()
            .iter()
            .rev()
            .find_map(|event| match event {
                ReporterEvent::LoginUrl { url, .. } => Some(url.clone()),
                _ => None,
            })
    }

    fn push(&self, event: ReporterEvent) {
        self.events.lock_or_recover().push(event);
    }
}

impl LoginReporter for RecordingReporter {
    fn login_url(&self, url: &str, bare: bool) {
        self.push(ReporterEvent::LoginUrl {
            url: url.to_string(),
            bare,
        });
    }

    fn progress_started(&self, message: &str) {
        self.push(ReporterEvent::Started(message.to_string()));
    }

    fn progress_info(&self, message: &str) {
        self.push(ReporterEvent::Info(message.to_string()));
    }

    fn progress_succeeded(&self, message: &str) {
        self.push(ReporterEvent::Succeeded(message.to_string()));
    }

    fn progress_failed(&self, message: &str) {
        self.push(ReporterEvent::Failed(message.to_string()));
    }
}

type OpenHook = Box<dyn Fn(&str) + Send + Sync>;

/// Browser that records opened URLs instead of launching anything.
#[derive(Default)]
pub struct RecordingBrowser {
    opened: Mutex<Vec<(String, Option<String>)>>,
    fail_with: Option<String>,
    on_open: Option<OpenHook>,
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `open` call fails with `message` (after being recorded).
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Runs `hook` with the URL on every `open`, standing in for the user's browser.
    pub fn with_hook(hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            on_open: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<(String, Option<String>)> {
        self.opened.lock_or_recover().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock_or_recover().len()
    }
}

impl BrowserOpener for RecordingBrowser {
    fn open(&self, url: &str, app: Option<&str>) -> AppResult<()> {
        self.opened
            .lock_or_recover()
            .push((url.to_string(), app.map(str::to_string)));
        if let Some(message) = self.fail_with.as_deref() {
            return Err(AppError::new(ErrorKind::Internal, message.to_string()));
        }
        if let Some(hook) = self.on_open.as_ref() {
            hook(url);
        }
        Ok(())
    }
}

/// The `state` parameter a login site echoes for session `id`.
pub fn callback_state(id: &str) -> String {
    serde_json::json!({ "id": id }).to_string()
}

/// Redacted form of a secret, as it appears in logs.
pub fn masked(secret: &str) -> String {
    crate::shared::security::mask_secret(secret)
}
