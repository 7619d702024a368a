//! Usage: Open the login URL in the user's browser (system default or a named application).

use crate::shared::error::AppResult;
use std::process::Command;

pub trait BrowserOpener: Send + Sync {
    /// Opens `url`; `app` names a specific browser application instead of the default.
    fn open(&self, url: &str, app: Option<&str>) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str, app: Option<&str>) -> AppResult<()> {
        let app = app.map(str::trim).filter(|v| !v.is_empty());
        let mut cmd = build_open_command(url, app)?;
        tracing::debug!(
            program = %cmd.get_program().to_string_lossy(),
            app = app.unwrap_or("<default>"),
            "opening browser"
        );
        cmd.spawn()
            .map_err(|e| format!("INTERNAL_ERROR: failed to open browser: {e}"))?;
        Ok(())
    }
}

fn build_open_command(url: &str, app: Option<&str>) -> AppResult<Command> {
    #[cfg(target_os = "windows")]
    {
        return Ok(build_windows_open_command(url, app));
    }

    #[cfg(target_os = "macos")]
    {
        let mut cmd = Command::new("open");
        if let Some(app) = app {
            cmd.arg("-a").arg(app);
        }
        cmd.arg(url);
        return Ok(cmd);
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        let mut cmd = Command::new(app.unwrap_or("xdg-open"));
        cmd.arg(url);
        return Ok(cmd);
    }

    #[allow(unreachable_code)]
    {
        let _ = (url, app);
        Err("INTERNAL_ERROR: browser open is unsupported on this platform"
            .to_string()
            .into())
    }
}

#[cfg(target_os = "windows")]
fn build_windows_open_command(url: &str, app: Option<&str>) -> Command {
    match app {
        Some(app) => {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", app, url]);
            cmd
        }
        None => {
            let mut cmd = Command::new("rundll32.exe");
            // `explorer <url>` may open File Explorer for some URL shapes.
            cmd.arg("url.dll,FileProtocolHandler").arg(url);
            cmd
        }
    }
}
