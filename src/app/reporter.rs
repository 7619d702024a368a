//! Usage: User-facing progress output for an interactive login.
//!
//! Prompt and progress lines go to stderr. In bare mode the URL alone goes to stdout so scripts
//! can capture it.

use std::io::Write;

pub const VISIT_URL_PROMPT: &str = "Visit this url to log in:";
pub const LOGGING_IN: &str = "Logging in";
pub const LOGGED_IN: &str = "Logged in";

/// Receives the login's user-visible events.
///
/// The orchestrator decides what is shown in bare mode; implementations only render.
pub trait LoginReporter: Send + Sync {
    /// The URL the user has to visit. `bare` asks for the URL alone, no decoration.
    fn login_url(&self, url: &str, bare: bool);
    fn progress_started(&self, message: &str);
    fn progress_info(&self, message: &str);
    fn progress_succeeded(&self, message: &str);
    fn progress_failed(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Where the login URL is written and which lines make it up.
fn login_url_output(url: &str, bare: bool) -> (Stream, Vec<&str>) {
    if bare {
        (Stream::Stdout, vec![url])
    } else {
        (Stream::Stderr, vec![VISIT_URL_PROMPT, url])
    }
}

fn write_lines(out: &mut impl Write, lines: &[&str]) {
    for line in lines {
        let _ = writeln!(out, "{line}");
    }
    let _ = out.flush();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalReporter;

impl TerminalReporter {
    fn line(&self, text: &str) {
        write_lines(&mut std::io::stderr().lock(), &[text]);
    }
}

impl LoginReporter for TerminalReporter {
    fn login_url(&self, url: &str, bare: bool) {
        match login_url_output(url, bare) {
            (Stream::Stdout, lines) => write_lines(&mut std::io::stdout().lock(), &lines),
            (Stream::Stderr, lines) => write_lines(&mut std::io::stderr().lock(), &lines),
        }
    }

    fn progress_started(&self, message: &str) {
        self.line(&format!("… {message}"));
    }

    fn progress_info(&self, message: &str) {
        self.line(&format!("ℹ {message}"));
    }

    fn progress_succeeded(&self, message: &str) {
        self.line(&format!("✔ {message}"));
    }

    fn progress_failed(&self, message: &str) {
        self.line(&format!("✖ {message}"));
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl LoginReporter for SilentReporter {
    fn login_url(&self, _url: &str, _bare: bool) {}
    fn progress_started(&self, _message: &str) {}
    fn progress_info(&self, _message: &str) {}
    fn progress_succeeded(&self, _message: &str) {}
    fn progress_failed(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_url_is_plain_stdout() {
        let (stream, lines) = login_url_output("https://login", true);
        assert_eq!(stream, Stream::Stdout);
        assert_eq!(lines, vec!["https://login"]);
    }

    #[test]
    fn interactive_url_follows_the_prompt_on_stderr() {
        let (stream, lines) = login_url_output("https://login", false);
        assert_eq!(stream, Stream::Stderr);
        assert_eq!(lines, vec![VISIT_URL_PROMPT, "https://login"]);

        let mut out = Vec::new();
        write_lines(&mut out, &lines);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{VISIT_URL_PROMPT}\nhttps://login\n")
        );
    }
}
