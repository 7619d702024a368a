#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use ims_oauth_lib::test_support::{RecordingBrowser, RecordingReporter};
use ims_oauth_lib::{login, AppResult, LoginCredential, LoginDeps, LoginOptions, StaticCi};
use tokio::task::JoinHandle;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn save_once(&mut self, key: &'static str) {
        if self.saved.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.saved.push((key, std::env::var_os(key)));
    }

    pub fn set_var(&mut self, key: &'static str, value: impl Into<OsString>) {
        self.save_once(key);
        std::env::set_var(key, value.into());
    }

    pub fn remove_var(&mut self, key: &'static str) {
        self.save_once(key);
        std::env::remove_var(key);
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Recording collaborators wired into `LoginDeps`.
pub struct LoginHarness {
    pub reporter: Arc<RecordingReporter>,
    pub browser: Arc<RecordingBrowser>,
    pub deps: LoginDeps,
}

impl LoginHarness {
    pub fn new() -> Self {
        Self::build(RecordingBrowser::new(), false)
    }

    pub fn in_ci() -> Self {
        Self::build(RecordingBrowser::new(), true)
    }

    pub fn with_browser(browser: RecordingBrowser) -> Self {
        Self::build(browser, false)
    }

    fn build(browser: RecordingBrowser, ci: bool) -> Self {
        let reporter = Arc::new(RecordingReporter::new());
        let browser = Arc::new(browser);
        let deps = LoginDeps {
            reporter: reporter.clone(),
            browser: browser.clone(),
            ci: Arc::new(StaticCi(ci)),
        };
        Self {
            reporter,
            browser,
            deps,
        }
    }

    pub fn spawn(&self, options: LoginOptions) -> JoinHandle<AppResult<LoginCredential>> {
        let deps = self.deps.clone();
        tokio::spawn(async move { login(options, &deps).await })
    }

    /// Waits until the login reported its URL.
    pub async fn wait_for_url(&self) -> LoginUrl {
        for _ in 0..500 {
            if let Some(url) = self.reporter.last_url() {
                return LoginUrl::parse(&url);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("login never reported its url");
    }
}

/// A parsed auth-site URL.
#[derive(Debug, Clone)]
pub struct LoginUrl {
    pub raw: String,
    pub base: String,
    pub params: HashMap<String, String>,
}

impl LoginUrl {
    pub fn parse(raw: &str) -> Self {
        let url = reqwest::Url::parse(raw).expect("login url parses");
        let params = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut base = url.clone();
        base.set_query(None);
        Self {
            raw: raw.to_string(),
            base: base.to_string(),
            params,
        }
    }

    /// The auth-site URL wrapped inside a force-login logout URL.
    pub fn inner_redirect(&self) -> LoginUrl {
        LoginUrl::parse(self.param("redirect_uri").expect("redirect_uri present"))
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn id(&self) -> String {
        self.param("id").expect("id param").to_string()
    }

    pub fn port(&self) -> u16 {
        self.param("port")
            .expect("port param")
            .parse()
            .expect("numeric port")
    }
}

/// HTTP client that never follows redirects and never uses a proxy.
pub fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .expect("http client")
}

pub fn callback_base(port: u16) -> String {
    format!("http://127.0.0.1:{port}/")
}

pub fn form(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

pub fn callback_get_url(port: u16, pairs: &[(&str, &str)]) -> String {
    format!("{}?{}", callback_base(port), form(pairs))
}

pub fn state_for(id: &str) -> String {
    ims_oauth_lib::test_support::callback_state(id)
}

/// Sends a GET callback the way the login site's redirect would.
pub async fn send_get_callback(port: u16, pairs: &[(&str, &str)]) -> reqwest::Response {
    http()
        .get(callback_get_url(port, pairs))
        .send()
        .await
        .expect("callback request")
}

/// Sends a form POST callback the way the login site's postback would.
pub async fn send_post_callback(port: u16, pairs: &[(&str, &str)]) -> reqwest::Response {
    http()
        .post(callback_base(port))
        .header("content-type", "application/x-www-form-urlencoded")
        .body(form(pairs))
        .send()
        .await
        .expect("callback request")
}

/// Polls until nothing accepts connections on `port`.
pub async fn wait_port_closed(port: u16) -> bool {
    for _ in 0..200 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .is_err()
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}
