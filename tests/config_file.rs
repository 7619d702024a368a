use std::time::Duration;

use ims_oauth_lib::{
    load_config, ErrorKind, FlowKind, ImsEnvironment, LoginFlow, DEFAULT_LOGIN_TIMEOUT,
};

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("ims-context.toml");
    std::fs::write(&path, body).expect("write config");
    path
}

#[test]
fn server_to_server_file_selects_client_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
client_id = "cid"
client_secrets = ["s1", "s2"]
technical_account_email = "ta@techacct.adobe.com"
technical_account_id = "ta-id"
scopes = ["openid", "AdobeID"]
ims_org_id = "ORG@AdobeOrg"
env = "stage"
"#,
    );

    let config = load_config(&path).expect("config loads");
    assert_eq!(config.environment().unwrap(), ImsEnvironment::Stage);
    let LoginFlow::ServerToServer(flow) = LoginFlow::select(&config).unwrap() else {
        panic!("expected server-to-server flow");
    };
    assert_eq!(flow.client_secret, "s1");
    assert_eq!(flow.ims_org_id, "ORG@AdobeOrg");
}

#[test]
fn cli_hosted_file_maps_login_options() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
"$cli.bare-output" = true
client_id = "cid"
scope = "openid"
redirect_uri = "https://cb"
env = "prod"
timeout = 45
port = 0
open = false
browser = "firefox"
force = true
"#,
    );

    let config = load_config(&path).expect("config loads");
    let LoginFlow::CliHosted(flow) = LoginFlow::select(&config).unwrap() else {
        panic!("expected cli hosted flow");
    };
    let options = flow.options;
    assert!(options.bare);
    assert!(!options.open);
    assert!(options.force_login);
    assert_eq!(options.timeout, Duration::from_secs(45));
    assert_eq!(options.port, Some(0));
    assert_eq!(options.browser.as_deref(), Some("firefox"));
    assert_eq!(options.client_id.as_deref(), Some("cid"));
    assert_eq!(options.redirect_uri.as_deref(), Some("https://cb"));
    assert_eq!(options.env, ImsEnvironment::Prod);
}

#[test]
fn zero_timeout_in_file_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "\"cli.bare-output\" = false\ntimeout = 0\nenv = \"prod\"\n");

    let config = load_config(&path).unwrap();
    assert_eq!(config.login_timeout(), DEFAULT_LOGIN_TIMEOUT);
    assert_eq!(
        LoginFlow::select(&config).unwrap().kind(),
        FlowKind::CliHosted
    );
}

#[test]
fn missing_file_is_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).expect_err("missing");
    assert_eq!(err.kind(), ErrorKind::MissingConfig);
    assert!(err.message().contains("absent.toml"));
}

#[test]
fn malformed_file_is_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "client_id = [unterminated");
    let err = load_config(&path).expect_err("malformed");
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[test]
fn unknown_environment_in_file_fails_flow_construction() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "\"cli.bare-output\" = true\nenv = \"qa\"\n");

    let config = load_config(&path).unwrap();
    let err = LoginFlow::select(&config).expect_err("bad env");
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}
