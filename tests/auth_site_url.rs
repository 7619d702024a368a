mod support;

use std::collections::HashSet;

use ims_oauth_lib::{auth_site_url, random_id, ErrorKind, ImsEnvironment, QueryParams, IMS_ENV_VAR};
use support::{env_lock, EnvRestore, LoginUrl};

#[test]
fn session_params_without_optional_values_never_leak_placeholders() {
    let params = QueryParams::new()
        .with("id", Some("ab12cd34"))
        .with("port", Some(8123))
        .with("client_id", None::<String>)
        .with("scope", None::<String>)
        .with("redirect_uri", None::<String>);

    let url = auth_site_url(&params, ImsEnvironment::Prod, false).expect("url");

    assert!(!url.contains("undefined"));
    assert!(!url.contains("client_id"));
    let parsed = LoginUrl::parse(&url);
    assert_eq!(parsed.params.len(), 2);
    assert_eq!(parsed.id(), "ab12cd34");
    assert_eq!(parsed.port(), 8123);
}

#[test]
fn each_environment_points_at_its_own_login_site() {
    let params = QueryParams::new().with("id", Some("x"));

    let prod = LoginUrl::parse(&auth_site_url(&params, ImsEnvironment::Prod, false).unwrap());
    let stage = LoginUrl::parse(&auth_site_url(&params, ImsEnvironment::Stage, false).unwrap());

    assert_eq!(
        prod.base,
        "https://aio-login.adobeioruntime.net/api/v1/web/default/applogin"
    );
    assert_eq!(
        stage.base,
        "https://aio-login.adobeioruntime.net/api/v1/web/default/applogin-stage"
    );
}

#[test]
fn forced_login_round_trips_the_inner_url() {
    let params = QueryParams::new()
        .with("id", Some("ab12cd34"))
        .with("port", Some(8123))
        .with("scope", Some("openid,AdobeID"));
    let plain = auth_site_url(&params, ImsEnvironment::Prod, false).unwrap();
    let forced = LoginUrl::parse(&auth_site_url(&params, ImsEnvironment::Prod, true).unwrap());

    assert_eq!(forced.base, "https://ims-na1.adobelogin.com/ims/logout/v1");
    assert_eq!(forced.param("redirect_uri"), Some(plain.as_str()));
    assert_eq!(forced.inner_redirect().param("scope"), Some("openid,AdobeID"));
}

#[test]
fn random_ids_are_short_and_distinct() {
    let ids: HashSet<String> = (0..64).map(|_| random_id()).collect();
    assert_eq!(ids.len(), 64);
    assert!(ids
        .iter()
        .all(|id| id.len() == 8 && id.chars().all(|c| c.is_ascii_hexdigit())));
}

#[test]
fn environment_variable_selects_the_default_environment() {
    let _lock = env_lock();
    let mut env = EnvRestore::default();

    env.remove_var(IMS_ENV_VAR);
    assert_eq!(ImsEnvironment::resolve(None).unwrap(), ImsEnvironment::Prod);

    env.set_var(IMS_ENV_VAR, "stage");
    assert_eq!(ImsEnvironment::resolve(None).unwrap(), ImsEnvironment::Stage);
    assert_eq!(
        ImsEnvironment::resolve(Some("prod")).unwrap(),
        ImsEnvironment::Prod
    );

    env.set_var(IMS_ENV_VAR, "  ");
    assert_eq!(ImsEnvironment::resolve(None).unwrap(), ImsEnvironment::Prod);

    env.set_var(IMS_ENV_VAR, "qa");
    let err = ImsEnvironment::resolve(None).expect_err("unknown env");
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}
