//! Usage: IMS environment selection and the fixed endpoint table per environment.

use crate::shared::error::{AppError, AppResult, ErrorKind};
use std::str::FromStr;

/// Overrides the default environment when no explicit one is configured.
pub const ENV_VAR: &str = "IMS_OAUTH_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImsEnvironment {
    #[default]
    Prod,
    Stage,
}

impl ImsEnvironment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Stage => "stage",
        }
    }

    pub const fn endpoints(self) -> &'static ImsEndpoints {
        match self {
            Self::Prod => &PROD_ENDPOINTS,
            Self::Stage => &STAGE_ENDPOINTS,
        }
    }

    /// Resolves an optional configured name, falling back to `IMS_OAUTH_ENV`, then `prod`.
    pub fn resolve(configured: Option<&str>) -> AppResult<Self> {
        if let Some(name) = configured.map(str::trim).filter(|v| !v.is_empty()) {
            return name.parse();
        }
        match std::env::var(ENV_VAR) {
            Ok(name) if !name.trim().is_empty() => name.parse(),
            _ => Ok(Self::default()),
        }
    }
}

impl FromStr for ImsEnvironment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" => Ok(Self::Prod),
            "stage" => Ok(Self::Stage),
            other => Err(AppError::new(
                ErrorKind::InvalidConfig,
                format!("unknown ims environment '{other}' (expected prod|stage)"),
            )),
        }
    }
}

impl std::fmt::Display for ImsEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static endpoint configuration for one IMS environment.
#[derive(Debug)]
pub struct ImsEndpoints {
    /// CLI login site; the auth-site URL and the success/error pages live under it.
    pub login_site_url: &'static str,
    pub logout_url: &'static str,
    pub token_url: &'static str,
    pub authorize_url: &'static str,
}

impl ImsEndpoints {
    /// Page the browser lands on after a successful callback.
    pub fn success_page(&self) -> String {
        format!("{}/login-success", self.login_site_url)
    }

    /// Page the browser lands on after a rejected callback.
    pub fn error_page(&self, message: &str) -> AppResult<String> {
        let mut url = reqwest::Url::parse(&format!("{}/error", self.login_site_url))
            .map_err(|e| format!("INVALID_CONFIG: invalid login site url: {e}"))?;
        url.query_pairs_mut().append_pair("message", message);
        Ok(url.to_string())
    }

    /// Scheme + host (+ port) of the login site, the only origin allowed by CORS.
    pub fn login_site_origin(&self) -> AppResult<String> {
        let url = reqwest::Url::parse(self.login_site_url)
            .map_err(|e| format!("INVALID_CONFIG: invalid login site url: {e}"))?;
        Ok(url.origin().ascii_serialization())
    }
}

const PROD_ENDPOINTS: ImsEndpoints = ImsEndpoints {
    login_site_url: "https://aio-login.adobeioruntime.net/api/v1/web/default/applogin",
    logout_url: "https://ims-na1.adobelogin.com/ims/logout/v1",
    token_url: "https://ims-na1.adobelogin.com/ims/token/v3",
    authorize_url: "https://ims-na1.adobelogin.com/ims/authorize/v2",
};

const STAGE_ENDPOINTS: ImsEndpoints = ImsEndpoints {
    login_site_url: "https://aio-login.adobeioruntime.net/api/v1/web/default/applogin-stage",
    logout_url: "https://ims-na1-stg1.adobelogin.com/ims/logout/v1",
    token_url: "https://ims-na1-stg1.adobelogin.com/ims/token/v3",
    authorize_url: "https://ims-na1-stg1.adobelogin.com/ims/authorize/v2",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_names_round_trip() {
        assert_eq!("prod".parse::<ImsEnvironment>().unwrap(), ImsEnvironment::Prod);
        assert_eq!(" Stage ".parse::<ImsEnvironment>().unwrap(), ImsEnvironment::Stage);
        assert_eq!(ImsEnvironment::Stage.to_string(), "stage");
    }

    #[test]
    fn unknown_environment_is_a_config_error() {
        let err = "qa".parse::<ImsEnvironment>().expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(err.message().contains("'qa'"));
    }

    #[test]
    fn explicit_environment_wins_over_default() {
        assert_eq!(
            ImsEnvironment::resolve(Some("stage")).unwrap(),
            ImsEnvironment::Stage
        );
        assert!(ImsEnvironment::resolve(Some("nope")).is_err());
    }

    #[test]
    fn environments_use_distinct_endpoints() {
        let prod = ImsEnvironment::Prod.endpoints();
        let stage = ImsEnvironment::Stage.endpoints();
        assert_ne!(prod.login_site_url, stage.login_site_url);
        assert_ne!(prod.logout_url, stage.logout_url);
        assert_ne!(prod.token_url, stage.token_url);
    }

    #[test]
    fn origin_strips_path() {
        let origin = ImsEnvironment::Prod.endpoints().login_site_origin().unwrap();
        assert_eq!(origin, "https://aio-login.adobeioruntime.net");
    }

    #[test]
    fn error_page_encodes_message() {
        let page = ImsEnvironment::Prod
            .endpoints()
            .error_page("error code=a b&c")
            .unwrap();
        assert!(page.starts_with(
            "https://aio-login.adobeioruntime.net/api/v1/web/default/applogin/error?message="
        ));
        assert!(page.ends_with("message=error+code%3Da+b%26c"));
    }
}
