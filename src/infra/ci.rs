//! Usage: Detect non-interactive CI environments, where a browser login can never complete.

/// Variables that mark a CI job when set to anything but an explicit false.
const CI_ENV_VARS: &[&str] = &[
    "CI",
    "CONTINUOUS_INTEGRATION",
    "BUILD_NUMBER",
    "RUN_ID",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "TF_BUILD",
    "TEAMCITY_VERSION",
    "CODEBUILD_BUILD_ID",
    "BITBUCKET_BUILD_NUMBER",
];

pub trait CiDetector: Send + Sync {
    fn is_ci(&self) -> bool;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCiDetector;

impl CiDetector for EnvCiDetector {
    fn is_ci(&self) -> bool {
        detect_ci(|key| std::env::var(key).ok())
    }
}

/// Fixed answer, for callers that already know (and for tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCi(pub bool);

impl CiDetector for StaticCi {
    fn is_ci(&self) -> bool {
        self.0
    }
}

pub(crate) fn detect_ci(lookup: impl Fn(&str) -> Option<String>) -> bool {
    CI_ENV_VARS.iter().any(|key| {
        lookup(key).is_some_and(|value| {
            let value = value.trim();
            !value.is_empty() && !value.eq_ignore_ascii_case("false") && value != "0"
        })
    })
}
