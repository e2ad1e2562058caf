//! Runtime settings assembled from flags, the process environment and the
//! AWS shared profile files.

use crate::error::{NqError, NqResult};
use nq_aws::profile::SharedFiles;
use nq_aws::AwsRegion;
use nq_graph::EndpointSelector;
use std::fmt;
use std::str::FromStr;

pub const NEPTUNE_URL: &str = "NEPTUNE_URL";
pub const NEPTUNE_TOKEN: &str = "NEPTUNE_TOKEN";
pub const NEPTUNE_AUTH: &str = "NEPTUNE_AUTH";
pub const NEPTUNE_APPSYNC_API_ID: &str = "NEPTUNE_APPSYNC_API_ID";
pub const NEPTUNE_APPSYNC_API_NAME: &str = "NEPTUNE_APPSYNC_API_NAME";

/// How requests to the GraphQL endpoint are authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// SigV4 with AWS credentials.
    Iam,
    /// `Authorization: Bearer $NEPTUNE_TOKEN`.
    Token,
}

impl FromStr for AuthMode {
    type Err = NqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iam" | "sigv4" => Ok(Self::Iam),
            "token" | "bearer" => Ok(Self::Token),
            other => Err(NqError::Config(format!(
                "invalid {} value {:?}: must be 'iam' or 'token'",
                NEPTUNE_AUTH, other
            ))),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iam => write!(f, "iam"),
            Self::Token => write!(f, "token"),
        }
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub aws_profile: Option<String>,
    pub aws_region: Option<String>,
}

#[derive(Clone)]
pub struct Settings {
    /// Explicit endpoint; discovery is skipped when set.
    pub url: Option<String>,
    pub token: Option<String>,
    pub auth: AuthMode,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub selector: EndpointSelector,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("auth", &self.auth)
            .field("profile", &self.profile)
            .field("region", &self.region)
            .field("selector", &self.selector)
            .finish()
    }
}

impl Settings {
    /// Resolve against the live process environment.
    pub fn from_environment(overrides: &Overrides) -> NqResult<Self> {
        Self::resolve(
            overrides,
            |key| std::env::var(key).ok(),
            &SharedFiles::from_environment(),
        )
    }

    pub fn resolve<F>(overrides: &Overrides, lookup: F, files: &SharedFiles) -> NqResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let url = get(NEPTUNE_URL);
        let token = get(NEPTUNE_TOKEN);
        let auth = match get(NEPTUNE_AUTH) {
            Some(mode) => mode.parse()?,
            None if token.is_some() => AuthMode::Token,
            None => AuthMode::Iam,
        };
        if auth == AuthMode::Token && token.is_none() {
            return Err(NqError::Config(format!(
                "{} is not set; run `nq login` to fetch one",
                NEPTUNE_TOKEN
            )));
        }

        let profile = flag(&overrides.aws_profile).or_else(|| get("AWS_PROFILE"));
        let region = flag(&overrides.aws_region)
            .or_else(|| get("AWS_REGION"))
            .or_else(|| get("AWS_DEFAULT_REGION"))
            .or_else(|| {
                files
                    .load_profile(profile.as_deref().unwrap_or_default())
                    .region
                    .filter(|r| !r.trim().is_empty())
            })
            .or_else(|| {
                url.as_deref()
                    .and_then(|u| AwsRegion::from_appsync_url(u).ok())
                    .map(|r| r.name)
            });

        let selector = EndpointSelector::from_options(
            get(NEPTUNE_APPSYNC_API_ID).as_deref(),
            get(NEPTUNE_APPSYNC_API_NAME).as_deref(),
        );

        Ok(Self {
            url,
            token,
            auth,
            profile,
            region,
            selector,
        })
    }

    /// Profile name as used in cache keys; empty means the default chain.
    pub fn profile_name(&self) -> &str {
        self.profile.as_deref().unwrap_or_default()
    }

    pub fn region_name(&self) -> &str {
        self.region.as_deref().unwrap_or_default()
    }

    pub fn aws_region(&self) -> Option<AwsRegion> {
        self.region.as_deref().map(AwsRegion::new)
    }
}
