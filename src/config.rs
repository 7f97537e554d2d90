use crate::error::{BadEnvVarSnafu, ParseApiUrlSnafu, ParseNumberSnafu, RosterResult};
use dotenvy::var;
use secrecy::SecretString;
use snafu::ResultExt;
use std::{env::VarError, sync::Arc, time::Duration};
use url::Url;

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    sync_config: Arc<SyncConfig>,
}

impl RuntimeConfiguration {
    pub fn new() -> RosterResult<Self> {
        Ok(Self {
            sync_config: Arc::new(SyncConfig::new()?),
        })
    }

    pub fn sync_config(&self) -> Arc<SyncConfig> {
        self.sync_config.clone()
    }
}

/// How we talk to the students API and how long we trust what it told us.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_url: Url,
    pub api_token: Option<SecretString>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub list_freshness: Duration,
    pub detail_freshness: Duration,
    pub cache_capacity: u64,
}

impl SyncConfig {
    pub fn new() -> RosterResult<Self> {
        Self::from_vars(var)
    }

    /// Reads every `ROSTER_*` setting through `lookup`.
    fn from_vars(
        lookup: impl Fn(&'static str) -> Result<String, dotenvy::Error>,
    ) -> RosterResult<Self> {
        let api_url = lookup("ROSTER_API_URL").context(BadEnvVarSnafu {
            name: "ROSTER_API_URL",
        })?;
        let api_token = optional_env_var(&lookup, "ROSTER_API_TOKEN")?.map(SecretString::from);

        let mut config = Self::for_api(Url::parse(&api_url).context(ParseApiUrlSnafu {
            original: api_url.clone(),
        })?);
        config.api_token = api_token;

        if let Some(ms) = optional_number(&lookup, "ROSTER_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = optional_number(&lookup, "ROSTER_MAX_RETRIES")? {
            config.max_retries = u32::try_from(retries).unwrap_or(u32::MAX);
        }
        if let Some(secs) = optional_number(&lookup, "ROSTER_LIST_FRESHNESS_SECS")? {
            config.list_freshness = Duration::from_secs(secs);
        }
        if let Some(secs) = optional_number(&lookup, "ROSTER_DETAIL_FRESHNESS_SECS")? {
            config.detail_freshness = Duration::from_secs(secs);
        }
        if let Some(capacity) = optional_number(&lookup, "ROSTER_CACHE_CAPACITY")? {
            config.cache_capacity = capacity;
        }

        Ok(config)
    }

    /// Defaults for everything but the API location.
    pub fn for_api(api_url: Url) -> Self {
        Self {
            api_url,
            api_token: None,
            request_timeout: Duration::from_secs(2),
            max_retries: 1,
            list_freshness: Duration::from_secs(10),
            detail_freshness: Duration::from_secs(10),
            cache_capacity: 1_000,
        }
    }
}

fn optional_env_var(
    lookup: impl Fn(&'static str) -> Result<String, dotenvy::Error>,
    name: &'static str,
) -> RosterResult<Option<String>> {
    match lookup(name) {
        Ok(value) => Ok(Some(value)),
        Err(dotenvy::Error::EnvVar(VarError::NotPresent)) => Ok(None),
        Err(source) => Err(source).context(BadEnvVarSnafu { name }),
    }
}

fn optional_number(
    lookup: impl Fn(&'static str) -> Result<String, dotenvy::Error>,
    name: &'static str,
) -> RosterResult<Option<u64>> {
    optional_env_var(lookup, name)?
        .map(|value| value.trim().parse().context(ParseNumberSnafu { name }))
        .transpose()
}
