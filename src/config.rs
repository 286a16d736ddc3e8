use std::{path::PathBuf, time::Duration};

use anyhow::{Result, bail};

use crate::{
    control::{CallErrorPolicy, DEFAULT_PROXY_ENDPOINT, RECONNECT_DELAY},
    dispatch::Targets,
};

pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_OBS_ADDRESS: &str = "localhost:4444";
pub const DEFAULT_QUEUE_PATH: &str = "bucket/news/queue/run_of_show.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub obs_address: String,
    pub obs_password: String,
    pub queue_path: PathBuf,
    pub targets: Targets,
    pub proxy_endpoint: String,
    pub call_error_policy: CallErrorPolicy,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    pub call_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            obs_address: DEFAULT_OBS_ADDRESS.to_string(),
            obs_password: String::new(),
            queue_path: PathBuf::from(DEFAULT_QUEUE_PATH),
            targets: Targets::default(),
            proxy_endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            call_error_policy: CallErrorPolicy::Keep,
            poll_interval: POLL_INTERVAL,
            reconnect_delay: RECONNECT_DELAY,
            connect_timeout: CONNECT_TIMEOUT,
            call_timeout: CALL_TIMEOUT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    ///
    /// Address, password, path and proxy fall back to defaults when unset or empty.
    /// Scene/source names fall back only when unset. This is not an `OBS_SCENE || default`
    /// fallback: an explicitly empty value such as `OBS_SCENE=` is kept, and the
    /// dispatcher then skips that update. Leave the variable unset to get the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Config::default();

        if let Some(v) = non_empty("OBS_ADDRESS") {
            cfg.obs_address = v.trim().to_string();
        }
        if let Some(v) = lookup("OBS_PASSWORD") {
            cfg.obs_password = v;
        }
        if let Some(v) = non_empty("RUN_OF_SHOW_PATH") {
            cfg.queue_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty("VIDEO_PROXY_ENDPOINT") {
            cfg.proxy_endpoint = v.trim().to_string();
        }

        let targets = &mut cfg.targets;
        for (key, slot) in [
            ("OBS_SCENE", &mut targets.scene),
            ("OBS_HEADLINE_SOURCE", &mut targets.headline_source),
            ("OBS_SUMMARY_SOURCE", &mut targets.summary_source),
            ("OBS_BG_BROWSER_SOURCE", &mut targets.background_source),
        ] {
            if let Some(v) = lookup(key) {
                *slot = v.trim().to_string();
            }
        }

        if let Some(v) = non_empty("OBS_RECONNECT_ON_CALL_ERROR") {
            cfg.call_error_policy = if parse_flag("OBS_RECONNECT_ON_CALL_ERROR", &v)? {
                CallErrorPolicy::Reconnect
            } else {
                CallErrorPolicy::Keep
            };
        }

        Ok(cfg)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean for {key}: {other:?}"),
    }
}
