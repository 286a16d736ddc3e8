use std::time::{Duration, Instant};

use url::form_urlencoded;

use crate::obs::ObsError;

pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_PROXY_ENDPOINT: &str = "http://127.0.0.1:8000/proxy_video";

/// Remote operations on a live link to the production tool.
pub trait SceneControl {
    fn set_text(&mut self, source: &str, text: &str) -> Result<(), ObsError>;
    fn set_browser_url(&mut self, source: &str, url: &str) -> Result<(), ObsError>;
    fn set_current_scene(&mut self, scene: &str) -> Result<(), ObsError>;
    fn close(&mut self) {}
}

/// Produces links. A fresh link is created for every (re)connect attempt.
pub trait Connector {
    type Link: SceneControl;

    fn connect(&mut self, address: &str, password: &str) -> Result<Self::Link, ObsError>;
}

/// What to do with the link when a call fails with a transport error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallErrorPolicy {
    /// Log and keep the link; only connection establishment retries.
    #[default]
    Keep,
    /// Drop the link and go through the reconnect delay again.
    Reconnect,
}

#[derive(Debug)]
pub enum CallOutcome {
    Applied,
    /// Target name not configured.
    Skipped,
    /// No live link.
    Offline,
    Failed(ObsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Failed { retry_at: Instant },
}

enum LinkState<L> {
    Idle,
    Connected(L),
    Waiting { retry_at: Instant },
    Lost,
    Closed,
}

/// Owns the connection to the control endpoint and every call made through it.
///
/// Nothing here blocks beyond a single connect attempt or a single request; retries
/// are driven by [`ControlClient::maintain`] from the caller's loop.
pub struct ControlClient<C: Connector> {
    connector: C,
    address: String,
    password: String,
    state: LinkState<C::Link>,
    retry_delay: Duration,
    policy: CallErrorPolicy,
    proxy_endpoint: String,
    attempts: u32,
}

impl<C: Connector> ControlClient<C> {
    pub fn new(connector: C, address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            connector,
            address: address.into(),
            password: password.into(),
            state: LinkState::Idle,
            retry_delay: RECONNECT_DELAY,
            policy: CallErrorPolicy::default(),
            proxy_endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            attempts: 0,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_policy(mut self, policy: CallErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_proxy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.proxy_endpoint = endpoint.into();
        self
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, LinkState::Connected(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, LinkState::Closed)
    }

    /// Number of connection attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// When the next reconnect attempt is due, if one is pending.
    pub fn retry_at(&self) -> Option<Instant> {
        match self.state {
            LinkState::Waiting { retry_at } => Some(retry_at),
            _ => None,
        }
    }

    /// One connection attempt. A failure schedules the next attempt `retry_delay`
    /// after the attempt gave up, which may be well past `now` when the connect or
    /// handshake ran into its timeout.
    pub fn connect(&mut self, now: Instant) -> ConnectOutcome {
        if self.is_closed() {
            return ConnectOutcome::Failed { retry_at: now };
        }
        if let LinkState::Connected(mut old) = std::mem::replace(&mut self.state, LinkState::Idle) {
            old.close();
        }

        self.attempts += 1;
        match self.connector.connect(&self.address, &self.password) {
            Ok(link) => {
                tracing::info!(address = %self.address, "connected to control endpoint");
                self.state = LinkState::Connected(link);
                ConnectOutcome::Connected
            }
            Err(e) => {
                let failed_at = now.max(Instant::now());
                let retry_at = failed_at + self.retry_delay;
                tracing::warn!(
                    address = %self.address,
                    attempt = self.attempts,
                    error = %e,
                    retry_in_ms = self.retry_delay.as_millis() as u64,
                    "failed to connect to control endpoint"
                );
                self.state = LinkState::Waiting { retry_at };
                ConnectOutcome::Failed { retry_at }
            }
        }
    }

    /// Drives reconnection: attempts a connect when one is due, and puts a dropped
    /// link back on the retry schedule.
    pub fn maintain(&mut self, now: Instant) {
        match self.state {
            LinkState::Idle => {
                self.connect(now);
            }
            LinkState::Waiting { retry_at } if now >= retry_at => {
                self.connect(now);
            }
            LinkState::Lost => {
                self.state = LinkState::Waiting {
                    retry_at: now + self.retry_delay,
                };
            }
            LinkState::Waiting { .. } | LinkState::Connected(_) | LinkState::Closed => {}
        }
    }

    pub fn set_text_property(&mut self, source: &str, text: &str) -> CallOutcome {
        if source.is_empty() {
            return CallOutcome::Skipped;
        }
        self.call(source, |link| link.set_text(source, text))
    }

    /// Points a browser source at the item's video, routed through the local proxy
    /// when it is an http(s) URL. An empty URL clears the source.
    pub fn set_background_url(&mut self, source: &str, raw_url: &str) -> CallOutcome {
        if source.is_empty() {
            return CallOutcome::Skipped;
        }
        let url = background_url(raw_url, &self.proxy_endpoint);
        self.call(source, |link| link.set_browser_url(source, &url))
    }

    pub fn activate_scene(&mut self, scene: &str) -> CallOutcome {
        if scene.is_empty() {
            return CallOutcome::Skipped;
        }
        self.call(scene, |link| link.set_current_scene(scene))
    }

    /// Best-effort disconnect. The client stays closed afterwards.
    pub fn shutdown(&mut self) {
        if let LinkState::Connected(mut link) = std::mem::replace(&mut self.state, LinkState::Closed) {
            link.close();
            tracing::info!(address = %self.address, "disconnected from control endpoint");
        }
    }

    fn call<F>(&mut self, target: &str, f: F) -> CallOutcome
    where
        F: FnOnce(&mut C::Link) -> Result<(), ObsError>,
    {
        let LinkState::Connected(link) = &mut self.state else {
            tracing::debug!(target_name = target, "not connected; skipping call");
            return CallOutcome::Offline;
        };

        match f(link) {
            Ok(()) => CallOutcome::Applied,
            Err(e) => {
                tracing::error!(target_name = target, error = %e, "remote call failed");
                if e.is_transport() && self.policy == CallErrorPolicy::Reconnect {
                    if let LinkState::Connected(mut link) =
                        std::mem::replace(&mut self.state, LinkState::Lost)
                    {
                        link.close();
                    }
                    tracing::warn!(address = %self.address, "dropping link after transport error");
                }
                CallOutcome::Failed(e)
            }
        }
    }
}

/// Effective browser-source URL for a queue item's video.
///
/// Anything starting with `http` is wrapped into the proxy's `url` query parameter;
/// every other value, including the empty string, passes through untouched.
///
/// The query value is form-urlencoded rather than `encodeURIComponent`-style: a
/// space becomes `+` instead of `%20`, and `~!'()` are escaped as `%XX`. `:` and `/`
/// come out as `%3A`/`%2F` either way, and the proxy decodes both forms to the same
/// string.
pub fn background_url(raw_url: &str, proxy_endpoint: &str) -> String {
    if raw_url.is_empty() || !raw_url.starts_with("http") {
        return raw_url.to_string();
    }
    let encoded: String = form_urlencoded::byte_serialize(raw_url.as_bytes()).collect();
    format!("{proxy_endpoint}?url={encoded}")
}
