use std::{
    io,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use serde::Serialize;
use thiserror::Error;
use tungstenite::{Message, WebSocket};

use crate::{
    control::{Connector, SceneControl},
    protocol::{
        AUTHENTICATE, AuthChallenge, AuthenticateParams, BrowserSettings, GET_AUTH_REQUIRED,
        NoParams, Request, Response, SET_CURRENT_SCENE, SET_SOURCE_SETTINGS, SET_TEXT_PROPERTIES,
        SetCurrentSceneParams, SetSourceSettingsParams, SetTextParams, auth_response,
    },
};

#[derive(Debug, Error)]
pub enum ObsError {
    #[error("cannot resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to reach {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("websocket handshake failed: {0}")]
    Handshake(String),
    #[error("authentication rejected: {0}")]
    AuthRejected(String),
    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{request} rejected: {message}")]
    Remote { request: String, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection closed by remote")]
    Closed,
}

impl ObsError {
    /// Link-level faults, as opposed to the remote end refusing a well-formed request.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ObsError::Transport(_) | ObsError::Closed | ObsError::Connect { .. }
        )
    }
}

/// Opens obs-websocket connections over plain TCP.
#[derive(Debug, Clone)]
pub struct ObsConnector {
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl Default for ObsConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(5),
        }
    }
}

impl Connector for ObsConnector {
    type Link = ObsLink;

    fn connect(&mut self, address: &str, password: &str) -> Result<ObsLink, ObsError> {
        let host = address.trim_start_matches("ws://").trim_end_matches('/');

        let addrs: Vec<SocketAddr> = host
            .to_socket_addrs()
            .map_err(|source| ObsError::Resolve {
                address: host.to_string(),
                source,
            })?
            .collect();
        if addrs.is_empty() {
            return Err(ObsError::Resolve {
                address: host.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
            });
        }

        let stream = connect_first(&addrs, self.connect_timeout).map_err(|source| {
            ObsError::Connect {
                address: host.to_string(),
                source,
            }
        })?;
        let set_timeouts = || -> io::Result<()> {
            stream.set_read_timeout(Some(self.io_timeout))?;
            stream.set_write_timeout(Some(self.io_timeout))?;
            stream.set_nodelay(true)
        };
        set_timeouts().map_err(|source| ObsError::Connect {
            address: host.to_string(),
            source,
        })?;

        let (ws, _response) = tungstenite::client(format!("ws://{host}"), stream)
            .map_err(|e| ObsError::Handshake(e.to_string()))?;

        let mut link = ObsLink { ws, next_id: 0 };
        link.authenticate(password)?;
        Ok(link)
    }
}

/// Tries each resolved address in order; `localhost` commonly yields `::1` before
/// `127.0.0.1` while the endpoint listens on only one of them.
pub fn connect_first(addrs: &[SocketAddr], timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses");
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "address unreachable, trying next");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// A live, authenticated connection. Requests are strictly sequential: each call
/// waits for its own response before returning.
pub struct ObsLink {
    ws: WebSocket<TcpStream>,
    next_id: u64,
}

impl ObsLink {
    fn authenticate(&mut self, password: &str) -> Result<(), ObsError> {
        let resp = self.request(GET_AUTH_REQUIRED, NoParams {})?;
        let challenge = AuthChallenge::from_response(&resp)?;
        if !challenge.auth_required {
            return Ok(());
        }

        let auth = auth_response(password, &challenge.salt, &challenge.challenge);
        match self.request(AUTHENTICATE, AuthenticateParams { auth }) {
            Ok(_) => Ok(()),
            Err(ObsError::Remote { message, .. }) => Err(ObsError::AuthRejected(message)),
            Err(e) => Err(e),
        }
    }

    fn request<T: Serialize>(&mut self, request_type: &str, params: T) -> Result<Response, ObsError> {
        self.next_id += 1;
        let message_id = self.next_id.to_string();
        let req = Request {
            request_type: request_type.to_string(),
            message_id: message_id.clone(),
            params,
        };
        self.ws.send(Message::Text(serde_json::to_string(&req)?))?;

        loop {
            let text = match self.ws.read()? {
                Message::Text(text) => text,
                Message::Close(_) => return Err(ObsError::Closed),
                // Pings are answered by tungstenite on the next write/flush.
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    continue;
                }
            };

            let resp: Response = match serde_json::from_str(&text) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unparseable frame");
                    continue;
                }
            };
            match resp.message_id.as_deref() {
                Some(id) if id == message_id => {}
                // Events and stale responses.
                _ => continue,
            }

            if resp.is_ok() {
                return Ok(resp);
            }
            if resp.status.is_none() {
                return Err(ObsError::Protocol(format!(
                    "{request_type} response without status"
                )));
            }
            return Err(ObsError::Remote {
                request: request_type.to_string(),
                message: resp.error_message(),
            });
        }
    }
}

impl SceneControl for ObsLink {
    fn set_text(&mut self, source: &str, text: &str) -> Result<(), ObsError> {
        self.request(
            SET_TEXT_PROPERTIES,
            SetTextParams {
                source: source.to_string(),
                text: text.to_string(),
            },
        )
        .map(drop)
    }

    fn set_browser_url(&mut self, source: &str, url: &str) -> Result<(), ObsError> {
        self.request(
            SET_SOURCE_SETTINGS,
            SetSourceSettingsParams {
                source_name: source.to_string(),
                source_settings: BrowserSettings {
                    url: url.to_string(),
                },
            },
        )
        .map(drop)
    }

    fn set_current_scene(&mut self, scene: &str) -> Result<(), ObsError> {
        self.request(
            SET_CURRENT_SCENE,
            SetCurrentSceneParams {
                scene_name: scene.to_string(),
            },
        )
        .map(drop)
    }

    fn close(&mut self) {
        let _ = self.ws.close(None);
        let _ = self.ws.flush();
    }
}
