//! obs-websocket v4 message shapes.
//!
//! Every request is a JSON text frame carrying `request-type` and a caller-chosen
//! `message-id`; the matching response echoes the id and reports `status`. Frames
//! without an id are events and carry `update-type` instead.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const GET_AUTH_REQUIRED: &str = "GetAuthRequired";
pub const AUTHENTICATE: &str = "Authenticate";
pub const SET_TEXT_PROPERTIES: &str = "SetTextGDIPlusProperties";
pub const SET_SOURCE_SETTINGS: &str = "SetSourceSettings";
pub const SET_CURRENT_SCENE: &str = "SetCurrentScene";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request<T> {
    #[serde(rename = "request-type")]
    pub request_type: String,
    #[serde(rename = "message-id")]
    pub message_id: String,
    #[serde(flatten)]
    pub params: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(rename = "message-id", default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }

    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| format!("status {:?}", self.status.as_deref().unwrap_or("missing")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoParams {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateParams {
    pub auth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTextParams {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSourceSettingsParams {
    #[serde(rename = "sourceName")]
    pub source_name: String,
    #[serde(rename = "sourceSettings")]
    pub source_settings: BrowserSettings,
}

/// Browser sources keep the page they render under `url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetCurrentSceneParams {
    #[serde(rename = "scene-name")]
    pub scene_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthChallenge {
    #[serde(rename = "authRequired", default)]
    pub auth_required: bool,
    #[serde(default)]
    pub challenge: String,
    #[serde(default)]
    pub salt: String,
}

impl AuthChallenge {
    pub fn from_response(response: &Response) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(response.fields.clone()))
    }
}

/// `base64(sha256(base64(sha256(password + salt)) + challenge))`
pub fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{password}{salt}").as_bytes()));
    STANDARD.encode(Sha256::digest(format!("{secret}{challenge}").as_bytes()))
}
