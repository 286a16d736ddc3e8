#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    path::PathBuf,
    rc::Rc,
    time::Duration,
};

use obs_show_sync::{
    control::{Connector, SceneControl},
    obs::ObsError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Text { source: String, text: String },
    Url { source: String, url: String },
    Scene { scene: String },
    Close,
}

/// Records every call made through any link it hands out.
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub calls: Rc<RefCell<Vec<Call>>>,
    /// Connect attempts left to fail before succeeding. `u32::MAX` never succeeds.
    pub failing_connects: Rc<Cell<u32>>,
    pub attempts: Rc<Cell<u32>>,
    /// How long each connect attempt blocks before it resolves.
    pub connect_delay: Rc<Cell<Duration>>,
    /// When set, every call on the link fails with this kind.
    pub call_failure: Rc<Cell<Option<FailureKind>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Remote,
    Transport,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: u32) -> Self {
        let c = Self::default();
        c.failing_connects.set(times);
        c
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl Connector for FakeConnector {
    type Link = FakeLink;

    fn connect(&mut self, _address: &str, _password: &str) -> Result<FakeLink, ObsError> {
        self.attempts.set(self.attempts.get() + 1);
        let delay = self.connect_delay.get();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let left = self.failing_connects.get();
        if left > 0 {
            if left != u32::MAX {
                self.failing_connects.set(left - 1);
            }
            return Err(ObsError::Connect {
                address: "fake".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        Ok(FakeLink {
            calls: self.calls.clone(),
            failure: self.call_failure.clone(),
        })
    }
}

pub struct FakeLink {
    calls: Rc<RefCell<Vec<Call>>>,
    failure: Rc<Cell<Option<FailureKind>>>,
}

impl FakeLink {
    fn record(&mut self, call: Call) -> Result<(), ObsError> {
        self.calls.borrow_mut().push(call);
        match self.failure.get() {
            None => Ok(()),
            Some(FailureKind::Remote) => Err(ObsError::Remote {
                request: "fake".to_string(),
                message: "source does not exist".to_string(),
            }),
            Some(FailureKind::Transport) => Err(ObsError::Closed),
        }
    }
}

impl SceneControl for FakeLink {
    fn set_text(&mut self, source: &str, text: &str) -> Result<(), ObsError> {
        self.record(Call::Text {
            source: source.to_string(),
            text: text.to_string(),
        })
    }

    fn set_browser_url(&mut self, source: &str, url: &str) -> Result<(), ObsError> {
        self.record(Call::Url {
            source: source.to_string(),
            url: url.to_string(),
        })
    }

    fn set_current_scene(&mut self, scene: &str) -> Result<(), ObsError> {
        self.record(Call::Scene {
            scene: scene.to_string(),
        })
    }

    fn close(&mut self) {
        self.calls.borrow_mut().push(Call::Close);
    }
}

pub struct QueueFile {
    pub dir: tempfile::TempDir,
    pub path: PathBuf,
}

impl QueueFile {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_of_show.json");
        Self { dir, path }
    }

    pub fn write(&self, text: &str) {
        std::fs::write(&self.path, text).unwrap();
    }

    pub fn write_item(&self, id: &str, heading: &str, summary: &str, video: &str) {
        let items = serde_json::json!([{
            "id": id,
            "main_heading": heading,
            "content_text": summary,
            "extra_data": { "video_url": video },
        }]);
        self.write(&items.to_string());
    }
}
