use crate::{
    control::{CallOutcome, Connector, ControlClient},
    queue::{QueueError, QueueReader},
};

/// Scene and source names the dispatcher writes to. An empty name disables that update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub scene: String,
    pub headline_source: String,
    pub summary_source: String,
    pub background_source: String,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            scene: "Broadcast".to_string(),
            headline_source: "Headline_Text".to_string(),
            summary_source: "Summary_Text".to_string(),
            background_source: "BG_Browser".to_string(),
        }
    }
}

/// Outcomes of the four remote calls made for one item, in call order.
#[derive(Debug)]
pub struct DispatchReport {
    pub id: String,
    pub headline: CallOutcome,
    pub summary: CallOutcome,
    pub background: CallOutcome,
    pub scene: CallOutcome,
}

impl DispatchReport {
    pub fn fully_applied(&self) -> bool {
        [&self.headline, &self.summary, &self.background, &self.scene]
            .iter()
            .all(|o| matches!(o, CallOutcome::Applied | CallOutcome::Skipped))
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    /// Queue missing or empty.
    NoItem,
    /// Same item as last dispatched.
    Unchanged,
    /// Current item has no id; nothing to key change detection on.
    Anonymous,
    Dispatched(DispatchReport),
}

/// Change detector. Holds only the id of the last dispatched item.
#[derive(Debug, Default)]
pub struct Dispatcher {
    targets: Targets,
    last_seen_id: Option<String>,
}

impl Dispatcher {
    pub fn new(targets: Targets) -> Self {
        Self {
            targets,
            last_seen_id: None,
        }
    }

    pub fn last_seen_id(&self) -> Option<&str> {
        self.last_seen_id.as_deref()
    }

    /// One poll: read the head of the queue and, if it changed, push it.
    ///
    /// The new id is recorded before any call is made, so an item whose update
    /// fails is not retried on later ticks.
    pub fn tick<C: Connector>(
        &mut self,
        queue: &QueueReader,
        control: &mut ControlClient<C>,
    ) -> Result<TickOutcome, QueueError> {
        let Some(item) = queue.current()? else {
            return Ok(TickOutcome::NoItem);
        };
        if item.id.is_empty() {
            return Ok(TickOutcome::Anonymous);
        }
        if self.last_seen_id.as_deref() == Some(item.id.as_str()) {
            return Ok(TickOutcome::Unchanged);
        }

        self.last_seen_id = Some(item.id.clone());
        tracing::info!(id = %item.id, heading = item.headline(), "new item detected");

        let t = &self.targets;
        let report = DispatchReport {
            headline: control.set_text_property(&t.headline_source, item.headline()),
            summary: control.set_text_property(&t.summary_source, item.summary()),
            background: control.set_background_url(&t.background_source, item.video_url()),
            scene: control.activate_scene(&t.scene),
            id: item.id,
        };

        if report.fully_applied() {
            tracing::info!(id = %report.id, "control endpoint updated for item");
        } else {
            tracing::warn!(id = %report.id, "item dispatched with failed or offline calls");
        }
        Ok(TickOutcome::Dispatched(report))
    }
}
