use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::{
    config::Config,
    control::{Connector, ControlClient},
    dispatch::{Dispatcher, TickOutcome},
    queue::QueueReader,
};

/// Everything one bridge process owns: the queue reader, the change detector and
/// the control client. All work happens on the caller's thread, one step at a time.
pub struct Session<C: Connector> {
    queue: QueueReader,
    dispatcher: Dispatcher,
    control: ControlClient<C>,
    poll_interval: std::time::Duration,
    next_poll: Option<Instant>,
}

impl<C: Connector> Session<C> {
    pub fn new(config: &Config, connector: C) -> Self {
        let control = ControlClient::new(
            connector,
            config.obs_address.clone(),
            config.obs_password.clone(),
        )
        .with_retry_delay(config.reconnect_delay)
        .with_policy(config.call_error_policy)
        .with_proxy_endpoint(config.proxy_endpoint.clone());

        Self {
            queue: QueueReader::new(config.queue_path.clone()),
            dispatcher: Dispatcher::new(config.targets.clone()),
            control,
            poll_interval: config.poll_interval,
            next_poll: None,
        }
    }

    pub fn control(&self) -> &ControlClient<C> {
        &self.control
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// First connection attempt; polling becomes due immediately whatever the outcome.
    pub fn start(&mut self, now: Instant) {
        tracing::info!(
            queue = %self.queue.path().display(),
            poll_ms = self.poll_interval.as_millis() as u64,
            "starting run-of-show bridge"
        );
        self.control.connect(now);
        self.next_poll = Some(now);
    }

    /// Runs whatever is due at `now` and returns when the next step should happen.
    pub fn step(&mut self, now: Instant) -> Instant {
        let due = self.next_poll.is_none_or(|at| now >= at);
        if due {
            self.tick();
            self.next_poll = Some(now + self.poll_interval);
        }
        self.control.maintain(now);

        let next_poll = self.next_poll.unwrap_or(now);
        match self.control.retry_at() {
            Some(retry_at) => retry_at.min(next_poll),
            None => next_poll,
        }
    }

    /// One poll of the queue. Errors are logged here and never stop the loop.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        match self.dispatcher.tick(&self.queue, &mut self.control) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read run-of-show");
                None
            }
        }
    }

    /// Steps until a shutdown message arrives or the channel closes, then disconnects.
    pub fn run(&mut self, shutdown: &Receiver<()>) {
        self.start(Instant::now());
        loop {
            let wake = self.step(Instant::now());
            let timeout = wake.saturating_duration_since(Instant::now());
            match shutdown.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::info!("shutting down");
        self.shutdown();
    }

    /// Connect, poll once, disconnect.
    pub fn run_once(&mut self, now: Instant) -> Option<TickOutcome> {
        self.start(now);
        let outcome = self.tick();
        self.shutdown();
        outcome
    }

    pub fn shutdown(&mut self) {
        self.control.shutdown();
    }
}
