//! Single-task runtime driving [`App`] against a [`RemoteApi`].
//!
//! All state mutation happens on the task that owns the [`Controller`].
//! Network calls run in spawned tasks and report back over an `mpsc` channel;
//! debounce deadlines and the status poll are served from
//! [`App::next_deadline`].

mod loop_runner;
mod tasks;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::api::RemoteApi;
use crate::app::{App, AppEvent, Effect, ViewCommand};

pub use loop_runner::Command;

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct Controller<A: RemoteApi> {
    api: A,
    app: App,
    event_tx: mpsc::Sender<AppEvent>,
    event_rx: mpsc::Receiver<AppEvent>,
    /// Spawned tasks whose event has not arrived yet.
    in_flight: usize,
    view_tx: Option<mpsc::UnboundedSender<ViewCommand>>,
}

impl<A: RemoteApi> Controller<A> {
    pub fn new(api: A, app: App) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            app,
            event_tx,
            event_rx,
            in_flight: 0,
            view_tx: None,
        }
    }

    /// Forward view commands to a rendering collaborator.
    pub fn with_view(mut self, view_tx: mpsc::UnboundedSender<ViewCommand>) -> Self {
        self.view_tx = Some(view_tx);
        self
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    pub fn into_app(self) -> App {
        self.app
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Run a transition and dispatch its effects.
    pub fn act<F>(&mut self, f: F)
    where
        F: FnOnce(&mut App, Instant) -> Vec<Effect>,
    {
        let effects = f(&mut self.app, Instant::now());
        self.dispatch(effects);
    }

    pub fn dispatch(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::View(command) => self.send_view(command),
                effect => {
                    tracing::debug!(task = tasks::task_name(&effect), "Dispatching");
                    tasks::spawn(self.api.clone(), effect, self.event_tx.clone());
                    self.in_flight += 1;
                }
            }
        }
    }

    fn send_view(&self, command: ViewCommand) {
        match &self.view_tx {
            Some(tx) => {
                if tx.send(command).is_err() {
                    tracing::debug!("View receiver dropped");
                }
            }
            None => tracing::trace!(command = ?command, "No view attached"),
        }
    }

    fn on_event(&mut self, event: AppEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let effects = self.app.handle_event(event, Instant::now());
        self.dispatch(effects);
    }

    fn on_deadline(&mut self) {
        let effects = self.app.tick(Instant::now());
        self.dispatch(effects);
    }

    /// Wait for the next completed task or due deadline and process it.
    ///
    /// Returns false when there is nothing left to wait for.
    pub async fn step(&mut self) -> bool {
        let deadline = self.app.next_deadline();
        if self.in_flight == 0 && deadline.is_none() {
            return false;
        }
        let has_tasks = self.in_flight > 0;
        tokio::select! {
            biased;

            Some(event) = self.event_rx.recv(), if has_tasks => self.on_event(event),

            _ = sleep_until_opt(deadline) => self.on_deadline(),

            else => return false,
        }
        true
    }

    /// Process events and deadlines until the engine is idle: no requests in
    /// flight, no debounce pending and no poll scheduled.
    pub async fn settle(&mut self) {
        while self.step().await {}
    }
}

pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
