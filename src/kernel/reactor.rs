//! Message-passing boundary between the automation driver and the engine.
//!
//! The driver forwards platform callbacks as `Command`s over a channel. The
//! reactor applies them one at a time to its `SessionController`; all engine
//! logic stays synchronous inside `step`.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::EngineConfig;
use super::event::{RawEvent, RawNode};
use super::metrics::contrast::ColorSample;
use super::metrics::MetricSnapshot;
use super::observation::Capabilities;
use super::session::SessionController;
use super::time::Timestamp;

#[derive(Debug)]
pub enum Command {
    Start(Capabilities),
    Raw(RawEvent),
    Track(String),
    TrackNode(RawNode),
    Colors(ColorSample),
    Harvest {
        now: Timestamp,
        reply: Option<oneshot::Sender<MetricSnapshot>>,
    },
    Reset,
}

pub struct Reactor {
    pub receiver: mpsc::Receiver<Command>,
    pub controller: SessionController,
    shutdown: CancellationToken,
}

impl Reactor {
    pub fn new(receiver: mpsc::Receiver<Command>, config: EngineConfig) -> Self {
        Self {
            receiver,
            controller: SessionController::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops `run` at the next command boundary.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Applies one command. Returns the snapshot for harvest commands.
    /// MUST NOT await.
    pub fn step(&mut self, command: Command) -> Option<MetricSnapshot> {
        match command {
            Command::Start(capabilities) => {
                self.controller.start(capabilities);
                None
            }
            Command::Raw(raw) => {
                self.controller.ingest(raw);
                None
            }
            Command::Track(element_id) => {
                self.controller.track_element(&element_id);
                None
            }
            Command::TrackNode(node) => {
                self.controller.track_node(&node);
                None
            }
            Command::Colors(sample) => {
                self.controller.sample_colors(sample);
                None
            }
            Command::Harvest { now, reply } => {
                let snapshot = self.controller.harvest(now);
                if let Some(tx) = reply {
                    if tx.send(snapshot.clone()).is_err() {
                        debug!("harvest requester went away before the reply");
                    }
                }
                Some(snapshot)
            }
            Command::Reset => {
                self.controller.reset();
                None
            }
        }
    }

    /// Async driver loop. Ends when every sender is dropped or on shutdown.
    pub async fn run(&mut self) {
        info!("Reactor accepting commands");
        loop {
            let command = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Reactor shutdown requested");
                    break;
                }
                command = self.receiver.recv() => command,
            };

            match command {
                Some(command) => {
                    self.step(command);
                }
                None => {
                    info!("Command channel closed");
                    break;
                }
            }
        }
    }
}
