//! The tokio control loop that owns a [`QueueOrchestrator`].
//!
//! Commands from any number of [`OrchestratorHandle`]s and the periodic poll
//! tick are serialized through one task, so user actions and reconciliation
//! never interleave mid-operation. Commands that are already waiting when the
//! loop wakes are applied as one batch and flushed once.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::{
    Action, DownloadBackend, ObserverCallback, ObserverId, OrchestratorError, PollReport,
    QueueOrchestrator,
};
use crate::persistence::SnapshotStore;
use crate::record::DownloadRecord;

/// Depth of the command channel.
const COMMAND_BUFFER: usize = 64;

/// Poll intervals below this are raised to it.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

enum Command {
    Dispatch {
        action: Action,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<DownloadRecord>>,
    },
    CanQuit {
        reply: oneshot::Sender<bool>,
    },
    IsDrained {
        reply: oneshot::Sender<bool>,
    },
    Subscribe {
        callback: ObserverCallback,
        reply: oneshot::Sender<Option<ObserverId>>,
    },
    Unsubscribe {
        id: ObserverId,
        reply: oneshot::Sender<bool>,
    },
    PollNow {
        reply: oneshot::Sender<PollReport>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running control loop.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    command_tx: mpsc::Sender<Command>,
}

impl OrchestratorHandle {
    /// Applies `action`; resolves once the change has been flushed.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Shutdown`] if the loop has stopped.
    pub async fn dispatch(&self, action: Action) -> Result<(), OrchestratorError> {
        self.request(|reply| Command::Dispatch { action, reply }).await
    }

    /// Shorthand for dispatching [`Action::Enqueue`].
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Shutdown`] if the loop has stopped.
    pub async fn enqueue(&self, urls: Vec<String>) -> Result<(), OrchestratorError> {
        self.dispatch(Action::Enqueue(urls)).await
    }

    /// # Errors
    ///
    /// Returns [`OrchestratorError::Shutdown`] if the loop has stopped.
    pub async fn snapshot(&self) -> Result<Vec<DownloadRecord>, OrchestratorError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// # Errors
    ///
    /// Returns [`OrchestratorError::Shutdown`] if the loop has stopped.
    pub async fn can_quit(&self) -> Result<bool, OrchestratorError> {
        self.request(|reply| Command::CanQuit { reply }).await
    }

    /// See [`QueueOrchestrator::is_drained`].
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Shutdown`] if the loop has stopped.
    pub async fn is_drained(&self) -> Result<bool, OrchestratorError> {
        self.request(|reply| Command::IsDrained { reply }).await
    }

    /// Registers an observer; it is invoked at once with the current snapshot
    /// and then after every flush, on the control loop's task.
    ///
    /// Resolves to `None` when the observer registry is full. An observer
    /// that panics is dropped; the loop keeps running.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Shutdown`] if the loop has stopped.
    pub async fn subscribe<F>(&self, callback: F) -> Result<Option<ObserverId>, OrchestratorError>
    where
        F: Fn(&[DownloadRecord]) + Send + 'static,
    {
        let callback: ObserverCallback = Box::new(callback);
        self.request(|reply| Command::Subscribe { callback, reply })
            .await
    }

    /// # Errors
    ///
    /// Returns [`OrchestratorError::Shutdown`] if the loop has stopped.
    pub async fn unsubscribe(&self, id: ObserverId) -> Result<bool, OrchestratorError> {
        self.request(|reply| Command::Unsubscribe { id, reply }).await
    }

    /// Runs a reconciliation poll now instead of waiting for the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Shutdown`] if the loop has stopped.
    pub async fn poll_now(&self) -> Result<PollReport, OrchestratorError> {
        self.request(|reply| Command::PollNow { reply }).await
    }

    /// Stops the loop after a final forced flush.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Shutdown`] if the loop had already stopped.
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Returns true once the loop has stopped accepting commands.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, OrchestratorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| OrchestratorError::Shutdown)?;
        reply_rx.await.map_err(|_| OrchestratorError::Shutdown)
    }
}

/// Owns the orchestrator for the lifetime of the control loop.
pub struct OrchestratorRuntime<B, S> {
    orchestrator: QueueOrchestrator<B, S>,
    command_rx: mpsc::Receiver<Command>,
    poll_interval: Duration,
}

impl<B, S> OrchestratorRuntime<B, S>
where
    B: DownloadBackend + 'static,
    S: SnapshotStore + 'static,
{
    /// Creates the loop without starting it.
    pub fn new(
        orchestrator: QueueOrchestrator<B, S>,
        poll_interval: Duration,
    ) -> (Self, OrchestratorHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let runtime = Self {
            orchestrator,
            command_rx,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        };
        (runtime, OrchestratorHandle { command_tx })
    }

    /// Spawns the loop on the current tokio runtime.
    pub fn spawn(orchestrator: QueueOrchestrator<B, S>, poll_interval: Duration) -> OrchestratorHandle {
        let (runtime, handle) = Self::new(orchestrator, poll_interval);
        tokio::spawn(runtime.run());
        handle
    }

    /// Runs until a shutdown command arrives or every handle is dropped.
    ///
    /// The first poll happens one interval after start; late ticks are
    /// delayed rather than bunched.
    pub async fn run(mut self) {
        let mut ticker = time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = u64::try_from(self.poll_interval.as_millis()).unwrap_or(u64::MAX),
            records = self.orchestrator.len(),
            "Download orchestrator started"
        );

        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        debug!("All orchestrator handles dropped");
                        self.orchestrator.shutdown();
                        return;
                    };
                    if self.handle_batch(command).await.is_break() {
                        return;
                    }
                }

                _ = ticker.tick() => {
                    let report = self.orchestrator.poll().await;
                    if report.changed > 0 || report.failed > 0 {
                        debug!(
                            checked = report.checked,
                            changed = report.changed,
                            failed = report.failed,
                            "Reconciliation poll"
                        );
                    }
                }
            }
        }
    }

    /// Handles `first` and every command already queued behind it, then
    /// flushes once before acknowledging the dispatched actions.
    async fn handle_batch(&mut self, first: Command) -> ControlFlow<()> {
        let mut acks = Vec::new();
        let mut next = Some(first);

        while let Some(command) = next {
            match command {
                Command::Dispatch { action, reply } => {
                    self.orchestrator.apply(action).await;
                    acks.push(reply);
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.orchestrator.snapshot());
                }
                Command::CanQuit { reply } => {
                    let _ = reply.send(self.orchestrator.can_quit());
                }
                Command::IsDrained { reply } => {
                    let _ = reply.send(self.orchestrator.is_drained());
                }
                Command::Subscribe { callback, reply } => {
                    let _ = reply.send(self.orchestrator.subscribe(callback));
                }
                Command::Unsubscribe { id, reply } => {
                    let _ = reply.send(self.orchestrator.unsubscribe(id));
                }
                Command::PollNow { reply } => {
                    let _ = reply.send(self.orchestrator.poll().await);
                }
                Command::Shutdown { reply } => {
                    self.orchestrator.shutdown();
                    for ack in acks {
                        let _ = ack.send(());
                    }
                    let _ = reply.send(());
                    return ControlFlow::Break(());
                }
            }
            next = self.command_rx.try_recv().ok();
        }

        self.orchestrator.flush_pending();
        for ack in acks {
            let _ = ack.send(());
        }
        ControlFlow::Continue(())
    }
}
