//! Serialized owner of the risk state
//!
//! All mutations go through one task that drains a command queue in arrival
//! order. Observers read snapshots from a watch channel and never touch the
//! state directly.

use crate::engine::modality::{Modality, Verdict};
use crate::engine::risk_state::{AlertTicket, RiskSnapshot, RiskState};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Risk ledger is no longer running")]
pub struct LedgerClosed;

enum StateCommand {
    ClearAlert {
        reply: oneshot::Sender<AlertTicket>,
    },
    RestoreAlert {
        ticket: AlertTicket,
        reply: oneshot::Sender<bool>,
    },
    ApplyVerdict {
        ticket: Option<AlertTicket>,
        modality: Modality,
        verdict: Verdict,
        reply: oneshot::Sender<RiskSnapshot>,
    },
    ApplyDelta {
        delta: f64,
        reply: oneshot::Sender<f64>,
    },
}

/// Task that owns the `RiskState`
pub struct RiskLedger {
    state: RiskState,
    commands: mpsc::UnboundedReceiver<StateCommand>,
    snapshots: watch::Sender<RiskSnapshot>,
}

impl RiskLedger {
    /// Spawn the ledger on the current runtime and return a handle to it
    pub fn spawn(state: RiskState) -> RiskStateHandle {
        let (tx, commands) = mpsc::unbounded_channel();
        let (snapshots, snapshot_rx) = watch::channel(state.snapshot());

        let ledger = RiskLedger {
            state,
            commands,
            snapshots,
        };
        tokio::spawn(ledger.run());

        RiskStateHandle {
            commands: tx,
            snapshots: snapshot_rx,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        debug!("Risk ledger stopped, all handles dropped");
    }

    fn handle(&mut self, command: StateCommand) {
        match command {
            StateCommand::ClearAlert { reply } => {
                let ticket = self.state.clear_alert();
                self.publish();
                let _ = reply.send(ticket);
            }
            StateCommand::RestoreAlert { ticket, reply } => {
                let restored = self.state.restore_alert(ticket);
                if restored {
                    self.publish();
                } else {
                    debug!("Alert still held by another attempt or rewritten since");
                }
                let _ = reply.send(restored);
            }
            StateCommand::ApplyVerdict {
                ticket,
                modality,
                verdict,
                reply,
            } => {
                let score = self.state.settle_verdict(ticket, modality, &verdict);
                debug!(%modality, score, "Verdict applied");
                let _ = reply.send(self.publish());
            }
            StateCommand::ApplyDelta { delta, reply } => {
                let score = self.state.apply_delta(delta);
                self.publish();
                let _ = reply.send(score);
            }
        }
    }

    // Publish before replying so a caller that awaited the reply never
    // reads an older snapshot.
    fn publish(&self) -> RiskSnapshot {
        let snapshot = self.state.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }
}

/// Cloneable handle to the ledger
#[derive(Clone)]
pub struct RiskStateHandle {
    commands: mpsc::UnboundedSender<StateCommand>,
    snapshots: watch::Receiver<RiskSnapshot>,
}

impl RiskStateHandle {
    /// Latest published snapshot
    pub fn snapshot(&self) -> RiskSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified after every mutation
    pub fn subscribe(&self) -> watch::Receiver<RiskSnapshot> {
        self.snapshots.clone()
    }

    pub async fn clear_alert(&self) -> Result<AlertTicket, LedgerClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(StateCommand::ClearAlert { reply })?;
        rx.await.map_err(|_| LedgerClosed)
    }

    /// Abandon the hold taken by `clear_alert`; see `RiskState::restore_alert`
    pub async fn restore_alert(&self, ticket: AlertTicket) -> Result<bool, LedgerClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(StateCommand::RestoreAlert { ticket, reply })?;
        rx.await.map_err(|_| LedgerClosed)
    }

    pub async fn apply_verdict(
        &self,
        modality: Modality,
        verdict: Verdict,
    ) -> Result<RiskSnapshot, LedgerClosed> {
        self.settle_verdict(None, modality, verdict).await
    }

    /// Apply the verdict of an attempt, releasing its alert hold in the same step
    pub async fn settle_verdict(
        &self,
        ticket: Option<AlertTicket>,
        modality: Modality,
        verdict: Verdict,
    ) -> Result<RiskSnapshot, LedgerClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(StateCommand::ApplyVerdict {
            ticket,
            modality,
            verdict,
            reply,
        })?;
        rx.await.map_err(|_| LedgerClosed)
    }

    pub async fn apply_delta(&self, delta: f64) -> Result<f64, LedgerClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(StateCommand::ApplyDelta { delta, reply })?;
        rx.await.map_err(|_| LedgerClosed)
    }

    fn send(&self, command: StateCommand) -> Result<(), LedgerClosed> {
        self.commands.send(command).map_err(|_| LedgerClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_deltas_accumulate() {
        let handle = RiskLedger::spawn(RiskState::new());

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.apply_delta(3.0).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(handle.snapshot().risk_score, 60.0);
    }

    #[tokio::test]
    async fn test_snapshot_published_after_verdict() {
        let handle = RiskLedger::spawn(RiskState::with_score(50.0));
        let mut updates = handle.subscribe();

        let snapshot = handle
            .apply_verdict(Modality::Weapon, Verdict::detection(15.0, Some("gun seen")))
            .await
            .unwrap();
        assert_eq!(snapshot.risk_score, 65.0);

        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().alert_message.as_deref(), Some("gun seen"));
    }

    #[tokio::test]
    async fn test_restore_after_clear() {
        let handle = RiskLedger::spawn(RiskState::new());
        handle
            .apply_verdict(Modality::Weapon, Verdict::detection(0.0, Some("old")))
            .await
            .unwrap();

        let ticket = handle.clear_alert().await.unwrap();
        assert!(handle.snapshot().alert_message.is_none());

        assert!(handle.restore_alert(ticket).await.unwrap());
        assert_eq!(handle.snapshot().alert_message.as_deref(), Some("old"));
    }
}
