// ABOUTME: One-shot gate that makes stream establishment look synchronous to the caller.
// ABOUTME: Released by the first received message, or by the pump exiting before any message.

use atomix_grpc::{Context, Result};
use tokio::sync::oneshot;

/// Create a linked signal (held by the pump) and waiter (held by the caller).
pub(crate) fn stream_open_gate() -> (GateSignal, GateWaiter) {
    let (tx, rx) = oneshot::channel();
    (GateSignal { tx: Some(tx) }, GateWaiter { rx })
}

/// Pump side of the gate.
///
/// Dropping an unopened signal also releases the waiter, so every pump exit
/// path unblocks the caller.
#[derive(Debug)]
pub(crate) struct GateSignal {
    tx: Option<oneshot::Sender<()>>,
}

impl GateSignal {
    /// Release the waiter. Returns false if the gate was already open.
    pub fn open(&mut self) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // The waiter may have given up on cancellation; that is fine.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.tx.is_none()
    }
}

/// Caller side of the gate.
#[derive(Debug)]
pub(crate) struct GateWaiter {
    rx: oneshot::Receiver<()>,
}

impl GateWaiter {
    /// Block until the gate is released or `ctx` is done, whichever comes first.
    ///
    /// A context that is already done wins over a released gate.
    pub async fn wait(self, ctx: &Context) -> Result<()> {
        tokio::select! {
            biased;
            err = ctx.done() => Err(err.into()),
            // Err means the signal was dropped unopened: the pump ended first.
            _ = self.rx => Ok(()),
        }
    }
}
