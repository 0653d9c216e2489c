// ABOUTME: Background task draining one server stream into a caller-owned delivery channel.
// ABOUTME: Shared by every watch and enumeration; closes the channel on every exit path.

use atomix_grpc::{receive, Context, ErrorKind, MessageStream, Received};
use tokio::sync::mpsc;

use crate::gate::GateSignal;

/// Why a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpExit {
    /// The server closed the stream.
    StreamEnded,
    /// The caller's context was canceled or timed out.
    Teardown(ErrorKind),
    /// The stream failed with a fault.
    Failed(ErrorKind),
    /// The caller dropped the receiving end of the delivery channel.
    ReceiverDropped,
}

type Inspect<M> = Box<dyn Fn(&M) + Send>;

/// Owns one stream and one delivery sender for the lifetime of a call.
pub(crate) struct Pump<M, E, F> {
    operation: &'static str,
    stream: MessageStream<M>,
    ctx: Context,
    tx: mpsc::Sender<E>,
    gate: Option<GateSignal>,
    inspect: Option<Inspect<M>>,
    map: F,
}

impl<M, E, F> Pump<M, E, F>
where
    M: Send + 'static,
    E: Send + 'static,
    F: FnMut(M) -> Option<E> + Send + 'static,
{
    /// `map` turns a wire message into a delivered item; `None` skips the message.
    pub fn new(
        operation: &'static str,
        stream: MessageStream<M>,
        ctx: Context,
        tx: mpsc::Sender<E>,
        map: F,
    ) -> Self {
        Self {
            operation,
            stream,
            ctx,
            tx,
            gate: None,
            inspect: None,
            map,
        }
    }

    /// Release `gate` on the first message (or on exit, if none arrives).
    pub fn with_gate(mut self, gate: GateSignal) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Observe every raw message before it is mapped.
    pub fn inspect(mut self, inspect: impl Fn(&M) + Send + 'static) -> Self {
        self.inspect = Some(Box::new(inspect));
        self
    }

    /// Drive the stream to completion.
    ///
    /// The sender and the gate are dropped on return, which closes the
    /// delivery channel and releases any still-waiting caller.
    pub async fn run(self) -> PumpExit {
        let Pump {
            operation,
            mut stream,
            ctx,
            tx,
            mut gate,
            inspect,
            mut map,
        } = self;

        let exit = loop {
            let msg = match receive(&mut stream, &ctx).await {
                Received::Message(msg) => msg,
                Received::End => break PumpExit::StreamEnded,
                Received::Failed(err) if err.is_teardown() => {
                    break PumpExit::Teardown(err.kind())
                }
                Received::Failed(err) => {
                    tracing::error!(error = %err, "{} failed", operation);
                    break PumpExit::Failed(err.kind());
                }
            };

            if let Some(gate) = gate.as_mut() {
                gate.open();
            }
            if let Some(inspect) = &inspect {
                inspect(&msg);
            }
            let Some(item) = map(msg) else {
                continue;
            };

            tokio::select! {
                biased;
                err = ctx.done() => break PumpExit::Teardown(atomix_grpc::Error::from(err).kind()),
                sent = tx.send(item) => {
                    if sent.is_err() {
                        break PumpExit::ReceiverDropped;
                    }
                }
            }
        };

        tracing::debug!(?exit, "{} stream closed", operation);
        exit
    }
}
