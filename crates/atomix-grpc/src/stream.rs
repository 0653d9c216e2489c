// ABOUTME: Receive classification for server streams.
// ABOUTME: Folds stream items, clean end, and context expiry into one Received outcome.

use futures::StreamExt;

use crate::context::Context;
use crate::error::Error;
use crate::transport::MessageStream;

/// Outcome of waiting for the next stream message.
#[derive(Debug)]
pub enum Received<T> {
    Message(T),
    /// The server closed the stream cleanly. Not an error.
    End,
    Failed(Error),
}

impl<T> From<Option<Result<T, tonic::Status>>> for Received<T> {
    fn from(item: Option<Result<T, tonic::Status>>) -> Self {
        match item {
            Some(Ok(msg)) => Received::Message(msg),
            Some(Err(status)) => Received::Failed(status.into()),
            None => Received::End,
        }
    }
}

/// Wait for the next message, giving up as soon as `ctx` is done.
///
/// Context expiry wins over a message that is ready at the same time.
pub async fn receive<T>(stream: &mut MessageStream<T>, ctx: &Context) -> Received<T> {
    tokio::select! {
        biased;
        err = ctx.done() => Received::Failed(err.into()),
        item = stream.next() => item.into(),
    }
}
