// ABOUTME: Distributed mutex bound to the holder's session.
// ABOUTME: Acquisitions are versioned so a stale holder cannot release a newer lock.

use std::time::Duration;

use atomix_grpc::{Context, Result, Transport};
use atomix_proto::lock as pb;
use tonic::transport::Channel;

use crate::meta::{preconditions_to_proto, ObjectMeta, Precondition};
use crate::primitive::{impl_primitive, PrimitiveOption, Type};
use crate::session::Session;

/// Snapshot of the lock as the server sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockState {
    pub locked: bool,
    /// Revision of the current acquisition; default when unlocked.
    pub meta: ObjectMeta,
}

#[derive(Debug, Clone)]
pub struct Lock<T = Channel> {
    session: Session<T>,
}

impl_primitive!(Lock);

impl<T: Transport> Lock<T> {
    pub async fn open(
        ctx: &Context,
        transport: T,
        name: &str,
        options: &[PrimitiveOption],
    ) -> Result<Self> {
        let session =
            Session::open(ctx, transport, Type::Lock, pb::SESSION, name, options).await?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Acquire the lock, waiting at most `timeout` on the server side.
    ///
    /// With no timeout the call waits until the lock is granted or `ctx` is
    /// done. A server-side timeout surfaces as `ErrorKind::Timeout`.
    pub async fn lock(&self, ctx: &Context, timeout: Option<Duration>) -> Result<ObjectMeta> {
        let timeout_millis = timeout
            .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX).max(1))
            .unwrap_or(0);
        let response: pb::LockResponse = self
            .session
            .unary(ctx, pb::LOCK, pb::LockRequest { timeout_millis })
            .await?;
        Ok(ObjectMeta::from_proto(response.meta))
    }

    /// Release the lock. Pass `IfMatch` with the acquisition's metadata to
    /// release only that acquisition.
    pub async fn unlock(&self, ctx: &Context, preconditions: &[Precondition]) -> Result<()> {
        let request = pb::UnlockRequest {
            preconditions: preconditions_to_proto(preconditions),
        };
        let _: pb::UnlockResponse = self.session.unary(ctx, pb::UNLOCK, request).await?;
        Ok(())
    }

    pub async fn get(&self, ctx: &Context) -> Result<LockState> {
        let response: pb::GetLockResponse = self
            .session
            .unary(ctx, pb::GET_LOCK, pb::GetLockRequest {})
            .await?;
        Ok(LockState {
            locked: response.locked,
            meta: ObjectMeta::from_proto(response.meta),
        })
    }

    pub async fn close(&self, ctx: &Context) -> Result<()> {
        self.session.close(ctx).await
    }
}
