// ABOUTME: Distributed signed 64-bit counter.
// ABOUTME: Every operation returns the value the server holds afterwards.

use atomix_grpc::{Context, Result, Transport};
use atomix_proto::counter as pb;
use tonic::transport::Channel;

use crate::primitive::{impl_primitive, PrimitiveOption, Type};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct Counter<T = Channel> {
    session: Session<T>,
}

impl_primitive!(Counter);

impl<T: Transport> Counter<T> {
    pub async fn open(
        ctx: &Context,
        transport: T,
        name: &str,
        options: &[PrimitiveOption],
    ) -> Result<Self> {
        let session =
            Session::open(ctx, transport, Type::Counter, pb::SESSION, name, options).await?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub async fn get(&self, ctx: &Context) -> Result<i64> {
        let response: pb::GetResponse =
            self.session.unary(ctx, pb::GET, pb::GetRequest {}).await?;
        Ok(response.value)
    }

    pub async fn set(&self, ctx: &Context, value: i64) -> Result<i64> {
        let response: pb::SetResponse =
            self.session.unary(ctx, pb::SET, pb::SetRequest { value }).await?;
        Ok(response.value)
    }

    pub async fn increment(&self, ctx: &Context, delta: i64) -> Result<i64> {
        let response: pb::IncrementResponse = self
            .session
            .unary(ctx, pb::INCREMENT, pb::IncrementRequest { delta })
            .await?;
        Ok(response.value)
    }

    pub async fn decrement(&self, ctx: &Context, delta: i64) -> Result<i64> {
        let response: pb::DecrementResponse = self
            .session
            .unary(ctx, pb::DECREMENT, pb::DecrementRequest { delta })
            .await?;
        Ok(response.value)
    }

    pub async fn close(&self, ctx: &Context) -> Result<()> {
        self.session.close(ctx).await
    }
}
