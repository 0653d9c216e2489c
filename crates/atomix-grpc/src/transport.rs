// ABOUTME: The connection seam: unary and server-streaming calls addressed by method path.
// ABOUTME: Implemented for tonic Channels; test suites plug in an in-memory transport.

use futures::stream::BoxStream;
use prost::Message;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tonic::{Request, Response, Status};

/// Messages of one server-streaming call. `None` from the stream is a clean end.
pub type MessageStream<T> = BoxStream<'static, Result<T, Status>>;

/// A connection able to issue unary and server-streaming calls.
///
/// One transport is shared by every primitive and session multiplexed on it;
/// implementations must be cheap to clone.
#[async_trait::async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    async fn unary<Req, Resp>(
        &self,
        path: &'static str,
        request: Request<Req>,
    ) -> Result<Response<Resp>, Status>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static;

    async fn server_streaming<Req, Resp>(
        &self,
        path: &'static str,
        request: Request<Req>,
    ) -> Result<MessageStream<Resp>, Status>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static;
}

async fn ready(channel: &Channel) -> Result<Grpc<Channel>, Status> {
    let mut grpc = Grpc::new(channel.clone());
    grpc.ready()
        .await
        .map_err(|e| Status::unavailable(format!("service was not ready: {}", e)))?;
    Ok(grpc)
}

#[async_trait::async_trait]
impl Transport for Channel {
    async fn unary<Req, Resp>(
        &self,
        path: &'static str,
        request: Request<Req>,
    ) -> Result<Response<Resp>, Status>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let mut grpc = ready(self).await?;
        grpc.unary(
            request,
            PathAndQuery::from_static(path),
            ProstCodec::default(),
        )
        .await
    }

    async fn server_streaming<Req, Resp>(
        &self,
        path: &'static str,
        request: Request<Req>,
    ) -> Result<MessageStream<Resp>, Status>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let mut grpc = ready(self).await?;
        let response = grpc
            .server_streaming(
                request,
                PathAndQuery::from_static(path),
                ProstCodec::default(),
            )
            .await?;
        Ok(Box::pin(response.into_inner()))
    }
}
