// ABOUTME: In-memory transport and services for exercising facades without a server.
// ABOUTME: Requests and responses go through real prost encoding so wire shapes are checked too.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use atomix_grpc::{MessageStream, Transport};
use atomix_proto::{
    set, CloseSessionRequest, CloseSessionResponse, OpenSessionRequest, OpenSessionResponse,
    SessionPaths,
};
use futures::StreamExt;
use prost::Message;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};

type UnaryHandler = Arc<dyn Fn(MetadataMap, Vec<u8>) -> Result<Vec<u8>, Status> + Send + Sync>;
type StreamHandler =
    Arc<dyn Fn(MetadataMap, Vec<u8>) -> Result<MessageStream<Vec<u8>>, Status> + Send + Sync>;

/// A call observed by the mock.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub path: &'static str,
    pub metadata: MetadataMap,
}

#[derive(Default)]
struct Inner {
    unary: Mutex<HashMap<&'static str, UnaryHandler>>,
    streaming: Mutex<HashMap<&'static str, StreamHandler>>,
    calls: Mutex<Vec<Call>>,
}

#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    inner: Arc<Inner>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<&str> = self.inner.unary.lock().unwrap().keys().copied().collect();
        paths.extend(self.inner.streaming.lock().unwrap().keys().copied());
        paths.sort_unstable();
        f.debug_struct("MockTransport")
            .field("paths", &paths)
            .field("calls", &self.inner.calls.lock().unwrap().len())
            .finish()
    }
}

fn decode<M: Message + Default>(bytes: &[u8]) -> Result<M, Status> {
    M::decode(bytes).map_err(|e| Status::internal(format!("decode failed: {}", e)))
}

/// An unbounded stream the test feeds by hand; dropping the sender ends it cleanly.
pub(crate) fn manual_stream<T: Send + 'static>(
) -> (mpsc::UnboundedSender<Result<T, Status>>, MessageStream<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Box::pin(UnboundedReceiverStream::new(rx)))
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_unary<Req, Resp, F>(&self, path: &'static str, handler: F)
    where
        Req: Message + Default,
        Resp: Message,
        F: Fn(&MetadataMap, Req) -> Result<Resp, Status> + Send + Sync + 'static,
    {
        let handler: UnaryHandler = Arc::new(move |metadata, bytes| {
            let request = decode::<Req>(&bytes)?;
            handler(&metadata, request).map(|response| response.encode_to_vec())
        });
        self.inner.unary.lock().unwrap().insert(path, handler);
    }

    pub fn on_stream<Req, Resp, F>(&self, path: &'static str, handler: F)
    where
        Req: Message + Default,
        Resp: Message + 'static,
        F: Fn(&MetadataMap, Req) -> Result<MessageStream<Resp>, Status> + Send + Sync + 'static,
    {
        let handler: StreamHandler = Arc::new(move |metadata, bytes| {
            let request = decode::<Req>(&bytes)?;
            let stream = handler(&metadata, request)?;
            Ok(Box::pin(stream.map(|item| item.map(|msg| msg.encode_to_vec()))))
        });
        self.inner.streaming.lock().unwrap().insert(path, handler);
    }

    /// Answer OpenSession with increasing ids and CloseSession for open ids only.
    pub fn serve_sessions(&self, paths: SessionPaths) {
        let next_id = Arc::new(AtomicU64::new(1));
        let open = Arc::new(Mutex::new(Vec::<u64>::new()));

        let opened = open.clone();
        self.on_unary(paths.open_session, move |_, _: OpenSessionRequest| {
            let session_id = next_id.fetch_add(1, Ordering::SeqCst);
            opened.lock().unwrap().push(session_id);
            Ok(OpenSessionResponse { session_id })
        });
        self.on_unary(paths.close_session, move |_, req: CloseSessionRequest| {
            let mut open = open.lock().unwrap();
            match open.iter().position(|id| *id == req.session_id) {
                Some(pos) => {
                    open.remove(pos);
                    Ok(CloseSessionResponse {})
                }
                None => Err(Status::not_found(format!(
                    "unknown session {}",
                    req.session_id
                ))),
            }
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn called(&self, path: &str) -> bool {
        self.inner
            .calls
            .lock()
            .unwrap()
            .iter()
            .any(|call| call.path == path)
    }

    /// Yield until `path` has been called.
    pub async fn wait_for_call(&self, path: &str) {
        while !self.called(path) {
            tokio::task::yield_now().await;
        }
    }

    fn record(&self, path: &'static str, metadata: &MetadataMap) {
        self.inner.calls.lock().unwrap().push(Call {
            path,
            metadata: metadata.clone(),
        });
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn unary<Req, Resp>(
        &self,
        path: &'static str,
        request: Request<Req>,
    ) -> Result<Response<Resp>, Status>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let handler = self.inner.unary.lock().unwrap().get(path).cloned();
        let handler = handler.ok_or_else(|| Status::unimplemented(path))?;
        let (metadata, _, message) = request.into_parts();
        self.record(path, &metadata);
        let bytes = handler(metadata, message.encode_to_vec())?;
        Ok(Response::new(decode(&bytes)?))
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
        let handler = self.inner.streaming.lock().unwrap().get(path).cloned();
        let handler = handler.ok_or_else(|| Status::unimplemented(path))?;
        let (metadata, _, message) = request.into_parts();
        self.record(path, &metadata);
        let stream = handler(metadata, message.encode_to_vec())?;
        Ok(Box::pin(
            stream.map(|item| item.and_then(|bytes| decode::<Resp>(&bytes))),
        ))
    }
}

/// Verify wire preconditions against the stored revision (zero when unset).
pub(crate) fn check_preconditions(
    revision: u64,
    preconditions: &[atomix_proto::Precondition],
) -> Result<(), Status> {
    for precondition in preconditions {
        if precondition.not_set && revision != 0 {
            return Err(Status::failed_precondition("already set"));
        }
        if let Some(meta) = &precondition.metadata {
            if meta.revision != revision {
                return Err(Status::failed_precondition(format!(
                    "revision {} does not match {}",
                    meta.revision, revision
                )));
            }
        }
    }
    Ok(())
}

type SetWatcher = mpsc::UnboundedSender<Result<set::EventsResponse, Status>>;

#[derive(Default)]
struct SetState {
    elements: Vec<String>,
    watchers: Vec<SetWatcher>,
}

impl SetState {
    fn notify(&mut self, kind: set::event::Type, value: &str) {
        let event = set::EventsResponse {
            event: Some(set::Event {
                r#type: kind as i32,
                element: Some(set::Element {
                    value: value.to_string(),
                }),
            }),
        };
        self.watchers
            .retain(|watcher| watcher.send(Ok(event.clone())).is_ok());
    }
}

fn element_value(element: Option<set::Element>) -> String {
    element.map(|e| e.value).unwrap_or_default()
}

/// An in-memory set service keeping elements in insertion order.
#[derive(Clone, Default)]
pub(crate) struct SetServer {
    state: Arc<Mutex<SetState>>,
}

impl SetServer {
    /// Register the set and set-manager services on `mock`.
    pub fn install(mock: &MockTransport) -> Self {
        let server = SetServer::default();
        mock.serve_sessions(set::SESSION);

        let state = server.state.clone();
        mock.on_unary(set::ADD, move |_, req: set::AddRequest| {
            let value = element_value(req.element);
            let mut state = state.lock().unwrap();
            if state.elements.contains(&value) {
                return Err(Status::already_exists(value));
            }
            state.elements.push(value.clone());
            state.notify(set::event::Type::Add, &value);
            Ok(set::AddResponse {
                element: Some(set::Element { value }),
            })
        });

        let state = server.state.clone();
        mock.on_unary(set::REMOVE, move |_, req: set::RemoveRequest| {
            let value = element_value(req.element);
            let mut state = state.lock().unwrap();
            let Some(pos) = state.elements.iter().position(|e| *e == value) else {
                return Err(Status::not_found(value));
            };
            state.elements.remove(pos);
            state.notify(set::event::Type::Remove, &value);
            Ok(set::RemoveResponse {
                element: Some(set::Element { value }),
            })
        });

        let state = server.state.clone();
        mock.on_unary(set::CONTAINS, move |_, req: set::ContainsRequest| {
            let value = element_value(req.element);
            let contains = state.lock().unwrap().elements.contains(&value);
            Ok(set::ContainsResponse { contains })
        });

        let state = server.state.clone();
        mock.on_unary(set::SIZE, move |_, _: set::SizeRequest| {
            let size = state.lock().unwrap().elements.len() as u32;
            Ok(set::SizeResponse { size })
        });

        let state = server.state.clone();
        mock.on_unary(set::CLEAR, move |_, _: set::ClearRequest| {
            let mut state = state.lock().unwrap();
            for value in std::mem::take(&mut state.elements) {
                state.notify(set::event::Type::Remove, &value);
            }
            Ok(set::ClearResponse {})
        });

        let state = server.state.clone();
        mock.on_stream(set::ELEMENTS, move |_, _: set::ElementsRequest| {
            let elements: Vec<Result<set::ElementsResponse, Status>> = state
                .lock()
                .unwrap()
                .elements
                .iter()
                .map(|value| {
                    Ok(set::ElementsResponse {
                        element: Some(set::Element {
                            value: value.clone(),
                        }),
                    })
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(elements)) as MessageStream<_>)
        });

        let state = server.state.clone();
        mock.on_stream(set::EVENTS, move |_, req: set::EventsRequest| {
            let (tx, stream) = manual_stream();
            let mut state = state.lock().unwrap();
            if req.replay {
                for value in &state.elements {
                    let _ = tx.send(Ok(set::EventsResponse {
                        event: Some(set::Event {
                            r#type: set::event::Type::Replay as i32,
                            element: Some(set::Element {
                                value: value.clone(),
                            }),
                        }),
                    }));
                }
            }
            state.watchers.push(tx);
            Ok(stream)
        });

        server
    }

    /// Seed elements without notifying watchers.
    pub fn seed(&self, values: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.elements.extend(values.iter().map(|v| v.to_string()));
    }

    /// End every open events stream cleanly.
    pub fn end_streams(&self) {
        self.state.lock().unwrap().watchers.clear();
    }

    /// Fail every open events stream with `status`.
    pub fn fail_streams(&self, status: Status) {
        for watcher in self.state.lock().unwrap().watchers.drain(..) {
            let _ = watcher.send(Err(status.clone()));
        }
    }

    pub fn watcher_count(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.watchers.retain(|w| !w.is_closed());
        state.watchers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use atomix_grpc::{Context, ErrorKind};

    #[test]
    fn test_mock_debug_lists_registered_paths() {
        let mock = MockTransport::new();
        mock.serve_sessions(set::SESSION);
        let debug = format!("{:?}", mock);
        assert!(debug.starts_with("MockTransport"));
        assert!(debug.contains(set::SESSION.open_session));
        assert!(debug.contains("calls: 0"));
    }

    #[tokio::test]
    async fn test_failed_open_can_be_unwrapped() {
        let mock = MockTransport::new();
        let err = Session::open(
            &Context::background(),
            mock.clone(),
            crate::primitive::Type::Set,
            set::SESSION,
            "",
            &[],
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }
}
