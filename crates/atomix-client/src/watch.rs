// ABOUTME: Watch and enumeration calls shared by every primitive facade.
// ABOUTME: Opens the stream, starts the pump, and blocks on the open gate for watches.

use atomix_grpc::{Context, Result, Transport};
use prost::Message;
use tokio::sync::mpsc;

use crate::gate::stream_open_gate;
use crate::pump::Pump;
use crate::session::Session;

/// A watch option: may adjust the outgoing events request and observe each
/// incoming events message.
///
/// Implemented by each primitive's closed `WatchOption` enum. Options are
/// applied in the order the caller passed them.
pub trait WatchHook<Req, Resp>: Send + Sync + 'static {
    fn before_watch(&self, request: &mut Req);

    fn after_watch(&self, _response: &Resp) {}
}

/// Option type for watches that accept no options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NoWatchOption {}

impl<Req, Resp> WatchHook<Req, Resp> for NoWatchOption {
    fn before_watch(&self, _request: &mut Req) {
        match *self {}
    }
}

impl<T: Transport> Session<T> {
    /// Start a watch and return once the stream is confirmed live.
    ///
    /// Returns `Ok` when the first message arrives or the stream ends before
    /// sending any; returns the context's error if it is done first. After
    /// returning, events keep flowing to `tx` until the stream ends, fails,
    /// `ctx` is done, or the receiver is dropped; `tx` is then closed.
    pub(crate) async fn watch<Req, Resp, E, O, F>(
        &self,
        ctx: &Context,
        path: &'static str,
        mut request: Req,
        options: Vec<O>,
        tx: mpsc::Sender<E>,
        map: F,
    ) -> Result<()>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
        E: Send + 'static,
        O: WatchHook<Req, Resp>,
        F: FnMut(Resp) -> Option<E> + Send + 'static,
    {
        for option in &options {
            option.before_watch(&mut request);
        }

        let stream = self.server_streaming(ctx, path, request).await?;

        let (signal, waiter) = stream_open_gate();
        let pump = Pump::new("watch", stream, ctx.clone(), tx, map)
            .with_gate(signal)
            .inspect(move |response| {
                for option in &options {
                    option.after_watch(response);
                }
            });
        self.spawn(async move {
            pump.run().await;
        });

        waiter.wait(ctx).await
    }

    /// Start streaming existing elements to `tx` and return immediately.
    ///
    /// `tx` is closed once the server has sent every element, or earlier if
    /// the stream fails, `ctx` is done, or the receiver is dropped.
    pub(crate) async fn elements<Req, Resp, E, F>(
        &self,
        ctx: &Context,
        path: &'static str,
        request: Req,
        tx: mpsc::Sender<E>,
        map: F,
    ) -> Result<()>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
        E: Send + 'static,
        F: FnMut(Resp) -> Option<E> + Send + 'static,
    {
        let stream = self.server_streaming(ctx, path, request).await?;
        let pump = Pump::new("elements", stream, ctx.clone(), tx, map);
        self.spawn(async move {
            pump.run().await;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Type;
    use crate::testing::{manual_stream, MockTransport};
    use atomix_grpc::ErrorKind;
    use atomix_proto::set;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<String>>>, &'static str);

    impl WatchHook<set::EventsRequest, set::EventsResponse> for Recorder {
        fn before_watch(&self, request: &mut set::EventsRequest) {
            request.replay = true;
            self.0.lock().unwrap().push(format!("before:{}", self.1));
        }

        fn after_watch(&self, response: &set::EventsResponse) {
            let value = response
                .event
                .as_ref()
                .and_then(|e| e.element.as_ref())
                .map(|e| e.value.clone())
                .unwrap_or_default();
            self.0
                .lock()
                .unwrap()
                .push(format!("after:{}:{}", self.1, value));
        }
    }

    fn add_event(value: &str) -> set::EventsResponse {
        set::EventsResponse {
            event: Some(set::Event {
                r#type: set::event::Type::Add as i32,
                element: Some(set::Element {
                    value: value.to_string(),
                }),
            }),
        }
    }

    fn value_of(response: set::EventsResponse) -> Option<String> {
        response.event.and_then(|e| e.element).map(|e| e.value)
    }

    async fn session(mock: &MockTransport) -> Session<MockTransport> {
        mock.serve_sessions(set::SESSION);
        Session::open(
            &Context::background(),
            mock.clone(),
            Type::Set,
            set::SESSION,
            "fruits",
            &[],
        )
        .await
        .unwrap()
    }

    type EventsSender = mpsc::UnboundedSender<Result<set::EventsResponse, tonic::Status>>;

    /// Serve one events stream whose messages the test sends by hand.
    fn manual_events(mock: &MockTransport) -> Arc<Mutex<Option<EventsSender>>> {
        let sender = Arc::new(Mutex::new(None));
        let slot = sender.clone();
        mock.on_stream(set::EVENTS, move |_, _: set::EventsRequest| {
            let (tx, stream) = manual_stream();
            *slot.lock().unwrap() = Some(tx);
            Ok(stream)
        });
        sender
    }

    #[tokio::test]
    async fn test_open_failure_returns_translated_error() {
        let mock = MockTransport::new();
        let session = session(&mock).await;
        mock.on_stream(set::EVENTS, |_, _: set::EventsRequest| {
            Err::<atomix_grpc::MessageStream<set::EventsResponse>, _>(
                tonic::Status::permission_denied("read-only"),
            )
        });

        let (tx, mut rx) = mpsc::channel(4);
        let err = session
            .watch(
                &Context::background(),
                set::EVENTS,
                set::EventsRequest::default(),
                Vec::<NoWatchOption>::new(),
                tx,
                value_of,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        // The sender was dropped without a pump ever starting.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_watch_returns_after_first_message() {
        let mock = MockTransport::new();
        let session = session(&mock).await;
        let sender = manual_events(&mock);

        let ctx = Context::background();
        let (tx, mut rx) = mpsc::channel(4);
        let watch = tokio::spawn({
            let ctx = ctx.clone();
            async move {
                session
                    .watch(
                        &ctx,
                        set::EVENTS,
                        set::EventsRequest::default(),
                        Vec::<NoWatchOption>::new(),
                        tx,
                        value_of,
                    )
                    .await
            }
        });

        mock.wait_for_call(set::EVENTS).await;
        tokio::task::yield_now().await;
        assert!(!watch.is_finished());

        let events = sender.lock().unwrap().take().unwrap();
        events.send(Ok(add_event("a"))).unwrap();
        assert!(watch.await.unwrap().is_ok());
        assert_eq!(rx.recv().await.as_deref(), Some("a"));

        drop(events);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_watch_on_immediately_ended_stream() {
        let mock = MockTransport::new();
        let session = session(&mock).await;
        mock.on_stream(set::EVENTS, |_, _: set::EventsRequest| {
            Ok(Box::pin(futures::stream::empty())
                as atomix_grpc::MessageStream<set::EventsResponse>)
        });

        let (tx, mut rx) = mpsc::channel(4);
        session
            .watch(
                &Context::background(),
                set::EVENTS,
                set::EventsRequest::default(),
                Vec::<NoWatchOption>::new(),
                tx,
                value_of,
            )
            .await
            .unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_cancel_before_first_message() {
        let mock = MockTransport::new();
        let session = session(&mock).await;
        let sender = manual_events(&mock);

        let ctx = Context::background().with_cancel();
        let (tx, mut rx) = mpsc::channel(4);
        let watch = tokio::spawn({
            let ctx = ctx.clone();
            async move {
                session
                    .watch(
                        &ctx,
                        set::EVENTS,
                        set::EventsRequest::default(),
                        Vec::<NoWatchOption>::new(),
                        tx,
                        value_of,
                    )
                    .await
            }
        });

        mock.wait_for_call(set::EVENTS).await;
        ctx.cancel();
        let err = watch.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Canceled);

        if let Some(events) = sender.lock().unwrap().take() {
            let _ = events.send(Ok(add_event("late")));
        }
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_before_first_message() {
        let mock = MockTransport::new();
        let session = session(&mock).await;
        let _sender = manual_events(&mock);

        let ctx = Context::background().with_timeout(std::time::Duration::from_secs(1));
        let (tx, mut rx) = mpsc::channel(4);
        let err = session
            .watch(
                &ctx,
                set::EVENTS,
                set::EventsRequest::default(),
                Vec::<NoWatchOption>::new(),
                tx,
                value_of,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_options_applied_in_order() {
        let mock = MockTransport::new();
        let session = session(&mock).await;
        let replayed = Arc::new(Mutex::new(false));
        let seen_replay = replayed.clone();
        mock.on_stream(set::EVENTS, move |_, req: set::EventsRequest| {
            *seen_replay.lock().unwrap() = req.replay;
            Ok(Box::pin(futures::stream::iter(vec![Ok(add_event("x"))]))
                as atomix_grpc::MessageStream<set::EventsResponse>)
        });

        let log = Arc::new(Mutex::new(Vec::new()));
        let options = vec![Recorder(log.clone(), "first"), Recorder(log.clone(), "second")];
        let (tx, mut rx) = mpsc::channel(4);
        session
            .watch(
                &Context::background(),
                set::EVENTS,
                set::EventsRequest::default(),
                options,
                tx,
                value_of,
            )
            .await
            .unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("x"));
        assert_eq!(rx.recv().await, None);

        assert!(*replayed.lock().unwrap());
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "before:first",
                "before:second",
                "after:first:x",
                "after:second:x",
            ]
        );
    }

    #[tokio::test]
    async fn test_watch_carries_session_metadata() {
        let mock = MockTransport::new();
        let session = session(&mock).await;
        mock.on_stream(set::EVENTS, |_, _: set::EventsRequest| {
            Ok(Box::pin(futures::stream::empty())
                as atomix_grpc::MessageStream<set::EventsResponse>)
        });

        let (tx, _rx) = mpsc::channel(4);
        session
            .watch(
                &Context::background(),
                set::EVENTS,
                set::EventsRequest::default(),
                Vec::<NoWatchOption>::new(),
                tx,
                value_of,
            )
            .await
            .unwrap();

        let call = mock
            .calls()
            .into_iter()
            .find(|call| call.path == set::EVENTS)
            .unwrap();
        assert_eq!(
            call.metadata
                .get(crate::session::SESSION_ID_HEADER)
                .unwrap()
                .to_str()
                .unwrap(),
            session.id().to_string()
        );
    }
}
