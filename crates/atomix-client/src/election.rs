// ABOUTME: Leader election among candidates identified by their client id.
// ABOUTME: Term changes are streamed to watchers as they happen.

use atomix_grpc::{Context, Error, Result, Transport};
use atomix_proto::election as pb;
use tokio::sync::mpsc;
use tonic::transport::Channel;

use crate::primitive::{impl_primitive, PrimitiveOption, Type};
use crate::session::Session;
use crate::watch::NoWatchOption;

/// One leadership term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Term {
    pub id: u64,
    pub leader: Option<String>,
    /// Candidates in priority order, leader first.
    pub candidates: Vec<String>,
}

impl Term {
    fn from_proto(term: Option<pb::Term>) -> Self {
        let term = term.unwrap_or_default();
        Self {
            id: term.id,
            leader: (!term.leader.is_empty()).then_some(term.leader),
            candidates: term.candidates,
        }
    }

    pub fn is_leader(&self, candidate: &str) -> bool {
        self.leader.as_deref() == Some(candidate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Changed(Term),
}

impl Event {
    fn from_proto(response: pb::EventsResponse) -> Option<Self> {
        let event = response.event?;
        match pb::event::Type::try_from(event.r#type).ok()? {
            pb::event::Type::Changed => Some(Event::Changed(Term::from_proto(event.term))),
            pb::event::Type::None => None,
        }
    }
}

/// A leader election. This handle's candidate id is the session's client id.
#[derive(Debug, Clone)]
pub struct Election<T = Channel> {
    session: Session<T>,
}

impl_primitive!(Election);

impl<T: Transport> Election<T> {
    pub async fn open(
        ctx: &Context,
        transport: T,
        name: &str,
        options: &[PrimitiveOption],
    ) -> Result<Self> {
        let session =
            Session::open(ctx, transport, Type::Election, pb::SESSION, name, options).await?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// The id this handle runs under.
    pub fn candidate_id(&self) -> &str {
        self.session.client_id()
    }

    async fn candidate_call(
        &self,
        ctx: &Context,
        path: &'static str,
        candidate_id: String,
    ) -> Result<Term> {
        if candidate_id.is_empty() {
            return Err(Error::invalid("candidate id must not be empty"));
        }
        let response: pb::TermResponse = self
            .session
            .unary(ctx, path, pb::CandidateRequest { candidate_id })
            .await?;
        Ok(Term::from_proto(response.term))
    }

    /// Join the election as this handle's candidate.
    pub async fn enter(&self, ctx: &Context) -> Result<Term> {
        self.candidate_call(ctx, pb::ENTER, self.candidate_id().to_string())
            .await
    }

    /// Withdraw this handle's candidate.
    pub async fn leave(&self, ctx: &Context) -> Result<Term> {
        self.candidate_call(ctx, pb::LEAVE, self.candidate_id().to_string())
            .await
    }

    /// Make `id` the leader.
    pub async fn anoint(&self, ctx: &Context, id: &str) -> Result<Term> {
        self.candidate_call(ctx, pb::ANOINT, id.to_string()).await
    }

    /// Move `id` one place up in the candidate order.
    pub async fn promote(&self, ctx: &Context, id: &str) -> Result<Term> {
        self.candidate_call(ctx, pb::PROMOTE, id.to_string()).await
    }

    /// Remove `id` from the election.
    pub async fn evict(&self, ctx: &Context, id: &str) -> Result<Term> {
        self.candidate_call(ctx, pb::EVICT, id.to_string()).await
    }

    pub async fn get_term(&self, ctx: &Context) -> Result<Term> {
        let response: pb::TermResponse = self
            .session
            .unary(ctx, pb::GET_TERM, pb::GetTermRequest {})
            .await?;
        Ok(Term::from_proto(response.term))
    }

    /// Watch term changes. Returns once the stream is live.
    pub async fn watch(&self, ctx: &Context, tx: mpsc::Sender<Event>) -> Result<()> {
        self.session
            .watch(
                ctx,
                pb::EVENTS,
                pb::EventsRequest {},
                Vec::<NoWatchOption>::new(),
                tx,
                Event::from_proto,
            )
            .await
    }

    pub async fn close(&self, ctx: &Context) -> Result<()> {
        self.session.close(ctx).await
    }
}
