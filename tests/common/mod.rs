//! Scripted peer for integration tests.
//!
//! [`ScriptedHost`] hands every exchange the session performs to the test,
//! which completes them in whatever order it likes through [`Peer`].

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use livepage::protocol::{ExchangeRequest, ExchangeResponse, REQUEST_ID_HEADER, RESPONSE_ID_HEADER};
use livepage::{ActionKind, Document, Envelope, Error, HttpHost, Result, Session, SessionBuilder};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Exchange
// ============================================================================

/// One exchange the session is waiting on.
#[derive(Debug)]
pub struct Exchange {
    pub request: ExchangeRequest,
    reply: oneshot::Sender<Result<ExchangeResponse>>,
}

impl Exchange {
    pub fn action(&self) -> ActionKind {
        self.request.action
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request.header(REQUEST_ID_HEADER)
    }

    pub fn response_id(&self) -> Option<&str> {
        self.request.header(RESPONSE_ID_HEADER)
    }

    pub fn args(&self) -> Vec<Value> {
        self.request.positional_args().expect("well-formed body")
    }

    /// Completes the exchange carrying `envelope` back.
    pub fn reply(self, envelope: Envelope) {
        let _ = self.reply.send(Ok(ExchangeResponse::envelope(&envelope)));
    }

    /// Completes the exchange with an empty 200.
    pub fn reply_empty(self) {
        let _ = self.reply.send(Ok(ExchangeResponse::new(200, "")));
    }

    /// Completes the exchange with a raw response.
    pub fn reply_raw(self, status: u16, body: &str) {
        let _ = self.reply.send(Ok(ExchangeResponse::new(status, body)));
    }

    /// Fails the exchange at the network level.
    pub fn fail(self) {
        let _ = self.reply.send(Err(Error::transport_failure("connection reset")));
    }
}

// ============================================================================
// ScriptedHost / Peer
// ============================================================================

pub struct ScriptedHost {
    tx: mpsc::UnboundedSender<Exchange>,
}

#[async_trait]
impl HttpHost for ScriptedHost {
    async fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeResponse> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Exchange { request, reply })
            .map_err(|_| Error::transport_failure("peer gone"))?;
        rx.await
            .map_err(|_| Error::transport_failure("peer dropped exchange"))?
    }
}

/// The test's end of the scripted host.
pub struct Peer {
    rx: mpsc::UnboundedReceiver<Exchange>,
}

impl Peer {
    /// Waits for the next exchange.
    pub async fn next(&mut self) -> Exchange {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("exchange within 2s")
            .expect("host alive")
    }

    /// Waits for the next exchange and checks its action.
    pub async fn expect(&mut self, action: ActionKind) -> Exchange {
        let exchange = self.next().await;
        assert_eq!(exchange.action(), action, "unexpected exchange {:?}", exchange.request);
        exchange
    }

    /// Waits for the next exchange of `action`, returning it along with the
    /// exchanges skipped on the way (still outstanding).
    pub async fn expect_skipping(&mut self, action: ActionKind) -> (Exchange, Vec<Exchange>) {
        let mut skipped = Vec::new();
        loop {
            let exchange = self.next().await;
            if exchange.action() == action {
                return (exchange, skipped);
            }
            skipped.push(exchange);
        }
    }

    /// Asserts that the session issues nothing more once it has settled.
    pub async fn assert_idle(&mut self) {
        settle().await;
        if let Ok(exchange) = self.rx.try_recv() {
            panic!("unexpected exchange {:?}", exchange.request);
        }
    }
}

pub fn scripted() -> (ScriptedHost, Peer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ScriptedHost { tx }, Peer { rx })
}

/// Lets spawned exchange tasks run to their next suspension point.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Routes crate logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn builder(host: ScriptedHost) -> SessionBuilder {
    init_tracing();
    Session::builder()
        .location("http://localhost:8080/live?page=1")
        .session_id("test-session")
        .host(host)
        .startup_delay(Duration::ZERO)
}

/// Builds and starts a session, returning it with its first keepalive.
pub async fn started(builder: SessionBuilder, peer: &mut Peer) -> (Session, Exchange) {
    let session = builder.build().expect("session");
    session.start().await.expect("start");
    let keepalive = peer.expect(ActionKind::Noop).await;
    (session, keepalive)
}

pub fn document_with(nodes: &[(&str, Option<&str>)]) -> Arc<livepage::MemoryDocument> {
    let doc = Arc::new(livepage::MemoryDocument::new());
    for (id, type_name) in nodes {
        let mut attrs = vec![(livepage::dom::ATTR_OBJECT_ID, *id)];
        if let Some(type_name) = type_name {
            attrs.push((livepage::dom::ATTR_TYPE_NAME, *type_name));
        }
        doc.append(doc.root(), "div", &attrs);
    }
    doc
}
