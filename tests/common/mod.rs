#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reflex::transport::{Frame, Transport, TransportError};
use reflex::{CompiledTemplate, Page, RequestContext, Session};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const COUNTER_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>counter</title>{{ client() }}</head>
<body>
  <h1>Counter</h1>
  <div id="app"><span>{{ Count }}</span><button onclick="{{ increment() }}">+</button></div>
</body>
</html>"#;

#[derive(Debug, Default, Serialize)]
pub struct Counter {
    #[serde(rename = "Count")]
    pub count: i64,
}

/// Everything the session wrote to its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Frame(Frame),
    Close(u16, String),
}

/// In-memory transport driven by a [`TestClient`].
pub struct ChannelTransport {
    incoming: mpsc::UnboundedReceiver<Frame>,
    outgoing: mpsc::UnboundedSender<Sent>,
    closed: bool,
    /// Number of sends allowed before every further send fails.
    send_budget: Option<usize>,
}

pub struct TestClient {
    pub tx: Option<mpsc::UnboundedSender<Frame>>,
    pub rx: mpsc::UnboundedReceiver<Sent>,
}

pub fn channel_transport() -> (ChannelTransport, TestClient) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            incoming: in_rx,
            outgoing: out_tx,
            closed: false,
            send_budget: None,
        },
        TestClient {
            tx: Some(in_tx),
            rx: out_rx,
        },
    )
}

impl ChannelTransport {
    pub fn with_send_budget(mut self, budget: usize) -> Self {
        self.send_budget = Some(budget);
        self
    }
}

impl Transport for ChannelTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if let Some(budget) = self.send_budget.as_mut() {
            if *budget == 0 {
                return Err(TransportError::Closed);
            }
            *budget -= 1;
        }
        self.outgoing
            .send(Sent::Frame(frame))
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        if self.closed {
            return None;
        }
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.outgoing.send(Sent::Close(code, reason.to_string()));
        Ok(())
    }
}

impl TestClient {
    pub fn send_json(&self, value: serde_json::Value) {
        self.send(Frame::Text(value.to_string()));
    }

    pub fn send(&self, frame: Frame) {
        self.tx
            .as_ref()
            .expect("client already hung up")
            .send(frame)
            .expect("session dropped its transport");
    }

    /// Simulate the browser going away.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    pub async fn next(&mut self) -> Sent {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timeout waiting for session output")
            .expect("session output channel closed")
    }

    pub async fn next_text(&mut self) -> String {
        match self.next().await {
            Sent::Frame(Frame::Text(text)) => text,
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    pub async fn try_next(&mut self, timeout: Duration) -> Option<Sent> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Collects the code of every error passed to a page's error handler.
#[derive(Clone, Default)]
pub struct ErrorLog(pub Arc<Mutex<Vec<String>>>);

impl ErrorLog {
    pub fn attach<S: 'static>(&self, page: Page<S>) -> Page<S> {
        let log = self.0.clone();
        page.error_handler(move |err, _| log.lock().push(err.code().to_string()))
    }

    pub fn codes(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

pub fn counter_page() -> Page<Counter> {
    counter_page_with_id("app")
}

/// The counter page with every handler `COUNTER_TEMPLATE` calls, bound to `id`.
pub fn counter_page_with_id(id: &str) -> Page<Counter> {
    Page::new(id, Counter::default()).on("increment", |c: &mut Counter| c.count += 1)
}

pub fn session_for<S: Serialize + Send + 'static>(
    source: &str,
    page: Page<S>,
    transport: ChannelTransport,
) -> Session<S, ChannelTransport> {
    let compiled = CompiledTemplate::compile(source, page.event_names()).unwrap();
    Session::new(page, compiled, Arc::new(RequestContext::default()), transport)
}

pub async fn start_server(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}
