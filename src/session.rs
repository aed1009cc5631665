//! The per-connection render/dispatch loop.
//!
//! ```text
//! Handshaking ─▶ Listening ─▶ Dispatching ─▶ Rendering ─▶ Sending ─┐
//!                    ▲  │ unknown event                            │
//!                    │  └──────────┘                               │
//!                    └─────────────────────────────────────────────┘
//! any fatal error / peer close ─▶ Closed
//! ```
//!
//! One cycle (receive, dispatch, render, send) finishes before the next
//! receive, so handlers never run concurrently against the same data.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::SessionError;
use crate::event::{EventMessage, Handshake};
use crate::fragment;
use crate::page::{Dispatch, Page};
use crate::request::RequestContext;
use crate::template::CompiledTemplate;
use crate::transport::{Frame, Transport, CLOSE_INTERNAL_ERROR, CLOSE_NORMAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Listening,
    Dispatching,
    Rendering,
    Sending,
    Closed,
}

/// A live page bound to one connection.
pub struct Session<S, T> {
    id: Uuid,
    page: Page<S>,
    template: CompiledTemplate,
    request: Arc<RequestContext>,
    transport: T,
    state: SessionState,
}

impl<S, T> Session<S, T>
where
    S: Serialize + Send,
    T: Transport,
{
    pub fn new(
        page: Page<S>,
        template: CompiledTemplate,
        request: Arc<RequestContext>,
        transport: T,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            page,
            template,
            request,
            transport,
            state: SessionState::Handshaking,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn page(&self) -> &Page<S> {
        &self.page
    }

    /// Drive the session until the peer closes or a fatal error occurs.
    ///
    /// A fatal error is passed to the page's error handler exactly once, the
    /// connection is closed with code 1011 and the error is returned. A
    /// session that already ended returns `Ok(())` immediately.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let span = tracing::info_span!(
            "live_session",
            id = %self.id,
            element_id = %self.page.element_id(),
        );
        self.drive().instrument(span).await
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        tracing::debug!("live session opened");
        let result = self.cycle().await;
        self.transition(SessionState::Closed);

        match result {
            Ok(()) => {
                if let Err(e) = self.transport.close(CLOSE_NORMAL, "").await {
                    tracing::debug!(error = %e, "close after peer shutdown failed");
                }
                tracing::debug!("live session closed");
                Ok(())
            }
            Err(err) => {
                self.page.report(&err, &self.request);
                if let Err(e) = self.transport.close(CLOSE_INTERNAL_ERROR, err.code()).await {
                    tracing::debug!(error = %e, "close after fatal error failed");
                }
                Err(err)
            }
        }
    }

    async fn cycle(&mut self) -> Result<(), SessionError> {
        self.handshake().await?;

        loop {
            self.transition(SessionState::Listening);
            let frame = match self.transport.recv().await {
                Some(frame) => frame?,
                None => return Ok(()),
            };
            let msg = EventMessage::decode(frame.as_bytes())?;

            self.transition(SessionState::Dispatching);
            if self.page.dispatch(&msg, &self.request)? == Dispatch::Unknown {
                tracing::debug!(event = %msg.name, "ignoring unregistered event");
                continue;
            }

            self.transition(SessionState::Rendering);
            let fragment = self.render_fragment()?;

            self.transition(SessionState::Sending);
            self.transport.send(Frame::Text(fragment)).await?;
        }
    }

    async fn handshake(&mut self) -> Result<(), SessionError> {
        let handshake = Handshake {
            element_id: self.page.element_id().to_string(),
        };
        let json = serde_json::to_string(&handshake)?;
        self.transport.send(Frame::Text(json)).await?;
        Ok(())
    }

    /// Render the whole template and cut out the live element.
    pub fn render_fragment(&self) -> Result<String, SessionError> {
        let document = self.template.render(self.page.data())?;
        Ok(fragment::extract(&document, self.page.element_id())?)
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}
