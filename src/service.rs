//! HTTP entry point: full page on GET, live session on WebSocket upgrade.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, FromRequestParts, Request},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;

use crate::error::{SessionError, SetupError};
use crate::fragment;
use crate::page::Page;
use crate::request::RequestContext;
use crate::session::Session;
use crate::template::{CompiledTemplate, Template};
use crate::transport::{TransportError, WebSocketTransport};

type SetupFn<S> = dyn Fn() -> Page<S> + Send + Sync;

impl Template {
    /// Bind this template to a page setup function.
    ///
    /// `setup` is called once here to validate the page: the element id must
    /// be set, the template must compile with the page's event names, and the
    /// initial render must contain exactly one element with that id.
    pub fn setup<S, F>(&self, setup: F) -> Result<LiveService<S>, SetupError>
    where
        S: Serialize + Send + 'static,
        F: Fn() -> Page<S> + Send + Sync + 'static,
    {
        let page = setup();
        let compiled = compile(self, &page)?;
        let document = compiled.render(page.data())?;
        match fragment::count_matches(&document, page.element_id()) {
            0 => return Err(SetupError::ElementNotFound(page.element_id().to_string())),
            1 => {}
            count => {
                return Err(SetupError::DuplicateElement {
                    id: page.element_id().to_string(),
                    count,
                })
            }
        }

        Ok(LiveService {
            inner: Arc::new(Inner {
                template: self.clone(),
                setup: Box::new(setup),
            }),
        })
    }
}

fn compile<S>(template: &Template, page: &Page<S>) -> Result<CompiledTemplate, SetupError> {
    page.validate()?;
    Ok(template.compile(page.event_names())?)
}

struct Inner<S> {
    template: Template,
    setup: Box<SetupFn<S>>,
}

/// A validated template plus the setup function that builds one page per
/// connection.
pub struct LiveService<S> {
    inner: Arc<Inner<S>>,
}

impl<S> std::fmt::Debug for LiveService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveService")
            .field("template", &self.inner.template)
            .finish_non_exhaustive()
    }
}

impl<S> Clone for LiveService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> LiveService<S>
where
    S: Serialize + Send + 'static,
{
    /// A router serving this page at `path`.
    pub fn router(&self, path: &str) -> Router {
        let service = self.clone();
        Router::new().route(
            path,
            get(move |req: Request| {
                let service = service.clone();
                async move { service.serve(req).await }
            }),
        )
    }

    /// Handle one request: upgrade to a live session or render the full page.
    pub async fn serve(&self, req: Request) -> Response {
        let (mut parts, _body) = req.into_parts();
        let request = Arc::new(RequestContext::from_parts(&parts));
        let page = (self.inner.setup)();

        let compiled = match compile(&self.inner.template, &page) {
            Ok(compiled) => compiled,
            Err(e) => {
                page.report(&SessionError::Setup(e), &request);
                return internal_error();
            }
        };

        if !is_websocket_upgrade(&parts.headers) {
            tracing::debug!(uri = %request.uri, "rendering full page");
            return match compiled.render(page.data()) {
                Ok(html) => Html(html).into_response(),
                Err(e) => {
                    page.report(&SessionError::Render(e), &request);
                    internal_error()
                }
            };
        }

        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                let err = TransportError::Upgrade(rejection.body_text());
                page.report(&SessionError::Transport(err), &request);
                return rejection.into_response();
            }
        };

        let on_error = page.error_handler_fn();
        let failed_request = Arc::clone(&request);
        page.transport_config()
            .apply(upgrade)
            .on_failed_upgrade(move |e| {
                on_error(
                    &SessionError::Transport(TransportError::WebSocket(e)),
                    &failed_request,
                );
            })
            .on_upgrade(move |socket| async move {
                let mut session =
                    Session::new(page, compiled, request, WebSocketTransport::new(socket));
                // Failures were already passed to the page's error handler.
                let _ = session.run().await;
            })
    }
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
