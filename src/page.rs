//! Per-connection page state: the live element, its data and its handlers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::binder;
use crate::config::TransportConfig;
use crate::error::{SessionError, SetupError};
use crate::event::EventMessage;
use crate::handler::{BoxedHandler, Handler};
use crate::request::RequestContext;

/// Callback invoked once for every fatal session error.
pub type ErrorHandler = Arc<dyn Fn(&SessionError, &RequestContext) + Send + Sync>;

fn default_error_handler(err: &SessionError, request: &RequestContext) {
    tracing::error!(
        code = err.code(),
        uri = %request.uri,
        remote = ?request.remote_addr,
        "live session failed: {}",
        err
    );
}

/// Outcome of routing one event message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler ran; the page must be re-rendered.
    Handled,
    /// No handler is registered under that name; nothing changed.
    Unknown,
}

/// One live page instance.
///
/// Built fresh by the setup function for every request, owned by exactly one
/// connection and dropped when it closes. `S` is the application data; it is
/// handed mutably to handlers and read by the template on every render.
pub struct Page<S> {
    element_id: String,
    events: HashMap<String, BoxedHandler<S>>,
    data: S,
    error_handler: ErrorHandler,
    transport: TransportConfig,
}

impl<S: 'static> Page<S> {
    pub fn new(element_id: impl Into<String>, data: S) -> Self {
        Self {
            element_id: element_id.into(),
            events: HashMap::new(),
            data,
            error_handler: Arc::new(default_error_handler),
            transport: TransportConfig::default(),
        }
    }

    /// Register `handler` under `name`. A second registration of the same
    /// name replaces the first.
    pub fn on<H, M>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<S, M>,
    {
        let name = name.into();
        if self
            .events
            .insert(name.clone(), BoxedHandler::new(handler))
            .is_some()
        {
            tracing::warn!(event = %name, "replacing previously registered handler");
        }
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SessionError, &RequestContext) + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn transport(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }
}

impl<S> Page<S> {
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn data(&self) -> &S {
        &self.data
    }

    pub fn transport_config(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    /// Checks that can run without rendering.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.element_id.is_empty() {
            return Err(SetupError::EmptyElementId);
        }
        Ok(())
    }

    pub(crate) fn error_handler_fn(&self) -> ErrorHandler {
        Arc::clone(&self.error_handler)
    }

    /// Hand a fatal error to the configured error handler.
    pub fn report(&self, err: &SessionError, request: &RequestContext) {
        (self.error_handler)(err, request);
    }

    /// Bind arguments for `msg` and run its handler against the page data.
    pub fn dispatch(
        &mut self,
        msg: &EventMessage,
        request: &Arc<RequestContext>,
    ) -> Result<Dispatch, SessionError> {
        let Some(handler) = self.events.get(&msg.name) else {
            return Ok(Dispatch::Unknown);
        };
        let args = binder::bind(handler.params(), &msg.event, request, &msg.args);
        handler
            .call(&mut self.data, args)
            .map_err(|message| SessionError::Handler {
                event: msg.name.clone(),
                message,
            })?;
        Ok(Dispatch::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq)]
    struct Counter {
        count: i64,
    }

    fn message(name: &str, args: Vec<serde_json::Value>) -> EventMessage {
        EventMessage {
            name: name.to_string(),
            args,
            event: Event::default(),
        }
    }

    fn request() -> Arc<RequestContext> {
        Arc::new(RequestContext::default())
    }

    #[test]
    fn empty_element_id_is_rejected() {
        let page = Page::new("", Counter::default());
        assert!(matches!(page.validate(), Err(SetupError::EmptyElementId)));
        assert!(Page::new("app", Counter::default()).validate().is_ok());
    }

    #[test]
    fn dispatch_runs_registered_handler() {
        let mut page = Page::new("app", Counter::default())
            .on("add", |c: &mut Counter, by: i64| c.count += by);
        let outcome = page.dispatch(&message("add", vec![json!(3)]), &request()).unwrap();
        assert_eq!(outcome, Dispatch::Handled);
        assert_eq!(page.data().count, 3);
    }

    // Dispatch is usable from code that does not require `S: 'static`.
    fn dispatch_any<S>(page: &mut Page<S>, msg: &EventMessage) -> Dispatch {
        page.dispatch(msg, &request()).unwrap()
    }

    #[test]
    fn dispatch_from_generic_context() {
        let mut page = Page::new("app", Counter::default())
            .on("increment", |c: &mut Counter| c.count += 1);
        assert_eq!(dispatch_any(&mut page, &message("increment", vec![])), Dispatch::Handled);
        assert_eq!(dispatch_any(&mut page, &message("other", vec![])), Dispatch::Unknown);
        assert_eq!(page.data().count, 1);
    }

    #[test]
    fn unknown_event_leaves_data_unchanged() {
        let mut page = Page::new("app", Counter { count: 7 })
            .on("increment", |c: &mut Counter| c.count += 1);
        let outcome = page
            .dispatch(&message("doesNotExist", vec![]), &request())
            .unwrap();
        assert_eq!(outcome, Dispatch::Unknown);
        assert_eq!(page.data(), &Counter { count: 7 });
    }

    #[test]
    fn handler_error_is_a_session_error() {
        let mut page = Page::new("app", Counter::default()).on(
            "fail",
            |_: &mut Counter| -> Result<(), String> { Err("nope".into()) },
        );
        let err = page.dispatch(&message("fail", vec![]), &request()).unwrap_err();
        assert!(matches!(err, SessionError::Handler { ref event, .. } if event == "fail"));
    }

    #[test]
    fn re_registering_replaces_handler() {
        let mut page = Page::new("app", Counter::default())
            .on("go", |c: &mut Counter| c.count += 1)
            .on("go", |c: &mut Counter| c.count += 100);
        page.dispatch(&message("go", vec![]), &request()).unwrap();
        assert_eq!(page.data().count, 100);
        assert_eq!(page.event_names().count(), 1);
    }

    #[test]
    fn custom_error_handler_is_used() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let page = Page::new("app", Counter::default()).error_handler(move |err, _| {
            sink.lock().unwrap().push(err.code());
        });
        page.report(&SessionError::Setup(SetupError::EmptyElementId), &RequestContext::default());
        assert_eq!(*seen.lock().unwrap(), vec!["setup_error"]);
    }
}
