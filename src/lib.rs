//! reflex - server-driven live HTML pages.
//!
//! A [`Page`] pairs application data with a set of event handlers and a
//! template. The browser renders the full page once, then keeps a WebSocket
//! open: every DOM event it reports runs a handler on the server, the
//! template is rendered again and only the live element (the page's
//! `element_id`) is sent back.
//!
//! ```no_run
//! use reflex::{Page, Template};
//! use serde::Serialize;
//!
//! #[derive(Serialize, Default)]
//! struct Counter {
//!     #[serde(rename = "Count")]
//!     count: i64,
//! }
//!
//! # async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//! let template = Template::parse(
//!     r#"<html><head>{{ client() }}</head><body>
//!        <div id="app"><button onclick="{{ increment() }}">{{ Count }}</button></div>
//!        </body></html>"#,
//! );
//! let live = template.setup(|| {
//!     Page::new("app", Counter::default())
//!         .on("increment", |c: &mut Counter| c.count += 1)
//! })?;
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, live.router("/")).await?;
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod fragment;
pub mod handler;
pub mod page;
pub mod request;
pub mod service;
pub mod session;
pub mod template;
pub mod transport;

pub use error::{SessionError, SetupError};
pub use event::{Event, EventMessage, Handshake};
pub use page::{Dispatch, ErrorHandler, Page};
pub use request::RequestContext;
pub use service::LiveService;
pub use session::{Session, SessionState};
pub use template::{CompiledTemplate, Template};
pub use transport::{Frame, Transport, TransportError};
