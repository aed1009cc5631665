//! The browser-side bootstrap, embedded at build time.
//!
//! The script opens a WebSocket on the page URL, waits for the handshake,
//! forwards `reflex.event(...)` calls and swaps fragment updates into the
//! live element. Unclean disconnects are retried every 5 seconds.

/// Raw JavaScript source of the client.
pub const SCRIPT: &str = include_str!("../client/reflex.js");

/// `<script>` markup inlined wherever a template calls `client()`.
pub fn inject() -> String {
    format!("<script type=\"text/javascript\">\n{}</script>", SCRIPT)
}
