//! Fokus site.
//!
//! Wires the core router, cache, and session listener to the concrete pages
//! (landing, password reset, email confirmation, not found) and to the auth
//! backend, and exposes the headless shell the `fokus-site` binary runs.

pub mod config;
#[cfg(feature = "remote-auth")]
pub mod gotrue;
pub mod pages;
pub mod shell;
pub mod state;
