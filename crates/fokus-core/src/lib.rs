//! Core library for the Fokus site.
//!
//! Contains the client-side router, the auth-callback interpreter that
//! classifies redirects from the auth backend, the session listener that
//! reacts to auth state changes, and the JSON cache over a
//! `fokus-storage` backend. Page handlers live in `fokus-site`; this crate
//! only knows them through the [`page::Page`] trait.

pub mod auth;
pub mod cache;
pub mod callback;
pub mod error;
pub mod error_log;
pub mod history;
pub mod listener;
pub mod location;
pub mod page;
pub mod router;
pub mod session;
pub mod viewport;
