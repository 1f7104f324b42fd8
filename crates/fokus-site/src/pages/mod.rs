//! Page handlers registered with the router.
//!
//! Markup is out of scope here: each page mounts a [`View`] describing what
//! it shows (heading, copy, an inline notice, whether its form accepts
//! input) and runs the auth calls its flow needs.
//!
//! [`View`]: fokus_core::viewport::View

pub mod confirm_email;
pub mod landing;
pub mod not_found;
pub mod reset_password;

pub use confirm_email::ConfirmEmailPage;
pub use landing::LandingPage;
pub use not_found::NotFoundPage;
pub use reset_password::ResetPasswordPage;
