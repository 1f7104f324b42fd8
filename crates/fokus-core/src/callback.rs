//! Auth-callback interpreter.
//!
//! The auth backend redirects back to the site with its verdict encoded in
//! the URL fragment (`#access_token=…&type=signup`, `#error_description=…`).
//! This module classifies a location into an [`Intent`] and picks the route
//! whose page should handle it.
//!
//! Fragment signals always beat path signals: the backend reports through
//! the fragment no matter which path the redirect lands on.

use serde::Serialize;

use crate::location::{FragmentParams, Location};

/// Default path of the password-reset page.
pub const RESET_PASSWORD_PATH: &str = "/reset-password";
/// Default path of the email-confirmation page.
pub const CONFIRM_EMAIL_PATH: &str = "/confirm-email";

/// Message used when a confirmation redirect carries no token.
pub const MISSING_TOKEN_MESSAGE: &str = "no access token found.";

/// `type` values that mean "an email address was just confirmed".
const CONFIRMATION_TYPES: [&str; 3] = ["signup", "email", "email_change"];

/// What an incoming navigation asks the site to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "kebab-case")]
pub enum Intent {
    /// The backend reported a failure, or the redirect was malformed.
    Error { message: String },
    /// The user followed a password-recovery link.
    PasswordRecovery,
    /// The user followed an email-confirmation link.
    ///
    /// `access_token` is always present when the intent came from the
    /// fragment; it is `None` only when the confirmation page was opened
    /// directly by path.
    EmailConfirmation { access_token: Option<String> },
    /// No auth signal; route by pathname.
    NormalRoute,
}

impl Intent {
    /// Short label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::PasswordRecovery => "password-recovery",
            Self::EmailConfirmation { .. } => "email-confirmation",
            Self::NormalRoute => "normal-route",
        }
    }
}

/// A classified location: the intent plus the route key to dispatch to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub intent: Intent,
    pub route: String,
}

/// Configured paths of the two callback pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPaths {
    pub reset_password: String,
    pub confirm_email: String,
}

impl Default for CallbackPaths {
    fn default() -> Self {
        Self {
            reset_password: RESET_PASSWORD_PATH.to_owned(),
            confirm_email: CONFIRM_EMAIL_PATH.to_owned(),
        }
    }
}

/// Classifies locations into auth-callback intents.
#[derive(Debug, Clone, Default)]
pub struct AuthCallbackInterpreter {
    paths: CallbackPaths,
}

impl AuthCallbackInterpreter {
    #[must_use]
    pub fn new(paths: CallbackPaths) -> Self {
        Self { paths }
    }

    #[must_use]
    pub fn paths(&self) -> &CallbackPaths {
        &self.paths
    }

    /// Whether the fragment carries anything this interpreter acts on.
    ///
    /// The router skips classification for fragments without these markers,
    /// so plain in-page anchors (`#pricing`) route by path.
    #[must_use]
    pub fn has_auth_markers(params: &FragmentParams) -> bool {
        params.get("access_token").is_some()
            || params.get("error_description").is_some()
            || params.get("error").is_some()
            || params
                .get("type")
                .is_some_and(|t| t == "recovery" || CONFIRMATION_TYPES.contains(&t))
    }

    /// Classify fragment parameters and a pathname. First match wins.
    #[must_use]
    pub fn classify(&self, params: &FragmentParams, pathname: &str) -> Intent {
        if let Some(message) = params
            .get("error_description")
            .or_else(|| params.get("error"))
        {
            return Intent::Error {
                message: message.to_owned(),
            };
        }

        match params.get("type") {
            Some("recovery") => return Intent::PasswordRecovery,
            Some(kind) if CONFIRMATION_TYPES.contains(&kind) => {
                return match params.get("access_token") {
                    Some(token) => Intent::EmailConfirmation {
                        access_token: Some(token.to_owned()),
                    },
                    None => Intent::Error {
                        message: MISSING_TOKEN_MESSAGE.to_owned(),
                    },
                };
            }
            _ => {}
        }

        if pathname == self.paths.reset_password {
            Intent::PasswordRecovery
        } else if pathname == self.paths.confirm_email {
            Intent::EmailConfirmation { access_token: None }
        } else {
            Intent::NormalRoute
        }
    }

    /// Classify a location and choose the route that handles it.
    ///
    /// Errors land on the page of the flow they belong to: the reset page
    /// for recovery links (by `type` or by path), the confirmation page for
    /// everything else.
    #[must_use]
    pub fn resolve(&self, location: &Location) -> Resolution {
        let params = location.params();
        let intent = if Self::has_auth_markers(&params) {
            self.classify(&params, &location.pathname)
        } else {
            self.classify(&FragmentParams::default(), &location.pathname)
        };

        let route = match &intent {
            Intent::PasswordRecovery => self.paths.reset_password.clone(),
            Intent::EmailConfirmation { .. } => self.paths.confirm_email.clone(),
            Intent::Error { .. } => {
                if params.get("type") == Some("recovery")
                    || location.pathname == self.paths.reset_password
                {
                    self.paths.reset_password.clone()
                } else {
                    self.paths.confirm_email.clone()
                }
            }
            Intent::NormalRoute => location.pathname.clone(),
        };

        Resolution { intent, route }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(url: &str) -> Resolution {
        AuthCallbackInterpreter::default().resolve(&Location::parse(url))
    }

    #[test]
    fn recovery_fragment_beats_any_path() {
        for path in ["/", "/confirm-email", "/pricing", "/reset-password"] {
            let res = resolve(&format!("{path}#access_token=t&type=recovery"));
            assert_eq!(res.intent, Intent::PasswordRecovery, "path {path}");
            assert_eq!(res.route, RESET_PASSWORD_PATH);
        }
    }

    #[test]
    fn signup_fragment_on_root_confirms_email() {
        let res = resolve("/#access_token=abc&type=signup");
        assert_eq!(
            res.intent,
            Intent::EmailConfirmation {
                access_token: Some("abc".to_owned())
            }
        );
        assert_eq!(res.route, CONFIRM_EMAIL_PATH);
    }

    #[test]
    fn email_change_is_a_confirmation() {
        let res = resolve("/#access_token=abc&type=email_change");
        assert!(matches!(res.intent, Intent::EmailConfirmation { .. }));
    }

    #[test]
    fn signup_without_token_is_an_error() {
        let res = resolve("/#type=signup");
        match res.intent {
            Intent::Error { message } => assert!(!message.is_empty()),
            other => panic!("expected error intent, got {other:?}"),
        }
        assert_eq!(res.route, CONFIRM_EMAIL_PATH);
    }

    #[test]
    fn error_description_wins_over_type() {
        let res = resolve("/#error=access_denied&error_description=Link+expired&type=recovery");
        assert_eq!(
            res.intent,
            Intent::Error {
                message: "Link expired".to_owned()
            }
        );
        assert_eq!(res.route, RESET_PASSWORD_PATH);
    }

    #[test]
    fn bare_error_code_is_an_error() {
        let res = resolve("/confirm-email#error=server_error");
        assert_eq!(
            res.intent,
            Intent::Error {
                message: "server_error".to_owned()
            }
        );
    }

    #[test]
    fn path_fallbacks_without_fragment() {
        assert_eq!(resolve("/reset-password").intent, Intent::PasswordRecovery);
        assert_eq!(
            resolve("/confirm-email").intent,
            Intent::EmailConfirmation { access_token: None }
        );
    }

    #[test]
    fn plain_anchor_routes_by_path() {
        let res = resolve("/#pricing");
        assert_eq!(res.intent, Intent::NormalRoute);
        assert_eq!(res.route, "/");
    }

    #[test]
    fn custom_paths_are_honoured() {
        let interp = AuthCallbackInterpreter::new(CallbackPaths {
            reset_password: "/account/reset".to_owned(),
            confirm_email: "/account/confirm".to_owned(),
        });
        let res = interp.resolve(&Location::parse("/account/reset"));
        assert_eq!(res.intent, Intent::PasswordRecovery);
        assert_eq!(res.route, "/account/reset");
        assert_eq!(
            interp.resolve(&Location::parse("/reset-password")).intent,
            Intent::NormalRoute
        );
    }
}
