//! Headless navigation shell.
//!
//! Reads one command per line and answers each with one JSON line
//! describing the dispatch and the view that resulted:
//!
//! ```text
//! open <url>                 follow an external link (adopts fragment sessions)
//! navigate <path>            in-site navigation
//! back | forward             history traversal
//! submit <password> <again>  submit the password-reset form
//! signout                    end the auth session
//! show                       print the current view
//! cache                      list cached keys
//! quit                       stop
//! ```

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use fokus_core::callback::Intent;
use fokus_core::router::Dispatch;
use fokus_core::viewport::View;

use crate::state::AppState;

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    Navigate(String),
    Back,
    Forward,
    Submit { password: String, confirmation: String },
    SignOut,
    Show,
    Cache,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// A usage message for unknown commands or missing arguments.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let mut arg = |usage: &str| {
            words
                .next()
                .map(str::to_owned)
                .ok_or_else(|| format!("usage: {usage}"))
        };

        let command = match verb {
            "open" => Self::Open(arg("open <url>")?),
            "navigate" | "go" => Self::Navigate(arg("navigate <path>")?),
            "back" => Self::Back,
            "forward" => Self::Forward,
            "submit" => Self::Submit {
                password: arg("submit <password> <again>")?,
                confirmation: arg("submit <password> <again>")?,
            },
            "signout" => Self::SignOut,
            "show" => Self::Show,
            "cache" => Self::Cache,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{other}'")),
        };
        Ok(Some(command))
    }
}

/// One line of shell output.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<View>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    /// Describe a dispatch together with the view it left behind.
    pub async fn dispatched(state: &AppState, dispatch: Dispatch) -> Self {
        let mut report = match dispatch {
            Dispatch::Handled {
                route,
                page,
                intent,
            } => Self {
                route: Some(route),
                page: Some(page),
                intent: Some(intent),
                ..Self::default()
            },
            Dispatch::Unmatched { path } => Self {
                route: Some(path),
                ..Self::default()
            },
        };
        report.view = state.router.viewport().snapshot().await;
        report
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Run `command`. `None` means stop.
pub async fn execute(state: &AppState, command: Command) -> Option<Report> {
    let report = match command {
        Command::Open(url) => Report::dispatched(state, state.open(&url).await).await,
        Command::Navigate(path) => {
            Report::dispatched(state, state.router.navigate(&path).await).await
        }
        Command::Back => match state.router.back().await {
            Some(dispatch) => Report::dispatched(state, dispatch).await,
            None => Report::failed("already at the oldest entry"),
        },
        Command::Forward => match state.router.forward().await {
            Some(dispatch) => Report::dispatched(state, dispatch).await,
            None => Report::failed("already at the newest entry"),
        },
        Command::Submit {
            password,
            confirmation,
        } => {
            let result = state.reset_page.submit(&password, &confirmation).await;
            let mut report = Report {
                view: state.router.viewport().snapshot().await,
                ..Report::default()
            };
            report.error = result.err().map(|e| e.to_string());
            report
        }
        Command::SignOut => match state.auth.sign_out().await {
            Ok(()) => {
                // Let the listener react before reporting.
                tokio::task::yield_now().await;
                Report {
                    route: Some(state.router.current_route().await),
                    view: state.router.viewport().snapshot().await,
                    ..Report::default()
                }
            }
            Err(e) => Report::failed(e),
        },
        Command::Show => Report {
            route: Some(state.router.current_route().await),
            view: state.router.viewport().snapshot().await,
            ..Report::default()
        },
        Command::Cache => Report {
            keys: Some(state.cache.keys("").await),
            ..Report::default()
        },
        Command::Quit => return None,
    };
    Some(report)
}

/// Write `report` as one JSON line.
///
/// # Errors
///
/// Serialization or write failures.
pub async fn write_report<W>(writer: &mut W, report: &Report) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(report)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read commands from `reader` until `quit` or end of input.
///
/// # Errors
///
/// I/O failures on either stream.
pub async fn run<R, W>(state: &AppState, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let report = match Command::parse(&line) {
            Ok(None) => continue,
            Ok(Some(command)) => match execute(state, command).await {
                Some(report) => report,
                None => break,
            },
            Err(usage) => Report::failed(usage),
        };
        write_report(&mut writer, &report).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(
            Command::parse("open /#access_token=abc&type=signup"),
            Ok(Some(Command::Open("/#access_token=abc&type=signup".to_owned())))
        );
        assert_eq!(Command::parse("  back "), Ok(Some(Command::Back)));
        assert_eq!(
            Command::parse("submit hunter22 hunter22"),
            Ok(Some(Command::Submit {
                password: "hunter22".to_owned(),
                confirmation: "hunter22".to_owned(),
            }))
        );
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Command::parse("open").unwrap_err().starts_with("usage"));
        assert!(Command::parse("submit only-one").is_err());
        assert_eq!(
            Command::parse("dance"),
            Err("unknown command 'dance'".to_owned())
        );
    }
}
