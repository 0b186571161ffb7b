//! Recognized login screens and their handlers.
//!
//! Azure AD's login flow is a sequence of screens whose order is not known in
//! advance. Each submodule handles one screen: it performs the minimal input
//! needed to advance and then waits for the page to move on. The
//! [`ScreenKind`] list is the closed set of screens the loop can recognize,
//! in priority order; the first whose probe selector matches the live page
//! wins the poll pass.

pub mod account_select;
pub mod password;
pub mod passwordless;
pub mod remember_me;
pub mod service_exception;
pub mod tfa_code;
pub mod tfa_failed;
pub mod tfa_notice;
pub mod username;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

use crate::prompt::{PromptError, Prompter};
use crate::session::{BrowserSession, SessionError, WaitUntil};

/// Selector for the error banner Azure renders above its input fields.
const ERROR_BANNER: &str = ".alert-error";

/// Number of backspaces used to defensively clear a pre-filled input.
const CLEAR_PRESSES: usize = 100;

/// Pause applied after clicks and typing, mirroring the page's own debounce.
pub(crate) const SHORT_PAUSE: Duration = Duration::from_millis(500);

/// Mutable parameter bag owned by one login attempt and passed to every
/// handler.
pub struct LoginContext {
    pub session: Arc<dyn BrowserSession>,
    pub prompter: Arc<dyn Prompter>,
    /// Unattended mode: use stored defaults instead of prompting when possible.
    pub no_prompt: bool,
    pub default_username: Option<String>,
    pub default_password: Option<String>,
    pub remember_me: bool,
    /// Bound on every post-action wait for a screen transition.
    pub transition_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum StateError {
    /// A hard-failure screen's message, surfaced verbatim.
    #[error("{0}")]
    UserFacing(String),
    #[error("unable to parse page: {0}")]
    PageParse(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// The closed set of screens the login loop recognizes.
///
/// [`ScreenKind::PRIORITY`] fixes the probe order; earlier entries win when
/// several probes would match the same page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Username,
    AccountSelect,
    Passwordless,
    Password,
    TfaNotice,
    TfaFailed,
    TfaCode,
    RememberMe,
    ServiceException,
}

impl ScreenKind {
    pub const PRIORITY: [ScreenKind; 9] = [
        ScreenKind::Username,
        ScreenKind::AccountSelect,
        ScreenKind::Passwordless,
        ScreenKind::Password,
        ScreenKind::TfaNotice,
        ScreenKind::TfaFailed,
        ScreenKind::TfaCode,
        ScreenKind::RememberMe,
        ScreenKind::ServiceException,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScreenKind::Username => "username input",
            ScreenKind::AccountSelect => "account selection",
            ScreenKind::Passwordless => "passwordless",
            ScreenKind::Password => "password input",
            ScreenKind::TfaNotice => "TFA instructions",
            ScreenKind::TfaFailed => "TFA failed",
            ScreenKind::TfaCode => "TFA code input",
            ScreenKind::RememberMe => "remember me",
            ScreenKind::ServiceException => "service exception",
        }
    }

    /// Selector probed against the live page to recognize this screen.
    pub fn probe_selector(self) -> &'static str {
        match self {
            ScreenKind::Username => r#"input[name="loginfmt"]:not(.moveOffScreen)"#,
            ScreenKind::AccountSelect => "#aadTile > div > div.table-cell.tile-img > img",
            ScreenKind::Passwordless => "input[value='Send notification']",
            ScreenKind::Password => {
                r#"input[name="Password"]:not(.moveOffScreen),input[name="passwd"]:not(.moveOffScreen)"#
            }
            ScreenKind::TfaNotice => "#idDiv_SAOTCAS_Description",
            ScreenKind::TfaFailed => "#idDiv_SAASDS_Description,#idDiv_SAASTO_Description",
            ScreenKind::TfaCode => "input[name=otc]:not(.moveOffScreen)",
            ScreenKind::RememberMe => "#KmsiDescription",
            ScreenKind::ServiceException => "#service_exception_message",
        }
    }

    /// Run this screen's handler.
    pub async fn handle(self, ctx: &mut LoginContext) -> Result<(), StateError> {
        match self {
            ScreenKind::Username => username::handle(ctx).await,
            ScreenKind::AccountSelect => account_select::handle(ctx).await,
            ScreenKind::Passwordless => passwordless::handle(ctx).await,
            ScreenKind::Password => password::handle(ctx).await,
            ScreenKind::TfaNotice => tfa_notice::handle(ctx).await,
            ScreenKind::TfaFailed => tfa_failed::handle(ctx).await,
            ScreenKind::TfaCode => tfa_code::handle(ctx).await,
            ScreenKind::RememberMe => remember_me::handle(ctx).await,
            ScreenKind::ServiceException => service_exception::handle(ctx).await,
        }
    }
}

/// If the screen-local error banner is present, print its text for the
/// operator and return it.
pub(crate) async fn relay_error_banner(
    ctx: &LoginContext,
) -> Result<Option<String>, StateError> {
    if !ctx.session.exists(ERROR_BANNER).await? {
        return Ok(None);
    }
    let message = ctx.session.text(ERROR_BANNER).await?.unwrap_or_default();
    log::debug!("found error banner, relaying");
    println!("{message}");
    Ok(Some(message))
}

/// Defensively clear an input with repeated backspaces.
pub(crate) async fn clear_input(ctx: &LoginContext, selector: &str) -> Result<(), StateError> {
    for _ in 0..CLEAR_PRESSES {
        ctx.session.press_key(selector, "Backspace").await?;
    }
    Ok(())
}

/// Wait for a submitted input to settle: either the field reports an error or
/// moves off screen, or it disappears entirely. Whichever happens first
/// returns control to the loop.
pub(crate) async fn wait_for_submission(
    ctx: &LoginContext,
    input_name: &str,
) -> Result<(), StateError> {
    let settled =
        format!("input[name={input_name}].has-error,input[name={input_name}].moveOffScreen");
    let input = format!("input[name={input_name}]");

    log::debug!("waiting for {input_name} submission to finish");
    tokio::select! {
        result = ctx
            .session
            .wait_for(&settled, WaitUntil::Present, ctx.transition_timeout) => result?,
        result = async {
            sleep(Duration::from_secs(1)).await;
            ctx.session
                .wait_for(&input, WaitUntil::Hidden, ctx.transition_timeout)
                .await
        } => result?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_has_highest_priority() {
        assert_eq!(ScreenKind::PRIORITY[0], ScreenKind::Username);
    }

    #[test]
    fn priority_list_is_exhaustive_and_distinct() {
        for (index, kind) in ScreenKind::PRIORITY.iter().enumerate() {
            assert_eq!(
                ScreenKind::PRIORITY.iter().position(|other| other == kind),
                Some(index)
            );
        }
        assert_eq!(ScreenKind::PRIORITY.len(), 9);
    }

    #[test]
    fn probe_selectors_exclude_offscreen_inputs() {
        assert!(ScreenKind::Username.probe_selector().contains(":not(.moveOffScreen)"));
        assert!(ScreenKind::Password.probe_selector().contains(":not(.moveOffScreen)"));
        assert!(ScreenKind::TfaCode.probe_selector().contains(":not(.moveOffScreen)"));
    }
}
