//! Two-factor instructional screen.
//!
//! Purely informational: if the description says a number must be entered in
//! the authenticator app, read and print that number, then wait for the
//! screen to clear once the second factor completes.

use crate::session::WaitUntil;

use super::{LoginContext, StateError};

const DESCRIPTION: &str = "#idDiv_SAOTCAS_Description";
const DISPLAY_SIGN: &str = "#idRichContext_DisplaySign";

/// Whether the description indicates a number-matching prompt.
fn mentions_displayed_number(description: &str) -> bool {
    description.contains("enter the number shown to sign in")
}

pub(super) async fn handle(ctx: &mut LoginContext) -> Result<(), StateError> {
    let description = ctx.session.text(DESCRIPTION).await?.unwrap_or_default();

    if mentions_displayed_number(&description) {
        log::debug!("reading the displayed authentication code");
        let code = ctx.session.text(DISPLAY_SIGN).await?.unwrap_or_default();
        println!("{code}");
    }

    log::debug!("waiting for second factor to complete");
    ctx.session
        .wait_for(DESCRIPTION, WaitUntil::Hidden, ctx.transition_timeout)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_number_matching_prompt() {
        assert!(mentions_displayed_number(
            "Open your Authenticator app, and enter the number shown to sign in."
        ));
    }

    #[test]
    fn ignores_plain_approval_prompt() {
        assert!(!mentions_displayed_number(
            "We've sent a notification to your mobile device."
        ));
    }
}
