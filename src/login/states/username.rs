//! Username entry screen.

use tokio::time::sleep;

use crate::session::WaitUntil;

use super::{LoginContext, SHORT_PAUSE, StateError, clear_input, relay_error_banner, wait_for_submission};

const USERNAME_INPUT: &str = r#"input[name="loginfmt"]"#;
const SUBMIT_BUTTON: &str = "input[type=submit]";

pub(super) async fn handle(ctx: &mut LoginContext) -> Result<(), StateError> {
    if relay_error_banner(ctx).await?.is_some() {
        // A rejected username means the stored default is wrong; force a
        // fresh prompt on this and later passes.
        ctx.default_username = None;
    }

    let username = match (ctx.no_prompt, ctx.default_username.as_deref()) {
        (true, Some(default)) if !default.is_empty() => {
            log::debug!("using default username without prompting");
            default.to_string()
        }
        (_, default) => {
            log::debug!("prompting for username");
            ctx.prompter.input("Username", default).await?
        }
    };

    log::debug!("waiting for username input to be visible");
    ctx.session
        .wait_for(USERNAME_INPUT, WaitUntil::Visible, ctx.transition_timeout)
        .await?;

    ctx.session.focus(USERNAME_INPUT).await?;
    clear_input(ctx, USERNAME_INPUT).await?;

    log::debug!("typing username");
    ctx.session.type_text(USERNAME_INPUT, &username).await?;
    sleep(SHORT_PAUSE).await;

    ctx.session
        .wait_for(SUBMIT_BUTTON, WaitUntil::Visible, ctx.transition_timeout)
        .await?;
    log::debug!("submitting username form");
    ctx.session.click(SUBMIT_BUTTON).await?;
    sleep(SHORT_PAUSE).await;

    wait_for_submission(ctx, "loginfmt").await
}
