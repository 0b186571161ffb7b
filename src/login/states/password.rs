//! Password entry screen.

use tokio::time::sleep;

use super::{LoginContext, SHORT_PAUSE, StateError, relay_error_banner};

const PASSWORD_INPUT: &str = r#"input[name="Password"],input[name="passwd"]"#;
const SUBMIT: &str = "span[class=submit],input[type=submit]";

pub(super) async fn handle(ctx: &mut LoginContext) -> Result<(), StateError> {
    if relay_error_banner(ctx).await?.is_some() {
        // Password was rejected; unset the default so the user can re-enter it.
        ctx.default_password = None;
    }

    let password = match (ctx.no_prompt, ctx.default_password.as_deref()) {
        (true, Some(default)) if !default.is_empty() => {
            log::debug!("using default password without prompting");
            default.to_string()
        }
        _ => {
            log::debug!("prompting for password");
            ctx.prompter.password("Password").await?
        }
    };

    ctx.session.focus(PASSWORD_INPUT).await?;
    log::debug!("typing password");
    ctx.session.type_text(PASSWORD_INPUT, &password).await?;

    log::debug!("submitting password form");
    ctx.session.click(SUBMIT).await?;

    // No raced transition wait here: the next screen varies too much, so the
    // outer loop re-probes after a short settle.
    sleep(SHORT_PAUSE).await;
    Ok(())
}
