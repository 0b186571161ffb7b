//! Verification code entry screen.

use tokio::time::sleep;

use super::{
    LoginContext, SHORT_PAUSE, StateError, clear_input, relay_error_banner, wait_for_submission,
};

const CODE_INPUT: &str = r#"input[name="otc"]"#;
const DESCRIPTION: &str = "#idDiv_SAOTCC_Description";
const SUBMIT_BUTTON: &str = "input[type=submit]";

pub(super) async fn handle(ctx: &mut LoginContext) -> Result<(), StateError> {
    if relay_error_banner(ctx).await?.is_none() {
        let instructions = ctx.session.text(DESCRIPTION).await?.unwrap_or_default();
        println!("{instructions}");
    }

    let code = ctx.prompter.input("Verification Code", None).await?;

    ctx.session.focus(CODE_INPUT).await?;
    clear_input(ctx, CODE_INPUT).await?;

    log::debug!("typing verification code");
    ctx.session.type_text(CODE_INPUT, &code).await?;

    log::debug!("submitting verification code");
    ctx.session.click(SUBMIT_BUTTON).await?;
    sleep(SHORT_PAUSE).await;

    wait_for_submission(ctx, "otc").await
}
