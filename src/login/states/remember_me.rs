//! "Stay signed in?" screen.
//!
//! Decided from configuration alone; the user is never prompted.

use tokio::time::sleep;

use super::{LoginContext, SHORT_PAUSE, StateError};

const ACCEPT_BUTTON: &str = "#idSIButton9";
const DECLINE_BUTTON: &str = "#idBtn_Back";

pub(super) async fn handle(ctx: &mut LoginContext) -> Result<(), StateError> {
    if ctx.remember_me {
        log::debug!("accepting remember-me");
        ctx.session.click(ACCEPT_BUTTON).await?;
    } else {
        log::debug!("declining remember-me");
        ctx.session.click(DECLINE_BUTTON).await?;
    }

    sleep(SHORT_PAUSE).await;
    Ok(())
}
