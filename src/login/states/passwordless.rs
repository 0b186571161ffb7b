//! Passwordless sign-in via push notification.
//!
//! No input required: trigger the notification, surface the displayed code so
//! the operator can confirm it on their device, then wait for the identity
//! provider to observe the approval.

use crate::session::WaitUntil;

use super::{LoginContext, StateError};

const SEND_NOTIFICATION: &str = "input[value='Send notification']";
const DISPLAY_SIGN: &str = "#idRemoteNGC_DisplaySign";
const POLLING_DESCRIPTION: &str = "#idDiv_RemoteNGC_PollingDescription";

pub(super) async fn handle(ctx: &mut LoginContext) -> Result<(), StateError> {
    log::debug!("sending notification");
    ctx.session.click(SEND_NOTIFICATION).await?;

    log::debug!("waiting for auth code");
    ctx.session
        .wait_for(DISPLAY_SIGN, WaitUntil::Visible, ctx.transition_timeout)
        .await?;

    let message = ctx
        .session
        .text(POLLING_DESCRIPTION)
        .await?
        .unwrap_or_default();
    println!("{message}");

    let auth_code = ctx.session.text(DISPLAY_SIGN).await?.unwrap_or_default();
    println!("{auth_code}");

    // Completion is driven externally, by the user approving on their device.
    log::debug!("waiting for response");
    ctx.session
        .wait_for(DISPLAY_SIGN, WaitUntil::Hidden, ctx.transition_timeout)
        .await?;
    Ok(())
}
