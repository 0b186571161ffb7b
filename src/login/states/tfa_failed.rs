//! Second-factor hard failure (request denied or timed out).
//!
//! Terminal: the on-page message is surfaced verbatim and the attempt aborts.

use super::{LoginContext, ScreenKind, StateError};

pub(super) async fn handle(ctx: &mut LoginContext) -> Result<(), StateError> {
    let message = ctx
        .session
        .text(ScreenKind::TfaFailed.probe_selector())
        .await?
        .unwrap_or_default();
    Err(StateError::UserFacing(message))
}
