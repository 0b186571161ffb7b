//! Generic identity-provider service exception screen. Terminal.

use super::{LoginContext, ScreenKind, StateError};

pub(super) async fn handle(ctx: &mut LoginContext) -> Result<(), StateError> {
    let message = ctx
        .session
        .text(ScreenKind::ServiceException.probe_selector())
        .await?
        .unwrap_or_default();
    Err(StateError::UserFacing(message))
}
