//! The page-state machine driving the interactive login.
//!
//! The screen sequence is owned by the identity provider and can change
//! without notice, so there is no transition table. Instead the loop
//! repeatedly probes the live page against the recognized screens in
//! priority order, runs the first matching handler, and races it against the
//! interceptor's completion signal. A probe that fails mid-navigation counts
//! as a non-match; a page nobody recognizes for too long is a fatal error
//! with a screenshot for diagnosis.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

use crate::login::interceptor::{AssertionError, AssertionInterceptor, extract_assertion};
use crate::login::states::{LoginContext, ScreenKind, StateError};
use crate::session::SessionError;

/// Timing bounds and diagnostics for one login attempt. Every bound is hard;
/// exceeding it ends the attempt.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Sleep between poll passes when no screen matched.
    pub poll_interval: Duration,
    /// Cumulative unrecognized time after which the attempt fails.
    pub unrecognized_ceiling: Duration,
    /// Bound on each handler's post-action transition wait.
    pub transition_timeout: Duration,
    /// Where the diagnostic screenshot lands on an unrecognized-state failure.
    pub screenshot_path: PathBuf,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            unrecognized_ceiling: Duration::from_secs(30),
            transition_timeout: Duration::from_secs(60),
            screenshot_path: PathBuf::from("aws-azure-auth-unrecognized-state.png"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error(
        "Unable to recognize page state! A screenshot has been dumped to {}. If this problem persists, try running with --mode=gui or --mode=debug",
        .screenshot_path.display()
    )]
    UnrecognizedState { screenshot_path: PathBuf },
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Assertion(#[from] AssertionError),
}

/// Poll-and-dispatch loop over the recognized screen set.
pub struct PageStateMachine {
    config: MachineConfig,
}

impl PageStateMachine {
    pub fn new(config: MachineConfig) -> Self {
        Self { config }
    }

    /// Drive the login to completion.
    ///
    /// Returns the extracted assertion once the interceptor captures the
    /// terminal request, or the first fatal error. Never exits silently.
    pub async fn run(
        &self,
        ctx: &mut LoginContext,
        interceptor: &AssertionInterceptor,
    ) -> Result<String, MachineError> {
        let mut unrecognized = Duration::ZERO;

        loop {
            if let Some(body) = interceptor.captured() {
                return Ok(extract_assertion(&body)?);
            }

            match self.probe_pass(ctx).await {
                Some(kind) => {
                    log::debug!("found state: {}", kind.name());

                    tokio::select! {
                        body = interceptor.wait_captured() => {
                            // The terminal request fired mid-handler; the
                            // unfinished handler work is abandoned.
                            log::debug!("assertion captured during state: {}", kind.name());
                            return Ok(extract_assertion(&body)?);
                        }
                        result = kind.handle(ctx) => {
                            result?;
                            log::debug!("finished state: {}", kind.name());
                        }
                    }

                    unrecognized = Duration::ZERO;
                }
                None => {
                    log::debug!("page state not recognized");
                    if unrecognized > self.config.unrecognized_ceiling {
                        return Err(self.fail_unrecognized(ctx).await);
                    }
                    unrecognized += self.config.poll_interval;
                    sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    /// One probe pass over the priority list. A probe error (typically an
    /// in-flight navigation) is treated as a non-match for that screen and
    /// evaluation continues.
    async fn probe_pass(&self, ctx: &LoginContext) -> Option<ScreenKind> {
        for kind in ScreenKind::PRIORITY {
            match ctx.session.exists(kind.probe_selector()).await {
                Ok(true) => return Some(kind),
                Ok(false) => {}
                Err(err) => {
                    log::debug!(
                        "probe for state \"{}\" failed ({err}), retrying next pass",
                        kind.name()
                    );
                }
            }
        }
        None
    }

    async fn fail_unrecognized(&self, ctx: &LoginContext) -> MachineError {
        let screenshot_path = self.config.screenshot_path.clone();
        if let Err(err) = ctx.session.screenshot(&screenshot_path).await {
            log::warn!("failed to capture diagnostic screenshot: {err}");
        }
        MachineError::UnrecognizedState { screenshot_path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_match_the_documented_timeouts() {
        let config = MachineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.unrecognized_ceiling, Duration::from_secs(30));
        assert_eq!(config.transition_timeout, Duration::from_secs(60));
        assert_eq!(
            config.screenshot_path,
            PathBuf::from("aws-azure-auth-unrecognized-state.png")
        );
    }
}
