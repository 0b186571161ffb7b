//! Controlled browser session abstraction.
//!
//! The login flow never talks to Chrome directly; it drives a
//! [`BrowserSession`], which exposes the handful of primitives the state
//! handlers need: navigation, DOM probing, input simulation, bounded waits,
//! request interception, and a diagnostic screenshot. The production
//! implementation lives in [`chrome`]; tests supply scripted fakes.

pub mod chrome;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Condition a [`BrowserSession::wait_for`] call resolves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The selector matches an element attached to the DOM, visible or not.
    Present,
    /// The selector matches an element that is currently rendered.
    Visible,
    /// The selector matches nothing, or only elements that are not rendered.
    Hidden,
}

/// Verdict returned by a [`RequestInspector`] for one outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptDecision {
    /// Let the request reach the network unmodified.
    Continue,
    /// Answer the request with an empty 200 so it never leaves the browser.
    ShortCircuit,
}

/// Inspects every outbound request once interception is enabled.
///
/// Implementations must be cheap and non-blocking; the verdict is produced on
/// the session's event loop.
pub trait RequestInspector: Send + Sync {
    fn inspect(&self, url: &str, post_data: Option<&str>) -> InterceptDecision;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser session is closed")]
    Closed,
    #[error("timed out after {timeout:?} waiting for `{selector}`")]
    WaitTimeout { selector: String, timeout: Duration },
    #[error("no element matches `{0}`")]
    ElementNotFound(String),
    #[error("page evaluation failed: {0}")]
    Evaluation(String),
    #[error("browser error: {0}")]
    Browser(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("screenshot failed: {0}")]
    Screenshot(String),
}

impl SessionError {
    /// Whether this error is the expected result of operating on a session
    /// that the interceptor has already released.
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionError::Closed)
    }
}

/// Automatable web-rendering surface owned by exactly one login attempt.
///
/// Every method must fail fast with [`SessionError::Closed`] once
/// [`BrowserSession::close`] has run, so work abandoned mid-race can never
/// touch a released browser.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// Probe whether any element currently matches `selector`.
    async fn exists(&self, selector: &str) -> Result<bool, SessionError>;

    /// Text content of the first element matching `selector`, if any.
    async fn text(&self, selector: &str) -> Result<Option<String>, SessionError>;

    async fn click(&self, selector: &str) -> Result<(), SessionError>;

    async fn focus(&self, selector: &str) -> Result<(), SessionError>;

    /// Type `text` into the first element matching `selector`.
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), SessionError>;

    /// Send a single named key press to the first element matching `selector`.
    async fn press_key(&self, selector: &str, key: &str) -> Result<(), SessionError>;

    /// Block until `selector` satisfies `until`, or fail with
    /// [`SessionError::WaitTimeout`].
    async fn wait_for(
        &self,
        selector: &str,
        until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// Route every outbound request through `inspector` from now on.
    async fn intercept_requests(
        &self,
        inspector: Arc<dyn RequestInspector>,
    ) -> Result<(), SessionError>;

    async fn screenshot(&self, path: &Path) -> Result<(), SessionError>;

    /// Tear the browser down. Idempotent; concurrent in-flight operations
    /// resolve to [`SessionError::Closed`] instead of panicking.
    async fn close(&self) -> Result<(), SessionError>;

    fn is_closed(&self) -> bool;
}
