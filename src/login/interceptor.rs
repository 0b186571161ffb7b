//! Interception of the assertion-bearing request.
//!
//! Azure finishes the login by POSTing the SAML response to the AWS sign-in
//! endpoint. We never want that navigation to happen: the interceptor watches
//! every outbound request, captures the body of the one aimed at the
//! configured endpoint, answers it with an empty 200, and wakes the state
//! machine. Capture is write-once; later hits on the endpoint are ignored.

use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::Notify;

use crate::session::{InterceptDecision, RequestInspector};

#[derive(Debug, Error)]
pub enum AssertionError {
    #[error("SAML response not found in intercepted request")]
    Missing,
    #[error("SAML response present more than once in intercepted request")]
    Duplicated,
}

/// Watches for the request destined for the assertion consumer endpoint.
///
/// Only the single endpoint selected for the profile's partition is treated
/// as terminal; an assertion posted to a different partition's endpoint
/// passes through untouched rather than being silently accepted.
pub struct AssertionInterceptor {
    endpoint: String,
    captured: Mutex<Option<String>>,
    notify: Notify,
}

impl AssertionInterceptor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            captured: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// The raw captured request body, if the terminal request has fired.
    pub fn captured(&self) -> Option<String> {
        self.captured.lock().expect("interceptor lock").clone()
    }

    /// Resolve once the terminal request has been captured.
    pub async fn wait_captured(&self) -> String {
        loop {
            let notified = self.notify.notified();
            if let Some(body) = self.captured() {
                return body;
            }
            notified.await;
        }
    }
}

impl RequestInspector for AssertionInterceptor {
    fn inspect(&self, url: &str, post_data: Option<&str>) -> InterceptDecision {
        if url != self.endpoint {
            return InterceptDecision::Continue;
        }

        let mut slot = self.captured.lock().expect("interceptor lock");
        if slot.is_none() {
            log::debug!("captured assertion request for {url}");
            *slot = Some(post_data.unwrap_or_default().to_string());
            self.notify.notify_waiters();
        }

        // Never let the sign-in endpoint actually be reached.
        InterceptDecision::ShortCircuit
    }
}

/// Pull the single `SAMLResponse` value out of the captured form body.
pub fn extract_assertion(body: &str) -> Result<String, AssertionError> {
    let mut values = url::form_urlencoded::parse(body.as_bytes())
        .filter(|(key, _)| key == "SAMLResponse")
        .map(|(_, value)| value.into_owned());

    let assertion = values.next().ok_or(AssertionError::Missing)?;
    if values.next().is_some() {
        return Err(AssertionError::Duplicated);
    }
    Ok(assertion)
}
