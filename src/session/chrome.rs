//! Chrome-backed [`BrowserSession`] built on the DevTools protocol.
//!
//! Launch flags follow the same conventions as other CDP automation in the
//! wild: headless by default, sandbox and GPU toggles, an optional persistent
//! profile directory so "remember me" survives restarts, and an outbound
//! proxy picked up from `https_proxy`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FulfillRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, PostDataEntry, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use super::{BrowserSession, InterceptDecision, RequestInspector, SessionError, WaitUntil};

const WINDOW_WIDTH: u32 = 425;
const WINDOW_HEIGHT: u32 = 550;
const AZURE_AD_SSO_HOST: &str = "autologon.microsoftazuread-sso.com";
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Options controlling how the Chrome process is started.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Pass `--no-sandbox` (needed in some container environments).
    pub disable_sandbox: bool,
    /// Opt in to Chrome's out-of-process network service.
    pub enable_network_service: bool,
    /// Allowlist the Azure AD seamless SSO host for integrated auth.
    pub enable_seamless_sso: bool,
    /// Skip the `--disable-extensions` default.
    pub keep_extensions: bool,
    pub disable_gpu: bool,
    /// Persistent profile directory; set when the user wants the identity
    /// provider to remember the session.
    pub user_data_dir: Option<PathBuf>,
    /// Outbound proxy endpoint, normally taken from `https_proxy`.
    pub proxy_server: Option<String>,
    /// In windowed mode, open this URL as an app window instead of a tab.
    pub app_url: Option<String>,
}

impl LaunchOptions {
    /// Read the outbound proxy from the conventional environment variable.
    pub fn with_proxy_from_env(mut self) -> Self {
        self.proxy_server = std::env::var("https_proxy").ok().filter(|v| !v.is_empty());
        self
    }
}

/// A single Chrome tab driven over CDP.
pub struct ChromeSession {
    page: Page,
    browser: Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
    intercept_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ChromeSession {
    /// Launch Chrome and open the initial page.
    pub async fn launch(options: LaunchOptions) -> Result<Self, SessionError> {
        let config = build_config(&options)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| SessionError::Launch(err.to_string()))?;
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        // The browser occasionally needs a beat before the first page attach.
        sleep(Duration::from_millis(200)).await;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| SessionError::Launch(err.to_string()))?;

        let headers = Headers::new(serde_json::json!({ "Accept-Language": "en" }));
        page.execute(SetExtraHttpHeadersParams::new(headers))
            .await
            .map_err(|err| SessionError::Browser(err.to_string()))?;

        Ok(Self {
            page,
            browser: Mutex::new(Some(browser)),
            handler_task,
            intercept_task: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn guard(&self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    async fn evaluate_json(&self, expression: String) -> Result<serde_json::Value, SessionError> {
        self.guard()?;
        self.page
            .evaluate(expression)
            .await
            .map_err(|err| SessionError::Evaluation(err.to_string()))?
            .into_value()
            .map_err(|err| SessionError::Evaluation(err.to_string()))
    }

    /// One poll of the wait condition; selectors go through `querySelector`,
    /// visibility through `offsetParent` (Azure's hidden inputs keep the
    /// `moveOffScreen` element attached but unrendered).
    async fn condition_met(
        &self,
        selector: &str,
        until: WaitUntil,
    ) -> Result<bool, SessionError> {
        let sel = js_string(selector);
        let expression = match until {
            WaitUntil::Present => {
                format!("document.querySelector({sel}) !== null")
            }
            WaitUntil::Visible => format!(
                "(() => {{ const el = document.querySelector({sel}); \
                 return el !== null && el.offsetParent !== null; }})()"
            ),
            WaitUntil::Hidden => format!(
                "(() => {{ const el = document.querySelector({sel}); \
                 return el === null || el.offsetParent === null; }})()"
            ),
        };
        let value = self.evaluate_json(expression).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.guard()?;
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|err| SessionError::Browser(err.to_string()))
    }

    async fn exists(&self, selector: &str) -> Result<bool, SessionError> {
        let sel = js_string(selector);
        let value = self
            .evaluate_json(format!("document.querySelector({sel}) !== null"))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text(&self, selector: &str) -> Result<Option<String>, SessionError> {
        let sel = js_string(selector);
        let value = self
            .evaluate_json(format!(
                "(() => {{ const el = document.querySelector({sel}); \
                 return el === null ? null : el.textContent; }})()"
            ))
            .await?;
        Ok(value.as_str().map(|text| text.to_string()))
    }

    async fn click(&self, selector: &str) -> Result<(), SessionError> {
        self.guard()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| SessionError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map(|_| ())
            .map_err(|err| SessionError::Browser(err.to_string()))
    }

    async fn focus(&self, selector: &str) -> Result<(), SessionError> {
        self.guard()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| SessionError::ElementNotFound(selector.to_string()))?;
        element
            .focus()
            .await
            .map(|_| ())
            .map_err(|err| SessionError::Browser(err.to_string()))
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), SessionError> {
        self.guard()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| SessionError::ElementNotFound(selector.to_string()))?;
        element
            .type_str(text)
            .await
            .map(|_| ())
            .map_err(|err| SessionError::Browser(err.to_string()))
    }

    async fn press_key(&self, selector: &str, key: &str) -> Result<(), SessionError> {
        self.guard()?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| SessionError::ElementNotFound(selector.to_string()))?;
        element
            .press_key(key)
            .await
            .map(|_| ())
            .map_err(|err| SessionError::Browser(err.to_string()))
    }

    async fn wait_for(
        &self,
        selector: &str,
        until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Evaluation failures during a navigation are retried until the
            // deadline, matching the probe tolerance of the outer loop.
            match self.condition_met(selector, until).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(SessionError::Closed) => return Err(SessionError::Closed),
                Err(err) => log::debug!("wait_for probe failed on `{selector}`: {err}"),
            }

            if Instant::now() >= deadline {
                return Err(SessionError::WaitTimeout {
                    selector: selector.to_string(),
                    timeout,
                });
            }
            sleep(PROBE_INTERVAL).await;
        }
    }

    async fn intercept_requests(
        &self,
        inspector: Arc<dyn RequestInspector>,
    ) -> Result<(), SessionError> {
        self.guard()?;

        let mut events = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|err| SessionError::Browser(err.to_string()))?;
        self.page
            .execute(FetchEnableParams::default())
            .await
            .map_err(|err| SessionError::Browser(err.to_string()))?;

        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let body = assemble_post_body(event.request.post_data_entries.as_deref());
                let decision = inspector.inspect(&event.request.url, body.as_deref());
                let request_id = event.request_id.clone();
                let outcome = match decision {
                    InterceptDecision::Continue => page
                        .execute(ContinueRequestParams::new(request_id))
                        .await
                        .map(|_| ()),
                    InterceptDecision::ShortCircuit => {
                        let params = match FulfillRequestParams::builder()
                            .request_id(request_id)
                            .response_code(200)
                            .build()
                        {
                            Ok(params) => params,
                            Err(err) => {
                                log::debug!("could not build fulfill params: {err}");
                                continue;
                            }
                        };
                        page.execute(params).await.map(|_| ())
                    }
                };
                if let Err(err) = outcome {
                    // Expected once the session is being torn down mid-flight.
                    log::debug!("request interception command failed: {err}");
                }
            }
        });
        *self.intercept_task.lock().await = Some(task);

        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), SessionError> {
        self.guard()?;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page
            .save_screenshot(params, path)
            .await
            .map(|_| ())
            .map_err(|err| SessionError::Screenshot(err.to_string()))
    }

    async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(task) = self.intercept_task.lock().await.take() {
            task.abort();
        }

        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(err) = browser.close().await {
                log::debug!("browser close reported: {err}");
            }
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn build_config(options: &LaunchOptions) -> Result<BrowserConfig, SessionError> {
    let mut builder = BrowserConfig::builder()
        .viewport(None)
        .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
        .launch_timeout(Duration::from_secs(20));

    if !options.headless {
        builder = builder.with_head();
        if let Some(ref url) = options.app_url {
            builder = builder.arg(format!("--app={url}"));
        }
    }
    if options.disable_sandbox {
        builder = builder.no_sandbox();
    }
    if options.enable_network_service {
        builder = builder.arg("--enable-features=NetworkService");
    }
    if options.enable_seamless_sso {
        builder = builder
            .arg(format!("--auth-server-whitelist={AZURE_AD_SSO_HOST}"))
            .arg(format!(
                "--auth-negotiate-delegate-whitelist={AZURE_AD_SSO_HOST}"
            ));
    }
    if !options.keep_extensions {
        builder = builder.arg("--disable-extensions");
    }
    if options.disable_gpu {
        builder = builder.arg("--disable-gpu");
    }
    if let Some(ref proxy) = options.proxy_server {
        builder = builder.arg(format!("--proxy-server={proxy}"));
    }
    if let Some(ref dir) = options.user_data_dir {
        std::fs::create_dir_all(dir)
            .map_err(|err| SessionError::Launch(format!("user data dir: {err}")))?;
        builder = builder.user_data_dir(dir);
    }

    builder
        .build()
        .map_err(|err| SessionError::Launch(err.to_string()))
}

/// Quote a CSS selector as a JavaScript string literal.
fn js_string(selector: &str) -> String {
    serde_json::Value::String(selector.to_string()).to_string()
}

/// Reassemble a paused request's POST body.
///
/// The protocol delivers the body broken into base64-encoded entries rather
/// than as one string; the entries concatenate in order.
fn assemble_post_body(entries: Option<&[PostDataEntry]>) -> Option<String> {
    let entries = entries?;
    let mut bytes = Vec::new();
    for entry in entries {
        let Some(data) = entry.bytes.as_ref() else {
            continue;
        };
        let encoded: &str = data.as_ref();
        match BASE64.decode(encoded) {
            Ok(mut decoded) => bytes.append(&mut decoded),
            Err(err) => {
                log::debug!("undecodable post data entry: {err}");
                return None;
            }
        }
    }
    (!bytes.is_empty()).then(|| String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(
            js_string(r#"input[name="loginfmt"]"#),
            r#""input[name=\"loginfmt\"]""#
        );
    }

    #[test]
    fn proxy_only_set_when_env_present() {
        let options = LaunchOptions::default();
        assert!(options.proxy_server.is_none());
    }

    fn entry(body: &str) -> PostDataEntry {
        PostDataEntry::builder().bytes(BASE64.encode(body)).build()
    }

    #[test]
    fn post_body_decodes_a_single_entry() {
        let entries = vec![entry("SAMLResponse=QUJD")];
        assert_eq!(
            assemble_post_body(Some(&entries)).as_deref(),
            Some("SAMLResponse=QUJD")
        );
    }

    #[test]
    fn post_body_concatenates_entries_in_order() {
        let entries = vec![entry("SAMLResponse="), entry("QUJD")];
        assert_eq!(
            assemble_post_body(Some(&entries)).as_deref(),
            Some("SAMLResponse=QUJD")
        );
    }

    #[test]
    fn requests_without_a_body_yield_none() {
        assert_eq!(assemble_post_body(None), None);
        let empty: Vec<PostDataEntry> = Vec::new();
        assert_eq!(assemble_post_body(Some(&empty)), None);
    }
}
