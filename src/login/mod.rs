//! Federated login orchestration.
//!
//! Wires together the login URL builder, the Chrome session, the assertion
//! interceptor, and the page-state machine to turn a configured profile into
//! a raw SAML assertion. One attempt owns the browser exclusively; the
//! session is released on every exit path.

pub mod interceptor;
pub mod machine;
pub mod states;
pub mod url;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ProfileConfig, chromium_profile_dir};
use crate::login::interceptor::{AssertionError, AssertionInterceptor, extract_assertion};
use crate::login::machine::{MachineConfig, MachineError, PageStateMachine};
use crate::login::states::LoginContext;
use crate::login::url::LoginUrlError;
use crate::prompt::Prompter;
use crate::session::chrome::{ChromeSession, LaunchOptions};
use crate::session::{BrowserSession, SessionError};

/// Global AWS sign-in endpoint.
pub const AWS_SAML_ENDPOINT: &str = "https://signin.aws.amazon.com/saml";
/// China partition sign-in endpoint.
pub const AWS_CN_SAML_ENDPOINT: &str = "https://signin.amazonaws.cn/saml";
/// GovCloud sign-in endpoint.
pub const AWS_GOV_SAML_ENDPOINT: &str = "https://signin.amazonaws-us-gov.com/saml";

/// How the browser window and the operator interact during the login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    /// Headless browser, all interaction proxied through the CLI.
    Cli,
    /// Visible browser window, user completes the login there.
    Gui,
    /// Visible browser window, interaction still proxied through the CLI.
    Debug,
}

impl LoginMode {
    pub fn headless(self) -> bool {
        matches!(self, LoginMode::Cli)
    }

    /// Whether the page-state machine drives the login instead of the user.
    pub fn cli_proxy(self) -> bool {
        matches!(self, LoginMode::Cli | LoginMode::Debug)
    }
}

/// Behavior switches for one login attempt, independent of the profile.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    pub mode: LoginMode,
    pub disable_sandbox: bool,
    /// Unattended mode: never prompt when a default answer exists.
    pub no_prompt: bool,
    pub enable_network_service: bool,
    pub enable_seamless_sso: bool,
    pub keep_extensions: bool,
    pub disable_gpu: bool,
    pub machine: MachineConfig,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            mode: LoginMode::Cli,
            disable_sandbox: false,
            no_prompt: false,
            enable_network_service: false,
            enable_seamless_sso: false,
            keep_extensions: false,
            disable_gpu: false,
            machine: MachineConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Url(#[from] LoginUrlError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error(transparent)]
    Assertion(#[from] AssertionError),
}

/// Select the one sign-in endpoint that is authoritative for the profile's
/// region partition. The interceptor only ever matches against this endpoint,
/// so an assertion aimed at a different partition is never silently accepted.
pub fn assertion_consumer_endpoint(region: Option<&str>) -> &'static str {
    match region {
        Some(region) if region.starts_with("us-gov") => AWS_GOV_SAML_ENDPOINT,
        Some(region) if region.starts_with("cn-") => AWS_CN_SAML_ENDPOINT,
        _ => AWS_SAML_ENDPOINT,
    }
}

/// Run the federated login for `profile` and return the raw SAML assertion.
pub async fn perform_login(
    profile: &ProfileConfig,
    options: &LoginOptions,
    prompter: Arc<dyn Prompter>,
) -> Result<String, LoginError> {
    let endpoint = assertion_consumer_endpoint(profile.region.as_deref());
    println!("Using AWS SAML endpoint {endpoint}");

    let login_url = url::build_login_url(&profile.app_id_uri, &profile.tenant_id, endpoint)?;

    let mut launch = LaunchOptions {
        headless: options.mode.headless(),
        disable_sandbox: options.disable_sandbox,
        enable_network_service: options.enable_network_service,
        enable_seamless_sso: options.enable_seamless_sso,
        keep_extensions: options.keep_extensions,
        disable_gpu: options.disable_gpu,
        ..LaunchOptions::default()
    }
    .with_proxy_from_env();
    if profile.remember_me {
        launch.user_data_dir = Some(chromium_profile_dir());
    }
    if !options.mode.headless() {
        launch.app_url = Some(login_url.clone());
    }

    log::debug!("loading login page in Chrome");
    let session: Arc<dyn BrowserSession> = Arc::new(ChromeSession::launch(launch).await?);
    let interceptor = Arc::new(AssertionInterceptor::new(endpoint));
    session.intercept_requests(interceptor.clone()).await?;

    let result = drive_login(&session, &interceptor, &login_url, profile, options, prompter).await;

    // Release the browser on every exit path; close failures after the
    // assertion has been captured are expected and ignored.
    if let Err(err) = session.close().await {
        log::debug!("session close reported: {err}");
    }

    result
}

async fn drive_login(
    session: &Arc<dyn BrowserSession>,
    interceptor: &Arc<AssertionInterceptor>,
    login_url: &str,
    profile: &ProfileConfig,
    options: &LoginOptions,
    prompter: Arc<dyn Prompter>,
) -> Result<String, LoginError> {
    if let Err(err) = session.navigate(login_url).await {
        // A still-valid session redirects straight to the intercepted AWS
        // endpoint, which aborts the navigation. That is fine.
        log::debug!("initial navigation reported: {err}");
    }

    if options.mode.cli_proxy() {
        let mut ctx = LoginContext {
            session: session.clone(),
            prompter,
            no_prompt: options.no_prompt,
            default_username: profile.default_username.clone(),
            default_password: profile.default_password.clone(),
            remember_me: profile.remember_me,
            transition_timeout: options.machine.transition_timeout,
        };
        let machine = PageStateMachine::new(options.machine.clone());
        Ok(machine.run(&mut ctx, interceptor).await?)
    } else {
        println!("Please complete the login in the opened window");
        let body = interceptor.wait_captured().await;
        Ok(extract_assertion(&body)?)
    }
}
