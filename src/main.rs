//! Command-line entry point.

use std::sync::Arc;

use clap::{Parser, ValueEnum};

use aws_azure_auth::config::{AwsFileStore, ProfileSettings};
use aws_azure_auth::login::{LoginMode, LoginOptions, perform_login};
use aws_azure_auth::prompt::{Prompter, StdPrompter};
use aws_azure_auth::roles::select_role_and_duration;
use aws_azure_auth::saml::parse_roles;
use aws_azure_auth::sts::{StsOptions, assume_role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Headless browser, interaction proxied through this terminal.
    Cli,
    /// Visible browser window, complete the login there.
    Gui,
    /// Visible browser window, interaction still proxied through the terminal.
    Debug,
}

impl From<Mode> for LoginMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Cli => LoginMode::Cli,
            Mode::Gui => LoginMode::Gui,
            Mode::Debug => LoginMode::Debug,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "aws-azure-auth", version, about)]
struct Args {
    /// Profile to log in with; falls back to $AWS_PROFILE, then "default".
    #[arg(short, long)]
    profile: Option<String>,

    /// Log in with every configured profile, sequentially.
    #[arg(short, long, conflicts_with = "profile")]
    all_profiles: bool,

    /// Refresh even when the stored credentials are still valid.
    #[arg(short, long)]
    force_refresh: bool,

    /// How the browser and the operator interact during the login.
    #[arg(short, long, value_enum, default_value_t = Mode::Cli)]
    mode: Mode,

    /// Interactively (re)configure the profile, then exit.
    #[arg(long)]
    configure: bool,

    /// Launch Chrome without its sandbox.
    #[arg(long)]
    no_sandbox: bool,

    /// Never prompt; fail instead when no default answer exists.
    #[arg(long)]
    no_prompt: bool,

    /// Enable Chrome's NetworkService (needed behind some auth proxies).
    #[arg(long)]
    enable_chrome_network_service: bool,

    /// Skip TLS verification on the STS call.
    #[arg(long)]
    no_verify_ssl: bool,

    /// Enable Azure AD seamless single sign-on in Chrome.
    #[arg(long)]
    enable_chrome_seamless_sso: bool,

    /// Keep Chrome extensions enabled.
    #[arg(long)]
    no_disable_extensions: bool,

    /// Disable GPU acceleration in Chrome.
    #[arg(long)]
    disable_gpu: bool,
}

impl Args {
    fn profile_name(&self) -> String {
        self.profile
            .clone()
            .or_else(|| std::env::var("AWS_PROFILE").ok())
            .unwrap_or_else(|| "default".to_string())
    }

    fn login_options(&self) -> LoginOptions {
        LoginOptions {
            mode: self.mode.into(),
            disable_sandbox: self.no_sandbox,
            no_prompt: self.no_prompt,
            enable_network_service: self.enable_chrome_network_service,
            enable_seamless_sso: self.enable_chrome_seamless_sso,
            keep_extensions: self.no_disable_extensions,
            disable_gpu: self.disable_gpu,
            ..LoginOptions::default()
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(&args).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let store = AwsFileStore::from_env()?;
    let prompter: Arc<dyn Prompter> = Arc::new(StdPrompter::new());

    if args.configure {
        return configure(&store, &args.profile_name(), &prompter).await;
    }

    if args.all_profiles {
        let names = store.profile_names()?;
        if names.is_empty() {
            eprintln!("No configured profiles found. Run with --configure first.");
            return Ok(());
        }
        // One failing profile must not abort the rest of the batch.
        let mut failures = 0usize;
        for name in &names {
            if let Err(err) = login_profile(args, &store, name, &prompter).await {
                eprintln!("Profile '{name}' failed: {err}");
                failures += 1;
            }
        }
        if failures > 0 {
            return Err(format!("{failures} of {} profiles failed", names.len()).into());
        }
        return Ok(());
    }

    login_profile(args, &store, &args.profile_name(), &prompter).await
}

/// Full login for one profile: browser flow, role selection, STS exchange,
/// credential write.
async fn login_profile(
    args: &Args,
    store: &AwsFileStore,
    name: &str,
    prompter: &Arc<dyn Prompter>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !args.force_refresh && !store.is_about_to_expire(name)? {
        println!("Profile '{name}' credentials are still valid, skipping login");
        return Ok(());
    }

    println!("Logging in with profile '{name}'...");
    let profile = store.load_profile(name)?;

    let assertion = perform_login(&profile, &args.login_options(), prompter.clone()).await?;
    let roles = parse_roles(&assertion)?;
    let selection = select_role_and_duration(roles, &profile, args.no_prompt, prompter).await?;

    let sts_options = StsOptions {
        region: profile.region.clone(),
        accept_invalid_certs: args.no_verify_ssl,
    };
    let credentials = assume_role(
        &assertion,
        &selection.role,
        selection.duration_hours,
        &sts_options,
    )
    .await?;

    store.write_credentials(name, &credentials)?;
    println!(
        "Done! Credentials for '{name}' expire at {}.",
        credentials
            .expiration
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    Ok(())
}

/// Interactive profile setup.
async fn configure(
    store: &AwsFileStore,
    name: &str,
    prompter: &Arc<dyn Prompter>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Configuring profile '{name}'");
    let existing = store.load_profile(name).ok();

    let tenant_id = prompter
        .input(
            "Azure Tenant ID",
            existing.as_ref().map(|profile| profile.tenant_id.as_str()),
        )
        .await?;
    let app_id_uri = prompter
        .input(
            "Azure App ID URI",
            existing.as_ref().map(|profile| profile.app_id_uri.as_str()),
        )
        .await?;
    let default_username = prompter
        .input(
            "Default Username",
            existing
                .as_ref()
                .and_then(|profile| profile.default_username.as_deref()),
        )
        .await?;
    let default_role_arn = prompter
        .input(
            "Default Role ARN (if multiple)",
            existing
                .as_ref()
                .and_then(|profile| profile.default_role_arn.as_deref()),
        )
        .await?;
    let default_duration_hours = prompter
        .input(
            "Default Session Duration Hours (up to 12)",
            existing
                .as_ref()
                .and_then(|profile| profile.default_duration_hours)
                .map(|hours| hours.to_string())
                .as_deref(),
        )
        .await?;
    let remember_me = prompter
        .input(
            "Stay logged in: skip authentication while refreshing aws credentials (true|false)",
            Some(if existing.is_some_and(|profile| profile.remember_me) {
                "true"
            } else {
                "false"
            }),
        )
        .await?;

    let settings = ProfileSettings {
        tenant_id,
        app_id_uri,
        default_username: Some(default_username).filter(|value| !value.is_empty()),
        default_role_arn: Some(default_role_arn).filter(|value| !value.is_empty()),
        default_duration_hours: default_duration_hours.trim().parse().ok(),
        remember_me: remember_me.trim() == "true",
    };
    store.save_profile(name, &settings)?;
    println!("Profile saved.");
    Ok(())
}
