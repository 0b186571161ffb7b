//! # aws-azure-auth
//!
//! AWS CLI credentials via Azure Active Directory federated login.
//!
//! Drives a scriptable Chrome through the Azure AD sign-in flow, intercepts
//! the SAML assertion posted back to AWS, exchanges it for temporary STS
//! credentials, and writes them to the shared credentials file.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use aws_azure_auth::config::AwsFileStore;
//! use aws_azure_auth::login::{LoginOptions, perform_login};
//! use aws_azure_auth::prompt::StdPrompter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = AwsFileStore::from_env()?;
//!     let profile = store.load_profile("default")?;
//!     let assertion =
//!         perform_login(&profile, &LoginOptions::default(), Arc::new(StdPrompter::new())).await?;
//!     println!("captured a {}-byte assertion", assertion.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod login;
pub mod prompt;
pub mod roles;
pub mod saml;
pub mod session;
pub mod sts;

pub use crate::config::{AwsFileStore, ConfigError, ProfileConfig, ProfileCredentials};
pub use crate::login::{LoginError, LoginMode, LoginOptions, perform_login};
pub use crate::prompt::{PromptError, Prompter, StdPrompter};
pub use crate::roles::{RoleSelection, RoleSelectionError, select_role_and_duration};
pub use crate::saml::{Role, SamlError, parse_roles};
pub use crate::session::{BrowserSession, SessionError};
pub use crate::sts::{StsError, StsOptions, assume_role};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
