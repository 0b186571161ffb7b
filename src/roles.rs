//! Role and session-duration selection.

use std::sync::Arc;

use thiserror::Error;

use crate::config::ProfileConfig;
use crate::prompt::{PromptError, Prompter};
use crate::saml::Role;

const MIN_DURATION_HOURS: u32 = 1;
const MAX_DURATION_HOURS: u32 = 12;
const DEFAULT_DURATION_HOURS: u32 = 1;

#[derive(Debug, Error)]
pub enum RoleSelectionError {
    #[error("No roles found in SAML response.")]
    NoRoles,
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// The answers needed for the STS exchange.
#[derive(Debug, Clone)]
pub struct RoleSelection {
    pub role: Role,
    pub duration_hours: u32,
}

/// Pick the role to assume and the session duration.
///
/// One offered role is taken as-is. With several, the profile's default role
/// short-circuits the prompt when present among them (always, under
/// `no_prompt`); otherwise the user picks from the sorted list. The duration
/// prompt is skipped whenever the profile provides one.
pub async fn select_role_and_duration(
    roles: Vec<Role>,
    profile: &ProfileConfig,
    no_prompt: bool,
    prompter: &Arc<dyn Prompter>,
) -> Result<RoleSelection, RoleSelectionError> {
    let role = pick_role(roles, profile, no_prompt, prompter).await?;
    let duration_hours = pick_duration(profile, no_prompt, prompter).await?;
    Ok(RoleSelection {
        role,
        duration_hours,
    })
}

async fn pick_role(
    mut roles: Vec<Role>,
    profile: &ProfileConfig,
    no_prompt: bool,
    prompter: &Arc<dyn Prompter>,
) -> Result<Role, RoleSelectionError> {
    if roles.is_empty() {
        return Err(RoleSelectionError::NoRoles);
    }
    if roles.len() == 1 {
        return Ok(roles.remove(0));
    }

    roles.sort_by(|a, b| a.role_arn.cmp(&b.role_arn));

    if let Some(default_arn) = profile.default_role_arn.as_deref() {
        if let Some(index) = roles.iter().position(|role| role.role_arn == default_arn) {
            if no_prompt {
                log::debug!("assuming default role without prompting: {default_arn}");
                return Ok(roles.remove(index));
            }
        }
    }

    let choices: Vec<String> = roles.iter().map(|role| role.role_arn.clone()).collect();
    let chosen = prompter
        .select("Role", &choices, profile.default_role_arn.as_deref())
        .await?;
    let index = roles
        .iter()
        .position(|role| role.role_arn == chosen)
        .ok_or(RoleSelectionError::Prompt(PromptError::InvalidSelection(
            chosen,
        )))?;
    Ok(roles.remove(index))
}

async fn pick_duration(
    profile: &ProfileConfig,
    no_prompt: bool,
    prompter: &Arc<dyn Prompter>,
) -> Result<u32, RoleSelectionError> {
    let default = profile
        .default_duration_hours
        .unwrap_or(DEFAULT_DURATION_HOURS);
    if no_prompt {
        return Ok(default.clamp(MIN_DURATION_HOURS, MAX_DURATION_HOURS));
    }

    // The stored default only pre-fills the prompt; the user always gets to
    // override it interactively.
    let default_answer = default.to_string();
    loop {
        let answer = prompter
            .input("Session Duration Hours (up to 12)", Some(&default_answer))
            .await?;
        match answer.trim().parse::<u32>() {
            Ok(hours) if (MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&hours) => {
                return Ok(hours);
            }
            _ => println!("Duration hours must be between 1 and 12"),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::prompt::PromptError;

    struct NoPrompter;

    #[async_trait]
    impl Prompter for NoPrompter {
        async fn input(&self, _: &str, _: Option<&str>) -> Result<String, PromptError> {
            panic!("unexpected input prompt");
        }

        async fn password(&self, _: &str) -> Result<String, PromptError> {
            panic!("unexpected password prompt");
        }

        async fn select(
            &self,
            _: &str,
            _: &[String],
            _: Option<&str>,
        ) -> Result<String, PromptError> {
            panic!("unexpected select prompt");
        }
    }

    struct PickSecond;

    #[async_trait]
    impl Prompter for PickSecond {
        async fn input(&self, _: &str, default: Option<&str>) -> Result<String, PromptError> {
            Ok(default.unwrap_or("1").to_string())
        }

        async fn password(&self, _: &str) -> Result<String, PromptError> {
            panic!("unexpected password prompt");
        }

        async fn select(
            &self,
            _: &str,
            choices: &[String],
            _: Option<&str>,
        ) -> Result<String, PromptError> {
            assert!(choices.len() > 1);
            Ok(choices[1].clone())
        }
    }

    fn role(arn: &str) -> Role {
        Role {
            role_arn: arn.to_string(),
            principal_arn: "arn:aws:iam::1:saml-provider/P".to_string(),
        }
    }

    fn profile(default_role: Option<&str>, default_hours: Option<u32>) -> ProfileConfig {
        ProfileConfig {
            tenant_id: "tenant".into(),
            app_id_uri: "uri".into(),
            default_username: None,
            default_password: None,
            default_role_arn: default_role.map(String::from),
            default_duration_hours: default_hours,
            remember_me: false,
            region: None,
        }
    }

    #[tokio::test]
    async fn no_roles_is_fatal() {
        let prompter: Arc<dyn Prompter> = Arc::new(NoPrompter);
        let err = select_role_and_duration(vec![], &profile(None, Some(1)), false, &prompter)
            .await
            .unwrap_err();
        assert!(matches!(err, RoleSelectionError::NoRoles));
    }

    /// Accepts whatever default each input prompt offers; panics on any
    /// role-selection prompt.
    struct AcceptDefaults;

    #[async_trait]
    impl Prompter for AcceptDefaults {
        async fn input(&self, _: &str, default: Option<&str>) -> Result<String, PromptError> {
            Ok(default.unwrap_or_default().to_string())
        }

        async fn password(&self, _: &str) -> Result<String, PromptError> {
            panic!("unexpected password prompt");
        }

        async fn select(
            &self,
            _: &str,
            _: &[String],
            _: Option<&str>,
        ) -> Result<String, PromptError> {
            panic!("unexpected select prompt");
        }
    }

    #[tokio::test]
    async fn single_role_skips_the_role_prompt() {
        let prompter: Arc<dyn Prompter> = Arc::new(AcceptDefaults);
        let selection = select_role_and_duration(
            vec![role("arn:aws:iam::1:role/Only")],
            &profile(None, Some(2)),
            false,
            &prompter,
        )
        .await
        .unwrap();
        assert_eq!(selection.role.role_arn, "arn:aws:iam::1:role/Only");
        assert_eq!(selection.duration_hours, 2);
    }

    #[tokio::test]
    async fn duration_prompt_runs_with_stored_default_prefilled() {
        struct FixedDuration;

        #[async_trait]
        impl Prompter for FixedDuration {
            async fn input(&self, _: &str, default: Option<&str>) -> Result<String, PromptError> {
                assert_eq!(default, Some("2"));
                Ok("3".to_string())
            }

            async fn password(&self, _: &str) -> Result<String, PromptError> {
                panic!("unexpected password prompt");
            }

            async fn select(
                &self,
                _: &str,
                _: &[String],
                _: Option<&str>,
            ) -> Result<String, PromptError> {
                panic!("unexpected select prompt");
            }
        }

        let prompter: Arc<dyn Prompter> = Arc::new(FixedDuration);
        let selection = select_role_and_duration(
            vec![role("arn:aws:iam::1:role/Only")],
            &profile(None, Some(2)),
            false,
            &prompter,
        )
        .await
        .unwrap();
        // The stored default was offered but the typed answer wins.
        assert_eq!(selection.duration_hours, 3);
    }

    #[tokio::test]
    async fn default_role_wins_under_no_prompt() {
        let prompter: Arc<dyn Prompter> = Arc::new(NoPrompter);
        let selection = select_role_and_duration(
            vec![role("arn:aws:iam::1:role/B"), role("arn:aws:iam::1:role/A")],
            &profile(Some("arn:aws:iam::1:role/B"), Some(1)),
            true,
            &prompter,
        )
        .await
        .unwrap();
        assert_eq!(selection.role.role_arn, "arn:aws:iam::1:role/B");
    }

    #[tokio::test]
    async fn prompt_offers_sorted_roles() {
        let prompter: Arc<dyn Prompter> = Arc::new(PickSecond);
        let selection = select_role_and_duration(
            vec![role("arn:aws:iam::1:role/C"), role("arn:aws:iam::1:role/A")],
            &profile(None, Some(1)),
            false,
            &prompter,
        )
        .await
        .unwrap();
        // Index 1 of the sorted list, not of the input order.
        assert_eq!(selection.role.role_arn, "arn:aws:iam::1:role/C");
    }

    #[tokio::test]
    async fn no_prompt_without_default_duration_uses_one_hour() {
        let prompter: Arc<dyn Prompter> = Arc::new(NoPrompter);
        let selection = select_role_and_duration(
            vec![role("arn:aws:iam::1:role/Only")],
            &profile(None, None),
            true,
            &prompter,
        )
        .await
        .unwrap();
        assert_eq!(selection.duration_hours, 1);
    }

    #[tokio::test]
    async fn out_of_range_default_duration_is_clamped_under_no_prompt() {
        let prompter: Arc<dyn Prompter> = Arc::new(NoPrompter);
        let selection = select_role_and_duration(
            vec![role("arn:aws:iam::1:role/Only")],
            &profile(None, Some(36)),
            true,
            &prompter,
        )
        .await
        .unwrap();
        assert_eq!(selection.duration_hours, 12);
    }
}
