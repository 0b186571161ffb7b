//! STS credential exchange.
//!
//! Trades the SAML assertion for temporary credentials via the
//! `AssumeRoleWithSAML` Query API. That call is unsigned, so a plain HTTPS
//! client is all we need.

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use thiserror::Error;

use crate::config::ProfileCredentials;
use crate::saml::Role;

const STS_API_VERSION: &str = "2011-06-15";

#[derive(Debug, Error)]
pub enum StsError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("AssumeRoleWithSAML request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("AssumeRoleWithSAML returned {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("AssumeRoleWithSAML response is missing '{0}'")]
    MissingField(&'static str),
    #[error("AssumeRoleWithSAML returned an unparseable expiration '{0}'")]
    BadExpiration(String),
}

/// Connection options for the STS call.
#[derive(Debug, Clone, Default)]
pub struct StsOptions {
    /// Region whose STS endpoint to call; `None` means the global endpoint.
    pub region: Option<String>,
    /// Skip TLS verification, for TLS-intercepting corporate proxies.
    pub accept_invalid_certs: bool,
}

/// Endpoint for the region's partition. Regional endpoints keep GovCloud and
/// China logins inside their partition; the global endpoint serves the rest.
fn sts_endpoint(region: Option<&str>) -> String {
    match region {
        Some(region) if region.starts_with("cn-") => {
            format!("https://sts.{region}.amazonaws.com.cn")
        }
        Some(region) => format!("https://sts.{region}.amazonaws.com"),
        None => "https://sts.amazonaws.com".to_string(),
    }
}

/// Assume `role` with the given base64-encoded SAML assertion.
pub async fn assume_role(
    assertion: &str,
    role: &Role,
    duration_hours: u32,
    options: &StsOptions,
) -> Result<ProfileCredentials, StsError> {
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(options.accept_invalid_certs)
        .build()
        .map_err(StsError::Client)?;

    let duration_seconds = (duration_hours * 3600).to_string();
    let params = [
        ("Action", "AssumeRoleWithSAML"),
        ("Version", STS_API_VERSION),
        ("PrincipalArn", role.principal_arn.as_str()),
        ("RoleArn", role.role_arn.as_str()),
        ("SAMLAssertion", assertion),
        ("DurationSeconds", duration_seconds.as_str()),
    ];

    let endpoint = sts_endpoint(options.region.as_deref());
    log::debug!("assuming role {} via {endpoint}", role.role_arn);

    let response = client.post(&endpoint).form(&params).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(StsError::Rejected { status, body });
    }

    parse_credentials(&body)
}

/// Pull the `Credentials` block out of the Query API's XML response.
fn parse_credentials(body: &str) -> Result<ProfileCredentials, StsError> {
    let document = Html::parse_document(body);
    let field = |name: &'static str| -> Result<String, StsError> {
        // Tag names come out of the HTML parser lowercased.
        let selector = Selector::parse(&format!("credentials > {}", name.to_lowercase()))
            .unwrap_or_else(|_| unreachable!("static selector"));
        document
            .select(&selector)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(StsError::MissingField(name))
    };

    let expiration_raw = field("Expiration")?;
    let expiration = DateTime::parse_from_rfc3339(&expiration_raw)
        .map_err(|_| StsError::BadExpiration(expiration_raw))?
        .with_timezone(&Utc);

    Ok(ProfileCredentials {
        access_key_id: field("AccessKeyId")?,
        secret_access_key: field("SecretAccessKey")?,
        session_token: field("SessionToken")?,
        expiration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"<AssumeRoleWithSAMLResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleWithSAMLResult>
    <Credentials>
      <AccessKeyId>ASIAEXAMPLE</AccessKeyId>
      <SecretAccessKey>secretkey</SecretAccessKey>
      <SessionToken>sessiontoken</SessionToken>
      <Expiration>2026-08-29T12:00:00Z</Expiration>
    </Credentials>
  </AssumeRoleWithSAMLResult>
</AssumeRoleWithSAMLResponse>"#;

    #[test]
    fn parses_credentials_from_response() {
        let credentials = parse_credentials(SAMPLE_RESPONSE).unwrap();
        assert_eq!(credentials.access_key_id, "ASIAEXAMPLE");
        assert_eq!(credentials.secret_access_key, "secretkey");
        assert_eq!(credentials.session_token, "sessiontoken");
        assert_eq!(
            credentials.expiration,
            DateTime::parse_from_rfc3339("2026-08-29T12:00:00Z").unwrap()
        );
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let body = SAMPLE_RESPONSE.replace(
            "<SessionToken>sessiontoken</SessionToken>",
            "",
        );
        let err = parse_credentials(&body).unwrap_err();
        assert!(matches!(err, StsError::MissingField("SessionToken")));
    }

    #[test]
    fn unparseable_expiration_is_an_error() {
        let body = SAMPLE_RESPONSE.replace("2026-08-29T12:00:00Z", "tomorrow");
        assert!(matches!(
            parse_credentials(&body),
            Err(StsError::BadExpiration(_))
        ));
    }

    #[test]
    fn endpoint_follows_region_partition() {
        assert_eq!(sts_endpoint(None), "https://sts.amazonaws.com");
        assert_eq!(
            sts_endpoint(Some("eu-west-1")),
            "https://sts.eu-west-1.amazonaws.com"
        );
        assert_eq!(
            sts_endpoint(Some("cn-north-1")),
            "https://sts.cn-north-1.amazonaws.com.cn"
        );
        assert_eq!(
            sts_endpoint(Some("us-gov-west-1")),
            "https://sts.us-gov-west-1.amazonaws.com"
        );
    }
}
