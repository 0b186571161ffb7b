//! SAML assertion parsing.
//!
//! The assertion is base64-encoded XML. The only part we care about is the
//! AWS role attribute, whose values pair a role ARN with the principal ARN of
//! the identity provider, comma-separated in either order.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use scraper::{Html, Selector};
use thiserror::Error;

const ROLE_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/Role";

#[derive(Debug, Error)]
pub enum SamlError {
    #[error("SAML assertion is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("SAML assertion is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("malformed role attribute value '{0}'")]
    MalformedRole(String),
}

/// An AWS role offered by the assertion, together with the federating
/// principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub role_arn: String,
    pub principal_arn: String,
}

/// Extract the roles offered by a base64-encoded SAML assertion.
///
/// Assertions for accounts with no role mappings simply yield an empty list;
/// that is the caller's problem to report.
pub fn parse_roles(assertion: &str) -> Result<Vec<Role>, SamlError> {
    let xml = String::from_utf8(BASE64.decode(assertion)?)?;
    let document = Html::parse_document(&xml);

    // XML tag names survive the HTML parser lowercased, so select
    // case-insensitively via the attribute filter.
    let selector = Selector::parse(&format!(
        "attribute[name='{ROLE_ATTRIBUTE}'] > attributevalue"
    ))
    .unwrap_or_else(|_| unreachable!("static selector"));

    let mut roles = Vec::new();
    for value in document.select(&selector) {
        let text = value.text().collect::<String>();
        let text = text.trim();
        roles.push(parse_role_pair(text)?);
    }
    Ok(roles)
}

/// Split a role attribute value into (role, principal), accepting the two
/// ARNs in either order.
fn parse_role_pair(value: &str) -> Result<Role, SamlError> {
    let Some((first, second)) = value.split_once(',') else {
        return Err(SamlError::MalformedRole(value.to_string()));
    };
    let (first, second) = (first.trim(), second.trim());

    if first.contains(":role/") {
        Ok(Role {
            role_arn: first.to_string(),
            principal_arn: second.to_string(),
        })
    } else if second.contains(":role/") {
        Ok(Role {
            role_arn: second.to_string(),
            principal_arn: first.to_string(),
        })
    } else {
        Err(SamlError::MalformedRole(value.to_string()))
    }
}
