//! Azure AD SAML login URL construction.
//!
//! Builds the minimal `AuthnRequest` document, deflates it, base64-encodes
//! it, and URL-encodes it into the tenant's `saml2` endpoint. Stateless;
//! every call produces a fresh request id and timestamp.

use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{SecondsFormat, Utc};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LoginUrlError {
    #[error("failed to deflate SAML request: {0}")]
    Compression(#[from] std::io::Error),
}

/// Build the federation request URL for one login attempt.
///
/// `app_id_uri` identifies the Azure enterprise application, `tenant_id` the
/// directory, and `assertion_consumer_url` the AWS endpoint the identity
/// provider should post the assertion to.
pub fn build_login_url(
    app_id_uri: &str,
    tenant_id: &str,
    assertion_consumer_url: &str,
) -> Result<String, LoginUrlError> {
    let request_id = Uuid::new_v4();
    let issue_instant = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    log::debug!("generated SAML request id id{request_id}");

    let saml_request = format!(
        r#"
        <samlp:AuthnRequest xmlns="urn:oasis:names:tc:SAML:2.0:metadata" ID="id{request_id}" Version="2.0" IssueInstant="{issue_instant}" IsPassive="false" AssertionConsumerServiceURL="{assertion_consumer_url}" xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol">
            <Issuer xmlns="urn:oasis:names:tc:SAML:2.0:assertion">{app_id_uri}</Issuer>
            <samlp:NameIDPolicy Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress"></samlp:NameIDPolicy>
        </samlp:AuthnRequest>
        "#
    );

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(saml_request.as_bytes())?;
    let deflated = encoder.finish()?;

    let encoded = BASE64.encode(deflated);
    let query: String =
        url::form_urlencoded::byte_serialize(encoded.as_bytes()).collect();

    Ok(format!(
        "https://login.microsoftonline.com/{tenant_id}/saml2?SAMLRequest={query}"
    ))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::DeflateDecoder;

    use super::*;

    fn decode_request(login_url: &str) -> String {
        let parsed = url::Url::parse(login_url).unwrap();
        let (_, value) = parsed
            .query_pairs()
            .find(|(key, _)| key == "SAMLRequest")
            .expect("SAMLRequest parameter");
        let deflated = BASE64.decode(value.as_bytes()).unwrap();
        let mut decoder = DeflateDecoder::new(&deflated[..]);
        let mut xml = String::new();
        decoder.read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn url_targets_tenant_endpoint() {
        let login_url = build_login_url(
            "https://signin.aws.amazon.com/saml#123",
            "my-tenant",
            "https://signin.aws.amazon.com/saml",
        )
        .unwrap();
        assert!(login_url.starts_with("https://login.microsoftonline.com/my-tenant/saml2?SAMLRequest="));
    }

    #[test]
    fn request_round_trips_through_deflate_and_base64() {
        let login_url = build_login_url(
            "https://signin.aws.amazon.com/saml#123",
            "my-tenant",
            "https://signin.aws.amazon.com/saml",
        )
        .unwrap();

        let xml = decode_request(&login_url);
        assert!(xml.contains("samlp:AuthnRequest"));
        assert!(xml.contains(r#"AssertionConsumerServiceURL="https://signin.aws.amazon.com/saml""#));
        assert!(xml.contains("https://signin.aws.amazon.com/saml#123"));
        assert!(xml.contains("emailAddress"));
    }

    #[test]
    fn each_call_uses_a_fresh_request_id() {
        let first = decode_request(
            &build_login_url("uri", "tenant", "https://signin.aws.amazon.com/saml").unwrap(),
        );
        let second = decode_request(
            &build_login_url("uri", "tenant", "https://signin.aws.amazon.com/saml").unwrap(),
        );

        let id = |xml: &str| {
            let start = xml.find("ID=\"").unwrap() + 4;
            xml[start..start + 38].to_string()
        };
        assert_ne!(id(&first), id(&second));
    }
}
