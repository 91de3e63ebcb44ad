//! Telephony access tokens for browser / mobile voice clients.
//!
//! The token is an HS256 JWT signed with the API secret, carrying a voice
//! grant that lets the holder place calls through the configured call-routing
//! application and receive incoming calls.

use crate::config::TwilioCredentials;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

const TOKEN_CONTENT_TYPE: &str = "twilio-fpa;v=1";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("identity must not be empty")]
    EmptyIdentity,
    #[error("failed to sign access token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AccessTokenClaims {
    pub jti: String,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub grants: Grants,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Grants {
    pub identity: String,
    pub voice: VoiceGrant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoiceGrant {
    pub incoming: IncomingGrant,
    pub outgoing: OutgoingGrant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IncomingGrant {
    pub allow: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutgoingGrant {
    pub application_sid: String,
}

/// Mints a signed access token for `identity`, valid for `ttl_secs` from `now`.
pub fn mint_access_token(
    credentials: &TwilioCredentials,
    identity: &str,
    ttl_secs: u64,
    now: i64,
) -> Result<String, TokenError> {
    if identity.trim().is_empty() {
        return Err(TokenError::EmptyIdentity);
    }

    let claims = AccessTokenClaims {
        jti: format!("{}-{}", credentials.api_key, now),
        iss: credentials.api_key.clone(),
        sub: credentials.account_sid.clone(),
        iat: now,
        exp: now.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
        grants: Grants {
            identity: identity.to_string(),
            voice: VoiceGrant {
                incoming: IncomingGrant { allow: true },
                outgoing: OutgoingGrant {
                    application_sid: credentials.twiml_app_sid.clone(),
                },
            },
        },
    };

    let mut header = Header::new(Algorithm::HS256);
    header.cty = Some(TOKEN_CONTENT_TYPE.to_string());

    let token = encode(
        &header,
        &claims,
        &EncodingKey::from_secret(credentials.api_secret.as_bytes()),
    )?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};

    fn credentials() -> TwilioCredentials {
        TwilioCredentials {
            account_sid: "AC123".to_string(),
            api_key: "SK456".to_string(),
            api_secret: "super-secret".to_string(),
            twiml_app_sid: "AP789".to_string(),
        }
    }

    #[test]
    fn test_token_claims_and_header() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_access_token(&credentials(), "alice", 600, now).unwrap();

        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.cty.as_deref(), Some(TOKEN_CONTENT_TYPE));

        let decoded = decode::<AccessTokenClaims>(
            &token,
            &DecodingKey::from_secret(b"super-secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        let claims = decoded.claims;
        assert_eq!(claims.iss, "SK456");
        assert_eq!(claims.sub, "AC123");
        assert_eq!(claims.jti, format!("SK456-{now}"));
        assert_eq!(claims.exp - claims.iat, 600);
        assert_eq!(claims.grants.identity, "alice");
        assert!(claims.grants.voice.incoming.allow);
        assert_eq!(claims.grants.voice.outgoing.application_sid, "AP789");
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let now = chrono::Utc::now().timestamp();
        let token = mint_access_token(&credentials(), "alice", 600, now).unwrap();

        let result = decode::<AccessTokenClaims>(
            &token,
            &DecodingKey::from_secret(b"another-secret"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_identity_is_rejected() {
        let err = mint_access_token(&credentials(), "  ", 600, 0).unwrap_err();
        assert!(matches!(err, TokenError::EmptyIdentity));
    }
}
