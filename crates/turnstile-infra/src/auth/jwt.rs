//! JWT token service implementation.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use turnstile_core::domain::{AuthPolicy, Claims};
use turnstile_core::ports::{AuthError, TokenService};

/// JWT token service configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub lifetime: Duration,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthPolicy::default())
    }
}

impl From<&AuthPolicy> for JwtConfig {
    fn from(policy: &AuthPolicy) -> Self {
        Self {
            secret: policy.signing_secret.clone(),
            lifetime: policy.token_lifetime,
            issuer: policy.issuer.clone(),
        }
    }
}

/// Wire format of the token payload.
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    iat: i64,
    exp: i64,
    iss: String,
}

/// HS256 token service.
///
/// Only [`JwtTokenService::ALGORITHM`] is accepted on verification; a token
/// whose header names any other algorithm is rejected before its signature
/// is looked at. Expiry is checked with zero leeway at second precision:
/// a token is expired once the current second is past `exp`.
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtTokenService {
    pub const ALGORITHM: Algorithm = Algorithm::HS256;

    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Self::ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Sign a token as if issued at `issued_at`.
    pub fn issue_at(
        &self,
        subject_id: &str,
        email: Option<&str>,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let lifetime = TimeDelta::from_std(self.config.lifetime)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        let claims = JwtClaims {
            sub: subject_id.to_string(),
            email: email.map(str::to_string),
            iat: issued_at.timestamp(),
            exp: (issued_at + lifetime).timestamp(),
            iss: self.config.issuer.clone(),
        };

        encode(&Header::new(Self::ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

impl TokenService for JwtTokenService {
    fn generate_token(&self, subject_id: &str, email: Option<&str>) -> Result<String, AuthError> {
        self.issue_at(subject_id, email, Utc::now())
    }

    fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        let raw = token_data.claims;
        let timestamp = |secs: i64, name: &str| {
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| AuthError::InvalidToken(format!("{name} out of range")))
        };

        Ok(Claims {
            subject_id: raw.sub,
            email: raw.email,
            issued_at: timestamp(raw.iat, "iat")?,
            expires_at: timestamp(raw.exp, "exp")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key".to_string(),
            lifetime: Duration::from_secs(3600),
            issuer: "test-issuer".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate() {
        let service = JwtTokenService::new(test_config());

        let token = service
            .generate_token("user-1", Some("test@example.com"))
            .unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.subject_id, "user-1");
        assert_eq!(claims.email.as_deref(), Some("test@example.com"));
        assert_eq!(claims.expires_at - claims.issued_at, TimeDelta::hours(1));
    }

    #[test]
    fn test_email_is_optional() {
        let service = JwtTokenService::new(test_config());

        let token = service.generate_token("user-1", None).unwrap();
        assert_eq!(service.validate_token(&token).unwrap().email, None);
    }

    #[test]
    fn test_expired_token() {
        let service = JwtTokenService::new(test_config());
        let issued_at = Utc::now() - TimeDelta::hours(1) - TimeDelta::seconds(1);

        let token = service.issue_at("user-1", None, issued_at).unwrap();

        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_token_one_second_before_expiry_is_accepted() {
        let service = JwtTokenService::new(test_config());
        let issued_at = Utc::now() - TimeDelta::hours(1) + TimeDelta::seconds(1);

        let token = service.issue_at("user-1", None, issued_at).unwrap();

        assert!(service.validate_token(&token).is_ok());
    }

    #[test]
    fn test_garbage_token() {
        let service = JwtTokenService::new(test_config());

        let result = service.validate_token("invalid-token");
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let signer = JwtTokenService::new(JwtConfig {
            secret: "other-secret".to_string(),
            ..test_config()
        });
        let verifier = JwtTokenService::new(test_config());

        let token = signer.generate_token("user-1", None).unwrap();
        assert!(matches!(
            verifier.validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_bad_signature_wins_over_expiry() {
        let signer = JwtTokenService::new(JwtConfig {
            secret: "other-secret".to_string(),
            ..test_config()
        });
        let verifier = JwtTokenService::new(test_config());

        let token = signer
            .issue_at("user-1", None, Utc::now() - TimeDelta::days(2))
            .unwrap();
        assert!(matches!(
            verifier.validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_other_algorithm_rejected_even_with_right_secret() {
        let config = test_config();
        let service = JwtTokenService::new(config.clone());
        let now = Utc::now().timestamp();

        let claims = JwtClaims {
            sub: "user-1".to_string(),
            email: None,
            iat: now,
            exp: now + 3600,
            iss: config.issuer.clone(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_wrong_issuer() {
        let service1 = JwtTokenService::new(JwtConfig {
            issuer: "issuer1".to_string(),
            ..test_config()
        });
        let service2 = JwtTokenService::new(JwtConfig {
            issuer: "issuer2".to_string(),
            ..test_config()
        });

        let token = service1.generate_token("user-1", None).unwrap();
        assert!(service2.validate_token(&token).is_err());
    }
}
