//! Bearer token decoding.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Turns a raw bearer token into trusted claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HS256 shared-secret validator.
///
/// The token carries `issued_at` / `expires_at` instead of the registered
/// `iat` / `exp` claims, so the library's own time checks are disabled and
/// [`validate_claims`] runs after the signature check.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            TokenValidationError::Malformed(e.to_string())
        })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use promostock_core::{TenantId, UserId};

    fn mint(secret: &str, expires_in: Duration) -> (JwtClaims, String) {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::new("admin")],
            issued_at: now - Duration::seconds(5),
            expires_at: now + expires_in,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (claims, token)
    }

    #[test]
    fn accepts_token_signed_with_same_secret() {
        let (claims, token) = mint("s3cret", Duration::minutes(5));
        let decoded = Hs256JwtValidator::new("s3cret")
            .validate(&token, Utc::now())
            .unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let (_, token) = mint("s3cret", Duration::minutes(5));
        let err = Hs256JwtValidator::new("other")
            .validate(&token, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));

        let (_, stale) = mint("s3cret", Duration::seconds(1));
        let err = Hs256JwtValidator::new("s3cret")
            .validate(&stale, Utc::now() + Duration::minutes(1))
            .unwrap_err();
        assert_eq!(err, TokenValidationError::Expired);
    }
}
