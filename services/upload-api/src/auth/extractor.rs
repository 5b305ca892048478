use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use brain_intake_core::AuthenticatedUser;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AuthError, AUTHORIZATION_HEADER, BEARER_PREFIX};
use crate::api::ApiState;
use crate::config::UploadApiConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct JwtClaims {
    pub(crate) sub: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) exp: usize,
}

/// Validates HS256 bearer tokens and resolves them to a user.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &UploadApiConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];

        if let Some(issuer) = &config.jwt_issuer {
            validation.set_issuer(&[issuer]);
        }

        match &config.jwt_audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = token_data.claims;

        let email = claims.email.ok_or(AuthError::EmailNotFound)?;
        let user = AuthenticatedUser::new(email).map_err(|_| AuthError::EmailNotFound)?;

        debug!(user = %user, sub = ?claims.sub, "bearer token accepted");
        Ok(user)
    }

    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AuthError> {
        let value = headers
            .get(AUTHORIZATION_HEADER)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::MalformedAuthHeader)?;

        let token = value
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MalformedAuthHeader)?;

        self.verify_token(token)
    }
}

/// Extractor resolving the `Authorization: Bearer` header into a user.
#[derive(Debug, Clone)]
pub struct BearerUser(pub AuthenticatedUser);

#[axum::async_trait]
impl FromRequestParts<Arc<ApiState>> for BearerUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        match state.jwt.verify_headers(&parts.headers) {
            Ok(user) => Ok(BearerUser(user)),
            Err(err) => {
                warn!(error = %err, path = %parts.uri.path(), "rejected unauthenticated request");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    const SECRET: &str = "super-secret";

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(&UploadApiConfig {
            jwt_secret: SECRET.to_string(),
            ..UploadApiConfig::default()
        })
    }

    fn token(email: Option<&str>, secret: &str, expires_in: Duration) -> String {
        let claims = JwtClaims {
            sub: Some("user-1".to_string()),
            email: email.map(str::to_string),
            exp: (Utc::now() + expires_in).timestamp() as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("token should encode")
    }

    #[test]
    fn valid_token_resolves_to_email() {
        let user = verifier()
            .verify_token(&token(Some("ada@example.com"), SECRET, Duration::hours(1)))
            .expect("token should validate");
        assert_eq!(user.email(), "ada@example.com");
    }

    #[test]
    fn token_without_email_is_rejected() {
        let result = verifier().verify_token(&token(None, SECRET, Duration::hours(1)));
        assert!(matches!(result, Err(AuthError::EmailNotFound)));
    }

    #[test]
    fn wrong_secret_and_expired_tokens_are_rejected() {
        let v = verifier();
        let forged = token(Some("ada@example.com"), "other-secret", Duration::hours(1));
        assert!(matches!(v.verify_token(&forged), Err(AuthError::InvalidJwt(_))));

        let expired = token(Some("ada@example.com"), SECRET, Duration::hours(-2));
        assert!(matches!(v.verify_token(&expired), Err(AuthError::InvalidJwt(_))));
    }

    #[test]
    fn header_must_be_a_bearer_token() {
        let v = verifier();
        let mut headers = HeaderMap::new();
        assert!(matches!(
            v.verify_headers(&headers),
            Err(AuthError::MissingAuthHeader)
        ));

        headers.insert(AUTHORIZATION_HEADER, HeaderValue::from_static("Basic abc"));
        assert!(matches!(
            v.verify_headers(&headers),
            Err(AuthError::MalformedAuthHeader)
        ));

        let bearer = format!(
            "Bearer {}",
            token(Some("ada@example.com"), SECRET, Duration::hours(1))
        );
        headers.insert(
            AUTHORIZATION_HEADER,
            HeaderValue::from_str(&bearer).unwrap(),
        );
        assert_eq!(v.verify_headers(&headers).unwrap().email(), "ada@example.com");
    }
}
