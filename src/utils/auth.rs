use axum::extract::State;
use axum::{body::Body, extract::Request, http::HeaderMap, http::Response, http::header, middleware::Next};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::error::Error;
use crate::core::state::AppState;

/// Issuers write the subject as a decimal string; some clients send a number.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum Subject {
    Text(String),
    Number(i64),
}

impl Subject {
    fn user_id(&self) -> Option<i64> {
        match self {
            Subject::Text(text) => text.parse().ok(),
            Subject::Number(id) => Some(*id),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Claims {
    pub(crate) sub: Subject,
    pub(crate) iat: i64,
    pub(crate) nbf: i64,
    pub(crate) exp: i64,
    pub(crate) iss: String,
    pub(crate) aud: String,
}

/// Issues and verifies HS256 identity tokens. Immutable once built.
pub(crate) struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl TokenAuthority {
    pub(crate) fn new(secret: &str, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_owned(),
            audience: audience.to_owned(),
        }
    }

    /// Returns the token together with the instant it stops being valid.
    pub(crate) fn issue(
        &self,
        subject: i64,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), Error> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| Error::Internal)?;
        let expires_at = now + ttl;

        let claims = Claims {
            sub: Subject::Text(subject.to_string()),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };

        Ok((self.sign(&claims)?, expires_at))
    }

    fn sign(&self, claims: &Claims) -> Result<String, Error> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding_key,
        )?)
    }

    /// Resolves a token to the user id it was issued for. Everything except
    /// expiry is reported as `InvalidToken`.
    pub(crate) fn verify(&self, token: &str) -> Result<i64, Error> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| Error::InvalidToken)?;
        if header.alg != Algorithm::HS256 {
            return Err(Error::InvalidToken);
        }

        let claims = match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
        {
            Ok(token_data) => token_data.claims,
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => return Err(Error::ExpiredToken),
                _ => return Err(Error::InvalidToken),
            },
        };

        // the library accepts a token during the second it expires in
        let now = Utc::now().timestamp();
        if claims.exp <= now {
            return Err(Error::ExpiredToken);
        }
        if claims.nbf > now {
            return Err(Error::InvalidToken);
        }

        claims.sub.user_id().ok_or(Error::InvalidToken)
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, Error> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(Error::MissingCredentials)?
        .to_str()
        .map_err(|_| Error::MalformedCredentials)?;

    let mut parts = value.split_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(Error::MalformedCredentials),
    }
}

pub(crate) async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response<Body>, Error> {
    let user = state
        .user_controller
        .authenticate(request.headers())
        .await?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
