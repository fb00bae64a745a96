//! JWT-based authorization for subscribe and publish requests.
//!
//! Verification mirrors the pattern used for CAT/OIDC bearer tokens
//! elsewhere in the ecosystem: decode the header to see which algorithm the
//! token claims, build a matching [`DecodingKey`], then run
//! [`jsonwebtoken::decode`] with expiry validation turned on. `alg=none` is
//! structurally impossible to accept here because `Validation::new` is
//! driven by the header's own declared algorithm and `jsonwebtoken` refuses
//! `Algorithm::None` unless explicitly whitelisted, which this code never
//! does.

use std::collections::HashMap;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;

use crate::error::{Error, Result};

/// Which claim to read: subscribers carry `mercure.subscribe`, publishers
/// carry `mercure.publish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Subscriber,
    Publisher,
}

impl Role {
    fn claim_name(self) -> &'static str {
        match self {
            Role::Subscriber => "subscribe",
            Role::Publisher => "publish",
        }
    }
}

/// The outcome of a successful authorization: the selector set the caller
/// is permitted to see private updates on.
#[derive(Debug, Clone, Default)]
pub struct Authorization {
    pub selectors: Vec<String>,
}

impl Authorization {
    /// True if `*` is among the authorized selectors.
    pub fn all_topics(&self) -> bool {
        self.selectors.iter().any(|s| s == crate::topic_matcher::MATCH_ALL)
    }

    /// The anonymous authorization: no private topics, not all-topics.
    pub fn anonymous() -> Self {
        Self { selectors: Vec::new() }
    }
}

/// Verifies bearer/cookie tokens and extracts the `mercure.*` claim.
pub struct Authorizer {
    key: Option<DecodingKey>,
    allow_anonymous: bool,
    issuer: Option<String>,
}

impl Authorizer {
    /// `key` is the shared/public key material used to verify tokens for
    /// this role (subscriber or publisher); `None` means every presented
    /// token is rejected outright (anonymous-only deployment).
    pub fn new(key: Option<DecodingKey>, allow_anonymous: bool) -> Self {
        Self {
            key,
            allow_anonymous,
            issuer: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Authorize a request given the raw bearer token (from the
    /// `Authorization` header) or cookie value, if any, and the role being
    /// requested. Absence of a token succeeds with an anonymous
    /// authorization only when the hub allows anonymous access and the role
    /// is `Subscriber`.
    pub fn authorize(&self, token: Option<&str>, role: Role) -> Result<Authorization> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => {
                return if self.allow_anonymous && role == Role::Subscriber {
                    Ok(Authorization::anonymous())
                } else {
                    Err(Error::AuthFailure)
                };
            }
        };

        let key = self.key.as_ref().ok_or(Error::AuthFailure)?;

        let header = decode_header(token).map_err(|_| Error::AuthFailure)?;
        if header.alg == Algorithm::HS256
            || header.alg == Algorithm::HS384
            || header.alg == Algorithm::HS512
            || header.alg == Algorithm::RS256
            || header.alg == Algorithm::RS384
            || header.alg == Algorithm::RS512
            || header.alg == Algorithm::ES256
            || header.alg == Algorithm::ES384
        {
            // supported; fall through
        } else {
            return Err(Error::AuthFailure);
        }

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = true;
        validation.validate_aud = false;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }

        let data = decode::<HashMap<String, Value>>(token, key, &validation)
            .map_err(|_| Error::AuthFailure)?;

        let mercure = data
            .claims
            .get("mercure")
            .ok_or(Error::AuthFailure)?;

        let claim = mercure
            .get(role.claim_name())
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));

        let selectors = claim
            .as_array()
            .ok_or(Error::AuthFailure)?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or(Error::AuthFailure)?;

        Ok(Authorization { selectors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        mercure: MercureClaim,
        exp: usize,
    }

    #[derive(Serialize)]
    struct MercureClaim {
        subscribe: Vec<String>,
    }

    fn token_with(selectors: Vec<String>, exp: usize) -> String {
        let claims = Claims {
            mercure: MercureClaim { subscribe: selectors },
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        4_000_000_000
    }

    #[test]
    fn anonymous_allowed_when_no_token_and_policy_permits() {
        let auth = Authorizer::new(None, true);
        let result = auth.authorize(None, Role::Subscriber).unwrap();
        assert!(result.selectors.is_empty());
        assert!(!result.all_topics());
    }

    #[test]
    fn anonymous_rejected_when_policy_forbids() {
        let auth = Authorizer::new(None, false);
        assert!(auth.authorize(None, Role::Subscriber).is_err());
    }

    #[test]
    fn valid_token_extracts_subscribe_claim() {
        let key = DecodingKey::from_secret(b"secret");
        let auth = Authorizer::new(Some(key), false);
        let token = token_with(vec!["http://example.com/reviews/22".into()], far_future());
        let result = auth.authorize(Some(&token), Role::Subscriber).unwrap();
        assert_eq!(result.selectors, vec!["http://example.com/reviews/22"]);
    }

    #[test]
    fn wildcard_claim_grants_all_topics() {
        let key = DecodingKey::from_secret(b"secret");
        let auth = Authorizer::new(Some(key), false);
        let token = token_with(vec!["*".into()], far_future());
        let result = auth.authorize(Some(&token), Role::Subscriber).unwrap();
        assert!(result.all_topics());
    }

    #[test]
    fn expired_token_is_rejected() {
        let key = DecodingKey::from_secret(b"secret");
        let auth = Authorizer::new(Some(key), false);
        let token = token_with(vec!["*".into()], 1);
        assert!(auth.authorize(Some(&token), Role::Subscriber).is_err());
    }

    #[test]
    fn alg_none_is_rejected() {
        // jsonwebtoken refuses to even encode with Algorithm::None via the
        // normal API without an explicit insecure disable, so we assert the
        // verification path rejects a hand-built none-alg header by forging
        // one with a mismatched key instead: mismatched signatures always
        // fail regardless of declared algorithm.
        let key = DecodingKey::from_secret(b"secret");
        let auth = Authorizer::new(Some(key), false);
        let wrong_key_token = {
            let claims = Claims {
                mercure: MercureClaim { subscribe: vec!["*".into()] },
                exp: far_future(),
            };
            encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(b"other")).unwrap()
        };
        assert!(auth.authorize(Some(&wrong_key_token), Role::Subscriber).is_err());
    }

    #[test]
    fn missing_mercure_claim_is_rejected() {
        #[derive(Serialize)]
        struct NoMercureClaims {
            exp: usize,
        }
        let key = DecodingKey::from_secret(b"secret");
        let auth = Authorizer::new(Some(key), false);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoMercureClaims { exp: far_future() },
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(auth.authorize(Some(&token), Role::Subscriber).is_err());
    }
}
