use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::jwk::AlgorithmParameters;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use serde::de::DeserializeOwned;

use crate::claims::AccessTokenClaims;
use crate::claims::Claims;
use crate::claims::TokenClaims;
use crate::config::VerifierConfig;
use crate::error::Error;
use crate::error::Result;
use crate::jwks_cache::JwksCache;

/// Turns a raw access token into verified [`Claims`] or a rejection
///
/// Implementations must check liveness themselves: a token whose `exp` has
/// passed is rejected with [`Error::TokenExpired`] even when its signature is
/// valid.
#[async_trait]
pub trait ClaimsExtractor: Send + Sync {
    async fn extract(&self, raw_token: &str) -> Result<Claims>;
}

/// Extractor verifying tokens against the issuer's published JWKS
///
/// Generic over the claims layout so providers that put roles somewhere
/// other than a top-level `roles` array can plug in their own struct.
pub struct JwtClaimsExtractor<C = AccessTokenClaims> {
    jwks_cache: JwksCache,
    expected_issuer: String,
    expected_audiences: Vec<String>,
    _claims: PhantomData<fn() -> C>,
}

impl<C> JwtClaimsExtractor<C>
where
    C: TokenClaims + DeserializeOwned,
{
    /// Create a new extractor with the given configuration
    pub fn new(config: VerifierConfig) -> Result<Self> {
        if config.expected_audiences.is_empty() {
            return Err(Error::NoAudiencesConfigured);
        }

        let client = config.http_client.unwrap_or_default();

        Ok(Self {
            jwks_cache: JwksCache::new(
                config.expected_issuer.clone(),
                config.jwks_uri,
                config.jwks_cache_ttl,
                client,
            ),
            expected_issuer: config.expected_issuer,
            expected_audiences: config.expected_audiences,
            _claims: PhantomData,
        })
    }

    async fn verify(&self, token: &str) -> Result<C> {
        let header = decode_header(token)?;
        let kid = header.kid.as_deref().ok_or(Error::KeyIdMissing)?;

        let jwk = self
            .jwks_cache
            .find_key(kid)
            .await?
            .ok_or(Error::KeyNotMatchInJwks)?;

        let decoding_key = decoding_key_for(&jwk)?;
        let validation = validation_for(&header, &self.expected_audiences);

        Ok(decode::<C>(token, &decoding_key, &validation)?.claims)
    }
}

#[async_trait]
impl<C> ClaimsExtractor for JwtClaimsExtractor<C>
where
    C: TokenClaims + DeserializeOwned + Send,
{
    async fn extract(&self, raw_token: &str) -> Result<Claims> {
        let claims = self.verify(raw_token).await?;
        to_claims(&claims, &self.expected_issuer, Utc::now())
    }
}

/// Checks that apply after the signature is known to be good
fn to_claims<C: TokenClaims>(claims: &C, expected_issuer: &str, now: DateTime<Utc>) -> Result<Claims> {
    if claims.iss() != expected_issuer {
        return Err(Error::WrongIssuer(claims.iss().to_string()));
    }

    let subject = claims
        .sub()
        .filter(|sub| !sub.is_empty())
        .ok_or(Error::SubjectMissing)?;

    if claims.exp() < now.timestamp() {
        return Err(Error::TokenExpired(claims.exp()));
    }

    let expires_at =
        DateTime::from_timestamp(claims.exp(), 0).ok_or(Error::TokenExpired(claims.exp()))?;

    Ok(Claims::new(subject, claims.roles().iter().cloned(), expires_at))
}

/// Signature and audience only; expiry is checked separately in `to_claims`
fn validation_for(header: &Header, expected_audiences: &[String]) -> Validation {
    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_audience(expected_audiences);
    validation
}

/// RSA and symmetric keys only; `k` of an `oct` key is base64url without padding
fn decoding_key_for(jwk: &Jwk) -> Result<DecodingKey> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) | AlgorithmParameters::OctetKey(_) => {
            Ok(DecodingKey::from_jwk(jwk)?)
        }
        other_algo => Err(Error::AlgorithmNotSupported(format!("{other_algo:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: Option<&str>, exp: i64) -> AccessTokenClaims {
        AccessTokenClaims {
            iss: "https://idp.example.com".to_string(),
            sub: sub.map(str::to_string),
            exp,
            roles: vec!["ROLE_USER".to_string()],
        }
    }

    #[test]
    fn live_token_converts_to_claims() {
        let now = Utc::now();
        let exp = now.timestamp() + 3600;
        let result = to_claims(&claims(Some("alice"), exp), "https://idp.example.com", now).unwrap();

        assert_eq!(result.subject(), "alice");
        assert!(result.roles().contains("ROLE_USER"));
        assert_eq!(result.expires_at().timestamp(), exp);
    }

    #[test]
    fn expired_token_is_rejected_after_verification() {
        let now = Utc::now();
        let exp = now.timestamp() - 1;
        let result = to_claims(&claims(Some("alice"), exp), "https://idp.example.com", now);
        assert!(matches!(result, Err(Error::TokenExpired(e)) if e == exp));
    }

    #[test]
    fn missing_or_empty_subject_is_rejected() {
        let now = Utc::now();
        let exp = now.timestamp() + 60;
        assert!(matches!(
            to_claims(&claims(None, exp), "https://idp.example.com", now),
            Err(Error::SubjectMissing)
        ));
        assert!(matches!(
            to_claims(&claims(Some(""), exp), "https://idp.example.com", now),
            Err(Error::SubjectMissing)
        ));
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let now = Utc::now();
        let result = to_claims(&claims(Some("alice"), now.timestamp() + 60), "https://other", now);
        assert!(matches!(result, Err(Error::WrongIssuer(_))));
    }

    fn jwk_from(value: serde_json::Value) -> Jwk {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn octet_key_accepts_base64url_secret() {
        let jwk = jwk_from(serde_json::json!({
            "kty": "oct",
            "kid": "hmac-1",
            "k": "AyM1SysPpbyDfgZld3umj1qzKObwVMkoqQ-EstJQLr_T-1qS0gZH75aKtMN3Yj0iPS4hcgUuTwjAzZr1Z9CAow"
        }));

        assert!(decoding_key_for(&jwk).is_ok());
    }

    #[test]
    fn octet_key_verifies_hmac_signature() {
        // bytes fb ff bf 00 encode to "-_-_AA" in base64url
        let secret = [0xfb, 0xff, 0xbf, 0x00];
        let jwk = jwk_from(serde_json::json!({ "kty": "oct", "kid": "hmac-1", "k": "-_-_AA" }));

        let mut header = Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some("hmac-1".to_string());
        let token = jsonwebtoken::encode(
            &header,
            &serde_json::json!({
                "iss": "https://idp.example.com",
                "sub": "alice",
                "aud": "app",
                "exp": Utc::now().timestamp() + 60,
            }),
            &jsonwebtoken::EncodingKey::from_secret(&secret),
        )
        .unwrap();

        let key = decoding_key_for(&jwk).unwrap();
        let validation = validation_for(&header, &["app".to_string()]);
        let decoded = decode::<AccessTokenClaims>(&token, &key, &validation).unwrap();

        assert_eq!(decoded.claims.sub.as_deref(), Some("alice"));
    }

    #[test]
    fn elliptic_curve_key_is_not_supported() {
        let jwk = jwk_from(serde_json::json!({
            "kty": "EC",
            "kid": "ec-1",
            "crv": "P-256",
            "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
            "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFyM"
        }));

        let err = decoding_key_for(&jwk).err().unwrap();

        assert!(matches!(&err, Error::AlgorithmNotSupported(_)));
        assert!(!err.to_string().contains('\\'));
    }

    #[test]
    fn validation_leaves_expiry_to_the_extractor() {
        let header = Header::new(jsonwebtoken::Algorithm::RS256);
        let validation = validation_for(&header, &["app".to_string()]);
        assert!(!validation.validate_exp);
    }
}
