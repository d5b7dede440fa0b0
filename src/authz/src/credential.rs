//! Credential verification
//!
//! Pulls the bearer token out of a request, checks it and returns its
//! normalized claims. HMAC secrets verify HS256 tokens; a PEM-encoded RSA
//! public key verifies RS256 tokens. Without any key material, claims are only
//! decoded when unverified decoding was switched on explicitly.

use crate::claims::ClaimNormalizer;
use crate::error::{AuthzError, Result};
use crate::types::Claims;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::fmt;
use tracing::{debug, warn};

/// Header carrying the bearer token
pub const AUTHORIZATION: &str = "authorization";

const BEARER_PREFIX: &str = "Bearer ";

/// Read access to the parts of an incoming request the gate needs
pub trait RequestParts {
    /// Header value by case-insensitive name
    fn header(&self, name: &str) -> Option<&str>;

    /// Cookie value by name
    fn cookie(&self, _name: &str) -> Option<&str> {
        None
    }
}

/// Verifies bearer credentials and normalizes their claims
#[derive(Clone)]
pub struct CredentialVerifier {
    /// Key and validation rules, when a secret is configured
    key: Option<(DecodingKey, Validation)>,

    /// Decode claims without a signature check when no key is configured
    allow_unverified: bool,

    /// Cookie consulted when the authorization header is missing
    cookie_name: Option<String>,

    normalizer: ClaimNormalizer,
}

impl CredentialVerifier {
    /// Create a verifier for `secret`.
    ///
    /// A secret starting with `-----BEGIN` is read as an RSA public key and
    /// only admits RS256; anything else is an HMAC key admitting HS256.
    ///
    /// # Errors
    ///
    /// [`AuthzError::Config`] when the PEM key cannot be parsed.
    pub fn new(secret: Option<&str>) -> Result<Self> {
        let key = match secret.map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(pem) if pem.starts_with("-----BEGIN") => {
                let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| AuthzError::Config(format!("invalid RSA public key: {}", e)))?;
                Some((key, validation(Algorithm::RS256)))
            }
            Some(secret) => Some((
                DecodingKey::from_secret(secret.as_bytes()),
                validation(Algorithm::HS256),
            )),
        };

        Ok(Self {
            key,
            allow_unverified: false,
            cookie_name: None,
            normalizer: ClaimNormalizer::default(),
        })
    }

    /// Decode claims without verification when no secret is configured
    pub fn allow_unverified(mut self, allow: bool) -> Self {
        self.allow_unverified = allow;
        self
    }

    /// Fall back to the cookie `name` when no authorization header is sent
    pub fn with_cookie_fallback(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    /// Clock skew tolerated on `exp` and `nbf`, in seconds
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        if let Some((_, validation)) = &mut self.key {
            validation.leeway = leeway_secs;
        }
        self
    }

    /// Normalize verified claims with `normalizer`
    pub fn with_normalizer(mut self, normalizer: ClaimNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Algorithm accepted for signed tokens, `None` without a key
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.key
            .as_ref()
            .and_then(|(_, validation)| validation.algorithms.first().copied())
    }

    /// Bearer token of `request`, with any `Bearer ` prefix removed
    pub fn extract<'r, R>(&self, request: &'r R) -> Option<&'r str>
    where
        R: RequestParts + ?Sized,
    {
        let raw = match request.header(AUTHORIZATION) {
            Some(value) => value,
            None => request.cookie(self.cookie_name.as_deref()?)?,
        };

        let token = raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw).trim();
        (!token.is_empty()).then_some(token)
    }

    /// Verify the credential carried by `request`
    ///
    /// # Errors
    ///
    /// - [`AuthzError::NoCredential`] when the request carries no token
    /// - [`AuthzError::CredentialExpired`] when the token is past its expiry
    /// - [`AuthzError::CredentialInvalid`] for any other verification failure
    pub fn verify<R>(&self, request: &R) -> Result<Claims>
    where
        R: RequestParts + ?Sized,
    {
        let token = self.extract(request).ok_or_else(|| {
            debug!("No credential on request");
            AuthzError::NoCredential
        })?;

        let claims = self.verify_token(token)?;
        Ok(self.normalizer.normalize(claims))
    }

    /// Verify a bare token and return its claims as issued
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        match &self.key {
            Some((key, validation)) => decode::<Claims>(token, key, validation)
                .map(|data| data.claims)
                .map_err(|e| {
                    let err = match e.kind() {
                        ErrorKind::ExpiredSignature => AuthzError::CredentialExpired,
                        _ => AuthzError::CredentialInvalid,
                    };
                    warn!(kind = err.kind(), reason = %e, "Credential rejected");
                    err
                }),
            None if self.allow_unverified => decode_unverified(token),
            None => {
                warn!("No verification key configured and unverified decoding is disabled");
                Err(AuthzError::CredentialInvalid)
            }
        }
    }
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("algorithm", &self.algorithm())
            .field("allow_unverified", &self.allow_unverified)
            .field("cookie_name", &self.cookie_name)
            .field("normalizer", &self.normalizer)
            .finish()
    }
}

fn validation(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    // Claims are application-defined; only `exp`/`nbf` are checked when present.
    validation.required_spec_claims.clear();
    validation.validate_aud = false;
    validation.leeway = 0;
    validation
}

/// Read the payload segment without checking the signature
fn decode_unverified(token: &str) -> Result<Claims> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload)) = (parts.next(), parts.next()) else {
        return Err(AuthzError::CredentialInvalid);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthzError::CredentialInvalid)?;

    serde_json::from_slice(&bytes).map_err(|e| {
        warn!(reason = %e, "Unverified credential payload is not a JSON object");
        AuthzError::CredentialInvalid
    })
}
