//! Claim normalization
//!
//! Identity providers often namespace custom claims with a vendor URI, e.g.
//! `https://example.com/roles`. The normalizer rewrites such keys to their
//! configured short names (`roles`) so the rest of the gate only deals with
//! canonical claim keys.

use crate::types::Claims;
use tracing::debug;

/// Rewrites vendor-prefixed "meta" claims to their canonical short names
#[derive(Debug, Clone, Default)]
pub struct ClaimNormalizer {
    /// Meta claim short names, processed in order
    metas: Vec<String>,
}

impl ClaimNormalizer {
    /// Create a normalizer for the given meta claim short names
    pub fn new<I, S>(metas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metas: metas
                .into_iter()
                .map(Into::into)
                .map(|meta| meta.trim().to_string())
                .filter(|meta| !meta.is_empty())
                .collect(),
        }
    }

    /// Configured meta claim short names
    pub fn metas(&self) -> &[String] {
        &self.metas
    }

    /// Normalize `claims`.
    ///
    /// For each meta name the first key ending (case-insensitively) in
    /// `/<meta>` is moved to the canonical key `<meta>`, overwriting any value
    /// already stored there. Already-canonical claims pass through unchanged.
    pub fn normalize(&self, mut claims: Claims) -> Claims {
        for meta in &self.metas {
            let suffix = format!("/{}", meta.to_lowercase());
            let found = claims
                .keys()
                .find(|key| key.to_lowercase().ends_with(&suffix))
                .cloned();

            if let Some(key) = found {
                if let Some(value) = claims.remove(&key) {
                    debug!(from = %key, to = %meta, "Mapped meta claim");
                    claims.insert(meta.clone(), value);
                }
            }
        }

        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn claims(value: Value) -> Claims {
        match value {
            Value::Object(map) => map,
            _ => panic!("claims fixture must be an object"),
        }
    }

    #[test]
    fn test_maps_vendor_prefixed_claim() {
        let normalizer = ClaimNormalizer::new(["roles"]);
        let out = normalizer.normalize(claims(json!({
            "sub": "bob",
            "https://example.com/Roles": ["admin"],
        })));

        assert_eq!(out.get("roles"), Some(&json!(["admin"])));
        assert!(!out.contains_key("https://example.com/Roles"));
        assert_eq!(out.get("sub"), Some(&json!("bob")));
    }

    #[test]
    fn test_overwrites_existing_canonical_key() {
        let normalizer = ClaimNormalizer::new(["role"]);
        let out = normalizer.normalize(claims(json!({
            "role": "visitor",
            "https://example.com/role": "admin",
        })));

        assert_eq!(out.get("role"), Some(&json!("admin")));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_no_metas_passes_through() {
        let input = claims(json!({"https://example.com/role": "admin"}));
        let out = ClaimNormalizer::default().normalize(input.clone());
        assert_eq!(out, input);
    }

    #[test]
    fn test_requires_slash_boundary() {
        let normalizer = ClaimNormalizer::new(["role"]);
        let input = claims(json!({"userrole": "admin"}));
        assert_eq!(normalizer.normalize(input.clone()), input);
    }

    #[test]
    fn test_blank_meta_names_ignored() {
        let normalizer = ClaimNormalizer::new([" role ", ""]);
        assert_eq!(normalizer.metas(), ["role".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            role in "[a-z]{1,8}",
            scope in "[a-z]{1,6}:[a-z]{1,6}",
            prefix in "https://[a-z]{1,8}\\.com",
        ) {
            let normalizer = ClaimNormalizer::new(["role", "scope"]);
            let input = claims(json!({
                format!("{}/role", prefix): role,
                format!("{}/scope", prefix): scope,
                "sub": "subject",
            }));

            let once = normalizer.normalize(input);
            let twice = normalizer.normalize(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
