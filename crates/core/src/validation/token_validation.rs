use std::sync::Arc;

use authlane_common::jwt::at_hash;
use authlane_common::{constant_time_eq, Clock};
use authlane_domain::constants::REFRESH_TOKEN_NONCE_PLACEHOLDER;
use serde_json::Value;
use tracing::debug;

/// Individual id-token and response checks.
///
/// Every method returns `true` when the check passes.
pub struct TokenValidationService {
    clock: Arc<dyn Clock>,
}

impl TokenValidationService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// The `state` returned by the STS equals the one issued.
    #[must_use]
    pub fn validate_state_from_hash_callback(
        &self,
        state: Option<&str>,
        local_state: Option<&str>,
    ) -> bool {
        match (state, local_state) {
            (Some(state), Some(local)) if !local.is_empty() => constant_time_eq(local, state),
            _ => {
                debug!("state or local state missing");
                false
            }
        }
    }

    /// The id-token nonce equals the stored one. Refresh responses may
    /// omit the nonce, or skip the check when configured to.
    #[must_use]
    pub fn validate_id_token_nonce(
        &self,
        claims: &Value,
        local_nonce: Option<&str>,
        ignore_nonce_after_refresh: bool,
    ) -> bool {
        let token_nonce = claims.get("nonce").and_then(Value::as_str);
        let is_from_refresh_token = (token_nonce.is_none() || ignore_nonce_after_refresh)
            && local_nonce == Some(REFRESH_TOKEN_NONCE_PLACEHOLDER);
        if is_from_refresh_token {
            return true;
        }
        match (token_nonce, local_nonce) {
            (Some(token), Some(local)) => constant_time_eq(local, token),
            _ => false,
        }
    }

    /// `iss`, `sub`, `aud`, `exp` and `iat` are all present.
    #[must_use]
    pub fn validate_required_id_token(&self, claims: &Value) -> bool {
        ["iss", "sub", "aud", "exp", "iat"].iter().all(|claim| {
            let present = claims.get(claim).is_some_and(|value| !value.is_null());
            if !present {
                debug!(claim, "id token is missing a required claim");
            }
            present
        })
    }

    /// `iat` lies within `max_offset_seconds` of now, in either direction.
    #[must_use]
    pub fn validate_id_token_iat_max_offset(
        &self,
        claims: &Value,
        max_offset_seconds: i64,
        disable_iat_offset_validation: bool,
    ) -> bool {
        if disable_iat_offset_validation {
            return true;
        }
        let Some(iat) = numeric(claims, "iat") else {
            return false;
        };
        self.clock.unix_seconds().saturating_sub(iat).saturating_abs() < max_offset_seconds
    }

    #[must_use]
    pub fn validate_id_token_iss(&self, claims: &Value, issuer: &str) -> bool {
        claims.get("iss").and_then(Value::as_str) == Some(issuer)
    }

    /// `aud` equals or contains the client id.
    #[must_use]
    pub fn validate_id_token_aud(&self, claims: &Value, client_id: &str) -> bool {
        match claims.get("aud") {
            Some(Value::Array(audiences)) => {
                audiences.iter().any(|aud| aud.as_str() == Some(client_id))
            }
            Some(Value::String(aud)) => aud == client_id,
            _ => false,
        }
    }

    /// Multiple audiences require an `azp` claim.
    #[must_use]
    pub fn validate_id_token_azp_exists_if_more_than_one_aud(&self, claims: &Value) -> bool {
        match claims.get("aud") {
            Some(Value::Array(audiences)) if audiences.len() > 1 => claims.get("azp").is_some(),
            _ => true,
        }
    }

    /// A present `azp` names the client.
    #[must_use]
    pub fn validate_id_token_azp_valid(&self, claims: &Value, client_id: &str) -> bool {
        match claims.get("azp") {
            None | Some(Value::Null) => true,
            Some(azp) => azp.as_str() == Some(client_id),
        }
    }

    /// `exp` lies after now plus `offset_seconds`.
    #[must_use]
    pub fn validate_id_token_exp_not_expired(&self, claims: &Value, offset_seconds: i64) -> bool {
        let deadline = self.clock.unix_seconds().saturating_add(offset_seconds);
        numeric(claims, "exp").is_some_and(|exp| exp > deadline)
    }

    /// The id-token `at_hash` binds the access token.
    #[must_use]
    pub fn validate_id_token_at_hash(&self, access_token: &str, expected: &str, alg: &str) -> bool {
        let computed = at_hash(access_token, alg);
        debug!(expected, computed, "at_hash comparison");
        constant_time_eq(expected, &computed)
    }

    /// After a refresh the new id-token must describe the same session as
    /// the previous one.
    #[must_use]
    pub fn validate_id_token_claims_after_refresh(
        &self,
        new_claims: &Value,
        previous: &Value,
    ) -> bool {
        let same = |claim: &str| new_claims.get(claim) == previous.get(claim);
        if !same("iss") || !same("sub") || !same("aud") {
            return false;
        }
        // auth_time may only be compared when both tokens carry it
        match (new_claims.get("auth_time"), previous.get("auth_time")) {
            (Some(new), Some(old)) => new == old,
            _ => true,
        }
    }
}

fn numeric(claims: &Value, claim: &str) -> Option<i64> {
    let value = claims.get(claim)?;
    value.as_i64().or_else(|| value.as_f64().map(|v| v as i64))
}

#[cfg(test)]
mod tests {
    use authlane_common::MockClock;
    use serde_json::json;

    use super::*;

    fn validator(now: i64) -> TokenValidationService {
        TokenValidationService::new(Arc::new(MockClock::at_unix(now)))
    }

    #[test]
    fn state_must_match_issued_value() {
        let v = validator(0);
        assert!(v.validate_state_from_hash_callback(Some("abc"), Some("abc")));
        assert!(!v.validate_state_from_hash_callback(Some("abc"), Some("abd")));
        assert!(!v.validate_state_from_hash_callback(None, Some("abc")));
        assert!(!v.validate_state_from_hash_callback(Some(""), Some("")));
    }

    #[test]
    fn nonce_rules_after_refresh() {
        let v = validator(0);
        let with_nonce = json!({"nonce": "n1"});
        let without = json!({});

        assert!(v.validate_id_token_nonce(&with_nonce, Some("n1"), false));
        assert!(!v.validate_id_token_nonce(&with_nonce, Some("n2"), false));
        assert!(v.validate_id_token_nonce(&without, Some(REFRESH_TOKEN_NONCE_PLACEHOLDER), false));
        let placeholder = Some(REFRESH_TOKEN_NONCE_PLACEHOLDER);
        assert!(!v.validate_id_token_nonce(&with_nonce, placeholder, false));
        assert!(v.validate_id_token_nonce(&with_nonce, placeholder, true));
        assert!(!v.validate_id_token_nonce(&without, Some("n1"), true));
    }

    #[test]
    fn iat_offset_is_symmetric() {
        let v = validator(1_000);
        assert!(v.validate_id_token_iat_max_offset(&json!({"iat": 950}), 120, false));
        assert!(v.validate_id_token_iat_max_offset(&json!({"iat": 1_100}), 120, false));
        assert!(!v.validate_id_token_iat_max_offset(&json!({"iat": 800}), 120, false));
        assert!(v.validate_id_token_iat_max_offset(&json!({"iat": 0}), 120, true));
        assert!(!v.validate_id_token_iat_max_offset(&json!({"iat": i64::MIN}), 120, false));
    }

    #[test]
    fn audience_and_azp_rules() {
        let v = validator(0);
        let multi = json!({"aud": ["spa", "api"]});
        assert!(v.validate_id_token_aud(&multi, "spa"));
        assert!(!v.validate_id_token_aud(&json!({"aud": "other"}), "spa"));
        assert!(!v.validate_id_token_azp_exists_if_more_than_one_aud(&multi));
        assert!(v.validate_id_token_azp_exists_if_more_than_one_aud(&json!({"aud": ["spa"]})));
        assert!(v.validate_id_token_azp_valid(&json!({}), "spa"));
        assert!(!v.validate_id_token_azp_valid(&json!({"azp": "api"}), "spa"));
    }

    #[test]
    fn expiry_honours_offset() {
        let v = validator(1_000);
        assert!(v.validate_id_token_exp_not_expired(&json!({"exp": 1_100}), 0));
        assert!(!v.validate_id_token_exp_not_expired(&json!({"exp": 1_100}), 100));
        assert!(!v.validate_id_token_exp_not_expired(&json!({}), 0));
        assert!(v.validate_id_token_exp_not_expired(&json!({"exp": i64::MAX}), 0));
        assert!(!v.validate_id_token_exp_not_expired(&json!({"exp": 1_100}), i64::MAX));
    }

    #[test]
    fn required_claims_detected() {
        let v = validator(0);
        let full = json!({"iss": "i", "sub": "s", "aud": "a", "exp": 1, "iat": 1});
        assert!(v.validate_required_id_token(&full));
        assert!(!v.validate_required_id_token(&json!({"iss": "i", "sub": "s"})));
    }

    #[test]
    fn refresh_must_keep_subject() {
        let v = validator(0);
        let previous = json!({"iss": "i", "sub": "alice", "aud": "spa", "auth_time": 5});
        assert!(v.validate_id_token_claims_after_refresh(
            &json!({"iss": "i", "sub": "alice", "aud": "spa"}),
            &previous
        ));
        assert!(!v.validate_id_token_claims_after_refresh(
            &json!({"iss": "i", "sub": "bob", "aud": "spa"}),
            &previous
        ));
        assert!(!v.validate_id_token_claims_after_refresh(
            &json!({"iss": "i", "sub": "alice", "aud": "spa", "auth_time": 9}),
            &previous
        ));
    }
}
