// JWT token codec
// Decision: HS256 with a single server-held key, nothing is stored server-side
// Decision: Every issued token carries a `typ` claim so access and refresh tokens cannot be cross-used
// Decision: Expiry is checked by hand after the signature, with no leeway

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::config::JwtConfig;
use crate::error::TokenError;
use crate::identity::Role;

/// Kind of token, carried in the `typ` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (username)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<TokenKind>,
    /// Role names; access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    /// Any other claims supplied at issuance
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Issues and verifies signed, time-bounded tokens
#[derive(Clone)]
pub struct TokenCodec {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.signing_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.signing_key.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Build and sign a claim set `{sub, iat, exp, ..extra_claims}`.
    ///
    /// `sub`, `iat` and `exp` always win over same-named entries in
    /// `extra_claims`. `iat` and `exp` are whole Unix seconds, truncated
    /// independently, so a sub-second `ttl` may yield a token that is already
    /// expired. A zero or negative `ttl` always does.
    pub fn issue(
        &self,
        subject: &str,
        extra_claims: Map<String, Value>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Encoding("token lifetime out of range".to_string()))?;

        let mut claims = extra_claims;
        claims.insert("sub".to_string(), Value::from(subject));
        claims.insert("iat".to_string(), Value::from(now.timestamp()));
        claims.insert("exp".to_string(), Value::from(exp.timestamp()));

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature, then expiry.
    ///
    /// The signature is checked over the exact received payload before any
    /// claim is trusted; expiry is evaluated only once that succeeds.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| classify(e.kind()))?;

        if data.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    /// Verify a token and require a specific kind
    pub fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let claims = self.verify(token)?;
        match claims.typ {
            Some(found) if found == kind => Ok(claims),
            Some(found) => Err(TokenError::WrongKind {
                expected: kind,
                found,
            }),
            None => Err(TokenError::Malformed),
        }
    }

    /// Subject of a verified token
    pub fn subject_of(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token).map(|claims| claims.sub)
    }

    /// Access token: short-lived, carries the role claim
    pub fn issue_access(&self, username: &str, role: Role) -> Result<String, TokenError> {
        let mut claims = Map::new();
        claims.insert("typ".to_string(), Value::from(TokenKind::Access.as_str()));
        claims.insert("roles".to_string(), Value::from(vec![role.as_str()]));
        self.issue(username, claims, to_ttl(self.config.access_token_lifetime)?)
    }

    /// Refresh token: long-lived, no role claim
    pub fn issue_refresh(&self, username: &str) -> Result<String, TokenError> {
        let mut claims = Map::new();
        claims.insert("typ".to_string(), Value::from(TokenKind::Refresh.as_str()));
        self.issue(username, claims, to_ttl(self.config.refresh_token_lifetime)?)
    }

    pub fn access_token_lifetime(&self) -> std::time::Duration {
        self.config.access_token_lifetime
    }

    pub fn refresh_token_lifetime(&self) -> std::time::Duration {
        self.config.refresh_token_lifetime
    }
}

fn to_ttl(lifetime: std::time::Duration) -> Result<Duration, TokenError> {
    Duration::from_std(lifetime).map_err(|e| TokenError::Encoding(e.to_string()))
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigningKey;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use serde_json::json;
    use std::time::Duration as StdDuration;

    fn test_config(seed: u8) -> JwtConfig {
        JwtConfig {
            signing_key: SigningKey::from_bytes(vec![seed; 32]).unwrap(),
            access_token_lifetime: StdDuration::from_secs(900), // 15 minutes
            refresh_token_lifetime: StdDuration::from_secs(86400), // 1 day
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(test_config(42))
    }

    fn parts(token: &str) -> Vec<String> {
        token.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = codec();
        let token = codec.issue("alice", Map::new(), Duration::minutes(5)).unwrap();

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, 300);
        assert!(claims.typ.is_none());
        assert!(claims.roles.is_none());
        assert_eq!(codec.subject_of(&token).unwrap(), "alice");
    }

    #[test]
    fn test_extra_claims_survive_but_reserved_claims_win() {
        let codec = codec();
        let mut extra = Map::new();
        extra.insert("team".to_string(), json!("blue"));
        extra.insert("sub".to_string(), json!("mallory"));
        extra.insert("exp".to_string(), json!(i64::MAX));

        let token = codec.issue("alice", extra, Duration::minutes(1)).unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, 60);
        assert_eq!(claims.extra.get("team"), Some(&json!("blue")));
    }

    #[test]
    fn test_zero_and_negative_ttl_are_expired() {
        let codec = codec();
        for ttl in [Duration::zero(), Duration::seconds(-1), Duration::days(-3)] {
            let token = codec.issue("alice", Map::new(), ttl).unwrap();
            assert_eq!(codec.verify(&token), Err(TokenError::Expired));
        }
    }

    #[test]
    fn test_timestamps_are_whole_seconds() {
        let codec = codec();
        let token = codec
            .issue("alice", Map::new(), Duration::milliseconds(500))
            .unwrap();

        let payload = URL_SAFE_NO_PAD.decode(&parts(&token)[1]).unwrap();
        let claims: Value = serde_json::from_slice(&payload).unwrap();
        let iat = claims["iat"].as_i64().unwrap();
        let exp = claims["exp"].as_i64().unwrap();
        assert!((0..=1).contains(&(exp - iat)), "iat={iat} exp={exp}");
    }

    #[test]
    fn test_tampered_payload_fails_signature() {
        let codec = codec();
        let token = codec.issue_access("alice", Role::Member).unwrap();
        let mut p = parts(&token);

        let payload = URL_SAFE_NO_PAD.decode(&p[1]).unwrap();
        let forged = String::from_utf8(payload)
            .unwrap()
            .replace("MEMBER", "ADMIN");
        p[1] = URL_SAFE_NO_PAD.encode(forged);

        assert_eq!(codec.verify(&p.join(".")), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_signature_fails() {
        let codec = codec();
        let token = codec.issue_access("alice", Role::Admin).unwrap();
        let mut p = parts(&token);

        let mut sig: Vec<char> = p[2].chars().collect();
        sig[10] = if sig[10] == 'A' { 'B' } else { 'A' };
        p[2] = sig.into_iter().collect();

        let result = codec.verify(&p.join("."));
        assert!(matches!(
            result,
            Err(TokenError::BadSignature) | Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_every_single_byte_mutation_is_rejected() {
        let codec = codec();
        let token = codec.issue_access("alice", Role::Admin).unwrap();
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            if bytes[i] == b'.' {
                continue;
            }
            let mut mutated = bytes.to_vec();
            mutated[i] = if mutated[i] == b'x' { b'y' } else { b'x' };
            let mutated = String::from_utf8(mutated).unwrap();
            assert!(
                codec.verify(&mutated).is_err(),
                "mutation at byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_other_key_fails_signature() {
        let token = codec().issue("alice", Map::new(), Duration::minutes(5)).unwrap();
        let other = TokenCodec::new(test_config(7));
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_expired_token_with_bad_signature_reports_signature() {
        let token = codec().issue("alice", Map::new(), Duration::seconds(-60)).unwrap();
        let other = TokenCodec::new(test_config(7));
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify("invalid-token"), Err(TokenError::Malformed));
        assert_eq!(codec.verify(""), Err(TokenError::Malformed));
        assert_eq!(codec.verify("a.b.c"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"alice","iat":0,"exp":99999999999}"#);
        let token = format!("{}.{}.", header, payload);
        assert!(codec().verify(&token).is_err());
    }

    #[test]
    fn test_access_token_claims() {
        let codec = codec();
        let token = codec.issue_access("alice", Role::Admin).unwrap();
        let claims = codec.verify_kind(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.typ, Some(TokenKind::Access));
        assert_eq!(claims.roles, Some(vec!["ADMIN".to_string()]));
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_has_no_roles() {
        let codec = codec();
        let token = codec.issue_refresh("alice").unwrap();
        let claims = codec.verify_kind(&token, TokenKind::Refresh).unwrap();
        assert_eq!(claims.typ, Some(TokenKind::Refresh));
        assert!(claims.roles.is_none());
        assert_eq!(claims.exp - claims.iat, 86400);
    }

    #[test]
    fn test_wrong_token_kind() {
        let codec = codec();
        let access = codec.issue_access("alice", Role::Member).unwrap();
        let refresh = codec.issue_refresh("alice").unwrap();

        assert_eq!(
            codec.verify_kind(&access, TokenKind::Refresh),
            Err(TokenError::WrongKind {
                expected: TokenKind::Refresh,
                found: TokenKind::Access
            })
        );
        assert_eq!(
            codec.verify_kind(&refresh, TokenKind::Access),
            Err(TokenError::WrongKind {
                expected: TokenKind::Access,
                found: TokenKind::Refresh
            })
        );
    }

    #[test]
    fn test_untyped_token_is_not_a_session_token() {
        let codec = codec();
        let token = codec.issue("alice", Map::new(), Duration::minutes(5)).unwrap();
        assert_eq!(
            codec.verify_kind(&token, TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }
}
