//! Token codec contract tests
//!
//! Exercise the public issue/validate surface the way services use it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use token_codec::{issue, validate, Claims, TokenError};

const SECRET: &[u8] = b"integration-secret-that-is-long-enough!!";

#[test]
fn test_round_trip_preserves_identity_fields() {
    let long_name = "x".repeat(4096);
    let identities: &[(i64, &str, &str)] = &[
        (0, "", ""),
        (1, "a", "a@x.com"),
        (42, "alice", "a@x.com"),
        (-17, "négatif", "neg@example.org"),
        (i64::MAX, "max", "max@example.com"),
        (i64::MIN, "min", "min@example.com"),
        (9_007_199_254_740_993, "beyond-f64", "precise@example.com"),
        (5, "名前", "unicode+tag@例え.jp"),
        (6, long_name.as_str(), "long@example.com"),
    ];

    for &(id, username, email) in identities {
        let token = issue(id, username, email, SECRET, Duration::hours(1))
            .unwrap_or_else(|e| panic!("issue failed for {id}: {e}"));
        let claims = validate(&token, SECRET)
            .unwrap_or_else(|e| panic!("validate failed for {id}: {e}"));

        assert_eq!(claims.user_id, id);
        assert_eq!(claims.username, username);
        assert_eq!(claims.email, email);
    }
}

#[test]
fn test_zero_ttl_always_expired() {
    for id in [1_i64, 2, 3, 1000] {
        let token = issue(id, "user", "user@example.com", SECRET, Duration::zero()).unwrap();
        assert_eq!(validate(&token, SECRET), Err(TokenError::Expired));
    }
}

#[test]
fn test_foreign_secret_never_validates() {
    let token = issue(42, "alice", "a@x.com", SECRET, Duration::hours(1)).unwrap();

    for other in [
        b"integration-secret-that-is-long-enough!?".as_slice(),
        b"".as_slice(),
        b"short".as_slice(),
    ] {
        assert_eq!(validate(&token, other), Err(TokenError::BadSignature));
    }
}

#[test]
fn test_tampered_payload_rejected() {
    let token = issue(42, "alice", "a@x.com", SECRET, Duration::hours(1)).unwrap();
    let mut parts: Vec<&str> = token.split('.').collect();

    let forged_claims = Claims {
        user_id: 1,
        username: "admin".to_string(),
        email: "admin@x.com".to_string(),
        iat: 0,
        exp: i64::from(u32::MAX),
    };
    let forged = base64_url(&serde_json::to_vec(&forged_claims).unwrap());
    parts[1] = &forged;

    let result = validate(&parts.join("."), SECRET);
    assert_eq!(result, Err(TokenError::BadSignature));
}

#[test]
fn test_truncated_token_is_malformed() {
    let token = issue(42, "alice", "a@x.com", SECRET, Duration::hours(1)).unwrap();
    let head: String = token.split('.').take(2).collect::<Vec<_>>().join(".");
    assert_eq!(validate(&head, SECRET), Err(TokenError::Malformed));
}

fn base64_url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
