//! Integration tests for Mini App init data verification.
//!
//! Every payload here carries a real HMAC-SHA256 signature for the test
//! bot token, precomputed over the documented data-check string, so the
//! tests exercise the actual crypto path and not a mocked comparison.

use kopilka::telegram::webapp_auth::{verify, verify_user, InitDataError};

const TOKEN: &str = "123:ABC";

/// Minimal payload: auth_date + user.
const SIGNED_MINIMAL: &str = "auth_date=1700000000&user=%7B%22id%22%3A42%7D&hash=9d6cda6285c707ee8542a190bb9984c6ddd322e018aa8a9bed33da139a56839c";

/// Full payload shaped like a real Telegram launch: query_id, a user
/// object with extra fields the decoder must tolerate, auth_date.
const SIGNED_FULL: &str = "query_id=AAHdF6IQAAAAAN0XohDhrOrc&user=%7B%22id%22%3A99281932%2C%22first_name%22%3A%22Andrew%22%2C%22last_name%22%3A%22Rogue%22%2C%22username%22%3A%22rogue%22%2C%22language_code%22%3A%22en%22%2C%22is_premium%22%3Atrue%7D&auth_date=1662771648&hash=9f70496a34fa150f2224e2c004b9766d304f93bdbe34f7f78470579b316f8564";

/// Correctly signed, but the user field is not JSON.
const SIGNED_BAD_USER: &str =
    "auth_date=1700000000&user=not-json&hash=599ce92e2ba5790df1ab02822c51343514821a364d173447ccdc672cfe60ee72";

/// Correctly signed, no user field at all.
const SIGNED_NO_USER: &str =
    "auth_date=1700000000&query_id=AAA&hash=1ddfbaa13b2767ab7551742555ccb5a6677cbcd785e5fd11e7a15230eb2dd149";

#[test]
fn accepts_genuine_payload() {
    let data = verify(SIGNED_MINIMAL, TOKEN).expect("signature should check out");
    assert_eq!(data.auth_date(), Some(1_700_000_000));

    let user = data.user().expect("user field should decode");
    assert_eq!(user.id, 42);
}

#[test]
fn decodes_full_user_object() {
    let user = verify_user(SIGNED_FULL, TOKEN).expect("full payload should verify");
    assert_eq!(user.id, 99_281_932);
    assert_eq!(user.first_name, "Andrew");
    assert_eq!(user.last_name.as_deref(), Some("Rogue"));
    assert_eq!(user.username.as_deref(), Some("rogue"));
    assert_eq!(user.language_code.as_deref(), Some("en"));
}

#[test]
fn verification_is_deterministic() {
    for _ in 0..3 {
        assert!(verify(SIGNED_FULL, TOKEN).is_ok());
    }
}

#[test]
fn field_order_does_not_affect_the_hash() {
    // Same fields as SIGNED_FULL, shuffled.
    let reordered = "auth_date=1662771648&hash=9f70496a34fa150f2224e2c004b9766d304f93bdbe34f7f78470579b316f8564&user=%7B%22id%22%3A99281932%2C%22first_name%22%3A%22Andrew%22%2C%22last_name%22%3A%22Rogue%22%2C%22username%22%3A%22rogue%22%2C%22language_code%22%3A%22en%22%2C%22is_premium%22%3Atrue%7D&query_id=AAHdF6IQAAAAAN0XohDhrOrc";
    assert!(verify(reordered, TOKEN).is_ok());
}

#[test]
fn any_tampered_field_invalidates_the_signature() {
    // Bump the auth_date.
    let tampered = SIGNED_MINIMAL.replace("1700000000", "1700000001");
    assert_eq!(verify(&tampered, TOKEN).unwrap_err(), InitDataError::HashMismatch);

    // Swap the user id.
    let tampered = SIGNED_MINIMAL.replace("%22id%22%3A42", "%22id%22%3A43");
    assert_eq!(verify(&tampered, TOKEN).unwrap_err(), InitDataError::HashMismatch);

    // Graft an extra field onto a signed payload.
    let tampered = format!("{SIGNED_MINIMAL}&is_admin=1");
    assert_eq!(verify(&tampered, TOKEN).unwrap_err(), InitDataError::HashMismatch);
}

#[test]
fn wrong_bot_token_is_rejected() {
    assert_eq!(
        verify(SIGNED_MINIMAL, "456:DEF").unwrap_err(),
        InitDataError::HashMismatch
    );
}

#[test]
fn absent_and_wrong_hash_are_indistinguishable() {
    let no_hash = "auth_date=1700000000&user=%7B%22id%22%3A42%7D";
    let bad_hash = format!("{no_hash}&hash={}", "0".repeat(64));
    let short_hash = format!("{no_hash}&hash=deadbeef");
    let non_hex_hash = format!("{no_hash}&hash={}", "z".repeat(64));

    for payload in [no_hash.to_string(), bad_hash, short_hash, non_hex_hash] {
        assert_eq!(
            verify(&payload, TOKEN).unwrap_err(),
            InitDataError::HashMismatch,
            "payload: {payload}"
        );
    }
}

#[test]
fn empty_payload_is_reported_as_missing() {
    assert_eq!(verify("", TOKEN).unwrap_err(), InitDataError::MissingPayload);
    assert_eq!(verify("   ", TOKEN).unwrap_err(), InitDataError::MissingPayload);
}

#[test]
fn signed_but_unparseable_user_is_malformed_not_mismatch() {
    // Signature passes...
    let data = verify(SIGNED_BAD_USER, TOKEN).expect("payload is genuinely signed");
    // ...but the user decode reports its own error.
    assert_eq!(data.user().unwrap_err(), InitDataError::MalformedUser);
}

#[test]
fn signed_payload_without_user_is_malformed() {
    assert_eq!(
        verify_user(SIGNED_NO_USER, TOKEN).unwrap_err(),
        InitDataError::MalformedUser
    );
}

#[test]
fn age_uses_the_caller_supplied_clock() {
    let data = verify(SIGNED_MINIMAL, TOKEN).unwrap();
    assert_eq!(data.age(1_700_086_400), Some(86_400));
    // A clock behind auth_date yields a negative age; the caller decides
    // what to do with it.
    assert_eq!(data.age(1_699_999_990), Some(-10));
}
