//! Coverage of the webhook delivery contract (spec §4.4): a merchant
//! endpoint must be able to recompute the `X-Signature` header from the
//! raw body and the shared secret, independent of however the dispatcher
//! happened to serialize the payload.

use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zcash_x402_facilitator::webhook::signer::{build_headers, sign};

#[tokio::test]
async fn a_signed_delivery_verifies_against_the_shared_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/payments"))
        .and(header_exists("X-Signature"))
        .and(header_exists("X-Timestamp"))
        .and(header_exists("X-Delivery-Id"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let secret = "merchant-webhook-secret";
    let body = br#"{"id":"11111111-1111-1111-1111-111111111111","type":"payment.settled"}"#;
    let now_seconds = 1_800_000_000u64;
    let headers = build_headers(secret, now_seconds, body, "payment.settled", "delivery-1");

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/hooks/payments", server.uri()))
        .header("X-Signature", headers.signature.clone())
        .header("X-Timestamp", headers.timestamp.clone())
        .header("X-Delivery-Id", headers.delivery_id.clone())
        .body(body.to_vec())
        .send()
        .await
        .expect("mock server should accept the delivery");

    assert!(response.status().is_success());

    // The receiving merchant recomputes the tag exactly this way: it has no
    // access to anything but the raw body, the timestamp header, and its
    // own copy of the secret.
    let expected = sign(secret, now_seconds, body);
    assert_eq!(headers.signature, expected);
}

#[tokio::test]
async fn a_tampered_body_fails_verification() {
    let secret = "merchant-webhook-secret";
    let original_body = br#"{"id":"1","type":"payment.settled"}"#;
    let tampered_body = br#"{"id":"1","type":"payment.refunded"}"#;
    let now_seconds = 1_800_000_000u64;

    let headers = build_headers(secret, now_seconds, original_body, "payment.settled", "d1");
    let recomputed_on_tampered = sign(secret, now_seconds, tampered_body);

    assert_ne!(headers.signature, recomputed_on_tampered);
}
