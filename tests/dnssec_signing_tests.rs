mod common;

use chrono::{TimeZone, Utc};
use common::*;
use dnssec_signer::dns::{DNSResource, DNSResourceClass, DNSResourceType, DomainName};
use dnssec_signer::dnssec::{
    KeyPair, ResponsePolicy, ResponseStatus, SignError, UnsignedFallback, ValidityPolicy,
    sign_rrset,
};
use std::time::Duration;

fn both_keys() -> Vec<KeyPair> {
    vec![load_fixture(RSA_KEY), load_fixture(ECDSA_KEY)]
}

fn a_rrset(owner: &str) -> Vec<DNSResource> {
    let owner: DomainName = owner.parse().unwrap();
    [[192, 0, 2, 1], [192, 0, 2, 2]]
        .into_iter()
        .map(|addr| {
            DNSResource::raw(
                owner.clone(),
                DNSResourceType::A,
                DNSResourceClass::IN,
                300,
                addr.to_vec(),
            )
        })
        .collect()
}

/// ECDSA signer placed behind the RSA public key
fn cross_wired_key() -> KeyPair {
    let (_, _, ecdsa_signer) = load_fixture(ECDSA_KEY).into_parts();
    let (owner, rsa_public, _) = load_fixture(RSA_KEY).into_parts();
    KeyPair::from_signer(owner, rsa_public, ecdsa_signer)
}

#[test]
fn test_rsa_dnskey_scenario() {
    let responder = responder(vec![load_fixture(RSA_KEY)], ResponsePolicy::default());

    let unsigned = responder.respond(&zone(), false).unwrap();
    assert_eq!(unsigned.status, ResponseStatus::Unsigned);
    assert_eq!(unsigned.answers.len(), 1);
    assert_eq!(unsigned.answers[0].rtype, DNSResourceType::DNSKEY);
    assert_ne!(unsigned.answers[0].as_dnskey().unwrap().key_tag(), 0);

    let now = Utc::now().timestamp() as u32;
    let signed = responder.respond(&zone(), true).unwrap();
    assert_eq!(signed.status, ResponseStatus::Signed);
    assert_eq!(signed.dnskeys().count(), 1);
    assert_eq!(signed.rrsigs().count(), 1);

    let rrsig = signed.rrsigs().next().unwrap().as_rrsig().unwrap();
    assert!(rrsig.inception <= now && now <= rrsig.expiration);
    assert_eq!(rrsig.signer_name.to_string(), "example.com.");
    assert_eq!(rrsig.key_tag, RSA_KEY_TAG);
    assert_eq!(rrsig.original_ttl, ResponsePolicy::DEFAULT_DNSKEY_TTL);
    assert_eq!(rrsig.signature.len(), 256);

    let dnskeys: Vec<DNSResource> = signed.dnskeys().cloned().collect();
    verify_rrsig(rrsig, dnskeys[0].as_dnskey().unwrap(), &dnskeys);
}

#[test]
fn test_no_signatures_without_do() {
    let responder = responder(both_keys(), ResponsePolicy::default());
    let reply = responder.respond(&zone(), false).unwrap();
    assert_eq!(reply.dnskeys().count(), 2);
    assert_eq!(reply.rrsigs().count(), 0);
}

#[test]
fn test_one_signature_per_key_in_key_order() {
    let responder = responder(both_keys(), ResponsePolicy::default());
    let reply = responder.respond(&zone(), true).unwrap();

    let tags: Vec<u16> = reply
        .rrsigs()
        .map(|rr| rr.as_rrsig().unwrap().key_tag)
        .collect();
    assert_eq!(tags, vec![RSA_KEY_TAG, ECDSA_KEY_TAG]);

    let dnskeys: Vec<DNSResource> = reply.dnskeys().cloned().collect();
    for (rr, key) in reply.rrsigs().zip(&dnskeys) {
        verify_rrsig(rr.as_rrsig().unwrap(), key.as_dnskey().unwrap(), &dnskeys);
    }
}

#[test]
fn test_rsa_signatures_are_deterministic() {
    let keys = vec![load_fixture(RSA_KEY)];
    let window = ValidityPolicy::default()
        .window_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        .unwrap();
    let rrset = a_rrset("www.example.com.");

    let first = sign_rrset(&rrset, &zone(), 300, window, &keys).unwrap();
    let second = sign_rrset(&rrset, &zone(), 300, window, &keys).unwrap();
    assert_eq!(first.signatures, second.signatures);
}

#[test]
fn test_ecdsa_signatures_verify() {
    let keys = vec![load_fixture(ECDSA_KEY)];
    let window = ValidityPolicy::default().current_window().unwrap();
    let rrset = a_rrset("www.example.com.");

    let first = sign_rrset(&rrset, &zone(), 300, window, &keys).unwrap();
    let second = sign_rrset(&rrset, &zone(), 300, window, &keys).unwrap();
    for outcome in [&first, &second] {
        let rrsig = outcome.signatures[0].as_rrsig().unwrap();
        assert_eq!(rrsig.signature.len(), 64);
        verify_rrsig(rrsig, keys[0].public_key(), &rrset);
    }
}

#[test]
fn test_every_algorithm_signs_verifiable_dnskey_set() {
    for (base, algorithm, key_tag) in ALL_KEYS {
        let responder = responder(vec![load_fixture(base)], ResponsePolicy::default());
        let reply = responder.respond(&zone(), true).unwrap();
        assert_eq!(reply.status, ResponseStatus::Signed, "{}", base);

        let rrsig = reply.rrsigs().next().unwrap().as_rrsig().unwrap();
        assert_eq!(rrsig.algorithm, algorithm);
        assert_eq!(rrsig.key_tag, key_tag);

        let dnskeys: Vec<DNSResource> = reply.dnskeys().cloned().collect();
        verify_rrsig(rrsig, dnskeys[0].as_dnskey().unwrap(), &dnskeys);
    }
}

#[test]
fn test_legacy_rsa_and_p384_sign_a_rrset() {
    let window = ValidityPolicy::default().current_window().unwrap();
    let rrset = a_rrset("www.example.com.");

    for (base, sig_len) in [
        (RSASHA1_KEY, 128),
        (RSA_1024_KEY, 128),
        (RSASHA512_KEY, 256),
        (ECDSA_P384_KEY, 96),
    ] {
        let keys = vec![load_fixture(base)];
        let outcome = sign_rrset(&rrset, &zone(), 300, window, &keys).unwrap();
        assert!(outcome.is_complete(), "{}: {:?}", base, outcome.failures);

        let rrsig = outcome.signatures[0].as_rrsig().unwrap();
        assert_eq!(rrsig.signature.len(), sig_len, "{}", base);
        verify_rrsig(rrsig, keys[0].public_key(), &rrset);
    }
}

#[test]
fn test_signature_covers_rrset_in_any_order_and_case() {
    let keys = vec![load_fixture(RSA_KEY)];
    let window = ValidityPolicy::default().current_window().unwrap();
    let rrset = a_rrset("www.example.com.");
    let outcome = sign_rrset(&rrset, &zone(), 300, window, &keys).unwrap();
    let rrsig = outcome.signatures[0].as_rrsig().unwrap();

    let mut shuffled = a_rrset("WWW.Example.COM.");
    shuffled.reverse();
    verify_rrsig(rrsig, keys[0].public_key(), &shuffled);
}

#[test]
fn test_wildcard_labels() {
    let keys = vec![load_fixture(ECDSA_KEY)];
    let window = ValidityPolicy::default().current_window().unwrap();
    let outcome =
        sign_rrset(&a_rrset("*.example.com."), &zone(), 300, window, &keys).unwrap();

    let record = &outcome.signatures[0];
    assert_eq!(record.name.to_string(), "*.example.com.");
    assert_eq!(record.as_rrsig().unwrap().labels, 2);
}

#[test]
fn test_signer_mismatch_does_not_stop_other_keys() {
    let keys = vec![cross_wired_key(), load_fixture(ECDSA_KEY)];
    let window = ValidityPolicy::default().current_window().unwrap();

    let outcome = sign_rrset(&a_rrset("www.example.com."), &zone(), 300, window, &keys).unwrap();
    assert_eq!(outcome.signatures.len(), 1);
    assert_eq!(outcome.signatures[0].as_rrsig().unwrap().key_tag, ECDSA_KEY_TAG);
    assert_eq!(outcome.failures.len(), 1);
    match &outcome.failures[0] {
        SignError::SigningFailure { key_tag, reason } => {
            assert_eq!(*key_tag, RSA_KEY_TAG);
            assert!(reason.contains("mismatch"), "{}", reason);
        }
        other => panic!("unexpected failure: {:?}", other),
    }
}

#[test]
fn test_fallback_refuse() {
    let policy = ResponsePolicy {
        fallback: UnsignedFallback::Refuse,
        ..Default::default()
    };
    let responder = responder(vec![cross_wired_key()], policy);
    assert!(matches!(
        responder.respond(&zone(), true),
        Err(SignError::SigningUnavailable(_))
    ));
}

#[test]
fn test_fallback_allow_counts_degraded() {
    let responder = responder(vec![cross_wired_key()], ResponsePolicy::default());

    let reply = responder.respond(&zone(), true).unwrap();
    assert_eq!(reply.status, ResponseStatus::Degraded);
    assert_eq!(reply.dnskeys().count(), 1);
    assert_eq!(reply.rrsigs().count(), 0);
    assert_eq!(reply.failures.len(), 1);

    let metrics = responder.metrics();
    assert_eq!(metrics.response_count(ResponseStatus::Degraded), 1);
    assert_eq!(metrics.response_count(ResponseStatus::Signed), 0);
    assert_eq!(metrics.signing_failure_count(RSA_KEY_TAG), 1);
    assert!(
        metrics
            .gather_text()
            .unwrap()
            .contains("dnssec_dnskey_responses_total{status=\"degraded\"} 1")
    );
}

#[test]
fn test_configured_window_and_ttl() {
    let policy = ResponsePolicy {
        validity: ValidityPolicy::new(Duration::from_secs(86_400), Duration::from_secs(600))
            .unwrap(),
        dnskey_ttl: 900,
        ..Default::default()
    };
    let responder = responder(vec![load_fixture(ECDSA_KEY)], policy);
    let now = Utc.timestamp_opt(1_700_000_123, 0).unwrap();

    let reply = responder.respond_at(&zone(), true, now).unwrap();
    for rr in &reply.answers {
        assert_eq!(rr.ttl, 900);
    }
    let rrsig = reply.rrsigs().next().unwrap().as_rrsig().unwrap();
    assert_eq!(rrsig.inception, 1_699_999_800);
    assert_eq!(rrsig.expiration, 1_699_999_800 + 86_400);
    assert_eq!(rrsig.original_ttl, 900);
}

#[test]
fn test_presentation_format() {
    let responder = responder(vec![load_fixture(ECDSA_KEY)], ResponsePolicy::default());
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let reply = responder.respond_at(&zone(), true, now).unwrap();

    let dnskey = reply.answers[0].to_string();
    assert!(
        dnskey.starts_with("example.com. 3600 IN DNSKEY 256 3 13 0jBi3uqX"),
        "{}",
        dnskey
    );

    let rrsig = reply.answers[1].to_string();
    assert!(
        rrsig.contains("IN RRSIG DNSKEY 13 2 3600 20231114230000 20231114220000 19048 example.com."),
        "{}",
        rrsig
    );
}

#[tokio::test]
async fn test_bounded_path_signs_with_fixtures() {
    let responder = responder(both_keys(), ResponsePolicy::default());
    let reply = responder.respond_bounded(&zone(), true).await.unwrap();

    assert_eq!(reply.status, ResponseStatus::Signed);
    assert_eq!(reply.rrsigs().count(), 2);
    assert_eq!(responder.metrics().signing_timeout_count(), 0);

    let unsigned = responder.respond_bounded(&zone(), false).await.unwrap();
    assert_eq!(unsigned.rrsigs().count(), 0);
}

#[tokio::test]
async fn test_shared_responder_across_tasks() {
    let responder = responder(both_keys(), ResponsePolicy::default());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let responder = responder.clone();
        handles.push(tokio::spawn(async move {
            responder.respond_bounded(&zone(), true).await
        }));
    }
    for handle in handles {
        let reply = handle.await.unwrap().unwrap();
        assert_eq!(reply.rrsigs().count(), 2);
    }
    assert_eq!(responder.metrics().response_count(ResponseStatus::Signed), 8);
}
