//! Shared fixtures and signature verification for the integration tests

#![allow(dead_code)] // Not every test file uses every helper

use dnssec_signer::dns::{DNSResource, Dnskey, DomainName, Rrsig};
use dnssec_signer::dnssec::keyfile::rsa_public_components;
use dnssec_signer::dnssec::{
    DnskeyResponder, KeyFiles, KeyPair, KeySet, ResponsePolicy, signed_data,
};
use dnssec_signer::metrics::SigningMetrics;
use ring::signature::{self, RsaPublicKeyComponents, UnparsedPublicKey};
use std::path::PathBuf;
use std::sync::Arc;

pub const RSA_KEY: &str = "Kexample.com.+008+57335";
pub const RSA_KEY_TAG: u16 = 57335;
pub const ECDSA_KEY: &str = "Kexample.com.+013+19048";
pub const ECDSA_KEY_TAG: u16 = 19048;

/// 1024-bit RSASHA1 zone key
pub const RSASHA1_KEY: &str = "Kexample.com.+005+15288";
/// 1024-bit RSASHA256 zone key
pub const RSA_1024_KEY: &str = "Kexample.com.+008+26215";
pub const RSASHA512_KEY: &str = "Kexample.com.+010+30033";
pub const ECDSA_P384_KEY: &str = "Kexample.com.+014+13632";

/// Every fixture with its algorithm number and key tag
pub const ALL_KEYS: [(&str, u8, u16); 6] = [
    (RSASHA1_KEY, 5, 15288),
    (RSA_1024_KEY, 8, 26215),
    (RSA_KEY, 8, RSA_KEY_TAG),
    (RSASHA512_KEY, 10, 30033),
    (ECDSA_KEY, 13, ECDSA_KEY_TAG),
    (ECDSA_P384_KEY, 14, 13632),
];

pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data")
}

pub fn fixture_files(base: &str) -> KeyFiles {
    KeyFiles::from_base(data_dir().join(base))
}

pub fn fixture_text(base: &str) -> (String, String) {
    let files = fixture_files(base);
    (
        std::fs::read_to_string(&files.public).unwrap(),
        std::fs::read_to_string(&files.private).unwrap(),
    )
}

pub fn load_fixture(base: &str) -> KeyPair {
    KeyPair::load(&fixture_files(base)).unwrap()
}

pub fn zone() -> DomainName {
    "example.com.".parse().unwrap()
}

pub fn responder(keys: Vec<KeyPair>, policy: ResponsePolicy) -> DnskeyResponder {
    DnskeyResponder::new(
        Arc::new(KeySet::new(keys)),
        policy,
        Arc::new(SigningMetrics::new().unwrap()),
    )
}

/// Verify `rrsig` over `rrset` with `dnskey`, panicking on failure
pub fn verify_rrsig(rrsig: &Rrsig, dnskey: &Dnskey, rrset: &[DNSResource]) {
    assert_eq!(rrsig.algorithm, dnskey.algorithm);
    assert_eq!(rrsig.key_tag, dnskey.key_tag());

    let data = signed_data(rrsig, rrset);
    let rsa_params: &signature::RsaParameters = match dnskey.algorithm {
        5 | 7 => &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
        8 => &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
        10 => &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
        _ => {
            let ecdsa = match dnskey.algorithm {
                13 => &signature::ECDSA_P256_SHA256_FIXED,
                14 => &signature::ECDSA_P384_SHA384_FIXED,
                15 => {
                    UnparsedPublicKey::new(&signature::ED25519, &dnskey.public_key)
                        .verify(&data, &rrsig.signature)
                        .unwrap();
                    return;
                }
                other => panic!("no verifier for algorithm {}", other),
            };
            let mut point = vec![0x04];
            point.extend_from_slice(&dnskey.public_key);
            UnparsedPublicKey::new(ecdsa, &point)
                .verify(&data, &rrsig.signature)
                .unwrap();
            return;
        }
    };

    let (e, n) = rsa_public_components(&dnskey.public_key).unwrap();
    RsaPublicKeyComponents { n, e }
        .verify(rsa_params, &data, &rrsig.signature)
        .unwrap();
}
