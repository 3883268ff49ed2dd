use std::fmt;

use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, Ed25519KeyPair};
use sha1::Sha1;
use rsa::sha2::{Digest, Sha256, Sha512};
use rsa::{BigUint, Pkcs1v15Sign};
use secrecy::ExposeSecret;

use super::errors::{KeyError, Result, SignerFault};
use super::keyfile::PrivateKeyMaterial;
use super::DnsSecAlgorithm;
use crate::dns::Dnskey;

/// Signing capability, one variant per algorithm family.
///
/// RSA keys sign PKCS#1 v1.5 through the `rsa` crate, which takes SHA-1
/// digests and moduli below 2048 bits. ECDSA and Ed25519 go through `ring`.
///
/// RSA and Ed25519 signatures are deterministic. ECDSA
/// signatures use a fresh random nonce on every call, so two signatures over
/// the same data differ while both verify against the public key.
pub enum Signer {
    Rsa {
        algorithm: DnsSecAlgorithm,
        key: rsa::RsaPrivateKey,
    },
    Ecdsa {
        algorithm: DnsSecAlgorithm,
        key: EcdsaKeyPair,
        rng: SystemRandom,
    },
    Ed25519(Ed25519KeyPair),
}

impl Signer {
    /// Build a signer from parsed secret material and its public key
    pub fn from_material(material: PrivateKeyMaterial, public: &Dnskey) -> Result<Self> {
        let rng = SystemRandom::new();
        match material {
            PrivateKeyMaterial::Rsa { algorithm, key } => {
                let primes = vec![
                    BigUint::from_bytes_be(key.prime1.expose_secret()),
                    BigUint::from_bytes_be(key.prime2.expose_secret()),
                ];
                let key = rsa::RsaPrivateKey::from_components(
                    BigUint::from_bytes_be(&key.modulus),
                    BigUint::from_bytes_be(&key.public_exponent),
                    BigUint::from_bytes_be(key.private_exponent.expose_secret()),
                    primes,
                )
                .and_then(|key| key.validate().map(|()| key))
                .map_err(|e| KeyError::MalformedPrivateKey(format!("RSA key rejected: {}", e)))?;
                Ok(Self::Rsa { algorithm, key })
            }

            PrivateKeyMaterial::Ecdsa { algorithm, scalar } => {
                let signing_alg = match algorithm {
                    DnsSecAlgorithm::EcdsaP256Sha256 => {
                        &signature::ECDSA_P256_SHA256_FIXED_SIGNING
                    }
                    DnsSecAlgorithm::EcdsaP384Sha384 => {
                        &signature::ECDSA_P384_SHA384_FIXED_SIGNING
                    }
                    other => return Err(KeyError::UnsupportedAlgorithm(other.to_u8())),
                };

                // DNSKEY carries x || y; ring wants the uncompressed SEC1 point
                let expected = scalar.expose_secret().len() * 2;
                if public.public_key.len() != expected {
                    return Err(KeyError::MalformedPublicKey(format!(
                        "{} public key must be {} bytes, found {}",
                        algorithm,
                        expected,
                        public.public_key.len()
                    )));
                }
                let mut point = Vec::with_capacity(expected + 1);
                point.push(0x04);
                point.extend_from_slice(&public.public_key);

                let key = EcdsaKeyPair::from_private_key_and_public_key(
                    signing_alg,
                    scalar.expose_secret(),
                    &point,
                    &rng,
                )
                .map_err(|e| {
                    KeyError::MalformedPrivateKey(format!(
                        "ECDSA private key does not match public key: {}",
                        e
                    ))
                })?;
                Ok(Self::Ecdsa {
                    algorithm,
                    key,
                    rng,
                })
            }

            PrivateKeyMaterial::Ed25519 { seed } => {
                Ed25519KeyPair::from_seed_and_public_key(seed.expose_secret(), &public.public_key)
                    .map(Self::Ed25519)
                    .map_err(|e| {
                        KeyError::MalformedPrivateKey(format!(
                            "Ed25519 private key does not match public key: {}",
                            e
                        ))
                    })
            }
        }
    }

    pub fn algorithm(&self) -> DnsSecAlgorithm {
        match self {
            Self::Rsa { algorithm, .. } | Self::Ecdsa { algorithm, .. } => *algorithm,
            Self::Ed25519(_) => DnsSecAlgorithm::Ed25519,
        }
    }

    /// Sign `data` for `algorithm`, which must be the algorithm this key was loaded for
    pub fn sign(
        &self,
        algorithm: DnsSecAlgorithm,
        data: &[u8],
    ) -> std::result::Result<Vec<u8>, SignerFault> {
        if algorithm != self.algorithm() {
            return Err(SignerFault::AlgorithmMismatch {
                key: self.algorithm(),
                requested: algorithm,
            });
        }

        match self {
            Self::Rsa { key, .. } => {
                let (scheme, digest) = rsa_digest(algorithm, data)?;
                key.sign(scheme, &digest)
                    .map_err(|_| SignerFault::Rejected(algorithm))
            }
            Self::Ecdsa { key, rng, .. } => key
                .sign(rng, data)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|_| SignerFault::Rejected(algorithm)),
            Self::Ed25519(key) => Ok(key.sign(data).as_ref().to_vec()),
        }
    }
}

/// PKCS#1 v1.5 scheme and message digest for an RSA algorithm
fn rsa_digest(
    algorithm: DnsSecAlgorithm,
    data: &[u8],
) -> std::result::Result<(Pkcs1v15Sign, Vec<u8>), SignerFault> {
    match algorithm {
        DnsSecAlgorithm::RsaSha1 | DnsSecAlgorithm::RsaSha1Nsec3Sha1 => {
            Ok((Pkcs1v15Sign::new::<Sha1>(), Sha1::digest(data).to_vec()))
        }
        DnsSecAlgorithm::RsaSha256 => {
            Ok((Pkcs1v15Sign::new::<Sha256>(), Sha256::digest(data).to_vec()))
        }
        DnsSecAlgorithm::RsaSha512 => {
            Ok((Pkcs1v15Sign::new::<Sha512>(), Sha512::digest(data).to_vec()))
        }
        _ => Err(SignerFault::Rejected(algorithm)),
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = match self {
            Self::Rsa { .. } => "Rsa",
            Self::Ecdsa { .. } => "Ecdsa",
            Self::Ed25519(_) => "Ed25519",
        };
        f.debug_struct("Signer")
            .field("family", &family)
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}
