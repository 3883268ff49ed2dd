use std::fs;
use std::path::Path;

use tracing::debug;

use super::errors::{KeyError, Result, SignError};
use super::keyfile::{KeyFiles, PrivateKeyMaterial, PublicKeyRecord, parse_public_key};
use super::signer::Signer;
use super::DnsSecAlgorithm;
use crate::dns::{Dnskey, DomainName};

/// A DNSKEY and the signer for its private half, with the key tag cached
#[derive(Debug)]
pub struct KeyPair {
    owner: DomainName,
    public: Dnskey,
    signer: Signer,
    key_tag: u16,
}

impl KeyPair {
    /// Load a key pair from its `.key` and `.private` files
    pub fn load(files: &KeyFiles) -> Result<Self> {
        let public = read_source(&files.public)?;
        let private = read_source(&files.private)?;
        let pair = Self::parse(&public, &private)?;

        debug!(
            "Loaded DNSSEC key {} for {}: algorithm {}, flags {}, key tag {}",
            files.display_name(),
            pair.owner,
            pair.public.algorithm,
            pair.public.flags,
            pair.key_tag
        );
        Ok(pair)
    }

    /// Parse a key pair from the contents of its two key files
    pub fn parse(public_text: &str, private_text: &str) -> Result<Self> {
        let record = parse_public_key(public_text)?;
        let material = PrivateKeyMaterial::parse(private_text, &record.dnskey)?;
        Self::from_parts(record, material)
    }

    pub fn from_parts(record: PublicKeyRecord, material: PrivateKeyMaterial) -> Result<Self> {
        let signer = Signer::from_material(material, &record.dnskey)?;
        Ok(Self::from_signer(record.owner, record.dnskey, signer))
    }

    /// Pair an existing signer with a public key. The two are not checked
    /// against each other; a mismatch surfaces when signing.
    pub fn from_signer(owner: DomainName, public: Dnskey, signer: Signer) -> Self {
        let key_tag = public.key_tag();
        Self {
            owner,
            public,
            signer,
            key_tag,
        }
    }

    pub fn into_parts(self) -> (DomainName, Dnskey, Signer) {
        (self.owner, self.public, self.signer)
    }

    /// Owner name from the key file; responses use the queried zone instead
    pub fn owner(&self) -> &DomainName {
        &self.owner
    }

    pub fn public_key(&self) -> &Dnskey {
        &self.public
    }

    pub fn key_tag(&self) -> u16 {
        self.key_tag
    }

    pub fn algorithm(&self) -> u8 {
        self.public.algorithm
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Sign `data` with the algorithm declared by the public key
    pub fn sign(&self, data: &[u8]) -> std::result::Result<Vec<u8>, SignError> {
        let failure = |reason: String| SignError::SigningFailure {
            key_tag: self.key_tag,
            reason,
        };
        let algorithm = DnsSecAlgorithm::from_u8(self.public.algorithm)
            .ok_or_else(|| failure(format!("unknown algorithm {}", self.public.algorithm)))?;
        self.signer
            .sign(algorithm, data)
            .map_err(|fault| failure(fault.to_string()))
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| KeyError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })
}
