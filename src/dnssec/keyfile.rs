//! Parsing of DNSSEC key files as written by `dnssec-keygen` and similar tools.
//!
//! A key is stored as two files sharing a base name `K<zone>+<alg>+<tag>`:
//! `<base>.key` holds the DNSKEY record in master-file format and
//! `<base>.private` holds the secret parameters in the BIND
//! `Private-key-format: v1.x` layout, one `Field: base64` entry per line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretBox;
use serde::Deserialize;

use super::errors::{KeyError, Result};
use super::DnsSecAlgorithm;
use crate::dns::record::DNSKEY_PROTOCOL;
use crate::dns::{DNSResourceClass, DNSResourceType, Dnskey, DomainName};

/// Paths of the public and private halves of one key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct KeyFiles {
    pub public: PathBuf,
    pub private: PathBuf,
}

impl KeyFiles {
    pub fn new(public: impl Into<PathBuf>, private: impl Into<PathBuf>) -> Self {
        Self {
            public: public.into(),
            private: private.into(),
        }
    }

    /// Expand a key base name into its `.key` and `.private` files.
    /// A trailing `.key` or `.private` on the base is ignored.
    pub fn from_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref().to_string_lossy();
        let stem = base
            .strip_suffix(".key")
            .or_else(|| base.strip_suffix(".private"))
            .unwrap_or(&base);
        Self {
            public: PathBuf::from(format!("{}.key", stem)),
            private: PathBuf::from(format!("{}.private", stem)),
        }
    }

    /// Name used when reporting on this key
    pub fn display_name(&self) -> String {
        let public = self.public.to_string_lossy();
        public.strip_suffix(".key").unwrap_or(&public).to_string()
    }
}

/// The DNSKEY record found in a public key file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRecord {
    pub owner: DomainName,
    pub ttl: Option<u32>,
    pub class: DNSResourceClass,
    pub dnskey: Dnskey,
}

/// Parse a public key file containing exactly one DNSKEY record
pub fn parse_public_key(text: &str) -> Result<PublicKeyRecord> {
    let records = split_records(text)?;
    let tokens = match records.as_slice() {
        [single] => single,
        [] => return Err(malformed_public("no DNSKEY record found")),
        many => {
            return Err(malformed_public(format!(
                "expected one DNSKEY record, found {}",
                many.len()
            )));
        }
    };

    let mut tokens = tokens.iter().map(String::as_str);
    let owner: DomainName = tokens
        .next()
        .ok_or_else(|| malformed_public("missing owner name"))?
        .parse()
        .map_err(|e| malformed_public(format!("invalid owner name: {}", e)))?;

    // TTL and class are both optional and may come in either order
    let mut ttl = None;
    let mut class = None;
    let rtype = loop {
        let token = tokens
            .next()
            .ok_or_else(|| malformed_public("missing record type"))?;
        if ttl.is_none() {
            if let Ok(value) = token.parse::<u32>() {
                ttl = Some(value);
                continue;
            }
        }
        if class.is_none() {
            if let Ok(value) = token.parse::<DNSResourceClass>() {
                class = Some(value);
                continue;
            }
        }
        break token;
    };

    if rtype.parse::<DNSResourceType>() != Ok(DNSResourceType::DNSKEY) {
        return Err(malformed_public(format!(
            "expected DNSKEY record, found {}",
            rtype
        )));
    }

    let flags = tokens
        .next()
        .and_then(|t| t.parse::<u16>().ok())
        .ok_or_else(|| malformed_public("invalid flags field"))?;
    let protocol = tokens
        .next()
        .and_then(|t| t.parse::<u8>().ok())
        .ok_or_else(|| malformed_public("invalid protocol field"))?;
    if protocol != DNSKEY_PROTOCOL {
        return Err(malformed_public(format!(
            "protocol must be {}, found {}",
            DNSKEY_PROTOCOL, protocol
        )));
    }
    let algorithm_token = tokens
        .next()
        .ok_or_else(|| malformed_public("missing algorithm field"))?;
    let algorithm = match algorithm_token.parse::<u8>() {
        Ok(number) => number,
        Err(_) => DnsSecAlgorithm::from_presentation(algorithm_token)
            .map(DnsSecAlgorithm::to_u8)
            .ok_or_else(|| {
                malformed_public(format!("unknown algorithm mnemonic {}", algorithm_token))
            })?,
    };

    let encoded: String = tokens.collect();
    if encoded.is_empty() {
        return Err(malformed_public("missing public key data"));
    }
    let public_key = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| malformed_public(format!("invalid base64 key data: {}", e)))?;

    Ok(PublicKeyRecord {
        owner,
        ttl,
        class: class.unwrap_or_default(),
        dnskey: Dnskey {
            flags,
            protocol,
            algorithm,
            public_key,
        },
    })
}

/// Split master-file text into records, each a list of tokens. Comments are
/// dropped and parenthesised continuations are joined.
fn split_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut depth = 0usize;

    for line in text.lines() {
        let line = line.split(';').next().unwrap_or_default();
        if depth == 0 && line.trim_start().starts_with('$') {
            return Err(malformed_public(format!(
                "unsupported directive: {}",
                line.trim()
            )));
        }

        let mut token = String::new();
        for c in line.chars() {
            match c {
                '(' | ')' => {
                    if c == '(' {
                        depth += 1;
                    } else {
                        depth = depth
                            .checked_sub(1)
                            .ok_or_else(|| malformed_public("unbalanced parentheses"))?;
                    }
                    if !token.is_empty() {
                        current.push(std::mem::take(&mut token));
                    }
                }
                c if c.is_whitespace() => {
                    if !token.is_empty() {
                        current.push(std::mem::take(&mut token));
                    }
                }
                c => token.push(c),
            }
        }
        if !token.is_empty() {
            current.push(token);
        }

        if depth == 0 && !current.is_empty() {
            records.push(std::mem::take(&mut current));
        }
    }

    if depth != 0 {
        return Err(malformed_public("unbalanced parentheses"));
    }
    Ok(records)
}

fn malformed_public(msg: impl Into<String>) -> KeyError {
    KeyError::MalformedPublicKey(msg.into())
}

fn malformed_private(msg: impl Into<String>) -> KeyError {
    KeyError::MalformedPrivateKey(msg.into())
}

/// RSA secret parameters, big-endian integers
#[derive(Debug)]
pub struct RsaPrivateKey {
    pub modulus: Vec<u8>,
    pub public_exponent: Vec<u8>,
    pub private_exponent: SecretBox<[u8]>,
    pub prime1: SecretBox<[u8]>,
    pub prime2: SecretBox<[u8]>,
    pub exponent1: SecretBox<[u8]>,
    pub exponent2: SecretBox<[u8]>,
    pub coefficient: SecretBox<[u8]>,
}

/// Secret key parameters for one supported algorithm family
#[derive(Debug)]
pub enum PrivateKeyMaterial {
    Rsa {
        algorithm: DnsSecAlgorithm,
        key: RsaPrivateKey,
    },
    Ecdsa {
        algorithm: DnsSecAlgorithm,
        scalar: SecretBox<[u8]>,
    },
    Ed25519 {
        seed: SecretBox<[u8]>,
    },
}

const RSA_FIELDS: [&str; 8] = [
    "Modulus",
    "PublicExponent",
    "PrivateExponent",
    "Prime1",
    "Prime2",
    "Exponent1",
    "Exponent2",
    "Coefficient",
];

impl PrivateKeyMaterial {
    pub fn algorithm(&self) -> DnsSecAlgorithm {
        match self {
            Self::Rsa { algorithm, .. } | Self::Ecdsa { algorithm, .. } => *algorithm,
            Self::Ed25519 { .. } => DnsSecAlgorithm::Ed25519,
        }
    }

    /// Parse a BIND private key file for the algorithm declared by `public`
    pub fn parse(text: &str, public: &Dnskey) -> Result<Self> {
        let mut entries = PrivateEntries::new(text);

        let (key, version) = entries
            .next_entry()?
            .ok_or_else(|| malformed_private("empty private key file"))?;
        let supported = key == "Private-key-format"
            && version
                .strip_prefix("v1.")
                .and_then(|minor| minor.parse::<u8>().ok())
                .is_some_and(|minor| minor >= 2);
        if !supported {
            return Err(malformed_private(format!(
                "unsupported private key format: {}: {}",
                key, version
            )));
        }

        let (key, declared) = entries
            .next_entry()?
            .filter(|(key, _)| *key == "Algorithm")
            .ok_or_else(|| malformed_private("missing Algorithm line"))?;
        let code = declared
            .split_whitespace()
            .next()
            .and_then(|code| code.parse::<u8>().ok())
            .ok_or_else(|| malformed_private(format!("invalid {}: {}", key, declared)))?;
        if code != public.algorithm {
            return Err(malformed_private(format!(
                "private key algorithm {} does not match public key algorithm {}",
                code, public.algorithm
            )));
        }

        let algorithm = DnsSecAlgorithm::from_u8(code)
            .filter(DnsSecAlgorithm::is_supported)
            .ok_or(KeyError::UnsupportedAlgorithm(code))?;

        let mut fields = entries.decode_fields()?;

        if algorithm.is_rsa() {
            let mut take = |name: &str| {
                fields
                    .remove(name)
                    .ok_or_else(|| malformed_private(format!("missing {} field", name)))
            };
            let [n, e, d, p, q, dp, dq, qinv] = RSA_FIELDS.map(&mut take);
            let key = RsaPrivateKey {
                modulus: n?,
                public_exponent: e?,
                private_exponent: secret(d?),
                prime1: secret(p?),
                prime2: secret(q?),
                exponent1: secret(dp?),
                exponent2: secret(dq?),
                coefficient: secret(qinv?),
            };
            check_rsa_public(&key, &public.public_key)?;
            return Ok(Self::Rsa { algorithm, key });
        }

        let scalar = fields
            .remove("PrivateKey")
            .ok_or_else(|| malformed_private("missing PrivateKey field"))?;
        if let Some(expected) = algorithm.private_key_len() {
            if scalar.len() != expected {
                return Err(malformed_private(format!(
                    "PrivateKey must be {} bytes for {}, found {}",
                    expected,
                    algorithm,
                    scalar.len()
                )));
            }
        }

        match algorithm {
            DnsSecAlgorithm::Ed25519 => Ok(Self::Ed25519 {
                seed: secret(scalar),
            }),
            _ => Ok(Self::Ecdsa {
                algorithm,
                scalar: secret(scalar),
            }),
        }
    }
}

fn secret(bytes: Vec<u8>) -> SecretBox<[u8]> {
    SecretBox::new(bytes.into_boxed_slice())
}

/// Split an RFC 3110 RSA public key into exponent and modulus
pub fn rsa_public_components(public_key: &[u8]) -> Option<(&[u8], &[u8])> {
    let (&first, rest) = public_key.split_first()?;
    let (exp_len, rest) = if first == 0 {
        if rest.len() < 2 {
            return None;
        }
        let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
        (len, &rest[2..])
    } else {
        (first as usize, rest)
    };
    if exp_len == 0 || rest.len() <= exp_len {
        return None;
    }
    Some(rest.split_at(exp_len))
}

pub(crate) fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn check_rsa_public(key: &RsaPrivateKey, public_key: &[u8]) -> Result<()> {
    let (exponent, modulus) = rsa_public_components(public_key)
        .ok_or_else(|| KeyError::MalformedPublicKey("invalid RSA public key encoding".into()))?;
    if strip_leading_zeros(exponent) != strip_leading_zeros(&key.public_exponent)
        || strip_leading_zeros(modulus) != strip_leading_zeros(&key.modulus)
    {
        return Err(malformed_private("RSA private key does not match public key"));
    }
    Ok(())
}

/// Iterator over `Key: value` lines of a private key file
struct PrivateEntries<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> PrivateEntries<'a> {
    fn new(text: &'a str) -> Self {
        Self { lines: text.lines() }
    }

    fn next_entry(&mut self) -> Result<Option<(&'a str, &'a str)>> {
        for line in self.lines.by_ref() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| malformed_private(format!("invalid line: {}", line)))?;
            return Ok(Some((key.trim(), value.trim())));
        }
        Ok(None)
    }

    /// Decode the remaining entries. Only base64 key fields are kept; timing
    /// metadata such as `Created` or `Activate` is skipped.
    fn decode_fields(mut self) -> Result<HashMap<&'a str, Vec<u8>>> {
        let mut fields = HashMap::new();
        while let Some((key, value)) = self.next_entry()? {
            if !RSA_FIELDS.contains(&key) && key != "PrivateKey" {
                continue;
            }
            let decoded = STANDARD
                .decode(value.as_bytes())
                .map_err(|e| malformed_private(format!("invalid base64 in {}: {}", key, e)))?;
            if fields.insert(key, decoded).is_some() {
                return Err(malformed_private(format!("duplicate {} field", key)));
            }
        }
        Ok(fields)
    }
}
