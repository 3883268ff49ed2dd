use std::fmt;

/// DNSSEC Algorithm numbers (RFC 4034, 5155, 5702, 5933, 6605, 7344, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// Delete DS (RFC 8078)
    DeleteDS = 0,
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// Diffie-Hellman (deprecated)
    DH = 2,
    /// DSA/SHA1 (RFC 2536)
    DSA = 3,
    /// Reserved
    Reserved4 = 4,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// DSA-NSEC3-SHA1 (RFC 5155)
    DsaNsec3Sha1 = 6,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// Reserved
    Reserved9 = 9,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// Reserved
    Reserved11 = 11,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost = 12,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
    /// Indirect (RFC 4034)
    Indirect = 252,
    /// Private algorithm (RFC 4034)
    PrivateDNS = 253,
    /// Private algorithm OID (RFC 4034)
    PrivateOID = 254,
    /// Reserved
    Reserved255 = 255,
}

impl DnsSecAlgorithm {
    const ALL: [Self; 21] = [
        Self::DeleteDS,
        Self::RsaMd5,
        Self::DH,
        Self::DSA,
        Self::Reserved4,
        Self::RsaSha1,
        Self::DsaNsec3Sha1,
        Self::RsaSha1Nsec3Sha1,
        Self::RsaSha256,
        Self::Reserved9,
        Self::RsaSha512,
        Self::Reserved11,
        Self::EccGost,
        Self::EcdsaP256Sha256,
        Self::EcdsaP384Sha384,
        Self::Ed25519,
        Self::Ed448,
        Self::Indirect,
        Self::PrivateDNS,
        Self::PrivateOID,
        Self::Reserved255,
    ];

    /// Registered algorithm for a number, `None` for unassigned numbers
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.to_u8() == value)
    }

    /// Look up an algorithm by number or presentation mnemonic
    pub fn from_presentation(value: &str) -> Option<Self> {
        match value.parse::<u8>() {
            Ok(number) => Self::from_u8(number),
            Err(_) => Self::ALL
                .into_iter()
                .find(|alg| alg.mnemonic().eq_ignore_ascii_case(value)),
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Mnemonic used in zone files and `Algorithm:` lines of private keys
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::DeleteDS => "DELETE",
            Self::RsaMd5 => "RSAMD5",
            Self::DH => "DH",
            Self::DSA => "DSA",
            Self::Reserved4 => "RESERVED4",
            Self::RsaSha1 => "RSASHA1",
            Self::DsaNsec3Sha1 => "DSA-NSEC3-SHA1",
            Self::RsaSha1Nsec3Sha1 => "RSASHA1-NSEC3-SHA1",
            Self::RsaSha256 => "RSASHA256",
            Self::Reserved9 => "RESERVED9",
            Self::RsaSha512 => "RSASHA512",
            Self::Reserved11 => "RESERVED11",
            Self::EccGost => "ECC-GOST",
            Self::EcdsaP256Sha256 => "ECDSAP256SHA256",
            Self::EcdsaP384Sha384 => "ECDSAP384SHA384",
            Self::Ed25519 => "ED25519",
            Self::Ed448 => "ED448",
            Self::Indirect => "INDIRECT",
            Self::PrivateDNS => "PRIVATEDNS",
            Self::PrivateOID => "PRIVATEOID",
            Self::Reserved255 => "RESERVED255",
        }
    }

    /// Whether keys of this algorithm can be loaded for signing
    pub fn is_supported(&self) -> bool {
        (self.is_rsa() && *self != Self::RsaMd5)
            || matches!(
                self,
                Self::EcdsaP256Sha256 | Self::EcdsaP384Sha384 | Self::Ed25519
            )
    }

    /// MUST-implement signing algorithms of RFC 8624 section 3.1
    pub fn is_recommended(&self) -> bool {
        matches!(
            self,
            Self::RsaSha256 | Self::EcdsaP256Sha256 | Self::Ed25519
        )
    }

    /// RSA variants whose public key uses the RFC 3110 encoding
    pub fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::RsaMd5
                | Self::RsaSha1
                | Self::RsaSha1Nsec3Sha1
                | Self::RsaSha256
                | Self::RsaSha512
        )
    }

    /// Length of the private scalar for fixed-size key algorithms
    pub fn private_key_len(&self) -> Option<usize> {
        match self {
            Self::EcdsaP256Sha256 | Self::Ed25519 => Some(32),
            Self::EcdsaP384Sha384 => Some(48),
            _ => None,
        }
    }
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
