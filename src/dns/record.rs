use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;

use super::enums::{DNSResourceClass, DNSResourceType};
use super::name::DomainName;
use crate::dnssec::{DnsSecAlgorithm, calculate_key_tag};

/// DNSKEY flag: the key is a zone key (RFC 4034 section 2.1.1)
pub const ZONE_KEY_FLAG: u16 = 0x0100;

/// DNSKEY flag: secure entry point, conventionally a KSK (RFC 3757)
pub const SEP_FLAG: u16 = 0x0001;

/// The only protocol value allowed in a DNSKEY (RFC 4034 section 2.1.2)
pub const DNSKEY_PROTOCOL: u8 = 3;

/// A resource record as consumed and produced by the signer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DNSResource {
    pub name: DomainName,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: RecordData,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordData {
    Dnskey(Dnskey),
    Rrsig(Rrsig),
    /// Uncompressed wire-format RDATA of any other type
    Raw(Vec<u8>),
}

/// DNSKEY RDATA (RFC 4034 section 2)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dnskey {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

/// RRSIG RDATA (RFC 4034 section 3)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rrsig {
    pub type_covered: DNSResourceType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer_name: DomainName,
    pub signature: Vec<u8>,
}

impl DNSResource {
    /// A DNSKEY record in class IN
    pub fn dnskey(name: DomainName, ttl: u32, key: Dnskey) -> Self {
        Self {
            name,
            rtype: DNSResourceType::DNSKEY,
            rclass: DNSResourceClass::IN,
            ttl,
            rdata: RecordData::Dnskey(key),
        }
    }

    /// An RRSIG record in class IN
    pub fn rrsig(name: DomainName, ttl: u32, sig: Rrsig) -> Self {
        Self {
            name,
            rtype: DNSResourceType::RRSIG,
            rclass: DNSResourceClass::IN,
            ttl,
            rdata: RecordData::Rrsig(sig),
        }
    }

    /// A record carrying pre-encoded RDATA
    pub fn raw(
        name: DomainName,
        rtype: DNSResourceType,
        rclass: DNSResourceClass,
        ttl: u32,
        rdata: Vec<u8>,
    ) -> Self {
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata: RecordData::Raw(rdata),
        }
    }

    pub fn as_dnskey(&self) -> Option<&Dnskey> {
        match &self.rdata {
            RecordData::Dnskey(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_rrsig(&self) -> Option<&Rrsig> {
        match &self.rdata {
            RecordData::Rrsig(sig) => Some(sig),
            _ => None,
        }
    }
}

impl RecordData {
    /// Uncompressed wire-format RDATA
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            Self::Dnskey(key) => key.to_rdata(),
            Self::Rrsig(sig) => {
                let mut data = sig.to_rdata_without_signature();
                data.extend_from_slice(&sig.signature);
                data
            }
            Self::Raw(data) => data.clone(),
        }
    }

    /// Length of [`RecordData::to_wire`] without building it
    pub fn wire_len(&self) -> usize {
        match self {
            Self::Dnskey(key) => 4 + key.public_key.len(),
            Self::Rrsig(sig) => {
                18 + sig.signer_name.to_canonical_wire().len() + sig.signature.len()
            }
            Self::Raw(data) => data.len(),
        }
    }
}

impl Dnskey {
    pub fn new(flags: u16, algorithm: u8, public_key: Vec<u8>) -> Self {
        Self {
            flags,
            protocol: DNSKEY_PROTOCOL,
            algorithm,
            public_key,
        }
    }

    /// RDATA in network order: flags, protocol, algorithm, key
    pub fn to_rdata(&self) -> Vec<u8> {
        let mut rdata = Vec::with_capacity(4 + self.public_key.len());
        rdata.extend_from_slice(&self.flags.to_be_bytes());
        rdata.push(self.protocol);
        rdata.push(self.algorithm);
        rdata.extend_from_slice(&self.public_key);
        rdata
    }

    pub fn key_tag(&self) -> u16 {
        calculate_key_tag(self.flags, self.protocol, self.algorithm, &self.public_key)
    }

    pub fn dnssec_algorithm(&self) -> Option<DnsSecAlgorithm> {
        DnsSecAlgorithm::from_u8(self.algorithm)
    }

    pub fn is_zone_key(&self) -> bool {
        self.flags & ZONE_KEY_FLAG != 0
    }

    pub fn is_secure_entry_point(&self) -> bool {
        self.flags & SEP_FLAG != 0
    }
}

impl Rrsig {
    /// RDATA up to and including the signer name, i.e. the part covered by the signature
    pub fn to_rdata_without_signature(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(18 + 255);
        data.extend_from_slice(&u16::from(self.type_covered).to_be_bytes());
        data.push(self.algorithm);
        data.push(self.labels);
        data.extend_from_slice(&self.original_ttl.to_be_bytes());
        data.extend_from_slice(&self.expiration.to_be_bytes());
        data.extend_from_slice(&self.inception.to_be_bytes());
        data.extend_from_slice(&self.key_tag.to_be_bytes());
        data.extend_from_slice(&self.signer_name.to_canonical_wire());
        data
    }
}

/// RRSIG timestamps are printed as YYYYMMDDHHmmSS in UTC (RFC 4034 section 3.2)
fn format_timestamp(secs: u32) -> String {
    match DateTime::from_timestamp(i64::from(secs), 0) {
        Some(time) => time.format("%Y%m%d%H%M%S").to_string(),
        None => secs.to_string(),
    }
}

impl fmt::Display for Dnskey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.flags,
            self.protocol,
            self.algorithm,
            STANDARD.encode(&self.public_key)
        )
    }
}

impl fmt::Display for Rrsig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {}",
            self.type_covered,
            self.algorithm,
            self.labels,
            self.original_ttl,
            format_timestamp(self.expiration),
            format_timestamp(self.inception),
            self.key_tag,
            self.signer_name,
            STANDARD.encode(&self.signature)
        )
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dnskey(key) => key.fmt(f),
            Self::Rrsig(sig) => sig.fmt(f),
            // RFC 3597 generic RDATA
            Self::Raw(data) if data.is_empty() => write!(f, "\\# 0"),
            Self::Raw(data) => write!(f, "\\# {} {}", data.len(), hex::encode_upper(data)),
        }
    }
}

impl fmt::Display for DNSResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name, self.ttl, self.rclass, self.rtype, self.rdata
        )
    }
}
