use tracing::{debug, trace, warn};

use super::errors::SignError;
use super::keypair::KeyPair;
use super::window::ValidityWindow;
use crate::dns::{DNSResource, DNSResourceType, DomainName, Rrsig};

/// Signatures produced for one RRset, plus the keys that failed to sign
#[derive(Debug, Clone, Default)]
pub struct SigningOutcome {
    /// RRSIG records in key order
    pub signatures: Vec<DNSResource>,
    /// One `SigningFailure` per key that could not sign
    pub failures: Vec<SignError>,
}

impl SigningOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sign an RRset with every key, producing one RRSIG per key that signs.
///
/// A key that fails does not stop the remaining keys; its error is returned
/// in [`SigningOutcome::failures`]. The only hard error is an input that is
/// not a single RRset.
pub fn sign_rrset(
    rrset: &[DNSResource],
    zone: &DomainName,
    ttl: u32,
    window: ValidityWindow,
    keys: &[KeyPair],
) -> Result<SigningOutcome, SignError> {
    let first = check_rrset(rrset)?;
    let mut outcome = SigningOutcome::default();

    for key in keys {
        let mut rrsig = Rrsig {
            type_covered: first.rtype,
            algorithm: key.algorithm(),
            labels: first.name.rrsig_label_count(),
            original_ttl: ttl,
            expiration: window.expiration(),
            inception: window.inception(),
            key_tag: key.key_tag(),
            signer_name: zone.clone(),
            signature: Vec::new(),
        };

        let data = signed_data(&rrsig, rrset);
        match key.sign(&data) {
            Ok(signature) => {
                trace!(
                    "Signed {} {} with key {} ({} bytes)",
                    first.name,
                    first.rtype,
                    key.key_tag(),
                    signature.len()
                );
                rrsig.signature = signature;
                outcome
                    .signatures
                    .push(DNSResource::rrsig(first.name.clone(), ttl, rrsig));
            }
            Err(e) => {
                warn!("DNSSEC signing of {} {} failed: {}", first.name, first.rtype, e);
                outcome.failures.push(e);
            }
        }
    }

    debug!(
        "Signed {} {}: {} signature(s), {} failure(s)",
        first.name,
        first.rtype,
        outcome.signatures.len(),
        outcome.failures.len()
    );
    Ok(outcome)
}

/// Check that the records form one non-empty RRset and return its first record
fn check_rrset(rrset: &[DNSResource]) -> Result<&DNSResource, SignError> {
    let first = rrset
        .first()
        .ok_or_else(|| SignError::InvalidRecordSet("empty RRset".to_string()))?;

    if first.rtype == DNSResourceType::RRSIG {
        return Err(SignError::InvalidRecordSet(
            "RRSIG records are not signed".to_string(),
        ));
    }

    for record in rrset {
        if record.rdata.wire_len() > usize::from(u16::MAX) {
            return Err(SignError::InvalidRecordSet(format!(
                "{} {} RDATA is {} bytes, over the 65535 byte limit",
                record.name,
                record.rtype,
                record.rdata.wire_len()
            )));
        }
    }

    for record in &rrset[1..] {
        if !record.name.eq_ignore_case(&first.name)
            || record.rtype != first.rtype
            || record.rclass != first.rclass
        {
            return Err(SignError::InvalidRecordSet(format!(
                "{} {} {} does not belong to {} {} {}",
                record.name, record.rclass, record.rtype, first.name, first.rclass, first.rtype
            )));
        }
    }
    Ok(first)
}

/// The data an RRSIG signs (RFC 4034 section 3.1.8.1): the RRSIG RDATA
/// without the signature, followed by the RRset in canonical form and order
pub fn signed_data(rrsig: &Rrsig, rrset: &[DNSResource]) -> Vec<u8> {
    let mut data = rrsig.to_rdata_without_signature();

    // Canonical order compares RDATA as left-justified unsigned octet
    // strings; duplicate records are dropped (RFC 4034 section 6.3)
    let mut rdatas: Vec<Vec<u8>> = rrset
        .iter()
        .map(|rr| canonical_rdata(rr.rtype, rr.rdata.to_wire()))
        .collect();
    rdatas.sort();
    rdatas.dedup();

    if let Some(first) = rrset.first() {
        let owner = first.name.to_canonical_wire();
        let rtype: u16 = first.rtype.into();
        let rclass: u16 = first.rclass.into();

        for rdata in rdatas {
            data.extend_from_slice(&owner);
            data.extend_from_slice(&rtype.to_be_bytes());
            data.extend_from_slice(&rclass.to_be_bytes());
            data.extend_from_slice(&rrsig.original_ttl.to_be_bytes());
            // sign_rrset rejects longer RDATA before it gets here
            let rdlength = u16::try_from(rdata.len()).unwrap_or(u16::MAX);
            data.extend_from_slice(&rdlength.to_be_bytes());
            data.extend_from_slice(&rdata);
        }
    }

    data
}

/// Lowercase the domain names embedded in RDATA for the record types of
/// RFC 4034 section 6.2 (NSEC dropped per RFC 6840 section 5.1)
fn canonical_rdata(rtype: DNSResourceType, mut rdata: Vec<u8>) -> Vec<u8> {
    // (offset of the first name, number of consecutive names)
    let (offset, names) = match u16::from(rtype) {
        // NS, MD, MF, CNAME, MB, MG, MR, PTR, NXT, DNAME
        2 | 3 | 4 | 5 | 7 | 8 | 9 | 12 | 30 | 39 => (0, 1),
        // SOA, MINFO, RP
        6 | 14 | 17 => (0, 2),
        // MX, AFSDB, RT, KX
        15 | 18 | 21 | 36 => (2, 1),
        // PX
        26 => (2, 2),
        // SRV
        33 => (6, 1),
        // SIG, RRSIG
        24 | 46 => (18, 1),
        // NAPTR: the replacement follows three character-strings
        35 => match naptr_replacement_offset(&rdata) {
            Some(offset) => (offset, 1),
            None => return rdata,
        },
        _ => return rdata,
    };

    let mut pos = offset;
    for _ in 0..names {
        match lowercase_name(&mut rdata, pos) {
            Some(end) => pos = end,
            None => break,
        }
    }
    rdata
}

/// Lowercase the uncompressed name at `pos`, returning the offset past it
fn lowercase_name(rdata: &mut [u8], mut pos: usize) -> Option<usize> {
    loop {
        let len = usize::from(*rdata.get(pos)?);
        if len == 0 {
            return Some(pos + 1);
        }
        if len > 63 {
            return None;
        }
        rdata.get_mut(pos + 1..pos + 1 + len)?.make_ascii_lowercase();
        pos += 1 + len;
    }
}

fn naptr_replacement_offset(rdata: &[u8]) -> Option<usize> {
    let mut pos = 4;
    for _ in 0..3 {
        pos += 1 + usize::from(*rdata.get(pos)?);
    }
    Some(pos)
}
