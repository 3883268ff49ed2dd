pub mod algorithm;
pub mod engine;
pub mod errors;
pub mod key_tag;
pub mod keyfile;
pub mod keypair;
pub mod keyset;
pub mod response;
pub mod signer;
pub mod window;

pub use algorithm::DnsSecAlgorithm;
pub use engine::{SigningOutcome, sign_rrset, signed_data};
pub use errors::{KeyError, KeyLoadFailure, KeySetError, SignError, SignerFault};
pub use key_tag::calculate_key_tag;
pub use keyfile::{KeyFiles, PrivateKeyMaterial, PublicKeyRecord, parse_public_key};
pub use keypair::KeyPair;
pub use keyset::KeySet;
pub use response::{
    DnskeyResponder, KeyResponse, ResponsePolicy, ResponseStatus, UnsignedFallback,
};
pub use signer::Signer;
pub use window::{ValidityPolicy, ValidityWindow};

/// DNSSEC constants
pub mod constants {
    /// DNSSEC OK flag in the EDNS0 extended flags (RFC 3225)
    pub const DO_FLAG: u16 = 0x8000;
}

/// Whether the EDNS0 extended flags request DNSSEC records
pub fn dnssec_requested(edns_flags: u16) -> bool {
    edns_flags & constants::DO_FLAG != 0
}
