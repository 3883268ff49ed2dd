pub mod enums;
pub mod name;
pub mod record;

pub use enums::{DNSResourceClass, DNSResourceType};
pub use name::DomainName;
pub use record::{DNSResource, Dnskey, RecordData, Rrsig};
