use std::fmt;
use std::str::FromStr;

use crate::error::{DnsError, Result};

/// Maximum length of a single label (RFC 1035)
const MAX_LABEL_LEN: usize = 63;

/// Maximum length of a name in wire format (RFC 1035)
const MAX_NAME_LEN: usize = 255;

/// An absolute domain name stored as its labels, root label omitted
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DomainName {
    labels: Vec<String>,
}

impl DomainName {
    /// The root name `.`
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a name from labels, checking RFC 1035 length limits
    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();

        let mut wire_len = 1;
        for label in &labels {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(DnsError::InvalidLabelLength(label.len()));
            }
            wire_len += label.len() + 1;
        }
        if wire_len > MAX_NAME_LEN {
            return Err(DnsError::NameTooLong);
        }

        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label count as carried in the RRSIG labels field (RFC 4034 section 3.1.3)
    pub fn rrsig_label_count(&self) -> u8 {
        let count = match self.labels.first() {
            Some(first) if first == "*" => self.labels.len() - 1,
            _ => self.labels.len(),
        };
        // bounded by MAX_NAME_LEN / 2
        count as u8
    }

    /// Case-insensitive comparison (RFC 4343)
    pub fn eq_ignore_case(&self, other: &DomainName) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(&other.labels)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Uncompressed wire format, case preserved
    pub fn to_wire(&self) -> Vec<u8> {
        self.encode(false)
    }

    /// Canonical wire format: uncompressed and lowercased (RFC 4034 section 6.2)
    pub fn to_canonical_wire(&self) -> Vec<u8> {
        self.encode(true)
    }

    fn encode(&self, lowercase: bool) -> Vec<u8> {
        let mut wire = Vec::with_capacity(MAX_NAME_LEN);
        for label in &self.labels {
            wire.push(label.len() as u8);
            if lowercase {
                wire.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
            } else {
                wire.extend_from_slice(label.as_bytes());
            }
        }
        wire.push(0);
        wire
    }
}

impl FromStr for DomainName {
    type Err = DnsError;

    /// Parse a name in presentation format; relative names are treated as absolute
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DnsError::InvalidName(s.to_string()));
        }
        if s == "." {
            return Ok(Self::root());
        }

        let trimmed = s.strip_suffix('.').unwrap_or(s);
        Self::from_labels(trimmed.split('.')).map_err(|e| match e {
            DnsError::InvalidLabelLength(_) => DnsError::InvalidName(s.to_string()),
            other => other,
        })
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            write!(f, "{}.", label)?;
        }
        Ok(())
    }
}
