use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::engine::{SigningOutcome, sign_rrset};
use super::errors::SignError;
use super::keyset::KeySet;
use super::window::ValidityPolicy;
use crate::dns::{DNSResource, DNSResourceType, DomainName};
use crate::error::ConfigError;
use crate::metrics::SigningMetrics;

/// What to do when signatures were requested but no key produced one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsignedFallback {
    /// Reply with the unsigned keys, marked degraded
    #[default]
    Allow,
    /// Fail the reply with `SigningUnavailable`
    Refuse,
}

impl FromStr for UnsignedFallback {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "refuse" => Ok(Self::Refuse),
            _ => Err(ConfigError::InvalidFallback(format!(
                "expected 'allow' or 'refuse', got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for UnsignedFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Refuse => write!(f, "refuse"),
        }
    }
}

/// Signing policy applied to DNSKEY responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponsePolicy {
    pub validity: ValidityPolicy,
    /// TTL of the DNSKEY records, also used as the RRSIG original TTL
    pub dnskey_ttl: u32,
    pub fallback: UnsignedFallback,
    /// Upper bound for the asynchronous signing path
    pub signing_timeout: Duration,
}

impl ResponsePolicy {
    pub const DEFAULT_DNSKEY_TTL: u32 = 3600;
    pub const DEFAULT_SIGNING_TIMEOUT: Duration = Duration::from_millis(1000);
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self {
            validity: ValidityPolicy::default(),
            dnskey_ttl: Self::DEFAULT_DNSKEY_TTL,
            fallback: UnsignedFallback::default(),
            signing_timeout: Self::DEFAULT_SIGNING_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    /// Signatures were not requested
    Unsigned,
    /// At least one key signed the DNSKEY set
    Signed,
    /// Signatures were requested but none could be produced
    Degraded,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsigned => "unsigned",
            Self::Signed => "signed",
            Self::Degraded => "degraded",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer section of a DNSKEY reply
#[derive(Debug, Clone)]
pub struct KeyResponse {
    /// DNSKEY records followed by their RRSIGs
    pub answers: Vec<DNSResource>,
    pub status: ResponseStatus,
    /// Keys that failed to sign, empty unless signatures were requested
    pub failures: Vec<SignError>,
}

impl KeyResponse {
    pub fn dnskeys(&self) -> impl Iterator<Item = &DNSResource> {
        self.records_of(DNSResourceType::DNSKEY)
    }

    pub fn rrsigs(&self) -> impl Iterator<Item = &DNSResource> {
        self.records_of(DNSResourceType::RRSIG)
    }

    fn records_of(&self, rtype: DNSResourceType) -> impl Iterator<Item = &DNSResource> {
        self.answers.iter().filter(move |rr| rr.rtype == rtype)
    }
}

type SignedAnswers = (Vec<DNSResource>, SigningOutcome);

/// Builds DNSKEY replies for a zone from a shared key set
#[derive(Clone)]
pub struct DnskeyResponder {
    keys: Arc<KeySet>,
    policy: ResponsePolicy,
    metrics: Arc<SigningMetrics>,
}

impl DnskeyResponder {
    pub fn new(keys: Arc<KeySet>, policy: ResponsePolicy, metrics: Arc<SigningMetrics>) -> Self {
        Self {
            keys,
            policy,
            metrics,
        }
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    pub fn policy(&self) -> &ResponsePolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &SigningMetrics {
        &self.metrics
    }

    /// A copy of every public key owned by `zone`
    pub fn dnskey_rrset(&self, zone: &DomainName) -> Vec<DNSResource> {
        self.keys
            .iter()
            .map(|key| {
                DNSResource::dnskey(zone.clone(), self.policy.dnskey_ttl, key.public_key().clone())
            })
            .collect()
    }

    /// Build the reply for a DNSKEY query at the current time
    pub fn respond(&self, zone: &DomainName, dnssec_ok: bool) -> Result<KeyResponse, SignError> {
        self.respond_at(zone, dnssec_ok, Utc::now())
    }

    /// Build the reply with signatures whose window is derived from `now`
    pub fn respond_at(
        &self,
        zone: &DomainName,
        dnssec_ok: bool,
        now: DateTime<Utc>,
    ) -> Result<KeyResponse, SignError> {
        if !dnssec_ok || self.keys.is_empty() {
            return Ok(self.unsigned(zone));
        }
        self.settle(zone, self.sign_answers(zone, now))
    }

    /// Like [`respond`](Self::respond), but signing runs on the blocking
    /// pool and is abandoned after the policy's signing timeout. An
    /// abandoned or crashed job counts as total signing failure.
    pub async fn respond_bounded(
        &self,
        zone: &DomainName,
        dnssec_ok: bool,
    ) -> Result<KeyResponse, SignError> {
        if !dnssec_ok || self.keys.is_empty() {
            return Ok(self.unsigned(zone));
        }

        let responder = self.clone();
        let job_zone = zone.clone();
        let job =
            tokio::task::spawn_blocking(move || responder.sign_answers(&job_zone, Utc::now()));
        self.await_signing(zone, job).await
    }

    async fn await_signing<F, E>(&self, zone: &DomainName, job: F) -> Result<KeyResponse, SignError>
    where
        F: Future<Output = Result<Result<SignedAnswers, SignError>, E>>,
        E: fmt::Display,
    {
        match tokio::time::timeout(self.policy.signing_timeout, job).await {
            Ok(Ok(signed)) => self.settle(zone, signed),
            Ok(Err(e)) => {
                error!("DNSSEC signing job for {} failed: {}", zone, e);
                self.fallback(zone, self.dnskey_rrset(zone), Vec::new())
            }
            Err(_) => {
                warn!(
                    "DNSSEC signing for {} timed out after {:?}",
                    zone, self.policy.signing_timeout
                );
                self.metrics.record_signing_timeout();
                self.fallback(zone, self.dnskey_rrset(zone), Vec::new())
            }
        }
    }

    fn unsigned(&self, zone: &DomainName) -> KeyResponse {
        self.metrics.record_response(ResponseStatus::Unsigned);
        KeyResponse {
            answers: self.dnskey_rrset(zone),
            status: ResponseStatus::Unsigned,
            failures: Vec::new(),
        }
    }

    fn sign_answers(
        &self,
        zone: &DomainName,
        now: DateTime<Utc>,
    ) -> Result<SignedAnswers, SignError> {
        let answers = self.dnskey_rrset(zone);
        let window = self.policy.validity.window_at(now)?;

        let started = Instant::now();
        let outcome = sign_rrset(
            &answers,
            zone,
            self.policy.dnskey_ttl,
            window,
            self.keys.keys(),
        )?;
        self.metrics.observe_signing_duration(started.elapsed());

        for failure in &outcome.failures {
            if let SignError::SigningFailure { key_tag, .. } = failure {
                self.metrics.record_signing_failure(*key_tag);
            }
        }
        Ok((answers, outcome))
    }

    /// A signing attempt that errored before any key ran (a clock outside
    /// the RRSIG time range) is total failure and goes through the fallback
    fn settle(
        &self,
        zone: &DomainName,
        signed: Result<SignedAnswers, SignError>,
    ) -> Result<KeyResponse, SignError> {
        match signed {
            Ok(signed) => self.finish(zone, signed),
            Err(e) => {
                error!("DNSSEC signing for {} failed: {}", zone, e);
                self.fallback(zone, self.dnskey_rrset(zone), vec![e])
            }
        }
    }

    fn finish(
        &self,
        zone: &DomainName,
        (mut answers, outcome): SignedAnswers,
    ) -> Result<KeyResponse, SignError> {
        if outcome.signatures.is_empty() {
            return self.fallback(zone, answers, outcome.failures);
        }

        debug!(
            "DNSKEY reply for {}: {} key(s), {} signature(s)",
            zone,
            answers.len(),
            outcome.signatures.len()
        );
        answers.extend(outcome.signatures);
        self.metrics.record_response(ResponseStatus::Signed);
        Ok(KeyResponse {
            answers,
            status: ResponseStatus::Signed,
            failures: outcome.failures,
        })
    }

    fn fallback(
        &self,
        zone: &DomainName,
        answers: Vec<DNSResource>,
        failures: Vec<SignError>,
    ) -> Result<KeyResponse, SignError> {
        match self.policy.fallback {
            UnsignedFallback::Allow => {
                warn!(
                    "No DNSSEC signatures produced for {}, serving {} unsigned key(s)",
                    zone,
                    answers.len()
                );
                self.metrics.record_response(ResponseStatus::Degraded);
                Ok(KeyResponse {
                    answers,
                    status: ResponseStatus::Degraded,
                    failures,
                })
            }
            UnsignedFallback::Refuse => {
                warn!("No DNSSEC signatures produced for {}, refusing reply", zone);
                Err(SignError::SigningUnavailable(zone.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::Dnskey;
    use crate::dnssec::KeyPair;
    use crate::dnssec::keyfile::PrivateKeyMaterial;
    use crate::dnssec::signer::Signer;
    use chrono::TimeZone;
    use ring::signature::{Ed25519KeyPair, KeyPair as _};

    fn ed25519_key(seed: u8) -> KeyPair {
        let seed = [seed; 32];
        let pair = Ed25519KeyPair::from_seed_unchecked(&seed).unwrap();
        let public = Dnskey::new(257, 15, pair.public_key().as_ref().to_vec());
        let material = PrivateKeyMaterial::Ed25519 {
            seed: secrecy::SecretBox::new(Box::new(seed) as Box<[u8]>),
        };
        let signer = Signer::from_material(material, &public).unwrap();
        KeyPair::from_signer("example.com.".parse().unwrap(), public, signer)
    }

    /// Ed25519 signer behind a public key that declares RSASHA256
    fn mismatched_key() -> KeyPair {
        let (owner, mut public, signer) = ed25519_key(9).into_parts();
        public.algorithm = 8;
        KeyPair::from_signer(owner, public, signer)
    }

    fn responder(keys: Vec<KeyPair>, fallback: UnsignedFallback) -> DnskeyResponder {
        let policy = ResponsePolicy {
            fallback,
            ..Default::default()
        };
        DnskeyResponder::new(
            Arc::new(KeySet::new(keys)),
            policy,
            Arc::new(SigningMetrics::new().unwrap()),
        )
    }

    fn zone() -> DomainName {
        "Example.COM.".parse().unwrap()
    }

    #[test]
    fn test_fallback_from_str() {
        assert_eq!("allow".parse::<UnsignedFallback>().unwrap(), UnsignedFallback::Allow);
        assert_eq!(" REFUSE ".parse::<UnsignedFallback>().unwrap(), UnsignedFallback::Refuse);
        assert!("maybe".parse::<UnsignedFallback>().is_err());
    }

    #[test]
    fn test_unsigned_reply() {
        let responder = responder(vec![ed25519_key(1), ed25519_key(2)], UnsignedFallback::Allow);
        let reply = responder.respond(&zone(), false).unwrap();

        assert_eq!(reply.status, ResponseStatus::Unsigned);
        assert_eq!(reply.dnskeys().count(), 2);
        assert_eq!(reply.rrsigs().count(), 0);
        for rr in &reply.answers {
            assert_eq!(rr.name, zone());
            assert_eq!(rr.ttl, ResponsePolicy::DEFAULT_DNSKEY_TTL);
        }
        assert_eq!(responder.metrics().response_count(ResponseStatus::Unsigned), 1);
    }

    #[test]
    fn test_signed_reply_follows_key_order() {
        let keys = vec![ed25519_key(1), ed25519_key(2), ed25519_key(3)];
        let tags: Vec<u16> = keys.iter().map(|k| k.key_tag()).collect();
        let responder = responder(keys, UnsignedFallback::Allow);

        let now = Utc.timestamp_opt(1_700_001_234, 0).unwrap();
        let reply = responder.respond_at(&zone(), true, now).unwrap();

        assert_eq!(reply.status, ResponseStatus::Signed);
        assert!(reply.failures.is_empty());
        let signed_tags: Vec<u16> = reply
            .rrsigs()
            .map(|rr| rr.as_rrsig().unwrap().key_tag)
            .collect();
        assert_eq!(signed_tags, tags);

        let rrsig = reply.rrsigs().next().unwrap().as_rrsig().unwrap();
        assert_eq!(rrsig.type_covered, DNSResourceType::DNSKEY);
        assert_eq!(rrsig.signer_name, zone());
        assert_eq!(rrsig.inception, 1_699_999_200);
        assert_eq!(rrsig.expiration, 1_700_002_800);
        assert_eq!(rrsig.labels, 2);
    }

    #[test]
    fn test_partial_failure_still_signed() {
        let good = ed25519_key(1);
        let bad = mismatched_key();
        let bad_tag = bad.key_tag();
        let responder = responder(vec![bad, good], UnsignedFallback::Refuse);

        let reply = responder.respond(&zone(), true).unwrap();
        assert_eq!(reply.status, ResponseStatus::Signed);
        assert_eq!(reply.rrsigs().count(), 1);
        assert_eq!(reply.failures.len(), 1);
        assert!(matches!(
            reply.failures[0],
            SignError::SigningFailure { key_tag, .. } if key_tag == bad_tag
        ));
        assert_eq!(responder.metrics().signing_failure_count(bad_tag), 1);
    }

    #[test]
    fn test_total_failure_allow_is_degraded() {
        let responder = responder(vec![mismatched_key()], UnsignedFallback::Allow);
        let reply = responder.respond(&zone(), true).unwrap();

        assert_eq!(reply.status, ResponseStatus::Degraded);
        assert_eq!(reply.dnskeys().count(), 1);
        assert_eq!(reply.rrsigs().count(), 0);
        assert_eq!(reply.failures.len(), 1);
        assert_eq!(responder.metrics().response_count(ResponseStatus::Degraded), 1);
        assert_eq!(responder.metrics().response_count(ResponseStatus::Unsigned), 0);
    }

    #[test]
    fn test_total_failure_refuse_errors() {
        let responder = responder(vec![mismatched_key()], UnsignedFallback::Refuse);
        assert_eq!(
            responder.respond(&zone(), true).unwrap_err(),
            SignError::SigningUnavailable("Example.COM.".to_string())
        );
    }

    #[test]
    fn test_empty_key_set() {
        let responder = responder(Vec::new(), UnsignedFallback::Refuse);
        let reply = responder.respond(&zone(), true).unwrap();
        assert!(reply.answers.is_empty());
        assert_eq!(reply.status, ResponseStatus::Unsigned);
    }

    #[test]
    fn test_clock_before_epoch_allow_degrades() {
        let responder = responder(vec![ed25519_key(1)], UnsignedFallback::Allow);
        let before_epoch = Utc.timestamp_opt(-60, 0).unwrap();

        let reply = responder.respond_at(&zone(), true, before_epoch).unwrap();
        assert_eq!(reply.status, ResponseStatus::Degraded);
        assert_eq!(reply.dnskeys().count(), 1);
        assert_eq!(reply.rrsigs().count(), 0);
        assert_eq!(reply.failures, vec![SignError::ClockOutOfRange(-60)]);
        assert_eq!(
            responder.metrics().response_count(ResponseStatus::Degraded),
            1
        );
    }

    #[test]
    fn test_clock_before_epoch_refuse_errors() {
        let responder = responder(vec![ed25519_key(1)], UnsignedFallback::Refuse);
        let before_epoch = Utc.timestamp_opt(-60, 0).unwrap();
        assert_eq!(
            responder.respond_at(&zone(), true, before_epoch).unwrap_err(),
            SignError::SigningUnavailable("Example.COM.".to_string())
        );
    }

    #[tokio::test]
    async fn test_bounded_signing() {
        let responder = responder(vec![ed25519_key(1)], UnsignedFallback::Refuse);
        let reply = responder.respond_bounded(&zone(), true).await.unwrap();
        assert_eq!(reply.status, ResponseStatus::Signed);
        assert_eq!(reply.rrsigs().count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_applies_fallback() {
        let mut responder = responder(vec![ed25519_key(1)], UnsignedFallback::Allow);
        responder.policy.signing_timeout = Duration::from_millis(10);

        let stalled =
            std::future::pending::<Result<Result<SignedAnswers, SignError>, String>>();
        let reply = responder.await_signing(&zone(), stalled).await.unwrap();
        assert_eq!(reply.status, ResponseStatus::Degraded);
        assert_eq!(reply.dnskeys().count(), 1);
        assert_eq!(responder.metrics().signing_timeout_count(), 1);

        responder.policy.fallback = UnsignedFallback::Refuse;
        let stalled =
            std::future::pending::<Result<Result<SignedAnswers, SignError>, String>>();
        assert!(matches!(
            responder.await_signing(&zone(), stalled).await,
            Err(SignError::SigningUnavailable(_))
        ));
        assert_eq!(responder.metrics().signing_timeout_count(), 2);
    }
}
