use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder, histogram_opts, opts,
};

use crate::dnssec::ResponseStatus;

/// Prometheus collectors for DNSKEY responses and RRSIG production
pub struct SigningMetrics {
    registry: Registry,

    dnskey_responses: IntCounterVec,
    signing_failures: IntCounterVec,
    signing_timeouts: IntCounter,
    signing_duration: Histogram,
}

impl SigningMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let dnskey_responses = IntCounterVec::new(
            opts!(
                "dnssec_dnskey_responses_total",
                "Total number of DNSKEY responses built, by signing status"
            ),
            &["status"],
        )?;

        let signing_failures = IntCounterVec::new(
            opts!(
                "dnssec_signing_failures_total",
                "Total number of signatures a key failed to produce"
            ),
            &["key_tag"],
        )?;

        let signing_timeouts = IntCounter::with_opts(opts!(
            "dnssec_signing_timeouts_total",
            "Total number of signing jobs abandoned after the signing timeout"
        ))?;

        let signing_duration = Histogram::with_opts(
            histogram_opts!(
                "dnssec_signing_duration_seconds",
                "Time spent signing one RRset with every key"
            )
            .buckets(vec![
                0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
            ]),
        )?;

        registry.register(Box::new(dnskey_responses.clone()))?;
        registry.register(Box::new(signing_failures.clone()))?;
        registry.register(Box::new(signing_timeouts.clone()))?;
        registry.register(Box::new(signing_duration.clone()))?;

        Ok(Self {
            registry,
            dnskey_responses,
            signing_failures,
            signing_timeouts,
            signing_duration,
        })
    }

    /// Record a DNSKEY response by its status
    pub fn record_response(&self, status: ResponseStatus) {
        self.dnskey_responses
            .with_label_values(&[status.as_str()])
            .inc();
    }

    /// Record a key that failed to sign
    pub fn record_signing_failure(&self, key_tag: u16) {
        self.signing_failures
            .with_label_values(&[key_tag.to_string().as_str()])
            .inc();
    }

    pub fn record_signing_timeout(&self) {
        self.signing_timeouts.inc();
    }

    pub fn observe_signing_duration(&self, duration: std::time::Duration) {
        self.signing_duration.observe(duration.as_secs_f64());
    }

    pub fn response_count(&self, status: ResponseStatus) -> u64 {
        self.dnskey_responses
            .with_label_values(&[status.as_str()])
            .get()
    }

    pub fn signing_failure_count(&self, key_tag: u16) -> u64 {
        self.signing_failures
            .with_label_values(&[key_tag.to_string().as_str()])
            .get()
    }

    pub fn signing_timeout_count(&self) -> u64 {
        self.signing_timeouts.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export metrics in Prometheus text format
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

impl Default for SigningMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create signing metrics")
    }
}
