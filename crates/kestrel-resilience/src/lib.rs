// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry primitives for the provider boundary.
//!
//! Only transient failures (timeouts, 429, 5xx, dropped connections) are
//! retried; everything else propagates on the first attempt. Retrying
//! happens here and nowhere else in the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use kestrel_core::{
    AdapterType, HealthStatus, KestrelError, PluginAdapter, ProviderAdapter, ProviderRequest,
    ProviderResponse,
};
use tracing::warn;

/// Exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based): base, 2x base, 4x base, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Wraps a provider and retries its transient failures.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
    name: String,
}

impl<P: ProviderAdapter> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        let name = format!("{}+retry", inner.name());
        Self {
            inner,
            policy,
            name,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: ProviderAdapter> PluginAdapter for RetryingProvider<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), KestrelError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl<P: ProviderAdapter> ProviderAdapter for RetryingProvider<P> {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, KestrelError> {
        let mut retry = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && retry < self.policy.max_retries => {
                    retry += 1;
                    let delay = self.policy.delay_for(retry);
                    warn!(
                        provider = self.inner.name(),
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct AttemptCounter(Mutex<u32>);

    impl AttemptCounter {
        fn bump(&self) -> u32 {
            let mut n = self.0.lock().unwrap();
            *n += 1;
            *n
        }

        fn get(&self) -> u32 {
            *self.0.lock().unwrap()
        }
    }

    /// Fails with the given statuses in order, then succeeds.
    struct Flaky {
        failures: Vec<Option<u16>>,
        attempts: AttemptCounter,
    }

    #[async_trait]
    impl PluginAdapter for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Provider
        }
    }

    #[async_trait]
    impl ProviderAdapter for Flaky {
        async fn complete(&self, _req: ProviderRequest) -> Result<ProviderResponse, KestrelError> {
            let n = self.attempts.bump() as usize;
            match self.failures.get(n - 1) {
                Some(Some(status)) => Err(KestrelError::Provider {
                    message: format!("status {status}"),
                    status: Some(*status),
                    source: None,
                }),
                Some(None) => Err(KestrelError::Timeout {
                    duration: Duration::from_secs(1),
                }),
                None => Ok(ProviderResponse::text("ok")),
            }
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            messages: vec![],
            tools: vec![],
            model: "m".into(),
            temperature: 0.0,
            max_tokens: 16,
        }
    }

    fn flaky(failures: Vec<Option<u16>>) -> Flaky {
        Flaky {
            failures,
            attempts: AttemptCounter::default(),
        }
    }

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let provider = RetryingProvider::new(
            flaky(vec![Some(429), Some(503), None]),
            RetryPolicy::new(3, Duration::from_millis(10)),
        );
        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(provider.inner().attempts.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let provider = RetryingProvider::new(
            flaky(vec![Some(500), Some(500), Some(500)]),
            RetryPolicy::new(2, Duration::from_millis(10)),
        );
        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, KestrelError::Provider { status: Some(500), .. }));
        assert_eq!(provider.inner().attempts.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let provider = RetryingProvider::new(
            flaky(vec![Some(401)]),
            RetryPolicy::new(3, Duration::from_millis(10)),
        );
        assert!(provider.complete(request()).await.is_err());
        assert_eq!(provider.inner().attempts.get(), 1);
    }

    #[test]
    fn name_marks_decorator() {
        let provider = RetryingProvider::new(flaky(vec![]), RetryPolicy::default());
        assert_eq!(provider.name(), "flaky+retry");
    }
}
