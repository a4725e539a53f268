//! Bounded exponential backoff for transient oracle failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::RetryConfig;
use crate::error::OracleError;
use crate::llm::provider::{OraclePrompt, ResponseOracle};

/// Wraps an oracle and retries `Unavailable` / `RateLimited` failures.
///
/// Other errors (auth, bad request, malformed reply) are returned at once.
pub struct RetryingOracle {
    inner: Arc<dyn ResponseOracle>,
    config: RetryConfig,
}

impl RetryingOracle {
    pub fn new(inner: Arc<dyn ResponseOracle>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn backoff(&self, attempt: u32, err: &OracleError) -> Duration {
        if let OracleError::RateLimited {
            retry_after: Some(after),
            ..
        } = err
        {
            return (*after).min(self.config.max_delay);
        }
        let base = self.config.delay_for(attempt);
        let jitter_ms = base.as_millis() as u64 / 4;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

#[async_trait]
impl ResponseOracle for RetryingOracle {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn complete(&self, prompt: &OraclePrompt, model: &str) -> Result<String, OracleError> {
        let mut attempt = 1;
        loop {
            match self.inner.complete(prompt, model).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.backoff(attempt, &e);
                    tracing::warn!(
                        provider = self.inner.provider_name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Oracle call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
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

    /// Fails with the queued errors, then succeeds.
    struct Flaky {
        failures: Mutex<Vec<OracleError>>,
        calls: Mutex<u32>,
    }

    impl Flaky {
        fn new(failures: Vec<OracleError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ResponseOracle for Flaky {
        fn provider_name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _prompt: &OraclePrompt,
            _model: &str,
        ) -> Result<String, OracleError> {
            *self.calls.lock().unwrap() += 1;
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok("{}".to_string())
            } else {
                Err(failures.remove(0))
            }
        }
    }

    fn unavailable() -> OracleError {
        OracleError::Unavailable {
            provider: "flaky".into(),
            reason: "connection reset".into(),
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let inner = Arc::new(Flaky::new(vec![unavailable(), unavailable()]));
        let oracle = RetryingOracle::new(inner.clone(), fast_retry(3));
        let reply = oracle
            .complete(&OraclePrompt::new("s", "u"), "m")
            .await
            .unwrap();
        assert_eq!(reply, "{}");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let inner = Arc::new(Flaky::new(vec![unavailable(), unavailable(), unavailable()]));
        let oracle = RetryingOracle::new(inner.clone(), fast_retry(2));
        let err = oracle
            .complete(&OraclePrompt::new("s", "u"), "m")
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn does_not_retry_auth_failures() {
        let inner = Arc::new(Flaky::new(vec![OracleError::AuthFailed {
            provider: "flaky".into(),
        }]));
        let oracle = RetryingOracle::new(inner.clone(), fast_retry(5));
        let err = oracle
            .complete(&OraclePrompt::new("s", "u"), "m")
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::AuthFailed { .. }));
        assert_eq!(inner.calls(), 1);
    }

    #[test]
    fn rate_limit_honours_retry_after() {
        let oracle = RetryingOracle::new(
            Arc::new(Flaky::new(vec![])),
            RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_secs(5),
            },
        );
        let err = OracleError::RateLimited {
            provider: "flaky".into(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(oracle.backoff(1, &err), Duration::from_secs(2));
    }
}
