use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Failures talking to an LLM provider
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("no LLM provider configured")]
    NotConfigured,

    #[error("unsupported LLM provider: {0}")]
    UnsupportedProvider(String),

    #[error("rate limited by {provider}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("network error with {provider}: {message}")]
    Network { provider: String, message: String },

    #[error("{provider} is temporarily unavailable (HTTP {status})")]
    ServiceUnavailable { provider: String, status: u16 },

    #[error("authentication with {provider} failed: {message}")]
    Authentication { provider: String, message: String },

    #[error("API error from {provider} (HTTP {status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {provider}: {message}")]
    Parse { provider: String, message: String },

    #[error("giving up on {provider} after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        provider: String,
        attempts: u32,
        last_error: String,
    },
}

impl LlmError {
    /// Classify a non-success HTTP status
    pub fn from_status(provider: &str, status: u16, body: String) -> Self {
        let provider = provider.to_string();
        match status {
            401 | 403 => LlmError::Authentication { provider, message: body },
            429 => LlmError::RateLimited {
                provider,
                retry_after: None,
            },
            500 | 502 | 503 | 504 | 529 => LlmError::ServiceUnavailable { provider, status },
            _ => LlmError::Api {
                provider,
                status,
                message: body,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Network { .. } | LlmError::ServiceUnavailable { .. }
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorHandler {
    config: RetryConfig,
}

impl ErrorHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation`, retrying transient failures with exponential backoff
    pub async fn execute_with_retry<F, Fut, T>(&self, provider: &str, mut operation: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let mut attempts = 0;

        loop {
            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };
            attempts += 1;

            if !error.is_retryable() {
                return Err(error);
            }
            if attempts > self.config.max_retries {
                return Err(LlmError::MaxRetriesExceeded {
                    provider: provider.to_string(),
                    attempts,
                    last_error: error.to_string(),
                });
            }

            let delay = match &error {
                LlmError::RateLimited {
                    retry_after: Some(after),
                    ..
                } => (*after).min(self.config.max_delay),
                _ => self.calculate_delay(attempts),
            };

            tracing::debug!(provider, attempts, delay_ms = delay.as_millis() as u64, error = %error, "retrying LLM request");
            sleep(delay).await;
        }
    }

    /// Calculate delay for retry with exponential backoff
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.config.base_delay.as_millis() as f64;
        let delay_ms = base_delay_ms * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let final_delay_ms = if self.config.jitter {
            // ±25%
            let jitter = rand::thread_rng().gen_range(-0.25..=0.25);
            delay_ms * (1.0 + jitter)
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay_ms as u64).min(self.config.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_retries(max_retries: u32) -> ErrorHandler {
        ErrorHandler::new(RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        })
    }

    fn network_error() -> LlmError {
        LlmError::Network {
            provider: "test".to_string(),
            message: "Connection failed".to_string(),
        }
    }

    #[test]
    fn test_retryable_errors() {
        assert!(LlmError::from_status("claude", 429, String::new()).is_retryable());
        assert!(LlmError::from_status("claude", 503, String::new()).is_retryable());
        assert!(network_error().is_retryable());

        let auth = LlmError::from_status("claude", 401, "invalid x-api-key".to_string());
        assert!(matches!(auth, LlmError::Authentication { .. }));
        assert!(!auth.is_retryable());
        assert!(!LlmError::from_status("claude", 400, "bad".to_string()).is_retryable());
    }

    #[test]
    fn test_delay_calculation() {
        let handler = ErrorHandler::new(RetryConfig {
            base_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(3),
            jitter: false,
            ..Default::default()
        });

        assert_eq!(handler.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(handler.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(handler.calculate_delay(3), Duration::from_millis(3000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let handler = ErrorHandler::new(RetryConfig {
            base_delay: Duration::from_millis(1000),
            ..Default::default()
        });
        for _ in 0..20 {
            let delay = handler.calculate_delay(1);
            assert!(delay >= Duration::from_millis(750) && delay <= Duration::from_millis(1250));
        }
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let handler = fast_retries(2);
        let attempt_count = Cell::new(0);

        let result = handler
            .execute_with_retry("test", || {
                attempt_count.set(attempt_count.get() + 1);
                let attempt = attempt_count.get();
                async move { if attempt < 3 { Err(network_error()) } else { Ok("Success") } }
            })
            .await;

        assert_eq!(result.unwrap(), "Success");
        assert_eq!(attempt_count.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let handler = fast_retries(2);
        let attempt_count = Cell::new(0);

        let result: Result<(), LlmError> = handler
            .execute_with_retry("test", || {
                attempt_count.set(attempt_count.get() + 1);
                async { Err(network_error()) }
            })
            .await;

        assert!(matches!(result, Err(LlmError::MaxRetriesExceeded { attempts: 3, .. })));
        assert_eq!(attempt_count.get(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let handler = fast_retries(3);
        let attempt_count = Cell::new(0);

        let result: Result<(), LlmError> = handler
            .execute_with_retry("test", || {
                attempt_count.set(attempt_count.get() + 1);
                async { Err(LlmError::from_status("test", 401, "denied".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(LlmError::Authentication { .. })));
        assert_eq!(attempt_count.get(), 1);
    }
}
