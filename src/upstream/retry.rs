// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded retry with exponential backoff and jitter for upstream calls.

use std::time::Duration;

use axum::http::Method;
use rand::Rng;
use tracing::{error, warn};

/// Per-route retry policy.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retrying.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Methods that may be retried. Other methods get a single attempt.
    pub methods: Vec<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            methods: Vec::new(),
        }
    }

    /// `retries` extra attempts for `GET`, backing off from `initial_delay`
    /// up to `max_delay`.
    pub fn with_retries(retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            initial_delay,
            max_delay,
            backoff_multiplier: 2.0,
            methods: vec![Method::GET],
        }
    }

    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    /// The effective policy for one request.
    pub fn for_method(&self, method: &Method) -> RetryPolicy {
        if self.methods.contains(method) {
            self.clone()
        } else {
            RetryPolicy {
                max_attempts: 1,
                ..self.clone()
            }
        }
    }
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or `policy.max_attempts` is reached.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => {
                if attempt >= max_attempts {
                    if max_attempts > 1 {
                        error!(
                            operation = %operation_name,
                            attempt = attempt,
                            error = %e,
                            "Upstream call failed after max retries"
                        );
                    }
                    return Err(e);
                }

                // 0.5x to 1.5x of the delay
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = jittered_delay.as_millis(),
                    "Upstream call failed, retrying"
                );

                tokio::time::sleep(jittered_delay).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * policy.backoff_multiplier)
                        .min(policy.max_delay.as_secs_f64()),
                );
            }
        }
    }
}
