//! Política de reintentos a nivel de infraestructura.
//!
//! Distinta del reintento de dominio (re-diseño tras fallo de DDL): aquí se
//! repite la misma ejecución del nodo ante errores transitorios o de
//! validación, con backoff exponencial acotado.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{classify_error, NodeError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Intentos totales, incluido el primero.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_factor: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS,
               initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
               backoff_factor: DEFAULT_BACKOFF_FACTOR,
               max_backoff_ms: DEFAULT_MAX_BACKOFF_MS }
    }
}

impl RetryPolicy {
    /// Un único intento.
    pub fn none() -> Self {
        Self { max_attempts: 1,
               ..Self::default() }
    }

    /// Reintentos sin espera (tests).
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1),
               initial_backoff_ms: 0,
               backoff_factor: 1.0,
               max_backoff_ms: 0 }
    }

    /// Espera antes del intento `attempt + 1` (attempt empieza en 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let raw = self.initial_backoff_ms as f64 * self.backoff_factor.max(1.0).powi(exp);
        let capped = raw.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Ejecuta `op` hasta que tenga éxito, falle con un error no reintentable o
/// se agoten los intentos. `on_retry(attempt, delay, err)` se invoca antes de
/// cada espera.
pub async fn run_with_retry<T, F, Fut, R>(policy: &RetryPolicy, mut op: F, mut on_retry: R) -> Result<T, NodeError>
    where F: FnMut(u32) -> Fut,
          Fut: Future<Output = Result<T, NodeError>>,
          R: FnMut(u32, Duration, &NodeError)
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(err) if attempt < max_attempts && classify_error(&err).is_retryable() => {
                let delay = policy.delay_for(attempt);
                on_retry(attempt, delay, &err);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn backoff_grows_and_caps() {
        let p = RetryPolicy { max_attempts: 5,
                              initial_backoff_ms: 100,
                              backoff_factor: 2.0,
                              max_backoff_ms: 350 };
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = Cell::new(0);
        let retries = Cell::new(0);
        let out = run_with_retry(&RetryPolicy::immediate(3),
                                 |attempt| {
                                     calls.set(calls.get() + 1);
                                     async move {
                                         if attempt < 3 {
                                             Err(NodeError::Transient("timeout".into()))
                                         } else {
                                             Ok(attempt)
                                         }
                                     }
                                 },
                                 |_, _, _| retries.set(retries.get() + 1)).await;
        assert_eq!(out, Ok(3));
        assert_eq!(calls.get(), 3);
        assert_eq!(retries.get(), 2);
    }

    #[tokio::test]
    async fn termination_is_never_retried() {
        let calls = Cell::new(0);
        let out: Result<(), _> = run_with_retry(&RetryPolicy::immediate(5),
                                                |_| {
                                                    calls.set(calls.get() + 1);
                                                    async { Err(NodeError::Termination("stop".into())) }
                                                },
                                                |_, _, _| {}).await;
        assert!(matches!(out, Err(NodeError::Termination(_))));
        assert_eq!(calls.get(), 1);
    }
}
