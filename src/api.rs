//! LLM API interaction with exponential backoff retry logic.
//!
//! The module uses a trait-based design:
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`AskFnWrapper`]: wraps the `awful_aj` library's `ask` function
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync` implementation
//!
//! Retries follow [`Backoff::llm`]: 3 attempts in total, 0.6s doubling up to
//! 6s, plus a small jitter that grows with the attempt index.

use crate::error::SummarizeError;
use crate::retry::Backoff;
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use std::error::Error;
use std::fmt;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors send text to an LLM and return its reply. Decorators such as
/// [`RetryAsk`] implement it too.
pub trait AskAsync {
    type Response;

    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Adds bounded exponential backoff to any [`AskAsync`] implementation.
pub struct RetryAsk<T> {
    inner: T,
    backoff: Backoff,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// ```ignore
    /// let client = AskFnWrapper { config, template };
    /// let retry_client = RetryAsk::new(client, Backoff::llm());
    /// ```
    pub fn new(inner: T, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt >= self.backoff.max_attempts {
                        error!(
                            attempt,
                            max = self.backoff.max_attempts,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff.delay(attempt - 1);
                    warn!(
                        attempt,
                        max = self.backoff.max_attempts,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// LLM endpoint, model and key.
    pub config: &'a AwfulJadeConfig,
    /// System prompt and seed messages.
    pub template: &'a ChatTemplate,
}

impl AskAsync for AskFnWrapper<'_> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        let dt = t0.elapsed();

        if let Err(e) = &res {
            warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed");
        }
        res
    }
}

/// Send `prompt` to the LLM, retrying per [`Backoff::llm`].
///
/// Backend failures that survive every attempt become
/// [`SummarizeError::Backend`].
#[instrument(level = "info", skip_all)]
pub async fn ask_with_backoff(
    config: &AwfulJadeConfig,
    prompt: &str,
    template: &ChatTemplate,
) -> Result<String, SummarizeError> {
    let t0 = Instant::now();
    let client = AskFnWrapper { config, template };
    let api = RetryAsk::new(client, Backoff::llm());
    let res = api.ask(prompt).await;
    let dt = t0.elapsed();

    match res {
        Ok(reply) => {
            info!(elapsed_ms_total = dt.as_millis() as u64, "ask_with_backoff succeeded");
            Ok(reply)
        }
        Err(e) => {
            error!(elapsed_ms_total = dt.as_millis() as u64, error = %e, "ask_with_backoff failed");
            Err(SummarizeError::Backend(e.to_string()))
        }
    }
}
