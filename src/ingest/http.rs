//! Outbound HTTP for provider adapters.

use std::future::Future;
use std::time::Duration;

use rand::seq::IndexedRandom;
use reqwest::{header::USER_AGENT, Client, Url};

use super::rate_limit::{Attempt, Operation};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.51",
];

/// Upper bound for one provider request, connect included. A request that
/// runs past it is reported as throttled and retried.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// GET a provider URL and return the body text.
///
/// Transport failures and any non-2xx status are reported as
/// [`Attempt::Throttled`] so the surrounding rate limiter waits and retries.
#[derive(Clone)]
pub struct HttpGet {
    provider: &'static str,
    client: Client,
    timeout: Duration,
}

impl HttpGet {
    pub fn new(provider: &'static str) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "ingest", provider, error = %e, "http client builder failed, using defaults");
                Client::new()
            });
        Self::with_client(provider, client)
    }

    pub fn with_client(provider: &'static str, client: Client) -> Self {
        Self {
            provider,
            client,
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Per-request deadline; also applied when the client came from elsewhere.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Operation<Url> for HttpGet {
    type Output = String;

    fn invoke(&self, url: Url) -> impl Future<Output = Attempt<String>> + Send {
        let request = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header(USER_AGENT, random_user_agent());
        let provider = self.provider;

        async move {
            // URLs carry api keys, so only the provider name is logged.
            let resp = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!(target: "ingest", provider, error = %e, "provider http error");
                    return Attempt::Throttled(format!("{provider} request failed: {e}"));
                }
            };

            let status = resp.status();
            if !status.is_success() {
                tracing::error!(
                    target: "ingest",
                    provider,
                    status = status.as_u16(),
                    "{provider} API returned a non-success status"
                );
                return Attempt::Throttled(format!("{provider} API returned status code {status}"));
            }

            match resp.text().await {
                Ok(body) => Attempt::Ready(body),
                Err(e) => Attempt::Throttled(format!("{provider} body read failed: {e}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::rate_limit::{RateLimit, RateLimitedCall};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn stalled_request_times_out_and_is_retried() {
        let server = MockServer::start().await;
        // First request hangs far past the deadline; the retry answers at once.
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3600)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
            .mount(&server)
            .await;

        let get = HttpGet::new("Test").with_timeout(Duration::from_millis(200));
        let limited = RateLimitedCall::new(
            "test_feed",
            RateLimit::new(100, Duration::from_millis(50)),
            get,
        );
        let url = Url::parse(&format!("{}/feed", server.uri())).unwrap();

        let body = tokio::time::timeout(Duration::from_secs(10), limited.call(url))
            .await
            .expect("request never timed out");

        assert_eq!(body, "fresh");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_success_status_is_throttled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let attempt = HttpGet::new("Test").invoke(url).await;
        assert!(matches!(attempt, Attempt::Throttled(_)));
    }

    #[test]
    fn returns_one_of_the_known_user_agents() {
        for _ in 0..20 {
            let ua = random_user_agent();
            assert!(USER_AGENTS.contains(&ua));
        }
    }
}
