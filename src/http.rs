use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::SelectorError;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, Copy)]
pub struct HttpSettings {
    /// `None` leaves the request unbounded.
    pub timeout: Option<Duration>,
    pub accept_invalid_certs: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(60)),
            accept_invalid_certs: false,
        }
    }
}

pub fn user_agent() -> String {
    format!("wfs/{}", env!("CARGO_PKG_VERSION"))
}

pub fn build_client(
    settings: HttpSettings,
    on_error: fn(String) -> SelectorError,
) -> Result<Client, SelectorError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent()).map_err(|err| on_error(err.to_string()))?,
    );
    let mut builder = Client::builder()
        .default_headers(headers)
        .danger_accept_invalid_certs(settings.accept_invalid_certs);
    // The blocking client applies a 30s default unless told otherwise.
    builder = builder.timeout(settings.timeout);
    builder.build().map_err(|err| on_error(err.to_string()))
}

/// Sends the request built by `make_req`, retrying throttling, 5xx and
/// transient transport failures with a linear backoff.
pub fn send_with_retries<F>(
    mut make_req: F,
    on_error: fn(String) -> SelectorError,
) -> Result<Response, SelectorError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match make_req().send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    tracing::debug!(status, attempt, "retrying request");
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    tracing::debug!(error = %err, attempt, "retrying request");
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Err(on_error(err.to_string()));
            }
        }
    }
}

fn backoff(attempt: usize) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    thread::sleep(Duration::from_millis(delay));
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
