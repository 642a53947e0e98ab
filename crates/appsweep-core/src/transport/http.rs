//! Single blocking GET over libcurl.

use std::time::Duration;

use crate::retry::TransportError;

/// Status code and body of a completed request.
#[derive(Debug)]
pub(super) struct HttpResponse {
    pub code: u32,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 429 maps to the rate-limit error; any other non-2xx to `Http`.
    pub fn ensure_success(&self) -> Result<(), TransportError> {
        match self.code {
            200..=299 => Ok(()),
            429 => Err(TransportError::RateLimited),
            code => Err(TransportError::Http(code)),
        }
    }
}

/// Performs a GET and collects the body. Follows redirects.
pub(super) fn get(url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
    let mut body = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(15).min(timeout))?;
    easy.timeout(timeout)?;
    easy.accept_encoding("")?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    Ok(HttpResponse { code, body })
}
