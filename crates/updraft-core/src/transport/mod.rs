//! HTTP GET transport with streamed, progress-reporting downloads.
//!
//! Uses the curl crate (libcurl). Every request sends a fixed User-Agent,
//! follows redirects and is bounded by a connect timeout and a low-speed
//! abort. Response headers are inspected before any body byte is accepted,
//! so a non-2xx status never touches the destination file.
//!
//! Calls block the current thread; from async code go through [`run_blocking`].
//! The curl handle is owned by the call and released on every exit path,
//! including errors and cancellation.

mod cancel;
mod headers;
mod progress;

pub use cancel::CancelToken;
pub use progress::{ProgressEvent, CHUNKS_PER_EVENT, CHUNK_SIZE};

use std::cell::RefCell;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crate::config::UpdaterConfig;
use crate::error::UpdateError;
use headers::ResponseHead;
use progress::ChunkedSink;

/// Blocking HTTP operations the update engine needs.
pub trait Transport: Send + Sync {
    /// GET `url` and return the raw body. Decoding is left to the caller.
    fn fetch_bytes(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, UpdateError>;

    /// GET `url`, read only the response headers and return `Content-Disposition`, if any.
    fn content_disposition(
        &self,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<Option<String>, UpdateError>;

    /// GET `url` and stream the body into `dest`, replacing any existing file.
    ///
    /// `on_progress` fires every [`CHUNKS_PER_EVENT`] chunks and once when the
    /// body ends. On error or cancellation `dest` may hold a partial file;
    /// removing it is up to the caller. Returns the number of bytes written.
    fn download(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<u64, UpdateError>;
}

/// Knobs for [`CurlTransport`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Abort when throughput stays below this many bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub max_redirections: u32,
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions::from(&UpdaterConfig::default())
    }
}

impl From<&UpdaterConfig> for TransportOptions {
    fn from(cfg: &UpdaterConfig) -> Self {
        Self {
            user_agent: cfg.effective_user_agent(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_limit: cfg.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
            max_redirections: cfg.max_redirections,
        }
    }
}

/// libcurl-backed [`Transport`].
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    options: TransportOptions,
}

impl CurlTransport {
    pub fn new(options: TransportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    fn easy(&self, url: &str) -> Result<curl::easy::Easy, UpdateError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)
            .map_err(|e| UpdateError::Network(format!("invalid URL {}: {}", url, e)))?;
        easy.get(true)?;
        easy.useragent(&self.options.user_agent)?;
        easy.follow_location(true)?;
        easy.max_redirections(self.options.max_redirections)?;
        easy.connect_timeout(self.options.connect_timeout)?;
        easy.low_speed_limit(self.options.low_speed_limit)?;
        easy.low_speed_time(self.options.low_speed_time)?;
        // Progress callbacks drive cancellation checks, including while the
        // server is silent.
        easy.progress(true)?;
        Ok(easy)
    }
}

/// Map a failed perform: a raised token wins over whatever curl reported.
fn transfer_error(e: curl::Error, cancel: &CancelToken) -> UpdateError {
    if cancel.is_cancelled() || e.is_aborted_by_callback() {
        UpdateError::Cancelled
    } else {
        e.into()
    }
}

fn http_error(url: &str, head: &ResponseHead) -> UpdateError {
    UpdateError::Http {
        url: url.to_string(),
        status: head.status.unwrap_or(0),
    }
}

fn ensure_success(easy: &mut curl::easy::Easy, url: &str) -> Result<(), UpdateError> {
    let status = easy.response_code()?;
    if !(200..300).contains(&status) {
        return Err(UpdateError::Http {
            url: url.to_string(),
            status,
        });
    }
    Ok(())
}

impl Transport for CurlTransport {
    fn fetch_bytes(&self, url: &str, cancel: &CancelToken) -> Result<Vec<u8>, UpdateError> {
        let mut easy = self.easy(url)?;
        let head = RefCell::new(ResponseHead::default());
        let mut body: Vec<u8> = Vec::new();
        let mut rejected = false;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|line| {
                head.borrow_mut().observe(line);
                true
            })?;
            transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
            transfer.write_function(|data| {
                if cancel.is_cancelled() {
                    return Ok(0);
                }
                if !head.borrow().is_success() {
                    rejected = true;
                    return Ok(0);
                }
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()
        };

        if let Err(e) = performed {
            if rejected {
                return Err(http_error(url, &head.borrow()));
            }
            return Err(transfer_error(e, cancel));
        }
        ensure_success(&mut easy, url)?;
        tracing::debug!(url, bytes = body.len(), "fetched body");
        Ok(body)
    }

    fn content_disposition(
        &self,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<Option<String>, UpdateError> {
        let mut easy = self.easy(url)?;
        let head = RefCell::new(ResponseHead::default());
        let mut stopped = false;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|line| {
                head.borrow_mut().observe(line);
                true
            })?;
            transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
            // Headers are all we need; refuse the first body byte.
            transfer.write_function(|_| {
                stopped = true;
                Ok(0)
            })?;
            transfer.perform()
        };

        match performed {
            Err(e) if !(stopped && e.is_write_error()) => return Err(transfer_error(e, cancel)),
            _ => {}
        }
        let head = head.into_inner();
        if !head.is_success() {
            return Err(http_error(url, &head));
        }
        Ok(head.content_disposition)
    }

    fn download(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancelToken,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<u64, UpdateError> {
        let mut easy = self.easy(url)?;
        easy.buffer_size(CHUNK_SIZE)?;

        let head = RefCell::new(ResponseHead::default());
        let mut sink: Option<ChunkedSink<File>> = None;
        let mut failure: Option<UpdateError> = None;

        let performed = {
            let mut transfer = easy.transfer();
            transfer.header_function(|line| {
                head.borrow_mut().observe(line);
                true
            })?;
            transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
            transfer.write_function(|data| {
                if cancel.is_cancelled() {
                    failure = Some(UpdateError::Cancelled);
                    return Ok(0);
                }
                if sink.is_none() {
                    let head = head.borrow();
                    if !head.is_success() {
                        failure = Some(http_error(url, &head));
                        return Ok(0);
                    }
                    match File::create(dest) {
                        Ok(f) => sink = Some(ChunkedSink::new(f, head.content_length)),
                        Err(e) => {
                            failure = Some(UpdateError::io("create", dest, e));
                            return Ok(0);
                        }
                    }
                }
                let Some(s) = sink.as_mut() else {
                    return Ok(0);
                };
                if let Err(e) = s.push(data, &mut *on_progress) {
                    failure = Some(UpdateError::io("write", dest, e));
                    return Ok(0);
                }
                Ok(data.len())
            })?;
            transfer.perform()
        };

        if let Err(e) = performed {
            if let Some(f) = failure {
                return Err(f);
            }
            return Err(transfer_error(e, cancel));
        }
        ensure_success(&mut easy, url)?;

        let sink = match sink {
            Some(s) => s,
            // Empty body: still leave an (empty) file behind.
            None => {
                let f = File::create(dest).map_err(|e| UpdateError::io("create", dest, e))?;
                ChunkedSink::new(f, head.borrow().content_length)
            }
        };
        let written = sink
            .finish(on_progress)
            .map_err(|e| UpdateError::io("write", dest, e))?;
        tracing::debug!(url, dest = %dest.display(), bytes = written, "download complete");
        Ok(written)
    }
}

/// Run a blocking transport or filesystem call on tokio's blocking pool.
///
/// A panic in `f` resumes on the caller.
pub(crate) async fn run_blocking<F, R>(f: F) -> Result<R, UpdateError>
where
    F: FnOnce() -> Result<R, UpdateError> + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(res) => res,
        Err(e) => match e.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            Err(_) => Err(UpdateError::Cancelled),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let mut cfg = UpdaterConfig::default();
        cfg.user_agent = "my-launcher/2".into();
        cfg.connect_timeout_secs = 5;
        cfg.max_redirections = 3;
        let opts = TransportOptions::from(&cfg);
        assert_eq!(opts.user_agent, "my-launcher/2");
        assert_eq!(opts.connect_timeout, Duration::from_secs(5));
        assert_eq!(opts.max_redirections, 3);
    }

    #[test]
    fn default_user_agent_is_never_empty() {
        let mut cfg = UpdaterConfig::default();
        cfg.user_agent = "   ".into();
        assert!(!TransportOptions::from(&cfg).user_agent.trim().is_empty());
        assert!(!TransportOptions::default().user_agent.is_empty());
    }

    #[test]
    fn unreachable_host_is_network_error() {
        // Port 9 on loopback is almost never listening; connection is refused.
        let t = CurlTransport::default();
        let err = t
            .fetch_bytes("http://127.0.0.1:9/manifest.json", &CancelToken::new())
            .unwrap_err();
        assert!(err.is_network(), "got {:?}", err);
    }

    #[test]
    fn raised_token_aborts_header_probe_and_fetch() {
        let t = CurlTransport::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = t
            .fetch_bytes("http://127.0.0.1:9/manifest.json", &cancel)
            .unwrap_err();
        assert!(matches!(err, UpdateError::Cancelled), "got {:?}", err);
        let err = t
            .content_disposition("http://127.0.0.1:9/v2.zip", &cancel)
            .unwrap_err();
        assert!(matches!(err, UpdateError::Cancelled), "got {:?}", err);
    }

    #[tokio::test]
    async fn run_blocking_returns_result() {
        let v = run_blocking(|| Ok::<_, UpdateError>(7)).await.unwrap();
        assert_eq!(v, 7);
        let e = run_blocking(|| Err::<u8, _>(UpdateError::Cancelled)).await.unwrap_err();
        assert!(matches!(e, UpdateError::Cancelled));
    }
}
