//! Remote update manifest: wire format and fetcher.
//!
//! The server hosts a JSON array of package descriptors:
//!
//! ```json
//! [{"Version": 6, "MinimumVersion": 5, "UpdateFileAddress": "https://…/v6.zip", "MD5": "…"}]
//! ```
//!
//! `MD5` may be `null` or missing. The body must be UTF-8 JSON; one that fails
//! to parse (invalid UTF-8 included) aborts the cycle. There is no partial
//! manifest.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::UpdateError;
use crate::transport::{run_blocking, CancelToken, Transport};

/// One update package as advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    /// Version the application is at once this package is applied.
    #[serde(rename = "Version")]
    pub version: u32,
    /// Lowest installed version this package may be applied from.
    #[serde(rename = "MinimumVersion")]
    pub minimum_version: u32,
    /// Where to download the package from.
    #[serde(rename = "UpdateFileAddress")]
    pub file_address: String,
    /// Hex digest of the package (MD5, or SHA-256 when 64 digits long).
    #[serde(rename = "MD5", default)]
    pub content_hash: Option<String>,
}

/// Descriptors in server order. Uniqueness is whatever the server provides.
pub type Manifest = Vec<UpdateDescriptor>;

/// Parse a manifest body as received on the wire.
pub fn parse_manifest(body: &[u8]) -> Result<Manifest, UpdateError> {
    serde_json::from_slice(body).map_err(|e| UpdateError::parse("manifest", e))
}

/// GET the manifest at `update_server_address` and parse it.
pub async fn fetch<T>(
    transport: Arc<T>,
    update_server_address: &str,
    cancel: &CancelToken,
) -> Result<Manifest, UpdateError>
where
    T: Transport + 'static,
{
    let url = update_server_address.to_string();
    let cancel = cancel.clone();
    let body = run_blocking(move || transport.fetch_bytes(&url, &cancel)).await?;
    let manifest = parse_manifest(&body)?;
    tracing::debug!(
        url = update_server_address,
        entries = manifest.len(),
        "manifest fetched"
    );
    Ok(manifest)
}
