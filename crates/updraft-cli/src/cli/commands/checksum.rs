//! `updraft checksum` – print MD5 and SHA-256 of a file.

use anyhow::Result;
use std::path::Path;
use updraft_core::checksum;

/// Both digests are accepted in a manifest's `MD5` field.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let owned = path.to_path_buf();
    let (md5, sha256) = tokio::task::spawn_blocking(move || {
        Ok::<_, updraft_core::UpdateError>((
            checksum::md5_path(&owned)?,
            checksum::sha256_path(&owned)?,
        ))
    })
    .await??;
    println!("md5     {}  {}", md5, path.display());
    println!("sha256  {}  {}", sha256, path.display());
    Ok(())
}
