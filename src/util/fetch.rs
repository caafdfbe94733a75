//! Resource download helper exposed to build scripts.
//!
//! Build descriptions sometimes pull third-party sources (vendored SDKs,
//! test corpora) before registering projects. Failures here return a boolean
//! signal and are logged; the calling script decides whether that is fatal.

use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use tar::Archive;

use crate::util::fs::ensure_dir;

/// Download a `.tar.gz` archive and extract it under `dest`, optionally
/// verifying a SHA256 checksum first.
///
/// Returns `true` on success. Failures are logged at error level and
/// reported as `false` rather than propagated; resource downloads are
/// script territory and must not abort the build run by themselves.
pub fn download_and_extract(url: &str, dest: &Path, sha256: Option<&str>) -> bool {
    match try_download_and_extract(url, dest, sha256) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("download of {} failed: {:#}", url, e);
            false
        }
    }
}

fn try_download_and_extract(url: &str, dest: &Path, sha256: Option<&str>) -> Result<()> {
    tracing::info!("fetching {}", url);

    let response = reqwest::blocking::get(url)
        .with_context(|| format!("failed to download {}", url))?;

    if !response.status().is_success() {
        bail!("failed to download {}: HTTP {}", url, response.status());
    }

    let bytes = response
        .bytes()
        .with_context(|| "failed to read response body")?;

    if let Some(expected) = sha256 {
        let actual = sha256_bytes(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            bail!(
                "checksum mismatch for {}:\n  expected: {}\n  actual:   {}",
                url,
                expected,
                actual
            );
        }
        tracing::debug!("checksum verified: {}", &actual[..16]);
    }

    ensure_dir(dest)?;
    let decoder = GzDecoder::new(&bytes[..]);
    Archive::new(decoder)
        .unpack(dest)
        .with_context(|| format!("failed to extract archive into {}", dest.display()))?;

    tracing::info!("extracted archive to {}", dest.display());
    Ok(())
}

/// Compute the hex SHA256 digest of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_bytes() {
        // Known digest of the empty input.
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_bad_url_returns_false() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(!download_and_extract(
            "http://127.0.0.1:1/nothing.tar.gz",
            tmp.path(),
            None
        ));
    }
}
