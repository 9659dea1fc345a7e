//! `.sha1` / `.md5` sidecar files for published files.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use md5::Md5;
use sha1::{Digest, Sha1};
use tracing::debug;

pub const SHA1_EXTENSION: &str = "sha1";
pub const MD5_EXTENSION: &str = "md5";

pub fn hex_encode_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len().saturating_mul(2));
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Lowercase hex digests of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigests {
    pub sha1: String,
    pub md5: String,
}

/// Digest a file in one streaming pass.
pub fn digest_file(path: &Path) -> io::Result<FileDigests> {
    let mut file = File::open(path)?;
    let mut sha1 = Sha1::new();
    let mut md5 = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sha1.update(&buf[..n]);
        md5.update(&buf[..n]);
    }
    Ok(FileDigests {
        sha1: hex_encode_lower(&sha1.finalize()),
        md5: hex_encode_lower(&md5.finalize()),
    })
}

/// `<file>.<ext>`
pub fn sidecar_path(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Write both sidecars next to `path`. Each holds the bare digest.
pub fn write_checksum_files(path: &Path) -> io::Result<FileDigests> {
    let digests = digest_file(path)?;
    fs::write(sidecar_path(path, SHA1_EXTENSION), &digests.sha1)?;
    fs::write(sidecar_path(path, MD5_EXTENSION), &digests.md5)?;
    debug!(path = ?path, sha1 = %digests.sha1, "Wrote checksum files");
    Ok(digests)
}
