//! `Upload-Checksum` algorithms and header values.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::ProtocolError;

/// Hash algorithms accepted by the checksum extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    /// Name used as the first token of the `Upload-Checksum` header.
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Computes the raw digest of `data`.
    pub fn digest_bytes(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Md5 => md5::Md5::digest(data).to_vec(),
            Self::Sha1 => sha1::Sha1::digest(data).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }

    /// Computes the raw digest of everything `reader` yields.
    pub fn digest_reader<R: Read>(self, reader: R) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Md5 => hash_reader::<md5::Md5, _>(reader),
            Self::Sha1 => hash_reader::<sha1::Sha1, _>(reader),
            Self::Sha256 => hash_reader::<sha2::Sha256, _>(reader),
            Self::Sha512 => hash_reader::<sha2::Sha512, _>(reader),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(ProtocolError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

fn hash_reader<D: Digest, R: Read>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut hasher = D::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

/// Formats `<algorithm> <base64 digest>` for the `Upload-Checksum` header.
pub fn checksum_header(algorithm: ChecksumAlgorithm, digest: &[u8]) -> String {
    format!("{} {}", algorithm.name(), STANDARD.encode(digest))
}

/// Hex form of a digest, for log lines.
pub fn hex_digest(digest: &[u8]) -> String {
    hex::encode(digest)
}
