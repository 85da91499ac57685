use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;
use tuskit_protocol::{ChecksumAlgorithm, Metadata, checksum_header, encode_metadata, hex_digest};

use crate::TusError;

/// Metadata key carrying the display name.
pub const FILENAME_KEY: &str = "filename";

/// Identity, size and metadata of one file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    path: PathBuf,
    name: String,
    size: u64,
    metadata: Metadata,
}

impl UploadDescriptor {
    /// Registers `path` for upload.
    ///
    /// The display name defaults to the base filename and is recorded as
    /// the `filename` metadata entry. Fails with [`TusError::FileNotFound`]
    /// if `path` is not a readable regular file.
    pub fn register(path: impl AsRef<Path>, name: Option<&str>) -> Result<Self, TusError> {
        let path = path.as_ref();
        let not_found = || TusError::FileNotFound(path.display().to_string());

        let meta = std::fs::metadata(path).map_err(|_| not_found())?;
        if !meta.is_file() {
            return Err(not_found());
        }
        std::fs::File::open(path).map_err(|_| not_found())?;

        let name = match name {
            Some(n) => n.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(not_found)?,
        };

        let mut metadata = Metadata::new();
        metadata.insert(FILENAME_KEY, name.clone());

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: meta.len(),
            metadata,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File size in bytes at registration time.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Adds or replaces a metadata entry.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key, value);
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<String> {
        self.metadata.remove(key)
    }

    /// Raw digest of the whole file.
    pub fn checksum(&self, algorithm: ChecksumAlgorithm) -> Result<Vec<u8>, TusError> {
        let file = std::fs::File::open(&self.path)?;
        Ok(algorithm.digest_reader(file)?)
    }

    /// `Upload-Checksum` value for the whole file.
    pub fn checksum_header(&self, algorithm: ChecksumAlgorithm) -> Result<String, TusError> {
        let digest = self.checksum(algorithm)?;
        debug!(
            path = %self.path.display(),
            algorithm = algorithm.name(),
            digest = %hex_digest(&digest),
            "file checksum computed"
        );
        Ok(checksum_header(algorithm, &digest))
    }

    /// `Upload-Metadata` value, in insertion order.
    pub fn metadata_header(&self) -> String {
        encode_metadata(&self.metadata)
    }

    /// Reads exactly `len` bytes starting at `offset`.
    pub fn read_range(&self, offset: u64, len: u64) -> Result<Vec<u8>, TusError> {
        let end = offset.checked_add(len);
        if end.is_none_or(|end| end > self.size) {
            return Err(TusError::InvalidByteRange {
                offset,
                len,
                size: self.size,
            });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = std::fs::File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn register_reads_size_and_name() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "report.pdf", &[1u8; 1024]);

        let desc = UploadDescriptor::register(&path, None).unwrap();
        assert_eq!(desc.size(), 1024);
        assert_eq!(desc.name(), "report.pdf");
        assert_eq!(desc.metadata().get("filename"), Some("report.pdf"));
    }

    #[test]
    fn register_with_display_name() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "tmp123", b"abc");

        let desc = UploadDescriptor::register(&path, Some("textfile.txt")).unwrap();
        assert_eq!(desc.name(), "textfile.txt");
        assert_eq!(desc.metadata_header(), "filename dGV4dGZpbGUudHh0");
    }

    #[test]
    fn register_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = UploadDescriptor::register(dir.path().join("nope.bin"), None).unwrap_err();
        assert!(matches!(err, TusError::FileNotFound(_)));
    }

    #[test]
    fn register_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let err = UploadDescriptor::register(dir.path(), None).unwrap_err();
        assert!(matches!(err, TusError::FileNotFound(_)));
    }

    #[test]
    fn checksum_header_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "a.txt", b"hello world");

        let first = UploadDescriptor::register(&path, None).unwrap();
        let second = UploadDescriptor::register(&path, Some("other")).unwrap();
        let h1 = first.checksum_header(ChecksumAlgorithm::Sha256).unwrap();
        let h2 = second.checksum_header(ChecksumAlgorithm::Sha256).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1, "sha256 uU0nuZNNPgilLlLX2n2r+sSE7+N6U4DukIj3rOLvzek=");
    }

    #[test]
    fn metadata_keeps_registration_order() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "a.txt", b"x");

        let mut desc = UploadDescriptor::register(&path, None).unwrap();
        desc.add_metadata("mtime", "1700000000");
        desc.add_metadata("filetype", "text/plain");
        assert_eq!(
            desc.metadata_header(),
            "filename YS50eHQ=,mtime MTcwMDAwMDAwMA==,filetype dGV4dC9wbGFpbg=="
        );

        assert_eq!(desc.remove_metadata("mtime").as_deref(), Some("1700000000"));
        assert_eq!(desc.metadata_header(), "filename YS50eHQ=,filetype dGV4dC9wbGFpbg==");
    }

    #[test]
    fn read_range_exact_bytes() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "a.bin", b"0123456789");
        let desc = UploadDescriptor::register(&path, None).unwrap();

        assert_eq!(desc.read_range(0, 4).unwrap(), b"0123");
        assert_eq!(desc.read_range(6, 4).unwrap(), b"6789");
        assert!(desc.read_range(10, 0).unwrap().is_empty());
    }

    #[test]
    fn read_range_past_end_rejected() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "a.bin", b"0123456789");
        let desc = UploadDescriptor::register(&path, None).unwrap();

        let err = desc.read_range(8, 4).unwrap_err();
        assert!(matches!(
            err,
            TusError::InvalidByteRange {
                offset: 8,
                len: 4,
                size: 10
            }
        ));
        assert!(desc.read_range(u64::MAX, 2).is_err());
    }
}
