// SPDX-License-Identifier: Apache-2.0

//! Content digests used to name synthetic objects.
//!
//! An object's name is the hex encoding of the first [`DIGEST_LEN`] bytes of
//! the BLAKE3 output over its full content, followed by [`DATA_EXTENSION`].
//! BLAKE3 is a streaming hash, so the digest does not depend on how the
//! content was split into chunks while hashing.

use std::fmt;
use std::io::Read;

pub const DIGEST_LEN: usize = 16;
pub const DATA_EXTENSION: &str = ".data";
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 26; // 64 MiB

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = DigestHasher::new();
        hasher.update(bytes);
        hasher.finalize()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// The object file name for content with this digest.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}{DATA_EXTENSION}", self.to_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

/// Incremental digest over content fed in arbitrary pieces.
#[derive(Default)]
pub struct DigestHasher {
    inner: blake3::Hasher,
}

impl DigestHasher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    #[must_use]
    pub fn finalize(&self) -> ContentDigest {
        let full = self.inner.finalize();
        let mut out = [0_u8; DIGEST_LEN];
        out.copy_from_slice(&full.as_bytes()[..DIGEST_LEN]);
        ContentDigest(out)
    }
}

/// Hashes everything `reader` yields, reading at most `chunk_size` bytes at a
/// time. Returns the digest and the number of bytes consumed.
pub fn digest_reader<R: Read>(
    mut reader: R,
    chunk_size: usize,
) -> std::io::Result<(ContentDigest, u64)> {
    let mut hasher = DigestHasher::new();
    let mut chunk = vec![0_u8; chunk_size.max(1)];
    let mut total = 0_u64;
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&chunk[..n]);
        total += n as u64;
    }
    Ok((hasher.finalize(), total))
}

/// The digest an object key claims for its content: the base name with the
/// data extension stripped.
#[must_use]
pub fn expected_digest_hex(key: &str) -> &str {
    let base = key.rsplit('/').next().unwrap_or(key);
    base.strip_suffix(DATA_EXTENSION).unwrap_or(base)
}
