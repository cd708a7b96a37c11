use crate::error::Result;
use sha1::{Digest, Sha1};
use std::{fs::File, io::Read, path::Path};

const MURMUR_M: u32 = 0x5bd1e995;
const MURMUR_R: u32 = 24;
const FINGERPRINT_SEED: u32 = 1;
const READ_CHUNK: usize = 8192;

pub type ContentDigest = String;

pub type ContentFingerprint = u32;

pub fn digest(path: &Path) -> Result<ContentDigest> {
    let file = File::open(path)?;
    digest_reader(file)
}

pub fn digest_reader(mut reader: impl Read) -> Result<ContentDigest> {
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; READ_CHUNK];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn fingerprint(path: &Path) -> Result<ContentFingerprint> {
    let file = File::open(path)?;
    fingerprint_reader(file)
}

pub fn fingerprint_reader(mut reader: impl Read) -> Result<ContentFingerprint> {
    let mut normalized = Vec::new();
    let mut buffer = [0u8; READ_CHUNK];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        normalized.extend(buffer[..read].iter().copied().filter(|b| !is_whitespace(*b)));
    }
    Ok(murmur2(&normalized, FINGERPRINT_SEED))
}

pub fn fingerprint_bytes(data: &[u8]) -> ContentFingerprint {
    let normalized: Vec<u8> = data.iter().copied().filter(|b| !is_whitespace(*b)).collect();
    murmur2(&normalized, FINGERPRINT_SEED)
}

/// Case-insensitive digest comparison; registries disagree on hex case.
pub fn digests_match(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}

pub fn murmur2(data: &[u8], seed: u32) -> u32 {
    // The registry hashes a 32-bit length; mod jars never approach 4 GiB.
    let mut h = seed ^ data.len() as u32;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(MURMUR_M);
        k ^= k >> MURMUR_R;
        k = k.wrapping_mul(MURMUR_M);

        h = h.wrapping_mul(MURMUR_M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        h ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(MURMUR_M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(MURMUR_M);
    h ^= h >> 15;
    h
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, 0x09 | 0x0A | 0x0D | 0x20)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Hands out at most `step` bytes per read.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = (self.pos + self.step).min(self.data.len());
            let len = (end - self.pos).min(buf.len());
            buf[..len].copy_from_slice(&self.data[self.pos..self.pos + len]);
            self.pos += len;
            Ok(len)
        }
    }

    #[test]
    fn empty_input_has_pinned_fingerprint() {
        assert_eq!(fingerprint_bytes(b""), 0x5bd1_5e36);
        assert_eq!(fingerprint_bytes(b" \t\r\n"), 0x5bd1_5e36);
    }

    #[test]
    fn murmur_matches_known_vectors() {
        assert_eq!(murmur2(b"a", 1), 0x2550_b18c);
        assert_eq!(murmur2(b"ab", 1), 0x64e1_50ee);
        assert_eq!(murmur2(b"abc", 1), 0x60a4_fcc1);
        assert_eq!(murmur2(b"abcd", 1), 0xc93f_7a16);
        assert_eq!(murmur2(b"helloworld", 1), 0xa85c_bded);
    }

    #[test]
    fn whitespace_is_ignored() {
        let compact = fingerprint_bytes(b"{\"id\":\"demo\"}");
        let padded = fingerprint_bytes(b"{ \"id\" :\t\"demo\"\r\n}\n");
        assert_eq!(compact, padded);
        assert_eq!(compact, 0xf2fb_7398);
    }

    #[test]
    fn fingerprint_does_not_depend_on_read_size() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let whole = fingerprint_reader(Cursor::new(data.clone())).unwrap();
        for step in [1, 3, 7, 4096] {
            let trickled = fingerprint_reader(Trickle {
                data: data.clone(),
                pos: 0,
                step,
            })
            .unwrap();
            assert_eq!(whole, trickled, "step {step}");
        }
        assert_eq!(whole, fingerprint_bytes(&data));
    }

    #[test]
    fn digest_is_lowercase_sha1() {
        let digest = digest_reader(Cursor::new(b"abc".to_vec())).unwrap();
        assert_eq!(digest, "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert!(digests_match(&digest, "A9993E364706816ABA3E25717850C26C9CD0D89D"));
    }

    #[test]
    fn file_helpers_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.jar");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(digest(&path).unwrap(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(fingerprint(&path).unwrap(), murmur2(b"abc", 1));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.jar");
        assert!(matches!(digest(&missing), Err(crate::error::Error::Io(_))));
        assert!(matches!(fingerprint(&missing), Err(crate::error::Error::Io(_))));
    }
}
