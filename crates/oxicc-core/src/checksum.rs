//! MD5 checksum engine used for the ICC profile id

use md5::{Digest, Md5 as Md5Core};

/// Incremental MD5 digest.
///
/// [`Md5::get`] finalizes the digest; later calls return the same value
/// (bytes added after finalization are ignored) until [`Md5::reset`].
#[derive(Debug, Clone, Default)]
pub struct Md5 {
    hasher: Md5Core,
    digest: Option<[u8; 16]>,
}

impl Md5 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.hasher = Md5Core::new();
        self.digest = None;
    }

    pub fn add(&mut self, data: &[u8]) {
        if self.digest.is_none() {
            self.hasher.update(data);
        }
    }

    pub fn get(&mut self) -> [u8; 16] {
        if let Some(digest) = self.digest {
            return digest;
        }
        let out = self.hasher.finalize_reset();
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&out);
        self.digest = Some(digest);
        digest
    }
}

/// One-shot digest
pub fn md5(data: &[u8]) -> [u8; 16] {
    let mut m = Md5::new();
    m.add(data);
    m.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(d: [u8; 16]) -> String {
        d.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_empty() {
        assert_eq!(hex(md5(b"")), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut m = Md5::new();
        m.add(b"message ");
        m.add(b"digest");
        assert_eq!(m.get(), md5(b"message digest"));
        assert_eq!(hex(m.get()), "f96b697d7cb7938d525a2f31aaf161d0");
    }

    #[test]
    fn test_reset() {
        let mut m = Md5::new();
        m.add(b"junk");
        let _ = m.get();
        m.reset();
        m.add(b"abc");
        assert_eq!(hex(m.get()), "900150983cd24fb0d6963f7d28e17f72");
    }
}
