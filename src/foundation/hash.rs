use sha2::{Digest, Sha256};

/// SHA-256 of a byte buffer as lowercase hex.
///
/// This is the content identity used for source bytes, every persisted
/// artifact, and (composed with the version stamps) the artifact cache key.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Cache/dedup identity of one generation run.
///
/// A pure function of byte-identical source content and the two version
/// strings: identical inputs always address the identical cache slot.
pub fn artifact_key(source_sha256: &str, pipeline_version: &str, template_version: &str) -> String {
    sha256_hex(format!("{source_sha256}:{pipeline_version}:{template_version}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_matches_known_vector() {
        // Empty-input SHA-256 is a fixed published constant.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn artifact_key_is_pure_and_version_sensitive() {
        let sha = sha256_hex(b"pixels");
        let a = artifact_key(&sha, "1.2.0", "humanoid-v1");
        let b = artifact_key(&sha, "1.2.0", "humanoid-v1");
        let c = artifact_key(&sha, "1.2.1", "humanoid-v1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
