use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(data);
    let out = h.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// Short, log-safe fingerprint of a secret: first 8 hex chars of sha256(secret).
pub fn fingerprint(secret: &str) -> String {
    let digest = sha256(secret.as_bytes());
    hex::encode(&digest[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = fingerprint("6b1e0c2a-token");
        let b = fingerprint("6b1e0c2a-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(!a.contains("token"));
    }

    #[test]
    fn test_fingerprint_differs_per_secret() {
        assert_ne!(fingerprint("alpha"), fingerprint("beta"));
    }
}
