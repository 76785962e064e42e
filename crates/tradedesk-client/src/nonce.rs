//! Anti-replay nonce generation
//!
//! Every request carries a timestamp, a random request key and, when the
//! search succeeds, a nonce. The nonce is a candidate string whose digest
//! `md5(candidate + "." + timestamp + "." + request_key)` ends in the mark
//! character derived from the request key. Finding one costs ~16 hashes on
//! average; the search is capped and a failed search drops only the nonce
//! header, never the request.

use tracing::{debug, trace};

/// Headers produced for one outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceHeaders {
    pub request_key: String,
    pub timestamp: u64,
    pub nonce: Option<String>,
}

impl NonceHeaders {
    /// Generate request key and nonce for `timestamp` with a random candidate source
    pub fn generate(timestamp: u64, max_attempts: u32) -> Self {
        let request_key = generate_request_key();
        let nonce = find_nonce(timestamp, &request_key, max_attempts, |_| random_candidate());
        if nonce.is_none() {
            debug!(
                "Nonce search exhausted {} attempts, omitting nonce header",
                max_attempts
            );
        }
        Self {
            request_key,
            timestamp,
            nonce,
        }
    }
}

/// 16 random bytes, hex encoded
pub fn generate_request_key() -> String {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&rand::random::<u64>().to_be_bytes());
    bytes[8..].copy_from_slice(&rand::random::<u64>().to_be_bytes());
    hex::encode(bytes)
}

fn random_candidate() -> String {
    format!("{:x}", rand::random::<u64>())
}

fn digest_hex(input: &str) -> String {
    hex::encode(md5::compute(input.as_bytes()).0)
}

/// The character a valid nonce digest must end with
pub fn mark_for(request_key: &str) -> char {
    digest_hex(request_key).chars().last().unwrap_or('0')
}

fn digest_ends_with_mark(candidate: &str, timestamp: u64, request_key: &str, mark: char) -> bool {
    let digest = digest_hex(&format!("{candidate}.{timestamp}.{request_key}"));
    digest.ends_with(mark)
}

/// Search for a nonce within `max_attempts` candidates
///
/// `candidates` is called with the attempt index and returns the candidate
/// to test. Returns `None` once the budget is spent.
pub fn find_nonce<F>(
    timestamp: u64,
    request_key: &str,
    max_attempts: u32,
    mut candidates: F,
) -> Option<String>
where
    F: FnMut(u32) -> String,
{
    let mark = mark_for(request_key);
    (0..max_attempts).find_map(|attempt| {
        let candidate = candidates(attempt);
        if digest_ends_with_mark(&candidate, timestamp, request_key, mark) {
            trace!("Nonce found after {} attempts", attempt + 1);
            Some(candidate)
        } else {
            None
        }
    })
}

/// Check a `(timestamp, request_key, nonce)` triple
pub fn verify_nonce(timestamp: u64, request_key: &str, nonce: &str) -> bool {
    digest_ends_with_mark(nonce, timestamp, request_key, mark_for(request_key))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    const KEY: &str = "00112233445566778899aabbccddeeff";
    const TS: u64 = 1_700_000_000_000;

    #[test]
    fn test_request_key_shape() {
        let key = generate_request_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_request_key());
    }

    #[test]
    fn test_mark_is_hex_digit() {
        assert!(mark_for(KEY).is_ascii_hexdigit());
        assert_eq!(mark_for(KEY), mark_for(KEY));
    }

    #[test]
    fn test_found_nonce_verifies() {
        let nonce = find_nonce(TS, KEY, 1000, |i| format!("c{i}")).expect("Nonce should be found");
        assert!(verify_nonce(TS, KEY, &nonce));
    }

    #[test]
    fn test_search_is_deterministic_for_same_candidates() {
        let a = find_nonce(TS, KEY, 1000, |i| i.to_string());
        let b = find_nonce(TS, KEY, 1000, |i| i.to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_budget_yields_none() {
        let mut calls = 0;
        let nonce = find_nonce(TS, KEY, 0, |i| {
            calls += 1;
            i.to_string()
        });
        assert_eq!(nonce, None);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_exhausted_budget_yields_none() {
        let losing = (0..1000)
            .map(|i| format!("x{i}"))
            .find(|c| !verify_nonce(TS, KEY, c))
            .expect("Some candidate should miss the mark");

        let mut calls = 0;
        let nonce = find_nonce(TS, KEY, 1000, |_| {
            calls += 1;
            losing.clone()
        });
        assert_eq!(nonce, None);
        assert_eq!(calls, 1000);
    }

    #[test]
    fn test_generate_with_default_budget() {
        let headers = NonceHeaders::generate(TS, 1000);
        assert_eq!(headers.timestamp, TS);
        let nonce = headers.nonce.expect("Search should succeed within 1000 attempts");
        assert!(verify_nonce(TS, &headers.request_key, &nonce));
    }
}
