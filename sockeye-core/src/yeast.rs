//! Yeast: compressed, strictly monotonic timestamp identifiers.
//!
//! Used as the `t` cache-buster query parameter on every polling and
//! upgrade URL. Two calls within the same millisecond stay distinct and
//! ordered by appending an encoded counter suffix.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// URL-safe alphabet, ordered so that encoded output sorts like the input.
const ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

struct YeastState {
    prev: String,
    seed: u64,
}

static STATE: Mutex<YeastState> = Mutex::new(YeastState {
    prev: String::new(),
    seed: 0,
});

/// Encode a number into the URL-safe alphabet.
pub fn encode(mut num: u64) -> String {
    let mut buf = [0u8; 16];
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = ALPHABET[(num % 64) as usize];
        num /= 64;
        if num == 0 {
            break;
        }
    }
    String::from_utf8_lossy(&buf[i..]).into_owned()
}

/// Produce the next identifier.
///
/// Identifiers are monotonic over the lifetime of the process: calls in
/// distinct milliseconds order by timestamp, calls within the same
/// millisecond order by the `.n` counter suffix.
pub fn yeast() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let encoded = encode(now);

    let mut state = STATE.lock().unwrap_or_else(|e| e.into_inner());
    if encoded != state.prev {
        state.prev = encoded.clone();
        state.seed = 0;
        return encoded;
    }
    // Fixed-width suffix so the counter keeps sorting past one encoded digit.
    let suffix = format!("{:0>4}", encode(state.seed));
    state.seed += 1;
    format!("{encoded}.{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ordering_matches_numeric() {
        let a = encode(1_000_000);
        let b = encode(1_000_001);
        assert!(a < b);
    }

    #[test]
    fn test_encode_zero() {
        assert_eq!(encode(0), "0");
        assert_eq!(encode(63), "_");
        assert_eq!(encode(64), "10");
    }

    #[test]
    fn test_successive_calls_are_distinct_and_increasing() {
        let a = yeast();
        let b = yeast();
        assert_ne!(a, b);
        assert!(b > a, "{b} should sort after {a}");
    }

    #[test]
    fn test_burst_stays_monotonic() {
        let mut prev = yeast();
        for _ in 0..1000 {
            let next = yeast();
            assert!(next > prev, "{next} should sort after {prev}");
            prev = next;
        }
    }
}
