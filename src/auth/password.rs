use rand::seq::SliceRandom;
use rand::Rng;

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}<>?";

/// Minimum credential length accepted by the policy.
pub const MIN_PASSWORD_LEN: usize = 10;

/// Generate a random credential meeting the strength policy: at least one
/// character from each of the lower/upper/digit/symbol classes, remaining
/// characters drawn from all classes, then shuffled. Lengths below the
/// policy minimum are raised to it.
pub fn generate_password(len: usize) -> String {
    let len = len.max(MIN_PASSWORD_LEN);
    let mut rng = rand::thread_rng();

    let mut chars: Vec<u8> = vec![
        LOWER[rng.gen_range(0..LOWER.len())],
        UPPER[rng.gen_range(0..UPPER.len())],
        DIGITS[rng.gen_range(0..DIGITS.len())],
        SYMBOLS[rng.gen_range(0..SYMBOLS.len())],
    ];

    let all: Vec<u8> = [LOWER, UPPER, DIGITS, SYMBOLS].concat();
    while chars.len() < len {
        chars.push(all[rng.gen_range(0..all.len())]);
    }

    chars.shuffle(&mut rng);
    String::from_utf8(chars).expect("password alphabet is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_class(pw: &str, class: &[u8]) -> bool {
        pw.bytes().any(|b| class.contains(&b))
    }

    #[test]
    fn meets_length_and_class_policy() {
        for _ in 0..200 {
            let pw = generate_password(12);
            assert_eq!(pw.len(), 12);
            assert!(has_class(&pw, LOWER), "missing lowercase in {pw}");
            assert!(has_class(&pw, UPPER), "missing uppercase in {pw}");
            assert!(has_class(&pw, DIGITS), "missing digit in {pw}");
            assert!(has_class(&pw, SYMBOLS), "missing symbol in {pw}");
        }
    }

    #[test]
    fn short_requests_are_raised_to_minimum() {
        assert_eq!(generate_password(4).len(), MIN_PASSWORD_LEN);
        assert_eq!(generate_password(0).len(), MIN_PASSWORD_LEN);
    }

    #[test]
    fn successive_passwords_differ() {
        let a = generate_password(16);
        let b = generate_password(16);
        assert_ne!(a, b);
    }
}
