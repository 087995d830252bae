//! Positional substitution cipher that turns row ids into short tokens.
//!
//! A token for `id` under an alphabet of `len` symbols starts at symbol
//! `id % len` and walks the alphabet (wrapping) for `id / len + 2` symbols.
//! Every run of `len` consecutive ids shares a token length, and within a
//! run the first symbol differs, so distinct ids never share a token as long
//! as the alphabet has no repeated symbol.

pub mod token_cipher;

use rand::seq::SliceRandom;

pub use token_cipher::TokenCipher;

/// Longest token, in symbols, that [`TokenCipher`] will hand out.
///
/// Token length grows by one every alphabet-length ids, so this caps the ids a
/// cipher can serve at roughly `MAX_TOKEN_LEN * alphabet length`.
pub const MAX_TOKEN_LEN: u64 = 2048;

/// The 52 upper and lower case Latin letters.
pub const LATIN_LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Ciphers `id` under `secret`.
///
/// The secret is not validated here; an empty secret yields an empty token and
/// a secret with repeated symbols can make distinct ids collide. The token is
/// `id / len + 2` symbols long whatever its size. Use [`TokenCipher`] to work
/// with a validated alphabet and a bounded token length.
pub fn cipher(secret: &str, id: u64) -> String {
    let symbols: Vec<char> = secret.chars().collect();
    cipher_symbols(&symbols, id)
}

/// Recovers the id that [`cipher`] turned into `token`.
///
/// Returns `None` for text `cipher` could not have produced under `secret`.
pub fn decipher(secret: &str, token: &str) -> Option<u64> {
    let symbols: Vec<char> = secret.chars().collect();
    decipher_symbols(&symbols, token)
}

/// Returns a random ordering of [`LATIN_LETTERS`], suitable as a fresh secret.
pub fn new_letter_ordering() -> String {
    let mut letters: Vec<char> = LATIN_LETTERS.chars().collect();
    letters.shuffle(&mut rand::thread_rng());
    letters.into_iter().collect()
}

pub(crate) fn cipher_symbols(symbols: &[char], id: u64) -> String {
    let len = symbols.len() as u64;
    if len == 0 {
        return String::new();
    }

    let start = id % len;
    let span = id / len + 1;
    (0..=span)
        .map(|k| symbols[((start + k) % len) as usize])
        .collect()
}

fn decipher_symbols(symbols: &[char], token: &str) -> Option<u64> {
    let len = symbols.len() as u64;
    let count = token.chars().count() as u64;
    if len == 0 || count < 2 {
        return None;
    }

    let first = token.chars().next()?;
    let start = symbols.iter().position(|s| *s == first)? as u64;
    let id = (count - 2).checked_mul(len)?.checked_add(start)?;

    let consistent = token
        .chars()
        .zip(0u64..)
        .all(|(symbol, k)| symbols[((start + k) % len) as usize] == symbol);

    consistent.then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const SECRET: &str = "zUTibXjNDAmFKPglvdnJLsxqOMYRhrGakBucteyQpSoWfHwVZICE";

    #[test]
    fn first_run_uses_two_symbols() {
        assert_eq!(cipher(SECRET, 0), "zU");
        assert_eq!(cipher(SECRET, 1), "UT");
        assert_eq!(cipher(SECRET, 2), "Ti");
    }

    #[test]
    fn wraps_around_the_alphabet() {
        assert_eq!(cipher(SECRET, 51), "Ez");
    }

    #[test]
    fn length_grows_every_alphabet_length_ids() {
        assert_eq!(cipher(SECRET, 52), "zUT");
        assert_eq!(cipher(SECRET, 53), "UTi");
        assert_eq!(cipher(SECRET, 103).chars().count(), 3);
        assert_eq!(cipher(SECRET, 104).chars().count(), 4);
    }

    #[test]
    fn is_deterministic() {
        for id in [0, 7, 52, 999, 12_345] {
            assert_eq!(cipher(SECRET, id), cipher(SECRET, id));
        }
    }

    #[test]
    fn distinct_ids_give_distinct_tokens() {
        let tokens: HashSet<String> = (0..5_000).map(|id| cipher(SECRET, id)).collect();
        assert_eq!(tokens.len(), 5_000);
    }

    #[test]
    fn empty_secret_yields_empty_token() {
        assert_eq!(cipher("", 10), "");
        assert_eq!(decipher("", "ab"), None);
    }

    #[test]
    fn decipher_inverts_cipher() {
        for id in [0, 1, 51, 52, 53, 1_000, 4_321] {
            assert_eq!(decipher(SECRET, &cipher(SECRET, id)), Some(id));
        }
    }

    #[test]
    fn decipher_rejects_foreign_text() {
        assert_eq!(decipher(SECRET, "z"), None);
        assert_eq!(decipher(SECRET, "zT"), None);
        assert_eq!(decipher(SECRET, "z0"), None);
        assert_eq!(decipher(SECRET, "0U"), None);
    }

    #[test]
    fn non_ascii_alphabet() {
        let secret = "αβγ";
        assert_eq!(cipher(secret, 1), "βγ");
        assert_eq!(cipher(secret, 5), "γαβ");
        assert_eq!(decipher(secret, "γαβ"), Some(5));
    }

    #[test]
    fn new_letter_ordering_is_a_permutation() {
        let ordering = new_letter_ordering();
        let mut got: Vec<char> = ordering.chars().collect();
        let mut want: Vec<char> = LATIN_LETTERS.chars().collect();
        got.sort_unstable();
        want.sort_unstable();
        assert_eq!(got, want);
    }
}
