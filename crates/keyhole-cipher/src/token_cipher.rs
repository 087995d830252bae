use crate::{cipher_symbols, MAX_TOKEN_LEN};
use keyhole_core::{CipherToken, SecretAlphabet};
use typed_builder::TypedBuilder;

/// A cipher bound to a validated secret alphabet.
///
/// `offset` is added to every row id before ciphering, so two stores sharing
/// a secret can still hand out disjoint tokens. Tokens never exceed
/// [`MAX_TOKEN_LEN`] symbols.
#[derive(Debug, Clone, TypedBuilder)]
pub struct TokenCipher {
    secret: SecretAlphabet,
    #[builder(default = 0)]
    offset: u64,
}

impl TokenCipher {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Largest row id [`encode`](Self::encode) accepts.
    ///
    /// `None` when the offset alone already needs a token longer than
    /// [`MAX_TOKEN_LEN`].
    pub fn max_id(&self) -> Option<u64> {
        let len = self.secret.len() as u64;
        let max_salted = (MAX_TOKEN_LEN - 1).saturating_mul(len).saturating_sub(1);
        max_salted.checked_sub(self.offset)
    }

    /// Ciphers row `id`. Returns `None` past [`max_id`](Self::max_id).
    pub fn encode(&self, id: u64) -> Option<CipherToken> {
        if id > self.max_id()? {
            return None;
        }
        let salted = id.checked_add(self.offset)?;
        Some(CipherToken::new(cipher_symbols(self.secret.symbols(), salted)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cipher, decipher, new_letter_ordering};

    const SECRET: &str = "zUTibXjNDAmFKPglvdnJLsxqOMYRhrGakBucteyQpSoWfHwVZICE";

    fn token_cipher(offset: u64) -> TokenCipher {
        TokenCipher::builder()
            .secret(SecretAlphabet::new(SECRET).unwrap())
            .offset(offset)
            .build()
    }

    #[test]
    fn zero_offset_matches_free_function() {
        let tc = TokenCipher::builder()
            .secret(SecretAlphabet::new(SECRET).unwrap())
            .build();
        assert_eq!(tc.offset(), 0);
        assert_eq!(tc.encode(1).unwrap().as_str(), cipher(SECRET, 1));
    }

    #[test]
    fn offset_is_added_before_ciphering() {
        let tc = token_cipher(52);
        assert_eq!(tc.encode(1).unwrap().as_str(), cipher(SECRET, 53));
    }

    #[test]
    fn tokens_stop_at_max_len() {
        let tc = token_cipher(0);
        let max = tc.max_id().unwrap();
        assert_eq!(max, (MAX_TOKEN_LEN - 1) * 52 - 1);

        let longest = tc.encode(max).unwrap();
        assert_eq!(longest.as_str().chars().count() as u64, MAX_TOKEN_LEN);
        assert!(tc.encode(max + 1).is_none());
    }

    #[test]
    fn offset_shrinks_the_id_range() {
        let tc = token_cipher(1_000);
        assert_eq!(tc.max_id(), Some((MAX_TOKEN_LEN - 1) * 52 - 1 - 1_000));
    }

    #[test]
    fn large_offset_leaves_no_ids() {
        let tc = token_cipher(10_000_000);
        assert_eq!(tc.max_id(), None);
        assert!(tc.encode(0).is_none());
        assert!(tc.encode(1).is_none());
    }

    #[test]
    fn encode_overflow_is_reported() {
        let tc = token_cipher(u64::MAX);
        assert!(tc.encode(1).is_none());
    }

    #[test]
    fn random_secret_round_trips() {
        let ordering = new_letter_ordering();
        let tc = TokenCipher::builder()
            .secret(SecretAlphabet::new(ordering.clone()).unwrap())
            .build();
        for id in 0..200 {
            let token = tc.encode(id).unwrap();
            assert_eq!(decipher(&ordering, token.as_str()), Some(id));
        }
    }
}
