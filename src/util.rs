use rand::{CryptoRng, RngCore};
use secrecy::SecretBox;


/// An empty `enum` for signaling the fact that a function (potentially) never returns.
/// Note that you can't construct a value of this type, so a function returning it
/// can never return. A function returning `Result<Never>` never returns
/// when it succeeds, but it might still fail.
pub(crate) enum Never {}

/// Generate random bytes with a crypotgraphically secure RNG.
pub(crate) fn gen_random_bytes_crypto<const N: usize>() -> SecretBox<[u8; N]> {
    // The explicit `CryptoRng` bound makes sure that a future `rand` update
    // that makes `rng()` return a non-cryptographically secure RNG would not
    // silently compile.
    fn imp<const N: usize>(mut rng: impl RngCore + CryptoRng) -> [u8; N] {
        let mut bytes = [0; N];
        rng.fill_bytes(&mut bytes);
        bytes
    }

    SecretBox::new(Box::new(imp(rand::rng())))
}

/// Returns a random string of `len` characters from `alphabet`, chosen with
/// a cryptographically secure RNG.
pub(crate) fn gen_random_string(alphabet: &[u8], len: usize) -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}
