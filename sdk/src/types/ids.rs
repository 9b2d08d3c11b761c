//! Client-side id generation.

use chrono::Local;
use rand::Rng;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Returns a random alphanumeric id whose first character is a letter.
///
/// A zero `length` yields an empty string.
#[must_use]
pub fn rand_id(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|i| {
            let charset = if i == 0 { LETTERS } else { ALPHANUMERIC };
            char::from(charset[rng.random_range(0..charset.len())])
        })
        .collect()
}

/// Generates a client order id: `{contract}-{YYYYMMDDHHmmss}{14 random}`.
///
/// e.g. `binance/btc.usdt-20190816152332asdfqwer123450`
#[must_use]
pub fn rand_client_oid(contract: &str) -> String {
    let now = Local::now().format("%Y%m%d%H%M%S");
    format!("{}-{}{}", contract, now, rand_id(14))
}

/// Generates a client withdrawal id:
/// `{exchange}/{currency}-{YYYYMMDD-HHmmss}-{5 random}`.
#[must_use]
pub fn rand_client_wid(exchange: &str, currency: &str) -> String {
    let now = Local::now().format("%Y%m%d-%H%M%S");
    format!("{}/{}-{}-{}", exchange, currency, now, rand_id(5))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rand_id_shape() {
        for _ in 0..100 {
            let id = rand_id(10);
            assert_eq!(id.len(), 10);
            assert!(id.chars().next().is_some_and(|c| c.is_ascii_alphabetic()));
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        }
        assert!(rand_id(0).is_empty());
    }

    #[test]
    fn test_rand_client_oid_shape() {
        let oid = rand_client_oid("binance/btc.usdt");
        let suffix = oid
            .strip_prefix("binance/btc.usdt-")
            .expect("contract prefix");
        assert_eq!(suffix.len(), 14 + 14);
        assert!(suffix[..14].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_rand_client_wid_shape() {
        let wid = rand_client_wid("binance", "btc");
        let suffix = wid.strip_prefix("binance/btc-").expect("prefix");
        let parts: Vec<&str> = suffix.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 5);
    }
}
