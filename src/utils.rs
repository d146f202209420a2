//! Small shared helpers

use rand::Rng;

/// Percent-encode a string for use in URL query parameters (RFC 3986
/// unreserved chars pass through).
pub fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// Random alphanumeric string, used for state nonces and generated
/// identity ids.
pub fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreserved_chars_pass_through() {
        assert_eq!(percent_encode("ABCDEFghijklmnop"), "ABCDEFghijklmnop");
        assert_eq!(percent_encode("0123456789"), "0123456789");
        assert_eq!(percent_encode("-_.~"), "-_.~");
    }

    #[test]
    fn test_reserved_chars_are_encoded() {
        assert_eq!(percent_encode(" "), "%20");
        assert_eq!(percent_encode("/"), "%2F");
        assert_eq!(percent_encode("?"), "%3F");
        assert_eq!(percent_encode("&"), "%26");
        assert_eq!(percent_encode("="), "%3D");
        assert_eq!(percent_encode("+"), "%2B");
        assert_eq!(percent_encode("@"), "%40");
    }

    #[test]
    fn test_mixed_url_encoding() {
        assert_eq!(
            percent_encode("hello world&foo=bar"),
            "hello%20world%26foo%3Dbar"
        );
    }

    #[test]
    fn test_random_alphanumeric_shape() {
        let a = random_alphanumeric(32);
        let b = random_alphanumeric(32);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
