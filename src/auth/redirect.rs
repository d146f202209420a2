//! Grant-code extraction from authorization redirect URLs
//!
//! The authorization page ends the interactive step by navigating to
//! a fixed local redirect target with the grant code in the query.
//! Presenters call this on every navigation: `NotTerminal` means the
//! page load should proceed, anything else means the surface can be
//! dismissed and the outcome handed back to the login flow.

use url::Url;

/// Redirect target the authorization request asks for. Never actually
/// served; it only has to be recognizable here.
pub const REDIRECT_URI: &str = "http://localhost/code";

/// Result of inspecting a navigation URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Not the configured redirect target; keep waiting.
    NotTerminal,
    /// The redirect arrived but carried no usable grant code.
    NoCode,
    Code(String),
}

/// Inspect a navigation URL for the terminal redirect and pull the
/// grant code out of its query. Malformed queries yield `NoCode`,
/// never an error.
pub fn extract_grant_code(redirect_url: &str) -> RedirectOutcome {
    if !redirect_url.starts_with(REDIRECT_URI) {
        return RedirectOutcome::NotTerminal;
    }

    let parsed = match Url::parse(redirect_url) {
        Ok(url) => url,
        Err(_) => return RedirectOutcome::NoCode,
    };

    for (key, value) in parsed.query_pairs() {
        if key == "code" {
            if value.is_empty() {
                return RedirectOutcome::NoCode;
            }
            return RedirectOutcome::Code(value.to_string());
        }
    }
    RedirectOutcome::NoCode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_code() {
        let outcome = extract_grant_code("http://localhost/code?code=ABC123&state=xyz");
        assert_eq!(outcome, RedirectOutcome::Code("ABC123".to_string()));
    }

    #[test]
    fn test_code_param_order_does_not_matter() {
        let outcome = extract_grant_code("http://localhost/code?state=xyz&code=ABC123");
        assert_eq!(outcome, RedirectOutcome::Code("ABC123".to_string()));
    }

    #[test]
    fn test_missing_code_param() {
        let outcome = extract_grant_code("http://localhost/code?state=xyz");
        assert_eq!(outcome, RedirectOutcome::NoCode);
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(
            extract_grant_code("http://localhost/code"),
            RedirectOutcome::NoCode
        );
        assert_eq!(
            extract_grant_code("http://localhost/code?"),
            RedirectOutcome::NoCode
        );
    }

    #[test]
    fn test_empty_code_value() {
        let outcome = extract_grant_code("http://localhost/code?code=&state=xyz");
        assert_eq!(outcome, RedirectOutcome::NoCode);
    }

    #[test]
    fn test_unrelated_url_is_not_terminal() {
        let outcome = extract_grant_code("https://idp.example.com/login?step=2");
        assert_eq!(outcome, RedirectOutcome::NotTerminal);
    }

    #[test]
    fn test_similar_prefix_is_not_terminal() {
        let outcome = extract_grant_code("http://localhost/callback?code=ABC");
        assert_eq!(outcome, RedirectOutcome::NotTerminal);
    }

    #[test]
    fn test_url_encoded_code_is_decoded() {
        let outcome = extract_grant_code("http://localhost/code?code=AB%2B123");
        assert_eq!(outcome, RedirectOutcome::Code("AB+123".to_string()));
    }

    #[test]
    fn test_first_code_param_wins() {
        let outcome = extract_grant_code("http://localhost/code?code=first&code=second");
        assert_eq!(outcome, RedirectOutcome::Code("first".to_string()));
    }
}
