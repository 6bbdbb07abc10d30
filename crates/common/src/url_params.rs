//! Query and fragment parameter handling
//!
//! Callback URLs carry the authorization response either in the query
//! (code flow) or in the fragment (implicit flow).

use url::form_urlencoded;
use url::Url;

/// Decoded `(key, value)` pairs of a query or fragment string.
///
/// A leading `?` or `#` is ignored.
#[must_use]
pub fn parse_params(raw: &str) -> Vec<(String, String)> {
    let trimmed = raw.trim_start_matches(['?', '#']);
    form_urlencoded::parse(trimmed.as_bytes()).into_owned().collect()
}

/// Parameters of a full URL's query component, or of a bare query string.
#[must_use]
pub fn query_params(url: &str) -> Vec<(String, String)> {
    match Url::parse(url) {
        Ok(parsed) => parsed.query_pairs().into_owned().collect(),
        Err(_) => {
            let query = url.split_once('?').map_or(url, |(_, query)| query);
            let query = query.split_once('#').map_or(query, |(query, _)| query);
            parse_params(query)
        }
    }
}

/// Parameters of a full URL's fragment, or of a bare fragment string.
#[must_use]
pub fn fragment_params(url: &str) -> Vec<(String, String)> {
    match url.split_once('#') {
        Some((_, fragment)) => parse_params(fragment),
        None if !url.contains('?') && !url.contains("://") => parse_params(url),
        None => Vec::new(),
    }
}

/// First value of `key` in `params`.
#[must_use]
pub fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Append percent-encoded `key=value` pairs to `base`.
///
/// Uses `&` when `base` already has a query, `?` otherwise.
#[must_use]
pub fn append_query<'a, I>(base: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut url = base.to_string();
    let mut separator = if base.contains('?') { '&' } else { '?' };
    for (key, value) in params {
        url.push(separator);
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(&value));
        separator = '&';
    }
    url
}

/// Encode `params` as an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn form_body(params: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish()
}

#[cfg(test)]
mod tests {
    //! Unit tests for url_params.
    use super::*;

    #[test]
    fn test_query_params_from_callback_url() {
        let params = query_params("https://app/cb?code=abc&state=x%20y&session_state=s#ignored");
        assert_eq!(param(&params, "code"), Some("abc"));
        assert_eq!(param(&params, "state"), Some("x y"));
        assert_eq!(param(&params, "session_state"), Some("s"));
    }

    #[test]
    fn test_fragment_params_from_url_and_bare_hash() {
        let from_url = fragment_params("https://app/cb#access_token=at&id_token=it");
        assert_eq!(param(&from_url, "access_token"), Some("at"));

        let bare = fragment_params("#error=login_required");
        assert_eq!(param(&bare, "error"), Some("login_required"));

        assert!(fragment_params("https://app/cb?code=1").is_empty());
    }

    #[test]
    fn test_append_query_picks_separator() {
        let url = append_query("https://sts/authorize", [("client_id", "spa app".to_string())]);
        assert_eq!(url, "https://sts/authorize?client_id=spa%20app");

        let url = append_query("https://sts/authorize?x=1", [("a", "b".to_string())]);
        assert_eq!(url, "https://sts/authorize?x=1&a=b");
    }

    #[test]
    fn test_form_body() {
        let body = form_body(&[
            ("grant_type".into(), "refresh_token".into()),
            ("redirect_uri".into(), "https://app/cb".into()),
        ]);
        assert_eq!(body, "grant_type=refresh_token&redirect_uri=https%3A%2F%2Fapp%2Fcb");
    }
}
