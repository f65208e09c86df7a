//! Descriptors for a single outgoing exchange

use std::fmt;

use http::{HeaderMap, Method};
use url::{form_urlencoded, Url};

/// An ordered collection of key/value parameters
///
/// Used both for query strings and for form-encoded bodies. Iteration order
/// is insertion order; inserting a key that is already present replaces its
/// value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    /// Constructs an empty parameter collection
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Inserts a parameter, replacing any existing value for the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    /// Adds a parameter and returns the collection
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Gets the value for a key, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The number of parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes the parameters as `application/x-www-form-urlencoded`
    pub fn to_form_urlencoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        params.extend(iter);
        params
    }
}

impl<K, V> Extend<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// A fully built HTTP request, ready to be handed to a transport
///
/// Once built, a request is never altered; retries re-send the same value.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Parameters,
}

impl HttpRequest {
    /// Builds a `GET` request
    ///
    /// Query parameters, if any, are appended to `uri` as `key=value` pairs
    /// joined by `&`.
    pub fn get(uri: Url, query: Option<&Parameters>, headers: Option<&HeaderMap>) -> Self {
        Self::build(Method::GET, uri, query, None, headers)
    }

    /// Builds a `POST` request with a form-encoded body
    pub fn post(
        uri: Url,
        query: Option<&Parameters>,
        body: Option<&Parameters>,
        headers: Option<&HeaderMap>,
    ) -> Self {
        Self::build(Method::POST, uri, query, body, headers)
    }

    fn build(
        method: Method,
        mut url: Url,
        query: Option<&Parameters>,
        body: Option<&Parameters>,
        headers: Option<&HeaderMap>,
    ) -> Self {
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.query_pairs_mut().extend_pairs(query.iter());
        }

        Self {
            method,
            url,
            headers: headers.cloned().unwrap_or_default(),
            body: body.cloned().unwrap_or_default(),
        }
    }

    /// The request method
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URI, including any query string
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Additional headers to send with the request
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The body parameters
    #[inline]
    pub fn body(&self) -> &Parameters {
        &self.body
    }

    /// The form-encoded body; empty if there are no body parameters
    pub fn encoded_body(&self) -> String {
        self.body.to_form_urlencoded()
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_endpoint() -> Url {
        Url::parse("https://login.example.com/common/oauth2/token").unwrap()
    }

    #[test]
    fn missing_parameters_produce_no_query_and_empty_body() {
        let request = HttpRequest::post(token_endpoint(), None, None, None);

        assert_eq!(request.url().query(), None);
        assert!(request.body().is_empty());
        assert_eq!(request.encoded_body(), "");
        assert!(request.headers().is_empty());
    }

    #[test]
    fn empty_parameters_produce_no_query() {
        let request = HttpRequest::get(token_endpoint(), Some(&Parameters::new()), None);

        assert_eq!(request.url().query(), None);
        assert_eq!(
            request.url().as_str(),
            "https://login.example.com/common/oauth2/token"
        );
    }

    #[test]
    fn query_parameters_are_appended_in_order() {
        let query = Parameters::from([("key1", "qp1"), ("key2", "qp2")]);
        let request = HttpRequest::get(token_endpoint(), Some(&query), None);

        assert_eq!(
            request.url().as_str(),
            "https://login.example.com/common/oauth2/token?key1=qp1&key2=qp2"
        );
    }

    #[test]
    fn query_parameters_extend_an_existing_query() {
        let mut uri = token_endpoint();
        uri.set_query(Some("api-version=1.0"));
        let query = Parameters::from([("key1", "qp1")]);

        let request = HttpRequest::get(uri, Some(&query), None);

        assert_eq!(request.url().query(), Some("api-version=1.0&key1=qp1"));
    }

    #[test]
    fn body_is_form_encoded() {
        let body = Parameters::from([("key1", "some value1"), ("key2", "a&b=c")]);
        let request = HttpRequest::post(token_endpoint(), None, Some(&body), None);

        assert_eq!(request.encoded_body(), "key1=some+value1&key2=a%26b%3Dc");
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut params = Parameters::from([("a", "1"), ("b", "2")]);
        params.insert("a", "3");

        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
        assert_eq!(params.get("b"), Some("2"));
        assert_eq!(params.get("c"), None);
    }
}
