use reqwest::Url;

use crate::auth::BasicCredentials;

use super::method::HttpMethod;

/// A request with every placeholder resolved and every header computed,
/// ready to hand to the client.
#[derive(Debug, Clone)]
pub struct RequestInput {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub basic_auth: Option<BasicCredentials>,
    pub body: Option<String>,
}

impl RequestInput {
    /// Returns the value of the first header matching `name`, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
