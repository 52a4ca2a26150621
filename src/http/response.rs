use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Protocol version as it appears in a status line, e.g. `HTTP/1.1`.
    pub version: String,
    pub duration_ms: u128,
    pub size_bytes: usize,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}
