use std::sync::Arc;

use axum::http::HeaderMap;

use crate::AppCore;

/// Header carrying the caller identity issued by the (external)
/// identity layer. Absent in single-user deployments.
pub const USER_HEADER: &str = "x-plumeflow-user";

pub const DEFAULT_OWNER: &str = "local";

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AppCore>,
}

/// Resolve the caller identity for a request.
pub fn owner_from(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_OWNER)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_defaults_to_local() {
        assert_eq!(owner_from(&HeaderMap::new()), "local");
    }

    #[test]
    fn owner_reads_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, "alice".parse().unwrap());
        assert_eq!(owner_from(&headers), "alice");
    }
}
