//! CORS policy: JSON-configurable allow-lists and the header-assembly logic
//! applied to every response.

use std::path::Path;

use http::{HeaderValue, header};
use serde::{Deserialize, Serialize};

use crate::types::Response;

/// CORS allow-lists, loaded from an optional JSON file or falling back to
/// the permissive defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "AllowedMethods")]
    pub allowed_methods: Vec<String>,
    #[serde(rename = "AllowedOrigins")]
    pub allowed_origins: Vec<String>,
    #[serde(rename = "AllowedHeaders")]
    pub allowed_headers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_methods: ["GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_origins: vec!["*".to_string()],
            allowed_headers: vec!["Content-Type".to_string()],
        }
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self, crate::error::StartupError> {
        let data =
            tokio::fs::read(path)
                .await
                .map_err(|source| crate::error::StartupError::CorsConfig {
                    path: path.display().to_string(),
                    source,
                })?;
        serde_json::from_slice(&data).map_err(|source| crate::error::StartupError::CorsConfigJson {
            path: path.display().to_string(),
            source,
        })
    }

    fn methods_str(&self) -> String {
        self.allowed_methods.join(", ")
    }

    fn origins_str(&self) -> String {
        self.allowed_origins.join(", ")
    }

    /// The allow/expose header lists, always including `Content-Type` and
    /// `Cache-Control` per the wire contract.
    fn headers_str(&self) -> String {
        let mut headers = self.allowed_headers.clone();
        for required in ["Content-Type", "Cache-Control"] {
            if !headers.iter().any(|h| h.eq_ignore_ascii_case(required)) {
                headers.push(required.to_string());
            }
        }
        headers.join(", ")
    }

    /// Adds `Access-Control-Allow-*` and `Access-Control-Expose-Headers`
    /// headers to `response`.
    pub fn apply(&self, response: &mut Response) {
        let headers = response.headers_mut();

        if let Ok(value) = HeaderValue::from_str(&self.origins_str()) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.methods_str()) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.headers_str()) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value.clone());
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_the_documented_policy() {
        let cfg = Config::default();
        assert_eq!(cfg.methods_str(), "GET, HEAD, POST, PUT, DELETE, OPTIONS");
        assert_eq!(cfg.origins_str(), "*");
        assert_eq!(cfg.headers_str(), "Content-Type, Cache-Control");
    }

    #[test]
    fn headers_str_does_not_duplicate_required_headers() {
        let mut cfg = Config::default();
        cfg.allowed_headers.push("Cache-Control".to_string());
        assert_eq!(cfg.headers_str(), "Content-Type, Cache-Control");
    }

    #[tokio::test]
    async fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cors.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let result = Config::load(&path).await;
        assert!(matches!(
            result,
            Err(crate::error::StartupError::CorsConfigJson { .. })
        ));
    }

    #[tokio::test]
    async fn load_parses_a_well_formed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cors.json");
        tokio::fs::write(
            &path,
            br#"{"AllowedMethods":["GET"],"AllowedOrigins":["https://example.com"],"AllowedHeaders":["X-Api-Key"]}"#,
        )
        .await
        .unwrap();

        let cfg = Config::load(&path).await.unwrap();
        assert_eq!(cfg.allowed_methods, vec!["GET"]);
        assert_eq!(cfg.allowed_origins, vec!["https://example.com"]);
    }
}
