//! Request classification.

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use sparkcache_core::Error;
use url::Url;

use crate::fetch::{Request, same_origin};

/// Which strategy handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingClass {
    /// Top-level document load.
    Navigation,
    /// Subresource from the serving origin.
    SameOriginStatic,
    /// External resource matching the allow-list.
    AllowedExternal,
    /// Everything else, network only.
    Passthrough,
}

/// Pure classifier over origin, navigation mode and external allow-list.
#[derive(Debug, Clone)]
pub struct Router {
    origin: Url,
    allow_list: RegexSet,
}

impl Router {
    /// Compile the allow-list patterns.
    pub fn new(origin: Url, patterns: &[String]) -> Result<Self, Error> {
        let allow_list =
            RegexSet::new(patterns).map_err(|e| Error::InvalidInput(format!("invalid runtime pattern: {e}")))?;
        Ok(Self { origin, allow_list })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// First matching rule wins: method, navigation, origin, allow-list.
    pub fn classify(&self, request: &Request) -> RoutingClass {
        if !request.is_cacheable() {
            RoutingClass::Passthrough
        } else if request.is_navigation() {
            RoutingClass::Navigation
        } else if same_origin(&request.url, &self.origin) {
            RoutingClass::SameOriginStatic
        } else if self.allow_list.is_match(request.url.as_str()) {
            RoutingClass::AllowedExternal
        } else {
            RoutingClass::Passthrough
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use sparkcache_core::AppConfig;

    fn router() -> Router {
        let config = AppConfig::default();
        Router::new(Url::parse("https://harnessthespark.com").unwrap(), &config.runtime_patterns).unwrap()
    }

    fn get(url: &str) -> Request {
        Request::get(url, Some(router().origin())).unwrap()
    }

    #[test]
    fn test_same_origin_navigation_is_navigation() {
        let request = Request::navigate("/about", Some(router().origin())).unwrap();
        assert_eq!(router().classify(&request), RoutingClass::Navigation);
    }

    #[test]
    fn test_cross_origin_navigation_is_navigation() {
        let request = Request::navigate("https://fonts.googleapis.com/css", None).unwrap();
        assert_eq!(router().classify(&request), RoutingClass::Navigation);
    }

    #[test]
    fn test_same_origin_asset() {
        assert_eq!(router().classify(&get("/styles.css")), RoutingClass::SameOriginStatic);
    }

    #[test]
    fn test_allow_listed_external() {
        for url in [
            "https://fonts.googleapis.com/css2?family=Inter",
            "https://fonts.gstatic.com/s/inter/v1.woff2",
            "https://cdnjs.cloudflare.com/ajax/libs/x.js",
            "https://images.unsplash.com/photo-1",
        ] {
            assert_eq!(router().classify(&get(url)), RoutingClass::AllowedExternal, "{url}");
        }
    }

    #[test]
    fn test_unlisted_external_is_passthrough() {
        assert_eq!(router().classify(&get("https://www.google-analytics.com/collect")), RoutingClass::Passthrough);
        // anchored patterns do not match plain http
        assert_eq!(router().classify(&get("http://fonts.googleapis.com/css")), RoutingClass::Passthrough);
    }

    #[test]
    fn test_non_get_is_passthrough_even_when_navigating() {
        let post = Request::new(Method::POST, "/contact", Some(router().origin()))
            .unwrap()
            .with_mode(crate::fetch::RequestMode::Navigate);
        assert_eq!(router().classify(&post), RoutingClass::Passthrough);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = Router::new(Url::parse("https://example.com").unwrap(), &["(".to_string()]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
