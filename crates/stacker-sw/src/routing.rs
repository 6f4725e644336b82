//! Request classification for the fetch handler.

use crate::config::WorkerConfig;
use crate::fetch::Request;
use http::Method;
use std::fmt;

/// Strategy chosen for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; the host performs its default network handling.
    Passthrough,
    /// Content-hashed build output: always from the network, never cached.
    NetworkOnly,
    /// Documents: network first, cached or offline fallback.
    NetworkFirst,
    /// Images, styles, scripts, fonts: cache first.
    CacheFirst,
    /// Remaining same-origin GETs.
    StaleWhileRevalidate,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Passthrough => write!(f, "passthrough"),
            Route::NetworkOnly => write!(f, "network-only"),
            Route::NetworkFirst => write!(f, "network-first"),
            Route::CacheFirst => write!(f, "cache-first"),
            Route::StaleWhileRevalidate => write!(f, "stale-while-revalidate"),
        }
    }
}

/// Pick the strategy for a request. First match wins.
pub fn classify(request: &Request, config: &WorkerConfig) -> Route {
    if request.method != Method::GET {
        return Route::Passthrough;
    }
    if config.is_build_asset(&request.url) {
        return Route::NetworkOnly;
    }
    if request.is_navigation() {
        return Route::NetworkFirst;
    }
    if request.destination.is_static_subresource() {
        return Route::CacheFirst;
    }
    if request.is_same_origin(&config.origin) {
        return Route::StaleWhileRevalidate;
    }
    Route::Passthrough
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Destination;
    use stacker_core::ShellConfig;
    use url::Url;

    fn config() -> WorkerConfig {
        let location = Url::parse("https://hours.example/sw.js?v=abc123").unwrap();
        WorkerConfig::from_location(&location, &ShellConfig::default())
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_non_get_passes_through() {
        let request = get("https://hours.example/api").with_method(Method::POST);
        assert_eq!(classify(&request, &config()), Route::Passthrough);
    }

    #[test]
    fn test_build_assets_beat_every_other_rule() {
        let script = get("https://hours.example/_next/static/chunks/main.js")
            .with_destination(Destination::Script);
        assert_eq!(classify(&script, &config()), Route::NetworkOnly);

        let data = get("https://hours.example/_next/data/build/index.json");
        assert_eq!(classify(&data, &config()), Route::NetworkOnly);
    }

    #[test]
    fn test_navigation_is_network_first() {
        let request = Request::navigate(Url::parse("https://hours.example/project/1").unwrap());
        assert_eq!(classify(&request, &config()), Route::NetworkFirst);
    }

    #[test]
    fn test_static_subresources_are_cache_first() {
        for destination in [
            Destination::Image,
            Destination::Style,
            Destination::Script,
            Destination::Font,
        ] {
            let request = get("https://hours.example/icon-192x192.png").with_destination(destination);
            assert_eq!(classify(&request, &config()), Route::CacheFirst);
        }
        let cross_origin_font =
            get("https://fonts.example/inter.woff2").with_destination(Destination::Font);
        assert_eq!(classify(&cross_origin_font, &config()), Route::CacheFirst);
    }

    #[test]
    fn test_same_origin_data_is_swr() {
        let request = get("https://hours.example/manifest.json").with_destination(Destination::Manifest);
        assert_eq!(classify(&request, &config()), Route::StaleWhileRevalidate);
        assert_eq!(
            classify(&get("https://hours.example/api/shifts"), &config()),
            Route::StaleWhileRevalidate
        );
    }

    #[test]
    fn test_cross_origin_data_passes_through() {
        let request = get("https://api.example/data.json");
        assert_eq!(classify(&request, &config()), Route::Passthrough);
    }
}
