//! CORS middleware configuration. A browser-based dashboard or demo
//! client is expected to call this from a different origin during
//! development, so the default stays permissive.

use tower_http::cors::CorsLayer;

pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}
