//! Route pattern extraction utilities.

use actix_web::HttpRequest;

/// Label used for requests that matched no registered route
pub const UNMATCHED_ROUTE: &str = "/unknown";

/// Route label for metrics: the matched resource pattern, never the raw path.
///
/// Scanners probing random paths would otherwise create one series each.
pub fn extract_route_pattern(req: &HttpRequest) -> String {
    req.match_pattern()
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}
