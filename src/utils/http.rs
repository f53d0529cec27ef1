//! HTTP utility functions for extracting request information.

use actix_web::HttpRequest;

/// Client address for request logs, preferring proxy headers over the peer
pub fn extract_client_ip(req: &HttpRequest) -> String {
    let forwarded = ["X-Forwarded-For", "X-Real-IP"].iter().find_map(|name| {
        let value = req.headers().get(*name)?.to_str().ok()?;
        // X-Forwarded-For lists the original client first
        let ip = value.split(',').next()?.trim();
        (!ip.is_empty()).then(|| ip.to_string())
    });

    forwarded.unwrap_or_else(|| {
        req.connection_info()
            .peer_addr()
            .unwrap_or("unknown")
            .to_string()
    })
}

/// Extract user agent from request headers
pub fn extract_user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}
