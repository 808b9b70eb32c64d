//! User-facing error pages.
//!
//! The denial page is identical for every deny reason; which check failed is
//! logged, never disclosed.  Operational failures (502/504) carry a neutral
//! one-liner.

use bytes::Bytes;
use http::{header, Response, StatusCode};
use http_body_util::{BodyExt, Full};

use super::ProxyBody;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Renders the 403 page shown to unauthorised clients.
#[derive(Debug, Clone)]
pub struct DenialRenderer {
    email: String,
    email_name: String,
}

impl DenialRenderer {
    /// Create a renderer with the configured contact details.
    #[must_use]
    pub fn new(email: impl Into<String>, email_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            email_name: email_name.into(),
        }
    }

    /// Render the access-denied page.
    #[must_use]
    pub fn render(&self, request_id: &str) -> Response<ProxyBody> {
        let contact = if self.email.is_empty() {
            String::new()
        } else {
            format!(
                "<p>If you believe you should have access, contact \
                 <a href=\"mailto:{email}\">{name}</a> quoting request id \
                 <code>{request_id}</code>.</p>",
                email = self.email,
                name = self.email_name,
            )
        };

        let body = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>Access denied</title></head>\n<body>\n\
             <h1>Access denied</h1>\n\
             <p>You are not authorised to view this page.</p>\n{contact}\
             </body>\n</html>\n"
        );

        html_response(StatusCode::FORBIDDEN, body)
    }
}

/// 502 page for origin connection failures.
#[must_use]
pub fn bad_gateway() -> Response<ProxyBody> {
    html_response(
        StatusCode::BAD_GATEWAY,
        "<html><body><h1>502 Bad Gateway</h1></body></html>\n".to_string(),
    )
}

/// 504 page for origin timeouts.
#[must_use]
pub fn gateway_timeout() -> Response<ProxyBody> {
    html_response(
        StatusCode::GATEWAY_TIMEOUT,
        "<html><body><h1>504 Gateway Timeout</h1></body></html>\n".to_string(),
    )
}

/// Plain 200 for load-balancer health probes.
#[must_use]
pub fn health_ok() -> Response<ProxyBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(full_body("OK"))
        .unwrap_or_else(|_| Response::new(full_body("OK")))
}

fn html_response(status: StatusCode, body: String) -> Response<ProxyBody> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, HTML_CONTENT_TYPE)
        .body(full_body(body))
        .unwrap_or_else(|_| Response::new(full_body("")))
}

/// Wrap a static body in the shared proxy body type.
pub(super) fn full_body(content: impl Into<Bytes>) -> ProxyBody {
    Full::new(content.into())
        .map_err(|never| match never {})
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_denial_page_contains_contact() {
        let renderer = DenialRenderer::new("ops@example.test", "Operations");
        let response = renderer.render("abc12345");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains("mailto:ops@example.test"));
        assert!(body.contains("Operations"));
        assert!(body.contains("abc12345"));
    }

    #[test]
    fn test_denial_page_without_email() {
        let renderer = DenialRenderer::new("", "Nobody");
        let response = renderer.render("abc12345");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_operational_pages() {
        assert_eq!(bad_gateway().status(), StatusCode::BAD_GATEWAY);
        assert_eq!(gateway_timeout().status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(health_ok().status(), StatusCode::OK);
    }
}
