//! Client metadata captured with mutating requests.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Originating IP and device fingerprint of a request.
///
/// The IP honors the first entry of `x-forwarded-for` when the server runs
/// behind a reverse proxy.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        Ok(Self { ip, user_agent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> RequestMeta {
        let (mut parts, ()) = request.into_parts();
        RequestMeta::from_request_parts(&mut parts, &())
            .await
            .expect("infallible")
    }

    #[tokio::test]
    async fn forwarded_for_takes_first_hop() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("user-agent", "test-agent/1.0")
            .body(())
            .expect("request");

        let meta = extract(request).await;
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(meta.user_agent.as_deref(), Some("test-agent/1.0"));
    }

    #[tokio::test]
    async fn missing_headers_yield_none() {
        let request = Request::builder().body(()).expect("request");
        let meta = extract(request).await;
        assert!(meta.ip.is_none());
        assert!(meta.user_agent.is_none());
    }
}
