use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
    middleware::Next,
};

/// Policy for the served front-end: self, the Spotify Web Playback SDK and
/// Spotify API calls from the browser. Disallow objects.
const CSP: &str = "default-src 'self'; script-src 'self' https://sdk.scdn.co; frame-src https://sdk.scdn.co; connect-src 'self' https://api.spotify.com https://*.spotify.com; img-src 'self' https: data:; style-src 'self' 'unsafe-inline'; object-src 'none'; base-uri 'self'; form-action 'self'; frame-ancestors 'self'";

/// Adds Content-Security-Policy and a couple of hardening headers to every response.
pub async fn csp_middleware(req: Request<Body>, next: Next) -> Response<Body> {
    let mut res = next.run(req).await;

    let headers = [
        ("content-security-policy", CSP),
        ("referrer-policy", "no-referrer"),
        ("x-content-type-options", "nosniff"),
    ];

    for (name, value) in headers {
        // Handlers may set their own value
        if res.headers().get(name).is_none() {
            res.headers_mut().insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
    }

    res
}
