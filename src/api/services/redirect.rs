use std::borrow::Cow;
use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, web};
use tracing::{error, trace};

use crate::api::AppState;
use crate::errors::MorphlinkError;
use crate::services::SOURCE_KEY;
use crate::utils::is_valid_custom_code;

pub const REFERRER_KEY: &str = "referrer";
pub const USER_AGENT_KEY: &str = "user_agent";

pub struct RedirectApi;

impl RedirectApi {
    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        state: web::Data<AppState>,
    ) -> HttpResponse {
        let code = path.into_inner();

        if !is_valid_custom_code(&code) {
            // 非法短码，直接 404，不经过 dispatcher
            trace!("Invalid short code rejected: {}", &code);
            return Self::not_found_response();
        }

        let metadata = Self::click_metadata(&req);
        match state.redirect.redirect(&code, metadata).await {
            Ok(target_url) => HttpResponse::build(StatusCode::FOUND)
                .insert_header(("Location", target_url))
                .finish(),
            Err(MorphlinkError::NotFound(_)) => Self::not_found_response(),
            Err(e) => {
                error!("Redirect lookup for '{}' failed: {}", code, e);
                HttpResponse::build(e.http_status())
                    .insert_header(("Content-Type", "text/plain; charset=utf-8"))
                    .body(e.error_type())
            }
        }
    }

    #[inline]
    fn not_found_response() -> HttpResponse {
        HttpResponse::build(StatusCode::NOT_FOUND)
            .insert_header(("Content-Type", "text/html; charset=utf-8"))
            .insert_header(("Cache-Control", "public, max-age=60"))
            .body("Not Found")
    }

    /// Only raw header strings are copied; the click itself is recorded off the request path
    fn click_metadata(req: &HttpRequest) -> BTreeMap<String, String> {
        let referrer = req
            .headers()
            .get("referer")
            .and_then(|h| h.to_str().ok())
            .map(String::from);
        let user_agent = req
            .headers()
            .get("user-agent")
            .and_then(|h| h.to_str().ok())
            .map(String::from);

        let mut metadata = BTreeMap::new();
        metadata.insert(
            SOURCE_KEY.to_string(),
            derive_source(req.uri().query(), referrer.as_deref()),
        );
        if let Some(referrer) = referrer {
            metadata.insert(REFERRER_KEY.to_string(), referrer);
        }
        if let Some(user_agent) = user_agent {
            metadata.insert(USER_AGENT_KEY.to_string(), user_agent);
        }
        metadata
    }
}

/// 推导流量来源：utm_source > ref:{domain} > direct
pub fn derive_source(query: Option<&str>, referrer: Option<&str>) -> String {
    if let Some(query) = query
        && let Some(utm_source) = extract_query_param(query, "utm_source")
        && !utm_source.is_empty()
    {
        return utm_source.into_owned();
    }

    if let Some(referer_url) = referrer
        && let Some(domain) = extract_domain(referer_url)
    {
        return format!("ref:{}", domain);
    }

    "direct".to_string()
}

/// 从 query string 提取指定参数值
#[inline]
fn extract_query_param<'a>(query: &'a str, key: &str) -> Option<Cow<'a, str>> {
    for part in query.split('&') {
        if let Some(value) = part.strip_prefix(key).and_then(|s| s.strip_prefix('=')) {
            // urlencoding::decode 返回 Cow，未编码时零分配
            return urlencoding::decode(value).ok();
        }
    }
    None
}

/// 从 URL 提取域名
#[inline]
fn extract_domain(url: &str) -> Option<&str> {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    // 取到第一个 / 或 : 或 ? 或 # 为止
    without_scheme
        .split(&['/', ':', '?', '#'][..])
        .next()
        .filter(|s| !s.is_empty())
}

/// Redirect 路由配置
pub fn redirect_routes() -> actix_web::Scope {
    web::scope("")
        .route("/{code}", web::get().to(RedirectApi::handle_redirect))
        .route("/{code}", web::head().to(RedirectApi::handle_redirect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_source_prefers_utm() {
        assert_eq!(
            derive_source(Some("a=1&utm_source=news%20letter"), Some("https://t.co/x")),
            "news letter"
        );
    }

    #[test]
    fn test_derive_source_from_referrer() {
        assert_eq!(
            derive_source(None, Some("https://www.example.org:8443/page?q=1")),
            "ref:www.example.org"
        );
        assert_eq!(derive_source(Some("utm_source="), Some("http://a.io")), "ref:a.io");
    }

    #[test]
    fn test_derive_source_direct() {
        assert_eq!(derive_source(None, None), "direct");
        assert_eq!(derive_source(Some("x=1"), Some("")), "direct");
    }
}
