//! 请求参数服务 - 业务能力层
//!
//! 把渲染配置中的字符串参数（cookie、请求头、窗口覆盖项）解析为引擎可用的结构

use serde_json::{Map, Value as JsonValue};
use tracing::warn;
use url::Url;

use crate::error::{AppError, AppResult, SourceError};
use crate::infrastructure::{CookieSpec, WindowConfig};
use crate::models::{Dimensions, RenderConfig};

/// 解析 cookie 字符串
///
/// 格式为 `name=value;name2=value2`，所有 cookie 都归属 `url` 的源（scheme://host）。
pub fn parse_cookies(cookies: &str, url: &str) -> AppResult<Vec<CookieSpec>> {
    let origin = cookie_origin(url)?;

    let specs = cookies
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            CookieSpec {
                url: origin.clone(),
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            }
        })
        .collect();
    Ok(specs)
}

fn cookie_origin(url: &str) -> AppResult<String> {
    let parsed = Url::parse(url).map_err(|_| {
        AppError::Source(SourceError::InvalidInput {
            input: url.to_string(),
        })
    })?;
    let host = parsed.host_str().unwrap_or_default();
    Ok(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

/// 组装每次加载附带的请求头
///
/// 顺序：`pragma: no-cache`（禁用缓存时）、`Accept-Language`、`requestHeaders` 中的各项。
/// `requestHeaders` 不是合法的 JSON 对象时返回配置错误。
pub fn request_headers(config: &RenderConfig) -> AppResult<Vec<(String, String)>> {
    let mut headers = Vec::new();

    if config.disable_cache {
        headers.push(("pragma".to_string(), "no-cache".to_string()));
    }
    if let Some(language) = config.accept_language.as_deref().filter(|l| !l.is_empty()) {
        headers.push(("Accept-Language".to_string(), language.to_string()));
    }
    if let Some(raw) = config.request_headers.as_deref() {
        let extra: Map<String, JsonValue> =
            serde_json::from_str(raw).map_err(|e| AppError::invalid_json("requestHeaders", e))?;
        for (name, value) in extra {
            let value = match value {
                JsonValue::String(s) => s,
                other => other.to_string(),
            };
            headers.push((name, value));
        }
    }

    Ok(headers)
}

/// 由页面尺寸和 `browserConfig` 覆盖项生成窗口参数
///
/// `browserConfig` 无法解析时记录警告并使用默认值；只识别 `width`、`height`、`show`。
pub fn window_config(
    config: &RenderConfig,
    dimensions: Dimensions,
    partition: Option<String>,
) -> WindowConfig {
    let mut window = WindowConfig {
        width: dimensions.width,
        height: dimensions.height,
        show: false,
        partition,
    };

    let Some(raw) = config.browser_config.as_deref() else {
        return window;
    };
    let overrides: Map<String, JsonValue> = match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            warn!("browserConfig 无效，使用默认窗口参数: {} ({})", raw, e);
            return window;
        }
    };

    if let Some(width) = overrides.get("width").and_then(pixel_value) {
        window.width = width;
    }
    if let Some(height) = overrides.get("height").and_then(pixel_value) {
        window.height = height;
    }
    if let Some(show) = overrides.get("show").and_then(JsonValue::as_bool) {
        window.show = show;
    }
    window
}

fn pixel_value(value: &JsonValue) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_are_scoped_to_origin() {
        let cookies = parse_cookies("session=abc; theme=dark;", "https://example.com:8443/a/b?c=1").unwrap();
        assert_eq!(
            cookies,
            vec![
                CookieSpec {
                    url: "https://example.com:8443".into(),
                    name: "session".into(),
                    value: "abc".into(),
                },
                CookieSpec {
                    url: "https://example.com:8443".into(),
                    name: "theme".into(),
                    value: "dark".into(),
                },
            ]
        );
    }

    #[test]
    fn cookie_value_keeps_embedded_equals() {
        let cookies = parse_cookies("token=a=b", "http://localhost/").unwrap();
        assert_eq!(cookies[0].value, "a=b");
        assert_eq!(cookies[0].url, "http://localhost");
    }

    #[test]
    fn headers_follow_documented_order() {
        let config = RenderConfig {
            disable_cache: true,
            accept_language: Some("zh-CN".into()),
            request_headers: Some(r#"{"X-Trace": "1", "X-Count": 2}"#.into()),
            ..Default::default()
        };
        let headers = request_headers(&config).unwrap();
        assert_eq!(headers[0], ("pragma".into(), "no-cache".into()));
        assert_eq!(headers[1], ("Accept-Language".into(), "zh-CN".into()));
        assert!(headers.contains(&("X-Trace".into(), "1".into())));
        assert!(headers.contains(&("X-Count".into(), "2".into())));
    }

    #[test]
    fn malformed_request_headers_are_fatal() {
        let config = RenderConfig {
            request_headers: Some("{not json".into()),
            ..Default::default()
        };
        assert!(request_headers(&config).unwrap_err().is_configuration());
    }

    #[test]
    fn browser_config_overrides_window() {
        let config = RenderConfig {
            browser_config: Some(r#"{"width": 1280, "show": true, "frame": false}"#.into()),
            ..Default::default()
        };
        let window = window_config(&config, Dimensions::new(796, 1123), None);
        assert_eq!(window.width, 1280);
        assert_eq!(window.height, 1123);
        assert!(window.show);
    }

    #[test]
    fn malformed_browser_config_falls_back_to_defaults() {
        let config = RenderConfig {
            browser_config: Some("width=1280".into()),
            ..Default::default()
        };
        let window = window_config(&config, Dimensions::new(796, 1123), Some("p".into()));
        assert_eq!((window.width, window.height, window.show), (796, 1123, false));
        assert_eq!(window.partition.as_deref(), Some("p"));
    }
}
