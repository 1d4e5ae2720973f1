//! 渲染会话 - 基础设施层
//!
//! 持有唯一的窗口资源，在引擎原语之上补充会话级约定（尺寸不变时不调整、关闭幂等）。

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::engine::{CaptureRequest, CookieSpec, RenderWindow};
use crate::models::Dimensions;

/// 渲染会话
///
/// 由所属任务独占；克隆只复制句柄。
#[derive(Clone)]
pub struct RendererSession {
    window: Arc<dyn RenderWindow>,
}

impl RendererSession {
    pub fn new(window: Arc<dyn RenderWindow>) -> Self {
        Self { window }
    }

    pub fn id(&self) -> &str {
        self.window.id()
    }

    pub fn dimensions(&self) -> Dimensions {
        self.window.dimensions()
    }

    pub fn is_destroyed(&self) -> bool {
        self.window.is_destroyed()
    }

    /// 调整窗口尺寸
    ///
    /// 与当前尺寸相同时不调用引擎，返回 `None`；否则返回新尺寸。
    pub async fn resize(&self, dimensions: Dimensions) -> AppResult<Option<Dimensions>> {
        if self.window.dimensions() == dimensions {
            debug!("窗口 {} 尺寸未变化 ({})", self.id(), dimensions);
            return Ok(None);
        }
        self.window.set_size(dimensions).await?;
        Ok(Some(dimensions))
    }

    pub async fn set_cookies(&self, cookies: &[CookieSpec]) -> AppResult<()> {
        if cookies.is_empty() {
            return Ok(());
        }
        self.window.set_cookies(cookies).await
    }

    pub async fn load(&self, url: &str, headers: &[(String, String)]) -> AppResult<()> {
        self.window.load(url, headers).await
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: &str) -> AppResult<JsonValue> {
        self.window.execute_script(js_code).await
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: &str) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    pub async fn capture(&self, request: &CaptureRequest) -> AppResult<Vec<u8>> {
        self.window.capture(request).await
    }

    /// 关闭窗口；已销毁的窗口直接返回
    pub async fn close(&self) -> AppResult<()> {
        if self.window.is_destroyed() {
            return Ok(());
        }
        self.window.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::engine::{RenderEngine, WindowConfig};
    use crate::infrastructure::mock::MockEngine;
    use crate::infrastructure::SignalBus;

    async fn open_session() -> (MockEngine, RendererSession) {
        let engine = MockEngine::new(SignalBus::new());
        let window = engine
            .open(&WindowConfig {
                width: 796,
                height: 1123,
                show: false,
                partition: None,
            })
            .await
            .unwrap();
        (engine, RendererSession::new(window))
    }

    #[tokio::test]
    async fn resize_skips_unchanged_dimensions() {
        let (engine, session) = open_session().await;

        assert_eq!(session.resize(Dimensions::new(796, 1123)).await.unwrap(), None);
        assert_eq!(engine.windows()[0].set_size_calls(), 0);

        let resized = session.resize(Dimensions::new(1123, 796)).await.unwrap();
        assert_eq!(resized, Some(Dimensions::new(1123, 796)));
        assert_eq!(session.dimensions(), Dimensions::new(1123, 796));
        assert_eq!(engine.windows()[0].set_size_calls(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (engine, session) = open_session().await;

        session.close().await.unwrap();
        session.close().await.unwrap();

        assert!(session.is_destroyed());
        assert_eq!(engine.windows()[0].close_calls(), 1);
    }

    #[tokio::test]
    async fn empty_cookie_list_is_not_sent() {
        let (engine, session) = open_session().await;

        session.set_cookies(&[]).await.unwrap();

        assert!(engine.windows()[0].cookies().is_empty());
        assert!(engine.windows()[0].calls().is_empty());
    }
}
