//! JS 执行器 - 基础设施层
//!
//! 包装 chromiumoxide 的 Page，只暴露"执行 JS"的能力

use chromiumoxide::Page;
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult};

/// JS 执行器
///
/// 职责：
/// - 在页面中执行脚本
/// - 把脚本异常和协议错误统一映射为 [`AppError`]
/// - 不关心任务、资源或捕获流程
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// 返回 `undefined` 的脚本得到 `JsonValue::Null`。
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self
            .page
            .evaluate(js_code.into())
            .await
            .map_err(AppError::script_failed)?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }
}
