use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult, ConfigError};
use crate::models::output::OutputKind;
use crate::models::page_size::PageSize;

/// 渲染配置
///
/// 任务构造时拍下快照（不可变），每个资源开始前从快照恢复出一份工作副本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub page_size: PageSize,
    pub landscape: bool,
    /// 0 = 默认边距, 1 = 无边距, 2 = 最小边距
    pub margins_type: u8,
    pub print_background: bool,
    pub print_selection_only: bool,
    /// 加载完成后的固定等待时间（毫秒）；事件等待模式下作为超时时间
    pub output_wait: u64,
    /// 存在时改为等待页面事件；空字符串表示默认事件名
    pub wait_for_js_event: Option<String>,
    /// `;` 分隔、`=` 分隔名值的 cookie 字符串
    pub cookies: Option<String>,
    pub accept_language: Option<String>,
    pub disable_cache: bool,
    /// JSON 对象字符串，附加到每次加载的请求头
    pub request_headers: Option<String>,
    /// JSON 对象字符串，覆盖窗口默认参数
    pub browser_config: Option<String>,
    /// Markdown 输入使用的自定义样式表
    pub css: Vec<String>,
    /// 显式指定输出类型，优先于目标文件扩展名
    #[serde(rename = "type")]
    pub output_type: Option<OutputKind>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            landscape: false,
            margins_type: 1,
            print_background: true,
            print_selection_only: false,
            output_wait: 0,
            wait_for_js_event: None,
            cookies: None,
            accept_language: None,
            disable_cache: false,
            request_headers: None,
            browser_config: None,
            css: Vec::new(),
            output_type: None,
        }
    }
}

impl RenderConfig {
    /// 按键名修改一个配置值（键名使用 camelCase，与序列化格式一致）
    ///
    /// 值的类型必须能反序列化为对应字段，否则返回 [`ConfigError::InvalidValue`]，
    /// 原配置保持不变。
    pub fn set_value(&mut self, key: &str, value: JsonValue) -> AppResult<()> {
        let current = serde_json::to_value(&*self)?;
        let JsonValue::Object(mut fields) = current else {
            return Err(AppError::Other("渲染配置无法序列化为对象".to_string()));
        };

        if !fields.contains_key(key) {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: "未知的配置项".to_string(),
            }
            .into());
        }
        fields.insert(key.to_string(), value);

        let updated: RenderConfig = serde_json::from_value(JsonValue::Object(fields)).map_err(|e| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let config = RenderConfig::default();
        assert_eq!(config.page_size, PageSize::Named("A4".into()));
        assert_eq!(config.margins_type, 1);
        assert!(config.print_background);
        assert_eq!(config.output_wait, 0);
        assert!(config.wait_for_js_event.is_none());
    }

    #[test]
    fn set_value_updates_known_key() {
        let mut config = RenderConfig::default();
        config.set_value("printBackground", json!(false)).unwrap();
        config.set_value("pageSize", json!("Letter")).unwrap();
        config.set_value("type", json!("png")).unwrap();

        assert!(!config.print_background);
        assert_eq!(config.page_size, PageSize::Named("Letter".into()));
        assert_eq!(config.output_type, Some(OutputKind::Png));
    }

    #[test]
    fn set_value_rejects_unknown_key_and_bad_type() {
        let mut config = RenderConfig::default();
        let before = config.clone();

        assert!(config.set_value("noSuchKey", json!(1)).is_err());
        let err = config.set_value("landscape", json!("yes")).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(config, before);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"landscape":true,"waitForJsEvent":""}"#).unwrap();
        assert!(config.landscape);
        assert_eq!(config.wait_for_js_event.as_deref(), Some(""));
        assert_eq!(config.margins_type, 1);
    }
}
