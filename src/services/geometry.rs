//! 页面几何服务 - 业务能力层
//!
//! 只负责"纸张尺寸 → 窗口像素"的换算，不关心流程

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::RendererSession;
use crate::models::{Dimensions, PageSize};

/// HTML 像素密度（PDF 为 72）
pub const HTML_DPI: f64 = 96.0;

/// 微米与英寸的换算比例
pub const MICRONS_PER_INCH: f64 = 25_400.0;

/// 计算纸张对应的窗口像素尺寸
///
/// - 命名尺寸：英寸 × 96，向下取整；横向时仅在高度大于宽度时交换
/// - 显式尺寸（微米）：按原样换算，忽略横向标记
///
/// 未知的命名尺寸返回 [`crate::error::ConfigError::UnknownPageSize`]。
pub fn page_dimensions(page_size: &PageSize, landscape: bool) -> AppResult<Dimensions> {
    match page_size {
        PageSize::Custom { width, height } => Ok(Dimensions::new(
            microns_to_pixels(*width),
            microns_to_pixels(*height),
        )),
        PageSize::Named(name) => {
            let (width, height) = page_size
                .named_inches()
                .ok_or_else(|| AppError::unknown_page_size(name.as_str()))?;
            let dims = Dimensions::new(inches_to_pixels(width), inches_to_pixels(height));
            if landscape && dims.height > dims.width {
                Ok(Dimensions::new(dims.height, dims.width))
            } else {
                Ok(dims)
            }
        }
    }
}

/// 按纸张尺寸调整窗口
///
/// 尺寸未变化时不调用引擎，返回 `None`。
pub async fn set_window_dimensions(
    session: &RendererSession,
    page_size: &PageSize,
    landscape: bool,
) -> AppResult<Option<Dimensions>> {
    let target = page_dimensions(page_size, landscape)?;
    let resized = session.resize(target).await?;
    if let Some(dims) = resized {
        debug!("窗口 {} 调整为 {} ({})", session.id(), dims, page_size);
    }
    Ok(resized)
}

fn inches_to_pixels(inches: f64) -> u32 {
    (inches * HTML_DPI).floor() as u32
}

fn microns_to_pixels(microns: u64) -> u32 {
    (microns as f64 * HTML_DPI / MICRONS_PER_INCH).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::MockEngine;
    use crate::infrastructure::{RenderEngine, SignalBus, WindowConfig};

    #[test]
    fn named_sizes_floor_to_pixels() {
        let letter = PageSize::Named("Letter".into());
        assert_eq!(page_dimensions(&letter, false).unwrap(), Dimensions::new(816, 1056));

        let a4 = PageSize::Named("A4".into());
        assert_eq!(page_dimensions(&a4, false).unwrap(), Dimensions::new(796, 1123));
    }

    #[test]
    fn landscape_swaps_named_sizes() {
        let letter = PageSize::Named("Letter".into());
        assert_eq!(page_dimensions(&letter, true).unwrap(), Dimensions::new(1056, 816));
    }

    #[test]
    fn explicit_sizes_ignore_landscape() {
        let custom = PageSize::Custom {
            width: 304_800,
            height: 228_600,
        };
        assert_eq!(page_dimensions(&custom, false).unwrap(), Dimensions::new(1152, 864));
        assert_eq!(page_dimensions(&custom, true).unwrap(), Dimensions::new(1152, 864));

        let tall = PageSize::Custom {
            width: 228_600,
            height: 304_800,
        };
        assert_eq!(page_dimensions(&tall, true).unwrap(), Dimensions::new(864, 1152));
    }

    #[test]
    fn unknown_named_size_is_configuration_error() {
        let err = page_dimensions(&PageSize::Named("B9".into()), false).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn unchanged_size_skips_engine() {
        let engine = MockEngine::new(SignalBus::new());
        let window = engine
            .open(&WindowConfig {
                width: 816,
                height: 1056,
                show: false,
                partition: None,
            })
            .await
            .unwrap();
        let session = RendererSession::new(window);
        let letter = PageSize::Named("Letter".into());

        assert_eq!(set_window_dimensions(&session, &letter, false).await.unwrap(), None);
        assert_eq!(
            set_window_dimensions(&session, &letter, true).await.unwrap(),
            Some(Dimensions::new(1056, 816))
        );
        assert_eq!(engine.windows()[0].set_size_calls(), 1);
    }
}
