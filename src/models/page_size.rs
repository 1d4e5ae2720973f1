use phf::phf_map;
use serde::{Deserialize, Serialize};

/// 标准纸张尺寸（英寸，纵向）
///
/// 名称区分大小写，与 Chromium 打印接口使用的名称保持一致。
static NAMED_PAGE_SIZES: phf::Map<&'static str, (f64, f64)> = phf_map! {
    "A3" => (11.7, 16.5),
    "A4" => (8.3, 11.7),
    "A5" => (5.8, 8.3),
    "Letter" => (8.5, 11.0),
    "Legal" => (8.5, 14.0),
    "Tabloid" => (11.0, 17.0),
};

/// 纸张尺寸：命名尺寸，或以微米为单位的显式宽高
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageSize {
    /// 命名尺寸，如 `A4`、`Letter`
    Named(String),
    /// 显式尺寸（微米）
    Custom { width: u64, height: u64 },
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Named("A4".to_string())
    }
}

impl PageSize {
    /// 查询命名尺寸的英寸宽高；显式尺寸或未知名称返回 `None`
    pub fn named_inches(&self) -> Option<(f64, f64)> {
        match self {
            PageSize::Named(name) => NAMED_PAGE_SIZES.get(name.as_str()).copied(),
            PageSize::Custom { .. } => None,
        }
    }

    /// 所有受支持的命名尺寸
    pub fn known_names() -> impl Iterator<Item = &'static str> {
        NAMED_PAGE_SIZES.keys().copied()
    }
}

impl std::fmt::Display for PageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageSize::Named(name) => write!(f, "{}", name),
            PageSize::Custom { width, height } => write!(f, "{}x{}µm", width, height),
        }
    }
}

/// 窗口像素尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 页面方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// 从横向标志推导
    pub fn from_landscape(landscape: bool) -> Self {
        if landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    pub fn is_landscape(self) -> bool {
        self == Orientation::Landscape
    }

    /// 尝试从字符串解析方向
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Some(Orientation::Portrait),
            "landscape" => Some(Orientation::Landscape),
            _ => None,
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "portrait"),
            Orientation::Landscape => write!(f, "landscape"),
        }
    }
}
