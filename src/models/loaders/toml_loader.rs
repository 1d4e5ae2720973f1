use crate::error::{AppError, AppResult, FileError};
use crate::models::manifest::JobManifest;
use crate::models::render_config::RenderConfig;
use std::path::{Path, PathBuf};
use tokio::fs;

async fn read_toml(path: &Path) -> AppResult<String> {
    fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))
}

fn toml_error(path: &Path, err: toml::de::Error) -> AppError {
    AppError::File(FileError::TomlParseFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// 从 TOML 文件加载渲染配置
pub async fn load_render_config(toml_file_path: &Path) -> AppResult<RenderConfig> {
    let content = read_toml(toml_file_path).await?;
    toml::from_str(&content).map_err(|e| toml_error(toml_file_path, e))
}

/// 从 TOML 文件加载任务清单
pub async fn load_manifest(toml_file_path: &Path) -> AppResult<JobManifest> {
    let content = read_toml(toml_file_path).await?;

    let mut manifest: JobManifest =
        toml::from_str(&content).map_err(|e| toml_error(toml_file_path, e))?;

    // 设置文件路径
    manifest.file_path = Some(toml_file_path.to_path_buf());

    Ok(manifest)
}

/// 从文件夹中加载所有任务清单，按文件名排序
///
/// 解析失败的文件会被跳过并记录警告。
pub async fn load_all_manifests(folder_path: &Path) -> AppResult<Vec<JobManifest>> {
    let mut entries = fs::read_dir(folder_path)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path.display().to_string(), e))?;

    let mut toml_files: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut manifests = Vec::with_capacity(toml_files.len());
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_manifest(&path).await {
            Ok(manifest) => {
                tracing::info!("成功加载 {} 个输入", manifest.inputs.len());
                manifests.push(manifest);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(manifests)
}
