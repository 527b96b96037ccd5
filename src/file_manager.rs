use std::path::{Path, PathBuf};

use tokio::fs;

use crate::common::Output;

pub async fn read_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    fs::read_to_string(path).await
}

/// Writes `output` as `key=value` lines to `output_dir/file_name`.
pub async fn write_result(
    output_dir: impl AsRef<Path>,
    file_name: &str,
    output: &Output,
) -> std::io::Result<PathBuf> {
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir).await?;

    let mut lines = String::new();
    for (key, value) in output {
        lines.push_str(&format!("{}={}\n", key, value));
    }
    let path = output_dir.join(file_name);
    fs::write(&path, lines).await?;
    Ok(path)
}

/// Copies `result` into `input_dir`, suffixing its name with the iteration.
pub async fn copy_into(
    result: impl AsRef<Path>,
    input_dir: impl AsRef<Path>,
    iteration: usize,
) -> std::io::Result<PathBuf> {
    let result = result.as_ref();
    let name = result
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result".to_string());
    let target = input_dir.as_ref().join(format!("{}.{}", name, iteration));
    fs::copy(result, &target).await?;
    Ok(target)
}
