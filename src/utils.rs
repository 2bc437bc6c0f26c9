/// Object key utility functions / 对象键工具函数

/// Clean a slash separated path / 清理路径，处理 . 和 .. 和重复的 /
/// Returns the cleaned segments joined by `/`, without leading or trailing separator
fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    parts.join("/")
}

/// Build the physical object key for a logical key / 由逻辑键生成物理对象键
///
/// `prefix` and `key` are joined with `/` and cleaned. The result never starts
/// or ends with a separator, which is the form S3 stores and lists keys in.
pub fn join_key(prefix: &str, key: &str) -> String {
    clean_path(&format!("{}/{}", prefix, key))
}
