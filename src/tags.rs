//! 标签规范化 - 把摄像头/标签/区域名转换为安全的聊天标签

/// 只保留 ASCII 字母和数字，顺序不变
///
/// 结果既可以作为 `#tag` 使用，也可以直接拼接进 URL 查询参数。
pub fn normalize(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// 规范化一组可能为空的标签，跳过 `None`
pub fn tag_list<S: AsRef<str>>(tags: &[Option<S>]) -> Vec<String> {
    tags.iter()
        .flatten()
        .map(|tag| normalize(tag.as_ref()))
        .collect()
}
