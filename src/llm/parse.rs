//! 从 LLM 文本中提取 JSON
//!
//! 支持 ```json 代码块、裸 JSON、前后夹杂说明文字的输出；找不到时返回 None。

/// 去掉 ```json / ``` 围栏，返回内部文本
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let rest = &trimmed[start + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.find("```").map(|end| &rest[..end]).unwrap_or(rest).trim()
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// 提取第一个 `{` 到最后一个 `}` 之间的文本
pub fn extract_json_object(text: &str) -> Option<&str> {
    slice_between(strip_fence(text), '{', '}')
}

/// 提取第一个 `[` 到最后一个 `]` 之间的文本
pub fn extract_json_array(text: &str) -> Option<&str> {
    slice_between(strip_fence(text), '[', ']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_from_fence_and_prose() {
        let fenced = "Sure!\n```json\n{\"a\": 1}\n```\nDone";
        assert_eq!(extract_json_object(fenced), Some("{\"a\": 1}"));

        let prose = "Plan: [{\"step\": 1}] hope that helps";
        assert_eq!(extract_json_array(prose), Some("[{\"step\": 1}]"));
    }

    #[test]
    fn test_missing_json_is_none() {
        assert_eq!(extract_json_object("no braces here"), None);
        assert_eq!(extract_json_array(""), None);
        assert_eq!(extract_json_array("] backwards ["), None);
    }
}
