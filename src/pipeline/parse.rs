//! 回复解析：围栏代码块提取与 JSON 文档解析
//!
//! 多个围栏块时总是取第一个符合条件的块，保证结果确定。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

static FENCE_RE: OnceLock<Regex> = OnceLock::new();

fn fence_re() -> &'static Regex {
    // 行首 ```lang<info...>\n body 行首 ```（缺少收尾围栏时取到文本末尾）
    FENCE_RE.get_or_init(|| {
        Regex::new(r"(?sm)^[ \t]*```([A-Za-z0-9_+.#-]*)[^\n]*\n(.*?)(?:^[ \t]*```|\z)")
            .expect("fence regex is valid")
    })
}

/// 一个 Markdown 围栏块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    pub lang: &'a str,
    pub body: &'a str,
}

/// 按出现顺序列出所有围栏块
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    fence_re()
        .captures_iter(text)
        .filter_map(|caps| {
            Some(FencedBlock {
                lang: caps.get(1)?.as_str(),
                body: caps.get(2)?.as_str(),
            })
        })
        .collect()
}

/// 从回复中取出程序文本：
/// 第一个 `lang` 标记的块 → 第一个任意块（丢弃其 info 行）→ 单行 ```…``` → 原文；结果去首尾空白
pub fn extract_code(response: &str, lang: &str) -> String {
    let blocks = fenced_blocks(response);
    if let Some(block) = blocks.iter().find(|b| b.lang.eq_ignore_ascii_case(lang)) {
        return block.body.trim().to_string();
    }
    if let Some(block) = blocks.first() {
        return block.body.trim().to_string();
    }
    if let Some(inline) = inline_fence(response) {
        return inline.trim().to_string();
    }
    response.trim().to_string()
}

fn inline_fence(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let end = rest.find("```").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// 解析结构化回复：优先第一个 ```json 块，否则整段回复；只接受 JSON 对象
pub fn parse_document(response: &str) -> Option<Map<String, Value>> {
    let candidate = fenced_blocks(response)
        .into_iter()
        .find(|b| b.lang.eq_ignore_ascii_case("json"))
        .map(|b| b.body)
        .unwrap_or(response);

    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(fields)) => Some(fields),
        Ok(_) => None,
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prefers_tagged_fence() {
        let response = "Here:\n```\nnot this\n```\n```lua\nprint(1)\n```\n";
        assert_eq!(extract_code(response, "lua"), "print(1)");
    }

    #[test]
    fn test_extract_first_untagged_fence() {
        let response = "```\nlocal a = 1\nprint(a)\n```\nand\n```\nprint(2)\n```";
        assert_eq!(extract_code(response, "lua"), "local a = 1\nprint(a)");
    }

    #[test]
    fn test_extract_other_tag_drops_info_line() {
        let response = "```python\nprint(3)\n```";
        assert_eq!(extract_code(response, "lua"), "print(3)");
    }

    #[test]
    fn test_extract_inline_fence() {
        assert_eq!(extract_code("```print(4)```", "lua"), "print(4)");
    }

    #[test]
    fn test_inline_backticks_in_prose_do_not_open_block() {
        let response = "Wrap output in ```text``` style.\n```lua\nprint(1)\n```";
        assert_eq!(extract_code(response, "lua"), "print(1)");
    }

    #[test]
    fn test_indented_fence() {
        let response = "Steps:\n  ```lua\n  print(7)\n  ```\n";
        assert_eq!(extract_code(response, "lua"), "print(7)");
    }

    #[test]
    fn test_extract_raw_response() {
        assert_eq!(extract_code("  print(5)\n", "lua"), "print(5)");
    }

    #[test]
    fn test_extract_unterminated_fence() {
        assert_eq!(extract_code("```lua\nprint(6)\n", "lua"), "print(6)");
    }

    #[test]
    fn test_parse_json_fence() {
        let response = "Plan below\n```json\n{\"approach\": \"x\", \"steps\": [\"a\"]}\n```\nthanks";
        let doc = parse_document(response).unwrap();
        assert_eq!(doc["approach"], "x");
    }

    #[test]
    fn test_parse_bare_json() {
        let doc = parse_document("  {\"summary\": \"ok\"}  ").unwrap();
        assert_eq!(doc["summary"], "ok");
    }

    #[test]
    fn test_parse_rejects_non_object_and_prose() {
        assert!(parse_document("[1, 2, 3]").is_none());
        assert!(parse_document("I would start by reading the input.").is_none());
        assert!(parse_document("```json\n{not json}\n```").is_none());
    }
}
