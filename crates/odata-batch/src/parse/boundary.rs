//! multipart 分段切分。

use crate::error::{BatchParseError, ParseErrorKind, ParseResult};
use crate::types::Line;

/// 按 `boundary` 把行序列切分为若干分段。
///
/// # 教案式说明
/// - **意图（Why）**：外层 batch 与 change set 共享同一套 MIME 分段规则，切分后的各分段互不依赖；
/// - **契约（What）**：
///   - 去除尾部空白后等于 `--boundary` 的行结束当前分段并开启新分段；
///   - 等于 `--boundary--` 的行结束当前分段并终止扫描，其后的行（epilogue）被忽略；
///   - 第一条分隔行之前的 preamble 被丢弃；
///   - 每个分段最后一行去掉一个紧邻分隔行的 CRLF，行号保持不变；
///   - 从未遇到结束分隔行时返回 `batch.missing_close_delimiter`，锚定在输入首行（空输入为 `0`）；
/// - **实现（How）**：单次线性扫描，分隔行只比较文本，不分配临时字符串。
pub fn split_by_boundary(lines: &[Line], boundary: &str) -> ParseResult<Vec<Vec<Line>>> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut current: Vec<Line> = Vec::new();
    let mut seen_delimiter = false;

    for line in lines {
        let trimmed = line.text().trim_end();
        match trimmed.strip_prefix(delimiter.as_str()) {
            Some("") => {
                if seen_delimiter {
                    parts.push(finish_part(current));
                }
                current = Vec::new();
                seen_delimiter = true;
            }
            Some("--") => {
                if seen_delimiter {
                    parts.push(finish_part(current));
                }
                return Ok(parts);
            }
            _ => current.push(line.clone()),
        }
    }

    let anchor = lines.first().map_or(0, Line::number);
    Err(BatchParseError::new(ParseErrorKind::MissingCloseDelimiter, anchor)
        .with_detail(format!("未找到 `{delimiter}--`")))
}

fn finish_part(mut lines: Vec<Line>) -> Vec<Line> {
    if let Some(last) = lines.last_mut() {
        *last = last.without_trailing_crlf();
    }
    lines
}
