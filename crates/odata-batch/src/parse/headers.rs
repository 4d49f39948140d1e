//! 头部块解析逻辑。
//!
//! ## 模块目标（Why）
//! - 分段头部、change set 包装头部与 HTTP 请求头部共用同一套 `Name: value` 语法；
//! - 头部块之后必须紧跟一个空行，严格模式下缺失即失败，宽松模式下静默容忍。
//!
//! ## 设计思路（How）
//! 1. 以游标 `pos` 遍历只读行切片，匹配成功的行被“消费”（游标前移），首个不匹配的行终止扫描；
//! 2. 取值按 `,` 无条件拆分并去除首尾空白，与主流 OData 服务端的兼容行为保持一致；
//! 3. 同名头部多次出现时按顺序合并取值。
//!
//! ## 风险提示（Trade-offs）
//! - 逗号拆分不识别引号，`Content-Type` 参数中的字面逗号会被拆开；
//!   保持该行为以兼容既有客户端，调用方如需原文可从行序列中自行读取。

use crate::error::{BatchParseError, ParseErrorKind, ParseResult};
use crate::types::{Headers, Line};

/// 从 `pos` 开始消费连续的头部行。
///
/// 返回的集合以 `lines[pos]`（进入时）的行号作为锚点；输入已耗尽时锚点为 `0`。
pub fn parse_headers(lines: &[Line], pos: &mut usize) -> Headers {
    let anchor = lines.get(*pos).map_or(0, Line::number);
    let mut headers = Headers::new(anchor);

    while let Some(line) = lines.get(*pos) {
        let Some((name, value)) = split_header_line(line.content()) else {
            break;
        };
        headers.add(name, split_values(value), line.number());
        *pos += 1;
    }

    headers
}

/// 消费头部块之后的空行。
///
/// - 严格模式：下一行必须只含空白且带有行终止符，否则返回 `batch.missing_blank_line`，
///   锚定在下一行（无剩余行时为 `0`）；
/// - 宽松模式：下一行为空白时消费，否则保持游标不变。
pub fn consume_blank_line(lines: &[Line], pos: &mut usize, strict: bool) -> ParseResult<()> {
    let next = lines.get(*pos);
    let is_separator = next.is_some_and(|line| {
        if strict {
            line.is_blank() && line.has_line_break()
        } else {
            line.is_blank()
        }
    });

    if is_separator {
        *pos += 1;
        Ok(())
    } else if strict {
        Err(BatchParseError::new(
            ParseErrorKind::MissingBlankLine,
            next.map_or(0, Line::number),
        ))
    } else {
        Ok(())
    }
}

fn split_header_line(content: &str) -> Option<(&str, &str)> {
    let (name, value) = content.split_once(':')?;
    let valid_name =
        !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
    valid_name.then(|| (name, value.trim()))
}

fn split_values(value: &str) -> Vec<String> {
    if value.is_empty() {
        return vec![String::new()];
    }
    let mut pieces: Vec<&str> = value.split(',').collect();
    while pieces.last().is_some_and(|piece| piece.is_empty()) {
        pieces.pop();
    }
    pieces
        .into_iter()
        .map(|piece| piece.trim().to_owned())
        .collect()
}
