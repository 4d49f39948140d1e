//! 媒体类型（`Content-Type`）解析。
//!
//! ## 模块目的（Why）
//! - 批处理流水线在多个位置需要读取 `type/subtype` 与参数：判定 change set、提取 boundary、
//!   跟踪正文字符集、校验分段类型；
//! - 为保持零依赖的解析路径，这里只实现 RFC 7231 §3.1.1.1 中批处理用得到的子集。
//!
//! ## 契约（What）
//! - [`ContentType::parse`] 接受 `type/subtype *( ";" name "=" value )`，参数名大小写不敏感，
//!   参数值保留原文（包括引号），由调用方决定是否去引号；
//! - [`boundary_of`] 按 multipart boundary 规则校验并返回去引号后的 token。

use crate::error::{BatchParseError, ParseErrorKind, ParseResult};

/// `multipart/mixed`。
pub const MULTIPART_MIXED: &str = "multipart/mixed";
/// `application/http`。
pub const APPLICATION_HTTP: &str = "application/http";

const BOUNDARY_PARAMETER: &str = "boundary";
const CHARSET_PARAMETER: &str = "charset";
const MAX_BOUNDARY_LEN: usize = 70;

/// 解析后的媒体类型。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    kind: String,
    subtype: String,
    parameters: Vec<(String, String)>,
}

impl ContentType {
    /// 解析媒体类型文本；缺少 `/` 或 type/subtype 为空时返回 `None`。
    pub fn parse(text: &str) -> Option<Self> {
        let mut segments = text.split(';');
        let essence = segments.next()?.trim();
        let (kind, subtype) = essence.split_once('/')?;
        let (kind, subtype) = (kind.trim(), subtype.trim());
        if !is_token(kind) || !is_token(subtype) {
            return None;
        }

        let mut parameters = Vec::new();
        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (name, value) = segment.split_once('=')?;
            let name = name.trim();
            if !is_token(name) {
                return None;
            }
            parameters.push((name.to_ascii_lowercase(), value.trim().to_owned()));
        }

        Some(Self {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parameters,
        })
    }

    /// 主类型（小写）。
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// 子类型（小写）。
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// 参数原文；名称大小写不敏感。
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// 类型与子类型是否与 `essence`（形如 `application/http`）一致，忽略参数。
    pub fn is_compatible(&self, essence: &str) -> bool {
        match essence.split_once('/') {
            Some((kind, subtype)) => {
                self.kind.eq_ignore_ascii_case(kind) && self.subtype.eq_ignore_ascii_case(subtype)
            }
            None => false,
        }
    }

    /// 是否为 JSON 或任意 XML 家族类型，这两类正文未声明 charset 时默认 UTF-8。
    pub fn defaults_to_utf8(&self) -> bool {
        self.is_compatible("application/json") || self.subtype.contains("xml")
    }
}

/// 头部取值是否以 `multipart/mixed` 开头（大小写不敏感）。
pub fn is_multipart_mixed(value: &str) -> bool {
    let value = value.trim_start();
    value
        .get(..MULTIPART_MIXED.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MULTIPART_MIXED))
}

/// 从 `multipart/mixed` 类型中提取并校验 boundary。
///
/// # 教案式说明
/// - **意图（Why）**：外层 batch 与每个 change set 都以此确定分隔符，两处共享同一套校验；
/// - **契约（What）**：
///   - 类型无法解析或不是 `multipart/mixed` → `batch.invalid_content_type`；
///   - 缺少 `boundary` 参数 → `batch.missing_boundary_delimiter`；
///   - 取值不满足字符集/长度约束 → `batch.invalid_boundary`；
///   - 成功时返回去掉引号后的 boundary；`line` 作为所有错误的诊断锚点。
pub fn boundary_of(content_type: &str, line: usize) -> ParseResult<String> {
    let parsed = ContentType::parse(content_type)
        .filter(|parsed| parsed.is_compatible(MULTIPART_MIXED))
        .ok_or_else(|| {
            BatchParseError::new(ParseErrorKind::InvalidContentType, line)
                .with_detail(format!("期望 {MULTIPART_MIXED}，实际为 `{content_type}`"))
        })?;

    let raw = parsed
        .parameter(BOUNDARY_PARAMETER)
        .ok_or_else(|| BatchParseError::new(ParseErrorKind::MissingBoundaryDelimiter, line))?
        .trim();

    if let Some(quoted) = raw.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        if is_quoted_boundary(quoted) {
            return Ok(quoted.to_owned());
        }
    } else if is_plain_boundary(raw) {
        return Ok(raw.to_owned());
    }

    Err(BatchParseError::new(ParseErrorKind::InvalidBoundary, line).with_detail(raw.to_owned()))
}

/// 取值的 `charset` 参数。
pub fn charset_parameter(content_type: &str) -> Option<String> {
    ContentType::parse(content_type)?
        .parameter(CHARSET_PARAMETER)
        .map(|value| value.trim_matches('"').to_owned())
}

fn is_token(text: &str) -> bool {
    !text.is_empty()
        && text.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$&-^_.+%*'`|~".contains(&b)
        })
}

fn is_plain_boundary_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'\'' | b'+')
}

fn is_plain_boundary(text: &str) -> bool {
    (1..=MAX_BOUNDARY_LEN).contains(&text.len()) && text.bytes().all(is_plain_boundary_char)
}

fn is_quoted_boundary(text: &str) -> bool {
    let is_extended =
        |b: u8| is_plain_boundary_char(b) || matches!(b, b'(' | b')' | b',' | b'/' | b':' | b'=' | b'?');
    let bytes = text.as_bytes();
    match bytes.split_last() {
        Some((&last, rest)) => {
            bytes.len() <= MAX_BOUNDARY_LEN
                && is_extended(last)
                && rest
                    .iter()
                    .all(|&b| is_extended(b) || b.is_ascii_whitespace())
        }
        None => false,
    }
}
