//! 分段分类：单个查询操作或嵌套 change set。
//!
//! ## 模块目标（Why）
//! - 顶层分段的 `Content-Type` 决定其形态：`multipart/mixed` 表示 change set，需要以内层
//!   boundary 再次切分；其余情况视为一个独立的查询操作；
//! - 以 [`BodyContent`] 显式区分两种形态，下游代码通过模式匹配处理，不依赖运行时类型判断。
//!
//! ## 契约（What）
//! - 本模块只负责结构还原，`Content-Type` 兼容性、`Content-ID`、禁止头部等语义规则由
//!   [`crate::transform`] 统一校验；
//! - 例外：缺少 `Content-Type`、内层 boundary 非法或与外层相同，会在此直接失败，
//!   因为它们决定了能否继续切分。

use tracing::trace;

use super::BatchPart;
use super::boundary::split_by_boundary;
use super::headers::{consume_blank_line, parse_headers};
use crate::error::{BatchParseError, ParseErrorKind, ParseResult};
use crate::media_type::{boundary_of, is_multipart_mixed};
use crate::types::{Headers, Line};

const CONTENT_TYPE: &str = "Content-Type";

/// 顶层分段的内容形态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyContent {
    /// 独立查询操作。
    Single(QueryOperation),
    /// 原子执行的 change set，按出现顺序保存各操作。
    ChangeSet(Vec<ChangeSetOperation>),
}

/// 顶层 multipart 分段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    boundary: String,
    strict: bool,
    headers: Headers,
    content: BodyContent,
}

impl BodyPart {
    /// 解析外层 boundary 切分出的一个分段。
    ///
    /// # 教案式说明
    /// - **前置条件**：`lines` 已去掉首尾分隔行，`boundary` 为外层 batch boundary；
    /// - **流程（How）**：
    ///   1. 解析分段头部并消费空行；
    ///   2. 读取 `Content-Type`，缺失时以头部块行号报告 `batch.missing_content_type`；
    ///   3. 任一取值为 `multipart/mixed` 时，以第一个取值提取内层 boundary，
    ///      与外层相同则在该头部行报告 `batch.invalid_boundary`；
    ///   4. change set 再次切分并逐一解析包装层，否则把剩余行作为单个查询操作。
    pub fn parse(lines: &[Line], boundary: &str, strict: bool) -> ParseResult<Self> {
        let mut pos = 0;
        let headers = parse_headers(lines, &mut pos);
        consume_blank_line(lines, &mut pos, strict)?;

        let content_type = headers
            .field(CONTENT_TYPE)
            .ok_or_else(|| BatchParseError::new(ParseErrorKind::MissingContentType, headers.line()))?;

        let content = if content_type.values().iter().any(|value| is_multipart_mixed(value)) {
            let first = content_type.first().unwrap_or_default();
            let inner = boundary_of(first, content_type.line())?;
            if inner == boundary {
                return Err(
                    BatchParseError::new(ParseErrorKind::InvalidBoundary, content_type.line())
                        .with_detail("change set boundary 与 batch boundary 相同"),
                );
            }

            let groups = split_by_boundary(&lines[pos..], &inner)?;
            trace!(
                target: "odata_batch::parse",
                boundary = %inner,
                operations = groups.len(),
                "解析 change set"
            );
            let operations = groups
                .iter()
                .map(|group| ChangeSetOperation::parse(group, strict))
                .collect::<ParseResult<Vec<_>>>()?;
            BodyContent::ChangeSet(operations)
        } else {
            BodyContent::Single(QueryOperation::parse(&lines[pos..], strict)?)
        };

        Ok(Self {
            boundary: boundary.to_owned(),
            strict,
            headers,
            content,
        })
    }

    /// 外层 batch boundary。
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// 是否为 change set。
    pub fn is_change_set(&self) -> bool {
        matches!(self.content, BodyContent::ChangeSet(_))
    }

    /// 分段内容。
    pub fn content(&self) -> &BodyContent {
        &self.content
    }

    /// 拆解为头部与内容。
    pub fn into_parts(self) -> (Headers, BodyContent) {
        (self.headers, self.content)
    }
}

impl BatchPart for BodyPart {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn is_strict(&self) -> bool {
        self.strict
    }
}

/// 一个 HTTP 请求形态的操作：请求行、头部与正文行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOperation {
    status_line: Line,
    headers: Headers,
    body: Vec<Line>,
    strict: bool,
}

impl QueryOperation {
    /// 解析操作：首行即请求行，其后为头部、空行与正文。
    ///
    /// 首行缺失或为空行时返回 `batch.invalid_status_line`，锚定在该行（无行时为 `0`）。
    pub fn parse(lines: &[Line], strict: bool) -> ParseResult<Self> {
        let status_line = match lines.first() {
            Some(line) if !line.is_blank() => line.clone(),
            other => {
                return Err(BatchParseError::new(
                    ParseErrorKind::InvalidStatusLine,
                    other.map_or(0, Line::number),
                )
                .with_detail("缺少请求行"));
            }
        };

        let mut pos = 1;
        let headers = parse_headers(lines, &mut pos);
        consume_blank_line(lines, &mut pos, strict)?;

        Ok(Self {
            status_line,
            headers,
            body: lines[pos..].to_vec(),
            strict,
        })
    }

    /// 请求行原文。
    pub fn status_line(&self) -> &Line {
        &self.status_line
    }

    /// 正文行。
    pub fn body(&self) -> &[Line] {
        &self.body
    }

    /// 解码后正文文本的字节数。
    pub fn body_size(&self) -> usize {
        self.body.iter().map(|line| line.text().len()).sum()
    }

    /// 可变头部，供 `Content-ID` 继承时替换字段。
    pub(crate) fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// 拆解为请求行、头部与正文。
    pub fn into_parts(self) -> (Line, Headers, Vec<Line>) {
        (self.status_line, self.headers, self.body)
    }
}

impl BatchPart for QueryOperation {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn is_strict(&self) -> bool {
        self.strict
    }
}

/// change set 内的包装层：自身 MIME 头部加一个内层查询操作。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetOperation {
    headers: Headers,
    operation: QueryOperation,
    strict: bool,
}

impl ChangeSetOperation {
    /// 解析内层 boundary 切分出的一个分组。
    pub fn parse(lines: &[Line], strict: bool) -> ParseResult<Self> {
        let mut pos = 0;
        let headers = parse_headers(lines, &mut pos);
        consume_blank_line(lines, &mut pos, strict)?;
        let operation = QueryOperation::parse(&lines[pos..], strict)?;
        Ok(Self {
            headers,
            operation,
            strict,
        })
    }

    /// 内层查询操作。
    pub fn operation(&self) -> &QueryOperation {
        &self.operation
    }

    /// 拆解为包装层头部与内层操作。
    pub fn into_parts(self) -> (Headers, QueryOperation) {
        (self.headers, self.operation)
    }
}

impl BatchPart for ChangeSetOperation {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn is_strict(&self) -> bool {
        self.strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(texts: &[&str]) -> Vec<Line> {
        texts
            .iter()
            .enumerate()
            .map(|(idx, text)| Line::new(*text, idx + 2))
            .collect()
    }

    #[test]
    fn single_operation_keeps_status_headers_and_body() {
        let lines = numbered(&[
            "Content-Type: application/http\r\n",
            "Content-Transfer-Encoding: binary\r\n",
            "\r\n",
            "GET People HTTP/1.1\r\n",
            "Accept: application/json\r\n",
            "\r\n",
            "",
        ]);
        let part = BodyPart::parse(&lines, "b1", true).expect("应解析成功");
        assert!(!part.is_change_set());
        assert_eq!(part.headers().values("content-transfer-encoding"), ["binary"]);

        let BodyContent::Single(operation) = part.content() else {
            panic!("期望单个查询操作");
        };
        assert_eq!(operation.status_line().number(), 5);
        assert_eq!(operation.headers().values("accept"), ["application/json"]);
        assert_eq!(operation.body().len(), 1);
        assert_eq!(operation.body_size(), 0);
    }

    #[test]
    fn change_set_is_split_by_inner_boundary() {
        let lines = numbered(&[
            "Content-Type: multipart/mixed; boundary=cs\r\n",
            "\r\n",
            "--cs\r\n",
            "Content-Type: application/http\r\n",
            "Content-ID: 1\r\n",
            "\r\n",
            "POST People HTTP/1.1\r\n",
            "\r\n",
            "{}\r\n",
            "--cs\r\n",
            "Content-Type: application/http\r\n",
            "\r\n",
            "DELETE People(1) HTTP/1.1\r\n",
            "\r\n",
            "\r\n",
            "--cs--\r\n",
            "",
        ]);
        let part = BodyPart::parse(&lines, "b1", true).unwrap();
        assert!(part.is_change_set());
        let BodyContent::ChangeSet(operations) = part.content() else {
            panic!("期望 change set");
        };
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[0].headers().values("Content-ID"), ["1"]);
        assert_eq!(operations[0].operation().body()[0].text(), "{}");
        assert_eq!(operations[0].operation().body_size(), 2);
        assert_eq!(operations[1].operation().status_line().number(), 14);
    }

    #[test]
    fn change_set_boundary_must_differ_from_outer() {
        let lines = numbered(&[
            "X-Trace: 1\r\n",
            "Content-Type: multipart/mixed; boundary=b1\r\n",
            "\r\n",
            "--b1--\r\n",
        ]);
        let err = BodyPart::parse(&lines, "b1", true).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidBoundary);
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn missing_content_type_is_anchored_at_header_block() {
        let lines = numbered(&["X-Trace: 1\r\n", "\r\n", "GET People HTTP/1.1\r\n", "\r\n"]);
        let err = BodyPart::parse(&lines, "b1", true).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::MissingContentType);
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn operation_without_status_line_fails() {
        let lines = numbered(&["\r\n", "  \r\n"]);
        let err = QueryOperation::parse(&lines, true).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidStatusLine);
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn status_line_must_follow_the_separator_directly() {
        let lines = numbered(&[
            "Content-Type: application/http\r\n",
            "\r\n",
            "\r\n",
            "GET People HTTP/1.1\r\n",
            "\r\n",
        ]);
        let err = BodyPart::parse(&lines, "b1", true).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidStatusLine);
        assert_eq!(err.code(), crate::error::codes::INVALID_STATUS_LINE);
        assert_eq!(err.line(), 4);

        let err = QueryOperation::parse(&[], true).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidStatusLine);
        assert_eq!(err.line(), 0);
    }

    #[test]
    fn lenient_mode_accepts_missing_separator() {
        let lines = numbered(&["GET People HTTP/1.1\r\n", "Accept: */*"]);
        assert!(QueryOperation::parse(&lines, true).is_err());
        let operation = QueryOperation::parse(&lines, false).unwrap();
        assert!(operation.body().is_empty());
        assert!(!operation.is_strict());
    }
}
