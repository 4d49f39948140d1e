//! 错误类型模块。
//!
//! ## 模块目的（Why）
//! - 批处理请求的任何结构性违规都会终止整个解析流程，调用方需要据此向客户端返回精确诊断；
//! - 每个错误携带稳定错误码（`batch.<语义>`）与最接近违规位置的 1 基行号，便于程序化处理与排障。
//!
//! ## 使用契约（What）
//! - 解析阶段统一返回 [`BatchParseError`]；
//! - 顶层入口返回 [`BatchError`]，将底层 I/O 失败与格式违规区分为两个独立类别；
//! - 错误码集中定义在 [`codes`] 模块，调用方应匹配码值而非展示文案。
//!
//! ## 风险提示（Trade-offs）
//! - `detail` 字段会复制少量上下文（例如头部名称或原始行文本），换取日志中的可读性；
//!   若上层需要脱敏，请只透传 `code()` 与 `line()`。

use std::io;

use thiserror::Error;

/// 批处理解析错误码集合，遵循 `<领域>.<语义>` 命名约定。
pub mod codes {
    /// Content-Type 中缺失 boundary 参数，或 multipart 中找不到分隔行。
    pub const MISSING_BOUNDARY_DELIMITER: &str = "batch.missing_boundary_delimiter";
    /// boundary 取值不符合 RFC 2046 字符集与长度约束，或 change set 复用了外层 boundary。
    pub const INVALID_BOUNDARY: &str = "batch.invalid_boundary";
    /// 缺少结束分隔行 `--boundary--`。
    pub const MISSING_CLOSE_DELIMITER: &str = "batch.missing_close_delimiter";
    /// 缺少 Content-Type 头。
    pub const MISSING_CONTENT_TYPE: &str = "batch.missing_content_type";
    /// Content-Type 取值非法或与期望类型不兼容。
    pub const INVALID_CONTENT_TYPE: &str = "batch.invalid_content_type";
    /// Content-Transfer-Encoding 不是 `binary`。
    pub const INVALID_CONTENT_TRANSFER_ENCODING: &str = "batch.invalid_content_transfer_encoding";
    /// 严格模式下头部与正文之间缺少空行。
    pub const MISSING_BLANK_LINE: &str = "batch.missing_blank_line";
    /// 请求行不是 `METHOD SP target SP version`。
    pub const INVALID_STATUS_LINE: &str = "batch.invalid_status_line";
    /// 未知的 HTTP 方法。
    pub const INVALID_METHOD: &str = "batch.invalid_method";
    /// HTTP 版本不是 `HTTP/1.1`。
    pub const INVALID_HTTP_VERSION: &str = "batch.invalid_http_version";
    /// 独立查询操作使用了非 `GET` 方法。
    pub const INVALID_QUERY_OPERATION_METHOD: &str = "batch.invalid_query_operation_method";
    /// change set 内使用了非修改类方法。
    pub const INVALID_CHANGESET_METHOD: &str = "batch.invalid_changeset_method";
    /// 请求目标的形态无法识别。
    pub const INVALID_URI: &str = "batch.invalid_uri";
    /// 解析后的请求 URI 不以服务根 URI 开头。
    pub const INVALID_BASE_URI: &str = "batch.invalid_base_uri";
    /// 缺少必需头部（例如绝对路径请求所需的唯一 Host）。
    pub const MISSING_MANDATORY_HEADER: &str = "batch.missing_mandatory_header";
    /// Host 头与服务根 URI 的 authority 不一致或出现多值。
    pub const INVALID_HOST: &str = "batch.invalid_host";
    /// change set 操作既无包装层也无内层 Content-ID。
    pub const MISSING_CONTENT_ID: &str = "batch.missing_content_id";
    /// Content-ID 出现多值。
    pub const INVALID_CONTENT_ID: &str = "batch.invalid_content_id";
    /// 出现了批处理子请求禁止携带的头部。
    pub const FORBIDDEN_HEADER: &str = "batch.forbidden_header";
    /// 正文与请求方法不兼容（例如带正文的 `GET`）。
    pub const INVALID_CONTENT: &str = "batch.invalid_content";
    /// Content-Length 为负数或不是整数。
    pub const INVALID_CONTENT_LENGTH: &str = "batch.invalid_content_length";
}

/// 解析失败的语义类别。
///
/// 每个变体与 [`codes`] 中的一个常量一一对应，`Display` 输出面向排障人员的中文描述。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// 见 [`codes::MISSING_BOUNDARY_DELIMITER`]。
    #[error("缺少 multipart boundary 分隔符")]
    MissingBoundaryDelimiter,
    /// 见 [`codes::INVALID_BOUNDARY`]。
    #[error("boundary 格式非法")]
    InvalidBoundary,
    /// 见 [`codes::MISSING_CLOSE_DELIMITER`]。
    #[error("缺少结束分隔行 `--boundary--`")]
    MissingCloseDelimiter,
    /// 见 [`codes::MISSING_CONTENT_TYPE`]。
    #[error("缺少 Content-Type 头")]
    MissingContentType,
    /// 见 [`codes::INVALID_CONTENT_TYPE`]。
    #[error("Content-Type 非法或与期望类型不兼容")]
    InvalidContentType,
    /// 见 [`codes::INVALID_CONTENT_TRANSFER_ENCODING`]。
    #[error("Content-Transfer-Encoding 必须为 binary")]
    InvalidContentTransferEncoding,
    /// 见 [`codes::MISSING_BLANK_LINE`]。
    #[error("头部之后缺少空行")]
    MissingBlankLine,
    /// 见 [`codes::INVALID_STATUS_LINE`]。
    #[error("请求行格式错误，期望 `METHOD SP target SP HTTP/1.1`")]
    InvalidStatusLine,
    /// 见 [`codes::INVALID_METHOD`]。
    #[error("未知的 HTTP 方法")]
    InvalidMethod,
    /// 见 [`codes::INVALID_HTTP_VERSION`]。
    #[error("仅支持 HTTP/1.1 版本号")]
    InvalidHttpVersion,
    /// 见 [`codes::INVALID_QUERY_OPERATION_METHOD`]。
    #[error("查询操作只允许使用 GET")]
    InvalidQueryOperationMethod,
    /// 见 [`codes::INVALID_CHANGESET_METHOD`]。
    #[error("change set 只允许使用 POST/PUT/PATCH/MERGE/DELETE")]
    InvalidChangeSetMethod,
    /// 见 [`codes::INVALID_URI`]。
    #[error("请求目标 URI 形态非法")]
    InvalidUri,
    /// 见 [`codes::INVALID_BASE_URI`]。
    #[error("请求 URI 与服务根 URI 不匹配")]
    InvalidBaseUri,
    /// 见 [`codes::MISSING_MANDATORY_HEADER`]。
    #[error("缺少必需的头部")]
    MissingMandatoryHeader,
    /// 见 [`codes::INVALID_HOST`]。
    #[error("Host 头与服务根 URI 不一致")]
    InvalidHost,
    /// 见 [`codes::MISSING_CONTENT_ID`]。
    #[error("change set 操作缺少 Content-ID")]
    MissingContentId,
    /// 见 [`codes::INVALID_CONTENT_ID`]。
    #[error("Content-ID 只能出现一个取值")]
    InvalidContentId,
    /// 见 [`codes::FORBIDDEN_HEADER`]。
    #[error("子请求携带了被禁止的头部")]
    ForbiddenHeader,
    /// 见 [`codes::INVALID_CONTENT`]。
    #[error("正文与请求方法不兼容")]
    InvalidContent,
    /// 见 [`codes::INVALID_CONTENT_LENGTH`]。
    #[error("Content-Length 必须是非负整数")]
    InvalidContentLength,
}

impl ParseErrorKind {
    /// 返回稳定错误码。
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingBoundaryDelimiter => codes::MISSING_BOUNDARY_DELIMITER,
            Self::InvalidBoundary => codes::INVALID_BOUNDARY,
            Self::MissingCloseDelimiter => codes::MISSING_CLOSE_DELIMITER,
            Self::MissingContentType => codes::MISSING_CONTENT_TYPE,
            Self::InvalidContentType => codes::INVALID_CONTENT_TYPE,
            Self::InvalidContentTransferEncoding => codes::INVALID_CONTENT_TRANSFER_ENCODING,
            Self::MissingBlankLine => codes::MISSING_BLANK_LINE,
            Self::InvalidStatusLine => codes::INVALID_STATUS_LINE,
            Self::InvalidMethod => codes::INVALID_METHOD,
            Self::InvalidHttpVersion => codes::INVALID_HTTP_VERSION,
            Self::InvalidQueryOperationMethod => codes::INVALID_QUERY_OPERATION_METHOD,
            Self::InvalidChangeSetMethod => codes::INVALID_CHANGESET_METHOD,
            Self::InvalidUri => codes::INVALID_URI,
            Self::InvalidBaseUri => codes::INVALID_BASE_URI,
            Self::MissingMandatoryHeader => codes::MISSING_MANDATORY_HEADER,
            Self::InvalidHost => codes::INVALID_HOST,
            Self::MissingContentId => codes::MISSING_CONTENT_ID,
            Self::InvalidContentId => codes::INVALID_CONTENT_ID,
            Self::ForbiddenHeader => codes::FORBIDDEN_HEADER,
            Self::InvalidContent => codes::INVALID_CONTENT,
            Self::InvalidContentLength => codes::INVALID_CONTENT_LENGTH,
        }
    }
}

/// 批处理格式违规。
///
/// # 教案式说明
/// - **意图（Why）**：把“哪一类违规”与“发生在第几行”绑定在一起，客户端诊断与服务端日志都依赖这两项；
/// - **契约（What）**：
///   - `kind`：违规类别，经 [`code`](Self::code) 暴露稳定错误码；
///   - `line`：1 基行号，输入为空或无法定位时为 `0`；
///   - `detail`：可选上下文，例如出错的头部名称或原始行文本；
/// - **设计权衡（Trade-offs）**：错误只携带拥有所有权的数据，不引用输入缓冲，可安全跨线程传递与记录。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} [{code}] (line {line}){}", detail_suffix(.detail))]
pub struct BatchParseError {
    kind: ParseErrorKind,
    code: &'static str,
    line: usize,
    detail: Option<String>,
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {detail}"),
        None => String::new(),
    }
}

impl BatchParseError {
    /// 构造不带上下文的解析错误。
    pub fn new(kind: ParseErrorKind, line: usize) -> Self {
        Self {
            kind,
            code: kind.code(),
            line,
            detail: None,
        }
    }

    /// 附加可读上下文。
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 违规类别。
    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// 稳定错误码，等价于 `self.kind().code()`。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 最接近违规位置的 1 基行号。
    pub fn line(&self) -> usize {
        self.line
    }

    /// 附加上下文。
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// 顶层入口返回的错误。
///
/// 格式违规与读取失败是两类截然不同的故障：前者应映射为 `400 Bad Request`，
/// 后者通常意味着连接中断或调用方主动关闭了输入流。
#[derive(Debug, Error)]
pub enum BatchError {
    /// 批处理报文结构违规。
    #[error(transparent)]
    Parse(#[from] BatchParseError),
    /// 底层输入流读取失败。
    #[error("读取批处理请求体失败: {0}")]
    Io(#[from] io::Error),
}

impl BatchError {
    /// 若为格式违规，返回对应的解析错误。
    pub fn as_parse_error(&self) -> Option<&BatchParseError> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Io(_) => None,
        }
    }
}

/// 解析阶段统一的返回类型。
pub type ParseResult<T> = Result<T, BatchParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_code_line_and_detail() {
        let err = BatchParseError::new(ParseErrorKind::ForbiddenHeader, 7).with_detail("Authorization");
        let rendered = err.to_string();
        assert!(rendered.contains(codes::FORBIDDEN_HEADER), "{rendered}");
        assert!(rendered.contains("line 7"), "{rendered}");
        assert!(rendered.ends_with(": Authorization"), "{rendered}");
        assert_eq!(err.code(), err.kind().code());
    }

    #[test]
    fn io_errors_are_a_separate_category() {
        let err = BatchError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "closed"));
        assert!(err.as_parse_error().is_none());
        let err = BatchError::from(BatchParseError::new(ParseErrorKind::InvalidUri, 3));
        assert_eq!(err.as_parse_error().map(BatchParseError::line), Some(3));
    }
}
