//! 顶层入口：串联分词、切分、分类与装配。
//!
//! ## 模块目的（Why）
//! - 调用方只需提供请求体读取器、`Content-Type` 与服务根 URI，即可得到有序的请求组；
//! - 输入流只读取一次并在解析结束（无论成功或失败）时释放。
//!
//! ## 实现策略（How）
//! 1. 从请求 `Content-Type` 提取外层 boundary；
//! 2. [`LineReader`] 一次性读完输入流，产出带行号的行序列；
//! 3. 按外层 boundary 切分，逐段执行 [`BodyPart::parse`] 与
//!    [`BatchRequestTransformer::transform`]，首个违规即终止。
//!
//! ## 风险提示（Trade-offs）
//! - 各分段在切分后互不依赖，理论上可以并行装配；当前保持顺序执行，
//!   使“首个违规”的定义与输入顺序一致。

use std::io::Read;

use tracing::{debug, trace};

use crate::config::BatchParserConfig;
use crate::error::{BatchError, ParseResult};
use crate::line::LineReader;
use crate::media_type::boundary_of;
use crate::parse::{BodyPart, split_by_boundary};
use crate::request::BatchRequestPart;
use crate::transform::BatchRequestTransformer;
use crate::types::Line;

const TARGET: &str = "odata_batch::parser";

/// 单次批处理请求的上下文。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequestContext {
    content_type: String,
    base_uri: String,
    service_resolution_uri: Option<String>,
}

impl BatchRequestContext {
    /// 以请求的 `Content-Type` 与服务根 URI 创建上下文。
    pub fn new(content_type: impl Into<String>, base_uri: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            base_uri: base_uri.into(),
            service_resolution_uri: None,
        }
    }

    /// 附加服务解析 URI，原样透传到每个子请求。
    #[must_use]
    pub fn with_service_resolution_uri(mut self, uri: impl Into<String>) -> Self {
        self.service_resolution_uri = Some(uri.into());
        self
    }

    /// 请求的 `Content-Type`。
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// 服务根 URI（原样）。
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// 服务解析 URI。
    pub fn service_resolution_uri(&self) -> Option<&str> {
        self.service_resolution_uri.as_deref()
    }
}

/// 批处理请求反序列化器。
///
/// # 教案式说明
/// - **意图（Why）**：把 `$batch` 请求体还原为可执行的子请求组，任何结构违规都以带行号的错误终止；
/// - **契约（What）**：
///   - 解析器本身无可变状态，可跨线程共享，对同一输入重复解析得到相同结果；
///   - 格式违规返回 [`BatchError::Parse`]，读取失败返回 [`BatchError::Io`]；
/// - **风险提示（Trade-offs）**：整个请求体会被读入内存，请在传输层限制请求体大小。
#[derive(Debug, Clone, Default)]
pub struct BatchParser {
    config: BatchParserConfig,
}

impl BatchParser {
    /// 以给定配置创建解析器。
    pub fn new(config: BatchParserConfig) -> Self {
        Self { config }
    }

    /// 当前配置。
    pub fn config(&self) -> &BatchParserConfig {
        &self.config
    }

    /// 读取并解析整个批处理请求体。
    ///
    /// `reader` 被消费，函数返回前即被释放。
    pub fn parse<R: Read>(
        &self,
        reader: R,
        context: &BatchRequestContext,
    ) -> Result<Vec<BatchRequestPart>, BatchError> {
        let result = self.parse_inner(reader, context);
        match &result {
            Ok(parts) => debug!(
                target: TARGET,
                parts = parts.len(),
                change_sets = parts.iter().filter(|part| part.is_change_set()).count(),
                "批处理请求解析完成"
            ),
            Err(BatchError::Parse(err)) => debug!(
                target: TARGET,
                code = err.code(),
                line = err.line(),
                error = %err,
                "批处理请求解析失败"
            ),
            Err(err) => debug!(target: TARGET, error = %err, "读取批处理请求体失败"),
        }
        result
    }

    /// [`parse`](Self::parse) 的内存输入便捷版本。
    pub fn parse_bytes(
        &self,
        body: &[u8],
        context: &BatchRequestContext,
    ) -> Result<Vec<BatchRequestPart>, BatchError> {
        self.parse(body, context)
    }

    fn parse_inner<R: Read>(
        &self,
        reader: R,
        context: &BatchRequestContext,
    ) -> Result<Vec<BatchRequestPart>, BatchError> {
        let boundary = boundary_of(context.content_type(), 0)?;
        debug!(
            target: TARGET,
            boundary = %boundary,
            strict = self.config.strict,
            "开始解析批处理请求"
        );

        let lines = LineReader::with_buffer_size(reader, self.config.buffer_size)
            .with_boundary(&boundary)
            .read_all()?;
        let transformer =
            BatchRequestTransformer::new(context.base_uri(), context.service_resolution_uri());

        Ok(self.parse_lines(&lines, &boundary, &transformer)?)
    }

    fn parse_lines(
        &self,
        lines: &[Line],
        boundary: &str,
        transformer: &BatchRequestTransformer,
    ) -> ParseResult<Vec<BatchRequestPart>> {
        split_by_boundary(lines, boundary)?
            .iter()
            .enumerate()
            .map(|(index, group)| {
                let part = BodyPart::parse(group, boundary, self.config.strict)?;
                trace!(
                    target: TARGET,
                    index,
                    change_set = part.is_change_set(),
                    first_line = group.first().map_or(0, Line::number),
                    "解析分段"
                );
                transformer.transform(part)
            })
            .collect()
    }
}
