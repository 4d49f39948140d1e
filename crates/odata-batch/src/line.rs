//! 行分词器：把原始字节流切分为带行号的 [`Line`] 序列。
//!
//! ## 模块目的（Why）
//! - 边界行匹配与正文字节计数都依赖精确的行终止符，因此每一行都保留 `\n`、`\r` 或 `\r\n`；
//! - 同一输入流中头部与正文的编码不同：头部永远按 ISO-8859-1 解码，正文按最近一次
//!   `Content-Type` 声明的字符集解码。
//!
//! ## 实现策略（How）
//! 1. 以固定大小的缓冲区从 [`Read`] 中按需填充，逐字节查找行终止符；
//! 2. 缓冲区末尾恰好是 `\r` 时先补充一次缓冲，再窥视一个字节决定是否连带消费 `\n`；
//! 3. 使用 [`ReadState`] 记录“自上一条边界行以来遇到的空行数”，达到两次即进入正文模式；
//! 4. 每解码一行就检查它是否为 `Content-Type` 头或边界行，并更新字符集与状态。
//!
//! ## 契约（What）
//! - [`LineReader`] 实现 `Iterator<Item = io::Result<Line>>`，只能前向遍历一次；
//! - 流结束时干净地返回 `None`，I/O 失败原样向上传播；
//! - 分词器从不校验格式，未知字符集只记录告警并沿用当前字符集。

use std::io::{self, ErrorKind, Read};

use tracing::warn;

use crate::charset::Charset;
use crate::media_type::ContentType;
use crate::types::Line;

/// 默认读缓冲大小。
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const CONTENT_TYPE_PREFIX: &str = "content-type:";
const BOUNDARY_PARAMETER: &str = "boundary";

/// 头部/正文模式的两态计数器。
///
/// 分段头部之后的空行计一次，HTTP 请求头之后的空行再计一次，此后即进入正文；
/// 遇到边界行时归零，下一分段重新从头部模式开始。
#[derive(Debug, Default, Clone, Copy)]
struct ReadState {
    blank_lines: u8,
}

impl ReadState {
    fn found_line_break(&mut self) {
        self.blank_lines = self.blank_lines.saturating_add(1);
    }

    fn found_boundary(&mut self) {
        self.blank_lines = 0;
    }

    fn is_read_body(self) -> bool {
        self.blank_lines >= 2
    }
}

/// 基于缓冲区的单遍行读取器。
pub struct LineReader<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
    limit: usize,
    eof: bool,
    line_number: usize,
    state: ReadState,
    header_charset: Charset,
    body_charset: Charset,
    boundaries: Vec<String>,
}

impl<R: Read> LineReader<R> {
    /// 以默认缓冲大小创建读取器。
    pub fn new(inner: R) -> Self {
        Self::with_buffer_size(inner, DEFAULT_BUFFER_SIZE)
    }

    /// 以指定缓冲大小创建读取器；`0` 会被提升为 `1`。
    pub fn with_buffer_size(inner: R, buffer_size: usize) -> Self {
        Self {
            inner,
            buffer: vec![0; buffer_size.max(1)],
            pos: 0,
            limit: 0,
            eof: false,
            line_number: 0,
            state: ReadState::default(),
            header_charset: Charset::latin1(),
            body_charset: Charset::latin1(),
            boundaries: Vec::new(),
        }
    }

    /// 预先登记外层 boundary，使第一条分隔行即可重置头部模式。
    #[must_use]
    pub fn with_boundary(mut self, boundary: &str) -> Self {
        self.register_boundary(boundary);
        self
    }

    /// 当前正文字符集。
    pub fn body_charset(&self) -> Charset {
        self.body_charset
    }

    /// 读取剩余全部行。
    pub fn read_all(self) -> io::Result<Vec<Line>> {
        self.collect()
    }

    fn fill_buffer(&mut self) -> io::Result<()> {
        if self.eof {
            return Ok(());
        }
        loop {
            match self.inner.read(&mut self.buffer) {
                Ok(0) => {
                    self.eof = true;
                    self.pos = 0;
                    self.limit = 0;
                    return Ok(());
                }
                Ok(read) => {
                    self.pos = 0;
                    self.limit = read;
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn read_raw_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut raw = Vec::new();
        loop {
            if self.pos == self.limit {
                self.fill_buffer()?;
                if self.eof {
                    break;
                }
            }

            let available = &self.buffer[self.pos..self.limit];
            match available.iter().position(|&b| b == LF || b == CR) {
                Some(idx) => {
                    let terminator = available[idx];
                    raw.extend_from_slice(&available[..=idx]);
                    self.pos += idx + 1;
                    if terminator == CR {
                        if self.pos == self.limit {
                            self.fill_buffer()?;
                        }
                        if !self.eof && self.buffer[self.pos] == LF {
                            raw.push(LF);
                            self.pos += 1;
                        }
                    }
                    return Ok(Some(raw));
                }
                None => {
                    raw.extend_from_slice(available);
                    self.pos = self.limit;
                }
            }
        }

        Ok((!raw.is_empty()).then_some(raw))
    }

    fn decode(&self, raw: &[u8]) -> String {
        if self.state.is_read_body() {
            self.body_charset.decode(raw)
        } else {
            self.header_charset.decode(raw)
        }
    }

    fn update_state(&mut self, text: &str) {
        let content = text.trim_end_matches(['\r', '\n']);
        if content
            .get(..CONTENT_TYPE_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(CONTENT_TYPE_PREFIX))
        {
            self.track_content_type(content[CONTENT_TYPE_PREFIX.len()..].trim());
        } else if content.is_empty() && !text.is_empty() {
            self.state.found_line_break();
        } else if self.is_boundary(content) {
            self.state.found_boundary();
        }
    }

    fn track_content_type(&mut self, value: &str) {
        let Some(content_type) = ContentType::parse(value) else {
            return;
        };

        self.body_charset = match content_type.parameter("charset") {
            Some(label) => match Charset::for_label(label) {
                Some(charset) => charset,
                None => {
                    warn!(
                        target: "odata_batch::line",
                        line = self.line_number,
                        charset = label,
                        "未知字符集，沿用当前正文字符集"
                    );
                    self.body_charset
                }
            },
            None if content_type.defaults_to_utf8() => Charset::utf8(),
            None => Charset::latin1(),
        };

        if let Some(boundary) = content_type.parameter(BOUNDARY_PARAMETER) {
            let boundary = boundary.trim().trim_matches('"').to_owned();
            self.register_boundary(&boundary);
        }
    }

    fn register_boundary(&mut self, boundary: &str) {
        let delimiter = format!("--{boundary}");
        if !self.boundaries.contains(&delimiter) {
            self.boundaries.push(delimiter);
        }
    }

    fn is_boundary(&self, content: &str) -> bool {
        self.boundaries.iter().any(|delimiter| {
            content
                .strip_prefix(delimiter.as_str())
                .is_some_and(|rest| rest.is_empty() || rest == "--")
        })
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = io::Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.read_raw_line() {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => return Some(Err(err)),
        };
        self.line_number += 1;
        let text = self.decode(&raw);
        self.update_state(&text);
        Some(Ok(Line::new(text, self.line_number)))
    }
}
