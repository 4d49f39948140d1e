#![warn(missing_docs)]

//! # odata-batch
//!
//! ## 教案目的（Why）
//! - **定位**：该 crate 负责 OData `$batch` 请求体的反序列化，把一个 `multipart/mixed` HTTP
//!   请求体还原为有序的子请求组，是 OData 服务端分发批处理请求前的第一道关卡。
//! - **架构角色**：向上为分发器提供方法、原始 URI 组成部分、头部与正文字节；
//!   向下只依赖一个字节读取器，不关心传输层实现。
//! - **边界**：不校验 OData 语义（实体集是否存在等），不执行子请求，也不生成批处理响应。
//!
//! ## 交互契约（What）
//! - **输入**：请求体读取器、请求 `Content-Type`（`multipart/mixed; boundary=...`）、服务根 URI，
//!   以及可选的服务解析 URI；
//! - **输出**：`Vec<BatchRequestPart>`，每个顶层分段对应一项，change set 标记为原子执行；
//! - **失败**：首个违规即终止，错误携带稳定错误码（见 [`error::codes`]）与 1 基行号。
//!
//! ## 实现策略（How）
//! - **模块划分**（数据严格自上而下流动）：
//!   1. `line`：行分词器，保留行终止符并跟踪正文字符集；
//!   2. `parse`：boundary 切分、头部解析、分段分类与请求行解析；
//!   3. `transform`：横切规则校验并装配 [`BatchRequest`]；
//!   4. `parser`：顶层编排入口 [`BatchParser`]；
//!   5. `types` / `media_type` / `charset`：共享数据模型与辅助解析；
//!   6. `config` / `error`：配置与错误模型。
//! - **关键技巧**：头部解析使用只读切片加游标，任何阶段都不修改上游产物；
//!   change set 与单个操作以枚举区分，下游通过模式匹配处理。
//!
//! ## 风险提示（Trade-offs）
//! - 请求体整体读入内存后再解析，换取简单的前向多阶段流水线；请求体大小应由传输层限制。
//! - 头部取值按逗号无条件拆分，与主流实现兼容，但会拆开引号内的逗号。
//!
//! ## 使用示例
//! ```
//! use odata_batch::{BatchParser, BatchRequestContext};
//!
//! let body = "--b1\r\n\
//!     Content-Type: application/http\r\n\
//!     \r\n\
//!     GET People HTTP/1.1\r\n\
//!     \r\n\
//!     \r\n\
//!     --b1--\r\n";
//! let context = BatchRequestContext::new(
//!     "multipart/mixed; boundary=b1",
//!     "http://odata.example.org/svc",
//! );
//! let parts = BatchParser::default().parse_bytes(body.as_bytes(), &context)?;
//! assert_eq!(parts.len(), 1);
//! assert_eq!(
//!     parts[0].requests()[0].uri().raw_request_uri(),
//!     "http://odata.example.org/svc/People"
//! );
//! # Ok::<(), odata_batch::BatchError>(())
//! ```

pub mod charset;
pub mod config;
pub mod error;
pub mod line;
pub mod media_type;
pub mod parse;
pub mod parser;
pub mod request;
pub mod transform;
pub mod types;

pub use crate::config::{BatchParserConfig, ConfigError};
pub use crate::error::{BatchError, BatchParseError, ParseErrorKind, ParseResult};
pub use crate::parser::{BatchParser, BatchRequestContext};
pub use crate::request::{BatchRequest, BatchRequestPart};
pub use crate::types::{HeaderField, Headers, Line, Method};
