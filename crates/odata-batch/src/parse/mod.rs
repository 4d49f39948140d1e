//! 解析模块入口。
//!
//! ## 模块目标（Why）
//! - 把分词器产出的行序列还原为结构化的分段与子请求，是批处理流水线的第 2–5 阶段；
//! - 所有阶段都以 `&[Line]` 加游标的方式前向消费输入，不修改任何已构造的数据。
//!
//! ## 结构概览（What）
//! - `boundary`：按 boundary 切分行序列并校验结束分隔行；
//! - `headers`：解析 `Name: value` 头部块与其后的空行；
//! - `part`：区分单个查询操作与 change set，递归切分嵌套 multipart；
//! - `request_line`：解析请求行并依据服务根 URI 解析请求目标。
//!
//! ## 风险提示（Trade-offs）
//! - 行序列整体驻留内存，适合常规规模的批处理请求；超大请求应在传输层限制请求体大小。

mod boundary;
mod headers;
mod part;
mod request_line;

pub use boundary::split_by_boundary;
pub use headers::{consume_blank_line, parse_headers};
pub use part::{BodyContent, BodyPart, ChangeSetOperation, QueryOperation};
pub use request_line::{RequestStatusLine, RequestUri};

pub(crate) use request_line::authority_of;

use crate::types::Headers;

/// 具备头部集合与严格模式标记的批处理片段。
///
/// 顶层分段、查询操作以及 change set 包装层都实现该能力，
/// 使头部校验逻辑可以不关心片段的具体形态。
pub trait BatchPart {
    /// 片段自身的头部集合。
    fn headers(&self) -> &Headers;

    /// 是否以严格模式解析。
    fn is_strict(&self) -> bool;
}
