//! 基础类型定义模块。
//!
//! ## 模块目标（Why）
//! - 为流水线各阶段提供统一的数据模型：行记录、HTTP 方法与大小写不敏感的多值头部集合；
//! - 行号是全部诊断信息的唯一来源，因此 [`Line`] 在切分、裁剪后都必须原样保留行号。
//!
//! ## 结构概览（What）
//! - [`Line`]：解码后的行文本（含行终止符）与 1 基行号；
//! - [`Method`]：批处理子请求允许出现的 HTTP 方法；
//! - [`HeaderField`] / [`Headers`]：保持出现顺序的多值头部及其集合。
//!
//! ## 风险与扩展（Trade-offs）
//! - `Headers` 以 `Vec` 线性查找实现，子请求头部通常只有个位数，避免引入哈希表的额外开销；
//!   若未来需要承载上百个头部，可替换为有序映射而不改变对外 API。

use core::fmt;
use std::str::FromStr;

/// 输入流中的一行。
///
/// 文本包含原始行终止符（`\n`、`\r` 或 `\r\n`），边界匹配与正文字节计数都依赖它。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Line {
    text: String,
    number: usize,
}

impl Line {
    /// 以文本与 1 基行号构造一行。
    pub fn new(text: impl Into<String>, number: usize) -> Self {
        Self {
            text: text.into(),
            number,
        }
    }

    /// 完整文本，包含行终止符。
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 1 基行号。
    pub fn number(&self) -> usize {
        self.number
    }

    /// 去掉行终止符后的内容。
    pub fn content(&self) -> &str {
        self.text.trim_end_matches(['\r', '\n'])
    }

    /// 是否以行终止符结尾。
    pub fn has_line_break(&self) -> bool {
        self.text.ends_with(['\r', '\n'])
    }

    /// 是否只包含空白字符（空串也算）。
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// 去除行尾单个 CRLF（以及其后的空格），保留行号。
    ///
    /// 行尾若不是 CRLF（例如裸 LF），返回原行的副本。
    #[must_use]
    pub fn without_trailing_crlf(&self) -> Self {
        let trimmed = self.text.trim_end_matches(' ');
        match trimmed.strip_suffix("\r\n") {
            Some(rest) => Self::new(rest, self.number),
            None => self.clone(),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// 批处理子请求可使用的 HTTP 方法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `MERGE`，OData v2/v3 客户端仍在使用的局部更新方法。
    Merge,
    /// `DELETE`
    Delete,
}

impl Method {
    /// 方法的规范文本。
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Merge => "MERGE",
            Self::Delete => "DELETE",
        }
    }

    /// 是否允许出现在 change set 内。
    pub const fn is_change_set_method(self) -> bool {
        matches!(
            self,
            Self::Post | Self::Put | Self::Patch | Self::Merge | Self::Delete
        )
    }
}

/// 无法识别的方法 token。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod;

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "MERGE" => Ok(Self::Merge),
            "DELETE" => Ok(Self::Delete),
            _ => Err(UnknownMethod),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个头部字段。
///
/// # 教案式说明
/// - **意图（Why）**：同名头部可能多次出现或以逗号分隔多个取值，需要按出现顺序累积；
/// - **契约（What）**：`name` 保留首次出现时的大小写；`values` 按出现顺序排列且不重复；
///   `line` 为首次出现的行号，用作该头部相关错误的诊断锚点；
/// - **风险（Trade-offs）**：取值去重沿用“已存在则跳过”的策略，重复的 `Accept` 等头部会被折叠。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    name: String,
    values: Vec<String>,
    line: usize,
}

impl HeaderField {
    /// 构造带初始取值的字段。
    pub fn new(name: impl Into<String>, values: Vec<String>, line: usize) -> Self {
        let mut field = Self {
            name: name.into(),
            values: Vec::with_capacity(values.len()),
            line,
        };
        field.extend(values);
        field
    }

    /// 头部名称（首次出现时的大小写）。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 全部取值。
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// 第一个取值。
    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// 首次出现的行号。
    pub fn line(&self) -> usize {
        self.line
    }

    fn extend(&mut self, values: impl IntoIterator<Item = String>) {
        for value in values {
            if !self.values.contains(&value) {
                self.values.push(value);
            }
        }
    }
}

/// 大小写不敏感、保持插入顺序的多值头部集合。
///
/// `line` 记录所属分段首行的行号，当“整组头部”本身是诊断锚点时使用（例如缺少 Content-Type）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<HeaderField>,
    line: usize,
}

impl Headers {
    /// 创建空集合。
    pub fn new(line: usize) -> Self {
        Self {
            fields: Vec::new(),
            line,
        }
    }

    /// 所属分段首行的行号。
    pub fn line(&self) -> usize {
        self.line
    }

    /// 追加取值；同名字段已存在时按顺序合并。
    pub fn add(&mut self, name: &str, values: Vec<String>, line: usize) {
        match self.position(name) {
            Some(idx) => self.fields[idx].extend(values),
            None => self.fields.push(HeaderField::new(name, values, line)),
        }
    }

    /// 用给定字段整体替换同名字段，不存在时追加。
    pub fn replace(&mut self, field: HeaderField) {
        match self.position(field.name()) {
            Some(idx) => self.fields[idx] = field,
            None => self.fields.push(field),
        }
    }

    /// 移除同名字段并返回。
    pub fn remove(&mut self, name: &str) -> Option<HeaderField> {
        self.position(name).map(|idx| self.fields.remove(idx))
    }

    /// 查找字段；取值为空的字段视为不存在。
    pub fn field(&self, name: &str) -> Option<&HeaderField> {
        self.fields
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name) && !field.values.is_empty())
    }

    /// 同名字段的全部取值，不存在时为空切片。
    pub fn values(&self, name: &str) -> &[String] {
        self.field(name).map(HeaderField::values).unwrap_or_default()
    }

    /// 同名字段的第一个取值。
    pub fn first(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(HeaderField::first)
    }

    /// 字段是否存在且至少有一个取值。
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// 按插入顺序遍历有取值的字段。
    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter().filter(|field| !field.values.is_empty())
    }

    /// 有取值的字段数量。
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// 是否不含任何有效字段。
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name.eq_ignore_ascii_case(name))
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a HeaderField;
    type IntoIter = Box<dyn Iterator<Item = &'a HeaderField> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_lookup_is_case_insensitive_and_appends() {
        let mut headers = Headers::new(1);
        headers.add("Accept", vec!["application/json".into()], 2);
        headers.add("ACCEPT", vec!["text/plain".into(), "application/json".into()], 3);

        let field = headers.field("accept").expect("Accept 应存在");
        assert_eq!(field.name(), "Accept");
        assert_eq!(field.values(), ["application/json", "text/plain"]);
        assert_eq!(field.line(), 2);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn empty_field_is_treated_as_absent() {
        let mut headers = Headers::new(4);
        headers.add("Content-ID", Vec::new(), 5);
        assert!(!headers.contains("content-id"));
        assert!(headers.values("Content-ID").is_empty());
        assert!(headers.is_empty());
    }

    #[test]
    fn replace_overwrites_instead_of_merging() {
        let mut headers = Headers::new(1);
        headers.add("Content-ID", vec!["inner".into()], 10);
        headers.replace(HeaderField::new("Content-Id", vec!["outer".into()], 4));
        assert_eq!(headers.values("content-id"), ["outer"]);
        assert_eq!(headers.field("CONTENT-ID").map(HeaderField::line), Some(4));
    }

    #[test]
    fn trailing_crlf_is_stripped_only_once() {
        let line = Line::new("payload\r\n\r\n  ", 9);
        let stripped = line.without_trailing_crlf();
        assert_eq!(stripped.text(), "payload\r\n");
        assert_eq!(stripped.number(), 9);

        let bare_lf = Line::new("payload\n", 2);
        assert_eq!(bare_lf.without_trailing_crlf().text(), "payload\n");
    }

    #[test]
    fn method_vocabulary() {
        assert_eq!("PATCH".parse::<Method>(), Ok(Method::Patch));
        assert!("get".parse::<Method>().is_err());
        assert!("HEAD".parse::<Method>().is_err());
        assert!(Method::Delete.is_change_set_method());
        assert!(!Method::Get.is_change_set_method());
    }
}
