//! 请求行解析与请求目标解析。
//!
//! ## 模块目标（Why）
//! - 每个子请求的首行形如 `METHOD SP request-target SP HTTP/1.1`，是方法与 URI 的唯一来源；
//! - 请求目标可以是绝对 URI、绝对路径或相对路径，三者最终都要落到服务根 URI 之下，
//!   下游分发器据此调用 URI 解析器。
//!
//! ## 设计思路（How）
//! 1. 以单个空格拆分为恰好三个 token，依次校验方法与版本；
//! 2. 请求目标按“绝对 URI → 绝对路径 → 相对路径”的顺序匹配，互斥且只尝试一次；
//! 3. 解析结果必须以服务根 URI 为前缀，前缀之后的部分即 OData 资源路径。
//!
//! ## 风险提示（Trade-offs）
//! - URI 各组成部分保持原始字符串，不做百分号解码与规范化，由下游 URI 解析器负责。

use crate::error::{BatchParseError, ParseErrorKind, ParseResult};
use crate::types::{Headers, Line, Method};

const HTTP_VERSION: &str = "HTTP/1.1";
const HOST: &str = "Host";
const SCHEME_SEPARATOR: &str = "://";

/// 解析后的请求 URI 组成部分，均为原始字符串。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUri {
    raw_base_uri: String,
    raw_odata_path: String,
    raw_query_path: String,
    raw_request_uri: String,
    raw_service_resolution_uri: Option<String>,
}

impl RequestUri {
    /// 服务根 URI（不含末尾 `/`）。
    pub fn raw_base_uri(&self) -> &str {
        &self.raw_base_uri
    }

    /// 服务根之后的资源路径，通常以 `/` 开头。
    pub fn raw_odata_path(&self) -> &str {
        &self.raw_odata_path
    }

    /// 查询串（不含 `?`），不存在时为空串。
    pub fn raw_query_path(&self) -> &str {
        &self.raw_query_path
    }

    /// 完整请求 URI，包含查询串。
    pub fn raw_request_uri(&self) -> &str {
        &self.raw_request_uri
    }

    /// 调用方传入的服务解析 URI，原样透传。
    pub fn raw_service_resolution_uri(&self) -> Option<&str> {
        self.raw_service_resolution_uri.as_deref()
    }
}

/// 已解析的请求行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestStatusLine {
    method: Method,
    uri: RequestUri,
    http_version: String,
    line: usize,
}

impl RequestStatusLine {
    /// 解析请求行并解析请求目标。
    ///
    /// # 教案式说明
    /// - **输入**：`line` 为请求行；`headers` 为同一操作的 HTTP 头部，绝对路径目标需要其中的 `Host`；
    ///   `base_uri` 为已去掉末尾 `/` 的服务根 URI；
    /// - **错误**（全部锚定在请求行行号）：
    ///   - token 数不为 3 → `batch.invalid_status_line`；
    ///   - 未知方法 → `batch.invalid_method`；
    ///   - 版本不是 `HTTP/1.1` → `batch.invalid_http_version`；
    ///   - 目标形态无法识别 → `batch.invalid_uri`；
    ///   - 绝对路径缺少唯一 `Host` → `batch.missing_mandatory_header`；
    ///   - 结果不在服务根之下 → `batch.invalid_base_uri`。
    pub fn parse(
        line: &Line,
        headers: &Headers,
        base_uri: &str,
        service_resolution_uri: Option<&str>,
    ) -> ParseResult<Self> {
        let number = line.number();
        let tokens: Vec<&str> = line.content().split(' ').collect();
        let [method, target, version] = tokens.as_slice() else {
            return Err(BatchParseError::new(ParseErrorKind::InvalidStatusLine, number)
                .with_detail(line.content().to_owned()));
        };

        let method: Method = method.parse().map_err(|_| {
            BatchParseError::new(ParseErrorKind::InvalidMethod, number)
                .with_detail((*method).to_owned())
        })?;

        let version = version.trim();
        if version != HTTP_VERSION {
            return Err(BatchParseError::new(ParseErrorKind::InvalidHttpVersion, number)
                .with_detail(version.to_owned()));
        }

        let uri = resolve_target(target, headers, base_uri, number)?;
        Ok(Self {
            method,
            uri: RequestUri {
                raw_service_resolution_uri: service_resolution_uri.map(str::to_owned),
                ..uri
            },
            http_version: version.to_owned(),
            line: number,
        })
    }

    /// 请求方法。
    pub fn method(&self) -> Method {
        self.method
    }

    /// 解析后的 URI。
    pub fn uri(&self) -> &RequestUri {
        &self.uri
    }

    /// 消费自身并返回 URI。
    pub fn into_uri(self) -> RequestUri {
        self.uri
    }

    /// HTTP 版本文本。
    pub fn http_version(&self) -> &str {
        &self.http_version
    }

    /// 请求行行号。
    pub fn line(&self) -> usize {
        self.line
    }

    /// 校验方法是否与所在上下文兼容。
    ///
    /// 独立查询操作只允许 `GET`；change set 内只允许修改类方法。
    pub fn validate_method(&self, is_change_set: bool) -> ParseResult<()> {
        match (is_change_set, self.method) {
            (false, Method::Get) => Ok(()),
            (false, method) => Err(BatchParseError::new(
                ParseErrorKind::InvalidQueryOperationMethod,
                self.line,
            )
            .with_detail(method.as_str())),
            (true, method) if method.is_change_set_method() => Ok(()),
            (true, method) => Err(BatchParseError::new(
                ParseErrorKind::InvalidChangeSetMethod,
                self.line,
            )
            .with_detail(method.as_str())),
        }
    }
}

/// 服务根 URI 的 authority 部分（`host[:port]`）。
pub(crate) fn authority_of(base_uri: &str) -> &str {
    let rest = base_uri
        .split_once(SCHEME_SEPARATOR)
        .map_or(base_uri, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

fn scheme_of(base_uri: &str) -> &str {
    base_uri
        .split_once(SCHEME_SEPARATOR)
        .map_or("http", |(scheme, _)| scheme)
}

fn is_absolute_uri(target: &str) -> bool {
    let lower = target
        .get(..8)
        .unwrap_or(target)
        .to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn resolve_target(
    target: &str,
    headers: &Headers,
    base_uri: &str,
    line: usize,
) -> ParseResult<RequestUri> {
    if target.is_empty() || target.chars().any(char::is_whitespace) {
        return Err(invalid_uri(target, line));
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    let resolved = if is_absolute_uri(path) {
        path.to_owned()
    } else if path.starts_with('/') {
        let hosts = headers.values(HOST);
        let [host] = hosts else {
            return Err(
                BatchParseError::new(ParseErrorKind::MissingMandatoryHeader, line)
                    .with_detail("绝对路径请求需要唯一的 Host 头"),
            );
        };
        let direct = format!("{}{SCHEME_SEPARATOR}{host}{path}", scheme_of(base_uri));
        if !is_under(&direct, base_uri) && host.eq_ignore_ascii_case(authority_of(base_uri)) {
            format!("{base_uri}{path}")
        } else {
            direct
        }
    } else if !path.contains(SCHEME_SEPARATOR) {
        format!("{base_uri}/{path}")
    } else {
        return Err(invalid_uri(target, line));
    };

    if !is_under(&resolved, base_uri) {
        return Err(BatchParseError::new(ParseErrorKind::InvalidBaseUri, line)
            .with_detail(format!("host does not match: `{resolved}` 不在 `{base_uri}` 之下")));
    }

    let odata_path = resolved[base_uri.len()..].to_owned();
    let raw_request_uri = match query {
        Some(query) => format!("{resolved}?{query}"),
        None => resolved,
    };

    Ok(RequestUri {
        raw_base_uri: base_uri.to_owned(),
        raw_odata_path: odata_path,
        raw_query_path: query.unwrap_or_default().to_owned(),
        raw_request_uri,
        raw_service_resolution_uri: None,
    })
}

fn is_under(uri: &str, base_uri: &str) -> bool {
    uri.strip_prefix(base_uri)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn invalid_uri(target: &str, line: usize) -> BatchParseError {
    BatchParseError::new(ParseErrorKind::InvalidUri, line).with_detail(target.to_owned())
}
