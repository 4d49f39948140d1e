//! 请求装配：把结构化分段转换为可执行的子请求。
//!
//! ## 模块目标（Why）
//! - 结构解析只保证“形状正确”，批处理协议的横切规则（禁止头部、`Content-ID` 继承、
//!   方法与正文兼容性、字符集与长度）集中在这里校验，保证每条规则只有一个实现位置；
//! - 产出的 [`BatchRequest`] 携带原始 URI 组成部分与截断后的正文字节，分发器无需再读取行序列。
//!
//! ## 校验顺序（How）
//! 1. 分段级：change set 要求 `multipart/mixed`；单个操作要求 `Content-Transfer-Encoding: binary`
//!    （若存在）与唯一的 `application/http`；
//! 2. change set 包装层：`Content-ID` 继承与包装头部校验；
//! 3. 操作级：请求行 → 方法上下文 → `Host` → 禁止头部 → `GET` 正文 → 字符集 → `Content-Length`。
//!
//! ## 风险提示（Trade-offs）
//! - 正文先按声明字符集重新编码再截断，`Content-Length` 以编码后的字节计数；
//!   多字节字符可能在截断处被切开，这与 HTTP 语义一致，由下游反序列化器处理。

use bytes::Bytes;
use tracing::trace;

use crate::charset::Charset;
use crate::error::{BatchParseError, ParseErrorKind, ParseResult};
use crate::media_type::{APPLICATION_HTTP, ContentType, MULTIPART_MIXED, charset_parameter};
use crate::parse::{
    BatchPart, BodyContent, BodyPart, QueryOperation, RequestStatusLine, authority_of,
};
use crate::request::{BatchRequest, BatchRequestPart};
use crate::types::{Headers, Method};

const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
const CONTENT_ID: &str = "Content-ID";
const CONTENT_LENGTH: &str = "Content-Length";
const HOST: &str = "Host";
const BINARY: &str = "binary";

/// 子请求不得携带的头部。
pub const FORBIDDEN_HEADERS: [&str; 7] = [
    "Authorization",
    "Expect",
    "From",
    "Max-Forwards",
    "Range",
    "TE",
    "WWW-Authenticate",
];

/// 把 [`BodyPart`] 装配为 [`BatchRequestPart`]。
///
/// 实例只持有不可变的服务根信息，可在多个解析间共享。
#[derive(Debug, Clone)]
pub struct BatchRequestTransformer {
    base_uri: String,
    service_resolution_uri: Option<String>,
}

impl BatchRequestTransformer {
    /// 以服务根 URI 创建装配器；末尾的 `/` 会被去掉。
    pub fn new(base_uri: &str, service_resolution_uri: Option<&str>) -> Self {
        Self {
            base_uri: base_uri.trim_end_matches('/').to_owned(),
            service_resolution_uri: service_resolution_uri.map(str::to_owned),
        }
    }

    /// 规范化后的服务根 URI。
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// 装配一个顶层分段。
    pub fn transform(&self, part: BodyPart) -> ParseResult<BatchRequestPart> {
        let is_change_set = part.is_change_set();
        validate_part_headers(&part)?;

        let (_, content) = part.into_parts();
        let requests = match content {
            BodyContent::Single(operation) => vec![self.transform_operation(operation, false)?],
            BodyContent::ChangeSet(operations) => operations
                .into_iter()
                .map(|wrapper| {
                    let (wrapper_headers, mut operation) = wrapper.into_parts();
                    inherit_content_id(&wrapper_headers, &mut operation)?;
                    validate_transfer_encoding(&wrapper_headers)?;
                    validate_content_type(&wrapper_headers, APPLICATION_HTTP)?;
                    self.transform_operation(operation, true)
                })
                .collect::<ParseResult<Vec<_>>>()?,
        };

        Ok(BatchRequestPart::new(is_change_set, requests))
    }

    fn transform_operation(
        &self,
        operation: QueryOperation,
        is_change_set: bool,
    ) -> ParseResult<BatchRequest> {
        let status = RequestStatusLine::parse(
            operation.status_line(),
            operation.headers(),
            &self.base_uri,
            self.service_resolution_uri.as_deref(),
        )?;
        status.validate_method(is_change_set)?;
        self.validate_host(operation.headers())?;
        reject_forbidden_headers(operation.headers())?;

        let method = status.method();
        let status_line = status.line();
        let (_, headers, body_lines) = operation.into_parts();

        let body = if method == Method::Get {
            if !body_lines.iter().all(|line| line.is_blank()) {
                return Err(BatchParseError::new(ParseErrorKind::InvalidContent, status_line)
                    .with_detail("GET 请求不得携带正文"));
            }
            Bytes::new()
        } else {
            let charset = body_charset(&headers)?;
            let text: String = body_lines.iter().map(|line| line.text()).collect();
            let mut encoded = charset.encode(&text);
            if let Some(length) = content_length(&headers)? {
                encoded.truncate(length);
            }
            Bytes::from(encoded)
        };

        trace!(
            target: "odata_batch::transform",
            method = %method,
            uri = status.uri().raw_request_uri(),
            body_len = body.len(),
            change_set = is_change_set,
            "装配子请求"
        );

        Ok(BatchRequest::new(method, status.into_uri(), headers, body))
    }

    fn validate_host(&self, headers: &Headers) -> ParseResult<()> {
        let Some(field) = headers.field(HOST) else {
            return Ok(());
        };
        let authority = authority_of(&self.base_uri);
        match field.values() {
            [host] if host.eq_ignore_ascii_case(authority) => Ok(()),
            values => Err(BatchParseError::new(ParseErrorKind::InvalidHost, field.line())
                .with_detail(format!("{values:?} 与 `{authority}` 不一致"))),
        }
    }
}

fn validate_part_headers(part: &BodyPart) -> ParseResult<()> {
    let headers = part.headers();
    if part.is_change_set() {
        validate_content_type(headers, MULTIPART_MIXED)
    } else {
        validate_transfer_encoding(headers)?;
        validate_content_type(headers, APPLICATION_HTTP)
    }
}

fn validate_content_type(headers: &Headers, expected: &str) -> ParseResult<()> {
    let field = headers
        .field(CONTENT_TYPE)
        .ok_or_else(|| BatchParseError::new(ParseErrorKind::MissingContentType, headers.line()))?;
    match field.values() {
        [value]
            if ContentType::parse(value)
                .is_some_and(|content_type| content_type.is_compatible(expected)) =>
        {
            Ok(())
        }
        values => Err(BatchParseError::new(ParseErrorKind::InvalidContentType, field.line())
            .with_detail(format!("期望 {expected}，实际为 {values:?}"))),
    }
}

fn validate_transfer_encoding(headers: &Headers) -> ParseResult<()> {
    match headers.field(CONTENT_TRANSFER_ENCODING) {
        None => Ok(()),
        Some(field) => match field.values() {
            [value] if value.eq_ignore_ascii_case(BINARY) => Ok(()),
            values => Err(BatchParseError::new(
                ParseErrorKind::InvalidContentTransferEncoding,
                field.line(),
            )
            .with_detail(format!("{values:?}"))),
        },
    }
}

/// 包装层的 `Content-ID` 整体替换内层同名字段；两者都缺失时报告在包装头部块行号。
fn inherit_content_id(wrapper: &Headers, operation: &mut QueryOperation) -> ParseResult<()> {
    let outer = wrapper.field(CONTENT_ID);
    let inner = operation.headers().field(CONTENT_ID);

    for field in [outer, inner].into_iter().flatten() {
        if field.values().len() != 1 {
            return Err(BatchParseError::new(ParseErrorKind::InvalidContentId, field.line())
                .with_detail(format!("{:?}", field.values())));
        }
    }

    let has_inner = inner.is_some();
    match outer {
        Some(outer) => {
            operation.headers_mut().replace(outer.clone());
            Ok(())
        }
        None if has_inner => Ok(()),
        None => Err(BatchParseError::new(
            ParseErrorKind::MissingContentId,
            wrapper.line(),
        )),
    }
}

fn reject_forbidden_headers(headers: &Headers) -> ParseResult<()> {
    match FORBIDDEN_HEADERS
        .iter()
        .find_map(|name| headers.field(name))
    {
        Some(field) => Err(BatchParseError::new(ParseErrorKind::ForbiddenHeader, field.line())
            .with_detail(field.name().to_owned())),
        None => Ok(()),
    }
}

fn body_charset(headers: &Headers) -> ParseResult<Charset> {
    let Some(field) = headers.field(CONTENT_TYPE) else {
        return Ok(Charset::utf8());
    };
    match field.first().and_then(charset_parameter) {
        None => Ok(Charset::utf8()),
        Some(label) => Charset::for_label(&label).ok_or_else(|| {
            BatchParseError::new(ParseErrorKind::InvalidContentType, field.line())
                .with_detail(format!("未知字符集 `{label}`"))
        }),
    }
}

fn content_length(headers: &Headers) -> ParseResult<Option<usize>> {
    let Some(field) = headers.field(CONTENT_LENGTH) else {
        return Ok(None);
    };
    match field.values() {
        [value] => value.parse::<usize>().map(Some).map_err(|_| {
            BatchParseError::new(ParseErrorKind::InvalidContentLength, field.line())
                .with_detail(value.clone())
        }),
        values => Err(BatchParseError::new(ParseErrorKind::InvalidContentLength, field.line())
            .with_detail(format!("{values:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Line;

    const BASE: &str = "http://odata.example.org/svc/";

    fn lines(text: &str) -> Vec<Line> {
        text.split_inclusive('\n')
            .enumerate()
            .map(|(idx, line)| Line::new(line, idx + 1))
            .collect()
    }

    fn transform(text: &str) -> ParseResult<BatchRequestPart> {
        let part = BodyPart::parse(&lines(text), "b1", true)?;
        BatchRequestTransformer::new(BASE, None).transform(part)
    }

    const SINGLE_HEADERS: &str =
        "Content-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n";

    #[test]
    fn base_uri_trailing_slash_is_removed() {
        let transformer = BatchRequestTransformer::new(BASE, None);
        assert_eq!(transformer.base_uri(), "http://odata.example.org/svc");
    }

    #[test]
    fn single_get_yields_one_request_with_empty_body() {
        let part = transform(&format!(
            "{SINGLE_HEADERS}GET People?$top=1 HTTP/1.1\r\nAccept: application/json\r\n\r\n"
        ))
        .unwrap();
        assert!(!part.is_change_set());
        let request = &part.requests()[0];
        assert_eq!(request.method(), Method::Get);
        assert_eq!(
            request.uri().raw_request_uri(),
            "http://odata.example.org/svc/People?$top=1"
        );
        assert!(request.body().is_empty());
        assert_eq!(request.headers().values("Accept"), ["application/json"]);
    }

    #[test]
    fn get_with_body_is_rejected_at_status_line() {
        let err = transform(&format!("{SINGLE_HEADERS}GET People HTTP/1.1\r\n\r\npayload"))
            .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidContent);
        assert_eq!(err.line(), 4);
    }

    #[test]
    fn single_part_requires_application_http() {
        let err = transform("Content-Type: text/plain\r\n\r\nGET People HTTP/1.1\r\n\r\n")
            .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidContentType);
        assert_eq!(err.line(), 1);

        let err = transform(
            "Content-Type: application/http\r\nContent-Transfer-Encoding: base64\r\n\r\nGET People HTTP/1.1\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidContentTransferEncoding);
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn forbidden_header_is_reported_at_its_line() {
        let err = transform(&format!(
            "{SINGLE_HEADERS}GET People HTTP/1.1\r\nAccept: */*\r\nmax-forwards: 3\r\n\r\n"
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::ForbiddenHeader);
        assert_eq!(err.line(), 6);
        assert_eq!(err.detail(), Some("max-forwards"));
    }

    #[test]
    fn foreign_host_is_rejected() {
        let err = transform(&format!(
            "{SINGLE_HEADERS}GET People HTTP/1.1\r\nHost: evil.example.org\r\n\r\n"
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidHost);
        assert_eq!(err.line(), 5);
    }

    fn change_set(operation: &str) -> String {
        format!(
            "Content-Type: multipart/mixed; boundary=cs\r\n\r\n--cs\r\n{operation}\r\n--cs--\r\n"
        )
    }

    #[test]
    fn body_is_encoded_and_truncated_to_content_length() {
        let part = transform(&change_set(
            "Content-Type: application/http\r\nContent-ID: 7\r\n\r\n\
             POST People HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 4\r\n\r\n\
             {\"Name\":\"x\"}\r\n",
        ))
        .unwrap();
        assert!(part.is_change_set());
        let request = &part.requests()[0];
        assert_eq!(request.content_id(), Some("7"));
        assert_eq!(request.body().to_vec(), b"{\"Na".to_vec());
    }

    #[test]
    fn invalid_content_length_is_rejected() {
        let err = transform(&change_set(
            "Content-Type: application/http\r\nContent-ID: 1\r\n\r\n\
             POST People HTTP/1.1\r\nContent-Length: -1\r\n\r\n{}\r\n",
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidContentLength);
        assert_eq!(err.line(), 8);
    }

    #[test]
    fn content_length_must_be_a_single_number() {
        for value in ["abc", "2, 3"] {
            let err = transform(&change_set(&format!(
                "Content-Type: application/http\r\nContent-ID: 1\r\n\r\n\
                 POST People HTTP/1.1\r\nContent-Length: {value}\r\n\r\n{{}}\r\n"
            )))
            .unwrap_err();
            assert_eq!(err.kind(), ParseErrorKind::InvalidContentLength, "{value}");
            assert_eq!(err.code(), crate::error::codes::INVALID_CONTENT_LENGTH);
            assert_eq!(err.line(), 8, "{value}");
        }
    }

    #[test]
    fn change_set_wrapper_requires_application_http() {
        let err = transform(&change_set(
            "Content-Type: text/plain\r\nContent-ID: 1\r\n\r\nDELETE People(1) HTTP/1.1\r\n\r\n",
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidContentType);
        assert_eq!(err.code(), crate::error::codes::INVALID_CONTENT_TYPE);
        assert_eq!(err.line(), 4);
    }

    #[test]
    fn change_set_wrapper_requires_binary_transfer_encoding() {
        let err = transform(&change_set(
            "Content-Type: application/http\r\nContent-Transfer-Encoding: base64\r\n\
             Content-ID: 1\r\n\r\nDELETE People(1) HTTP/1.1\r\n\r\n",
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidContentTransferEncoding);
        assert_eq!(
            err.code(),
            crate::error::codes::INVALID_CONTENT_TRANSFER_ENCODING
        );
        assert_eq!(err.line(), 5);
    }

    #[test]
    fn declared_charset_drives_encoding() {
        let part = transform(&change_set(
            "Content-Type: application/http\r\nContent-ID: 1\r\n\r\n\
             POST People HTTP/1.1\r\nContent-Type: text/plain; charset=iso-8859-1\r\n\r\nü",
        ))
        .unwrap();
        assert_eq!(part.requests()[0].body().to_vec(), vec![0xFC]);

        let err = transform(&change_set(
            "Content-Type: application/http\r\nContent-ID: 1\r\n\r\n\
             POST People HTTP/1.1\r\nContent-Type: text/plain; charset=x-bogus\r\n\r\nx\r\n",
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidContentType);
    }

    #[test]
    fn wrapper_content_id_replaces_inner_one() {
        let part = transform(&change_set(
            "Content-Type: application/http\r\nContent-ID: outer\r\n\r\n\
             DELETE People(1) HTTP/1.1\r\nContent-ID: inner\r\n\r\n",
        ))
        .unwrap();
        assert_eq!(part.requests()[0].headers().values("content-id"), ["outer"]);
    }

    #[test]
    fn content_id_rules() {
        let err = transform(&change_set(
            "Content-Type: application/http\r\n\r\nDELETE People(1) HTTP/1.1\r\n\r\n",
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::MissingContentId);
        assert_eq!(err.line(), 4);

        let err = transform(&change_set(
            "Content-Type: application/http\r\nContent-ID: 1, 2\r\n\r\nDELETE People(1) HTTP/1.1\r\n\r\n",
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidContentId);
        assert_eq!(err.line(), 5);
    }

    #[test]
    fn change_set_rejects_get() {
        let err = transform(&change_set(
            "Content-Type: application/http\r\nContent-ID: 1\r\n\r\nGET People HTTP/1.1\r\n\r\n",
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidChangeSetMethod);
    }
}
