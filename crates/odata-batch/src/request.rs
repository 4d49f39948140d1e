//! 流水线的最终产物：可交给分发器执行的子请求。

use bytes::Bytes;

use crate::parse::RequestUri;
use crate::types::{Headers, Method};

const CONTENT_ID: &str = "Content-ID";

/// 一个已解析、已校验的子请求。
///
/// 正文为按 `Content-Length` 截断后的字节视图，克隆只增加引用计数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    method: Method,
    uri: RequestUri,
    headers: Headers,
    body: Bytes,
}

impl BatchRequest {
    pub(crate) fn new(method: Method, uri: RequestUri, headers: Headers, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    /// 请求方法。
    pub fn method(&self) -> Method {
        self.method
    }

    /// 解析后的 URI 组成部分。
    pub fn uri(&self) -> &RequestUri {
        &self.uri
    }

    /// 请求头部。
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// `Content-ID` 取值，change set 内的请求总是携带。
    pub fn content_id(&self) -> Option<&str> {
        self.headers.first(CONTENT_ID)
    }

    /// 正文字节。
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// 对应一个顶层分段的请求组。
///
/// `is_change_set` 为真时组内请求必须由分发器原子执行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequestPart {
    is_change_set: bool,
    requests: Vec<BatchRequest>,
}

impl BatchRequestPart {
    /// 构造请求组。
    pub fn new(is_change_set: bool, requests: Vec<BatchRequest>) -> Self {
        Self {
            is_change_set,
            requests,
        }
    }

    /// 是否为原子 change set。
    pub fn is_change_set(&self) -> bool {
        self.is_change_set
    }

    /// 组内请求，保持原始顺序。
    pub fn requests(&self) -> &[BatchRequest] {
        &self.requests
    }

    /// 消费自身并返回请求列表。
    pub fn into_requests(self) -> Vec<BatchRequest> {
        self.requests
    }
}
