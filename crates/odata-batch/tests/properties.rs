//! 批处理解析器性质验证。
//!
//! - **核心目标 (Why)**：解析器不得依赖隐藏的可变状态或读缓冲粒度。对随机生成的合法请求体，
//!   重复解析与任意缓冲大小下的解析必须得到结构相同的结果；
//! - **设计手法 (How)**：Proptest 生成若干实体集名称与查询参数，拼装为只含 `GET` 操作的请求体，
//!   可选地在末尾追加一个 change set；
//! - **合同 (What)**：每个 `GET` 分段对应一个非原子请求组，change set 对应一个原子请求组，顺序与输入一致。

use odata_batch::{BatchParser, BatchParserConfig, BatchRequestContext, Method};
use proptest::prelude::*;

const BASE_URI: &str = "http://odata.example.org/svc";

fn context() -> BatchRequestContext {
    BatchRequestContext::new("multipart/mixed; boundary=batch_prop", BASE_URI)
}

fn render(entity_sets: &[(String, u8)], with_change_set: bool) -> String {
    let mut body = String::new();
    for (name, top) in entity_sets {
        body.push_str("--batch_prop\r\n");
        body.push_str("Content-Type: application/http\r\n");
        body.push_str("Content-Transfer-Encoding: binary\r\n\r\n");
        body.push_str(&format!("GET {name}?$top={top} HTTP/1.1\r\n"));
        body.push_str("Accept: application/json\r\n\r\n\r\n");
    }
    if with_change_set {
        body.push_str("--batch_prop\r\n");
        body.push_str("Content-Type: multipart/mixed; boundary=cs_prop\r\n\r\n");
        body.push_str("--cs_prop\r\n");
        body.push_str("Content-Type: application/http\r\n");
        body.push_str("Content-ID: 1\r\n\r\n");
        body.push_str("POST Orders HTTP/1.1\r\n");
        body.push_str("Content-Type: application/json\r\n\r\n");
        body.push_str("{\"Total\":42}\r\n");
        body.push_str("--cs_prop--\r\n\r\n");
    }
    body.push_str("--batch_prop--\r\n");
    body
}

fn entity_sets() -> impl Strategy<Value = Vec<(String, u8)>> {
    prop::collection::vec(("[A-Z][a-z]{0,8}", any::<u8>()), 0..6)
}

proptest! {
    #[test]
    fn buffer_size_never_changes_the_result(
        sets in entity_sets(),
        with_change_set in any::<bool>(),
        buffer_size in 1usize..64,
    ) {
        let body = render(&sets, with_change_set);
        let reference = BatchParser::default().parse_bytes(body.as_bytes(), &context()).unwrap();
        let small = BatchParser::new(BatchParserConfig::default().with_buffer_size(buffer_size))
            .parse_bytes(body.as_bytes(), &context())
            .unwrap();
        prop_assert_eq!(&reference, &small);

        let expected_parts = sets.len() + usize::from(with_change_set);
        prop_assert_eq!(reference.len(), expected_parts);
        for (part, (name, top)) in reference.iter().zip(&sets) {
            prop_assert!(!part.is_change_set());
            let request = &part.requests()[0];
            prop_assert_eq!(request.method(), Method::Get);
            let expected_uri = format!("{BASE_URI}/{name}?$top={top}");
            prop_assert_eq!(request.uri().raw_request_uri(), expected_uri.as_str());
        }
        if with_change_set {
            let last = reference.last().unwrap();
            prop_assert!(last.is_change_set());
            prop_assert_eq!(last.requests()[0].body().to_vec(), b"{\"Total\":42}".to_vec());
        }
    }

    #[test]
    fn reparsing_is_idempotent(sets in entity_sets(), with_change_set in any::<bool>()) {
        let body = render(&sets, with_change_set);
        let parser = BatchParser::default();
        let first = parser.parse_bytes(body.as_bytes(), &context()).unwrap();
        let second = parser.parse_bytes(body.as_bytes(), &context()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn truncated_input_fails_at_line_one(sets in entity_sets(), cut in 0usize..40) {
        let body = render(&sets, false);
        let truncated = body.trim_end_matches("--batch_prop--\r\n");
        let end = truncated.len().saturating_sub(cut);
        let truncated = &truncated[..end];
        let err = BatchParser::default()
            .parse_bytes(truncated.as_bytes(), &context())
            .unwrap_err();
        let parse = err.as_parse_error().unwrap();
        let expected_line = usize::from(!truncated.is_empty());
        prop_assert_eq!(parse.line(), expected_line);
    }
}
