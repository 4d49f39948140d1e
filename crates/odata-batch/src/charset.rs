//! 字符集处理。
//!
//! ## 模块目的（Why）
//! - 批处理报文的头部必须按 8 位编码（ISO-8859-1）安全解码，而各子请求正文的编码由其
//!   `Content-Type` 的 `charset` 参数决定，二者可能在同一输入流中交替出现；
//! - 装配阶段需要把解码后的正文重新编码为字节，以便按 `Content-Length` 截断。
//!
//! ## 实现策略（How）
//! - 借助 `encoding` crate 的 WHATWG 标签表解析字符集名称；`iso-8859-1`/`latin1` 与 `utf-8`
//!   走快速路径，避免 WHATWG 将 `iso-8859-1` 映射为 `windows-1252` 带来的差异；
//! - 解码与编码均使用替换策略，分词器永远不会因为字节序列非法而失败。

use core::fmt;

use encoding::all::{ISO_8859_1, UTF_8};
use encoding::label::encoding_from_whatwg_label;
use encoding::{DecoderTrap, EncoderTrap, EncodingRef};

/// 可在线程间共享的字符集句柄。
#[derive(Clone, Copy)]
pub struct Charset {
    encoding: EncodingRef,
}

impl Charset {
    /// 头部使用的 8 位默认编码。
    pub fn latin1() -> Self {
        Self {
            encoding: ISO_8859_1,
        }
    }

    /// 正文未声明 charset 时的默认编码。
    pub fn utf8() -> Self {
        Self { encoding: UTF_8 }
    }

    /// 按字符集标签查找，大小写与首尾空白不敏感；可带引号。
    pub fn for_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches('"').trim();
        if label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8") {
            return Some(Self::utf8());
        }
        if label.eq_ignore_ascii_case("iso-8859-1") || label.eq_ignore_ascii_case("latin1") {
            return Some(Self::latin1());
        }
        encoding_from_whatwg_label(label).map(|encoding| Self { encoding })
    }

    /// 字符集规范名称。
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// 将字节解码为文本，非法序列以替换字符代替。
    pub fn decode(&self, bytes: &[u8]) -> String {
        self.encoding
            .decode(bytes, DecoderTrap::Replace)
            .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
    }

    /// 将文本编码为字节，无法表示的字符以替换字符代替。
    pub fn encode(&self, text: &str) -> Vec<u8> {
        self.encoding
            .encode(text, EncoderTrap::Replace)
            .unwrap_or_else(|_| text.as_bytes().to_vec())
    }
}

impl PartialEq for Charset {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Charset {}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Charset").field(&self.name()).finish()
    }
}
