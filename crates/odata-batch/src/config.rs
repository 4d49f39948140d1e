//! 解析器配置。
//!
//! ## 设计动机（Why）
//! - 严格模式与读缓冲大小因部署而异：面向第三方客户端的网关通常需要宽松模式，
//!   内部服务则倾向严格校验；
//! - 配置以显式值传入解析器，不依赖全局状态，多个解析可以并发执行且互不干扰。
//!
//! ## 契约说明（What）
//! - [`BatchParserConfig`] 可直接构造、链式调整，或从 TOML 片段反序列化；缺失字段取默认值；
//! - [`BatchParserConfig::from_toml_str`] 在反序列化之后执行校验，`buffer_size` 必须大于零。

use thiserror::Error;

use crate::line::DEFAULT_BUFFER_SIZE;

/// 配置加载失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML 文本无法解析或字段类型不匹配。
    #[error("解析批处理配置失败: {0}")]
    Toml(#[from] toml::de::Error),
    /// 读缓冲大小为零。
    #[error("buffer_size 必须大于 0")]
    InvalidBufferSize,
}

/// 批处理解析器配置。
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchParserConfig {
    /// 头部之后缺少空行是否视为错误，默认 `true`。
    pub strict: bool,
    /// 行分词器每次从输入流读取的字节数，默认 8 KiB。
    pub buffer_size: usize,
}

impl Default for BatchParserConfig {
    fn default() -> Self {
        Self {
            strict: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl BatchParserConfig {
    /// 设置严格模式。
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// 设置读缓冲大小。
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// 从 TOML 文本加载并校验配置。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验字段取值。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::InvalidBufferSize);
        }
        Ok(())
    }
}
