//! MosesPipeline 错误处理系统
//!
//! 统一的错误类型。数值类问题（历史数据不足、协方差奇异、求解失败）在流水线内部
//! 以安全回退吸收，只有结构性契约违规才会以错误形式向外传播。

use thiserror::Error;

/// 流水线统一错误类型
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Data error: {message}")]
    Data { message: String },

    #[error("Optimization error: {message}")]
    Optimization { message: String },

    #[error("Strategy error: {message}")]
    Strategy { message: String },
}

impl PipelineError {
    /// 创建验证相关错误
    pub fn validation(message: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
        }
    }

    /// 创建配置相关错误
    pub fn config(message: &str) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    /// 创建数据相关错误
    pub fn data(message: &str) -> Self {
        Self::Data {
            message: message.to_string(),
        }
    }

    /// 创建优化求解相关错误
    pub fn optimization(message: &str) -> Self {
        Self::Optimization {
            message: message.to_string(),
        }
    }

    /// 创建策略相关错误
    pub fn strategy(message: &str) -> Self {
        Self::Strategy {
            message: message.to_string(),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = PipelineError::validation("magnitude must be finite");
        assert!(matches!(error, PipelineError::Validation { .. }));
        assert_eq!(error.to_string(), "Validation error: magnitude must be finite");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error = PipelineError::from(json_error);
        assert!(matches!(error, PipelineError::Serialization(_)));
    }

    #[test]
    fn test_result_type() {
        let success: Result<i32> = Ok(42);
        let failure: Result<i32> = Err(PipelineError::optimization("iteration limit reached"));

        assert!(success.is_ok());
        assert!(failure.is_err());
    }
}
