// 합성 에러 타입
// 단계별 실패 원인 구분 (경계에서는 성공/실패로만 축약)

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// 입력 파일 역할 (에러 메시지용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    Video,
    Audio,
}

impl fmt::Display for InputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRole::Video => write!(f, "video"),
            InputRole::Audio => write!(f, "background audio"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CombineError {
    /// 처리 시작 전 입력 경로가 존재하지 않음
    #[error("{role} file not found at '{}'", path.display())]
    InputNotFound { role: InputRole, path: PathBuf },
    /// 길이 조정이 정의되지 않는 값 (길이 0 배경음 등)
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("decode failure: {0}")]
    DecodeFailure(String),
    #[error("encode failure: {0}")]
    EncodeFailure(String),
}

pub type CombineResult<T> = Result<T, CombineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_not_found_message() {
        let err = CombineError::InputNotFound {
            role: InputRole::Audio,
            path: PathBuf::from("missing.mp3"),
        };
        assert_eq!(err.to_string(), "background audio file not found at 'missing.mp3'");
    }

    #[test]
    fn test_stage_messages() {
        let err = CombineError::EncodeFailure("AAC encoder not found".to_string());
        assert_eq!(err.to_string(), "encode failure: AAC encoder not found");
    }
}
