use std::path::PathBuf;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the application
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    ParseError { file: PathBuf, message: String },
    InvalidArgument(String),
    /// The requested root record is not declared in the package
    ActionNotFound { action_id: String, root: String },
    /// An annotation carried a key the active policy refuses
    UnknownAnnotationKey { field: String, key: String },
    /// A default value literal the renderer cannot format
    UnsupportedDefault { field: String, literal: String },
    /// The configured run deadline passed before the package finished
    DeadlineExceeded { package: String },
    /// Another package failed and the run was aborted
    Aborted,
    SerializationError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO 错误: {}", e),
            Error::ParseError { file, message } => {
                write!(f, "解析错误 {}: {}", file.display(), message)
            }
            Error::InvalidArgument(msg) => write!(f, "无效参数: {}", msg),
            Error::ActionNotFound { action_id, root } => {
                write!(f, "未找到接口 {} 的根结构体 {}", action_id, root)
            }
            Error::UnknownAnnotationKey { field, key } => {
                write!(f, "字段 {} 的注解包含未知键: {}", field, key)
            }
            Error::UnsupportedDefault { field, literal } => {
                write!(f, "字段 {} 的默认值类型不受支持: {}", field, literal)
            }
            Error::DeadlineExceeded { package } => write!(f, "包 {} 处理超时", package),
            Error::Aborted => write!(f, "其他包处理失败, 已中止"),
            Error::SerializationError(msg) => write!(f, "序列化错误: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON 序列化错误: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML 序列化错误: {}", err))
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::IoError(err.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_messages() {
        let err = Error::ActionNotFound {
            action_id: "2000".to_string(),
            root: "Demo2000".to_string(),
        };
        assert_eq!(err.to_string(), "未找到接口 2000 的根结构体 Demo2000");

        let err = Error::UnsupportedDefault {
            field: "Sex".to_string(),
            literal: "'m'".to_string(),
        };
        assert!(err.to_string().contains("'m'"));
    }

    #[test]
    fn test_io_error_source() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(Error::Aborted.source().is_none());
    }
}
