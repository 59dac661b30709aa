/// Result alias that carries the custom [`DemoError`] type.
pub type Result<T> = std::result::Result<T, DemoError>;

/// Common error type for the core crate.
///
/// Only configuration problems and unrecoverable decode failures ever reach
/// callers. Buffer-full and buffer-empty conditions are handled internally
/// and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a cue or config file.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// Invalid configuration detected while loading.
    #[error("configuration error: {0}")]
    Config(String),
    /// A cue refers to an effect name that was never declared.
    #[error("unknown effect `{name}`")]
    UnknownEffect { name: String },
    /// A cue refers to an effect slot that does not exist.
    #[error("effect index {index} out of range ({available} effects available)")]
    EffectIndexOutOfRange { index: usize, available: usize },
    /// The decoder failed mid-stream.
    #[error("decode error: {0}")]
    Decode(String),
    /// Caller supplied arguments that can never be valid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A shared lock was poisoned by a panicking thread.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
}

impl DemoError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Shorthand for [`DemoError::Config`].
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Returns `true` for errors raised while loading configuration or cues.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Json(_)
                | Self::UnknownEffect { .. }
                | Self::EffectIndexOutOfRange { .. }
        )
    }
}

impl From<&str> for DemoError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for DemoError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_configuration_errors() {
        assert!(DemoError::UnknownEffect {
            name: "plasma".into()
        }
        .is_configuration());
        assert!(DemoError::config("bad").is_configuration());
        assert!(!DemoError::Decode("eof".into()).is_configuration());
        assert!(!DemoError::from("boom").is_configuration());
    }

    #[test]
    fn formats_unknown_effect_with_name() {
        let err = DemoError::UnknownEffect {
            name: "starfield".into(),
        };
        assert!(format!("{err}").contains("starfield"));
    }
}
