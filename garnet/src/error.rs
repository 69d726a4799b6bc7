use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingErrorKind {
    /// Two encodings cannot be compared or concatenated.
    Compatibility,
    InvalidByteSequence,
    UndefinedConversion,
    ConverterNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpReason {
    Return,
    Break,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RubyError {
    Frozen { kind: &'static str },
    Encoding {
        kind: EncodingErrorKind,
        message: String,
    },
    Argument(String),
    Index(String),
    Type(String),
    LocalJump { reason: JumpReason, message: String },
}

pub type RubyResult<T> = Result<T, RubyError>;

impl RubyError {
    pub fn frozen(kind: &'static str) -> Self {
        Self::Frozen { kind }
    }

    pub fn encoding(kind: EncodingErrorKind, message: impl Into<String>) -> Self {
        Self::Encoding {
            kind,
            message: message.into(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    pub fn wrong_arguments(given: usize, expected: usize) -> Self {
        Self::Argument(format!(
            "wrong number of arguments ({given} for {expected})"
        ))
    }

    /// Arity failure for a callee with a rest parameter.
    pub fn too_few_arguments(given: usize, required: usize) -> Self {
        Self::Argument(format!(
            "wrong number of arguments ({given} for {required}+)"
        ))
    }

    pub fn local_jump(reason: JumpReason) -> Self {
        let message = match reason {
            JumpReason::Return => "unexpected return",
            JumpReason::Break => "break from proc-closure",
        };
        Self::LocalJump {
            reason,
            message: message.to_string(),
        }
    }

    pub fn encoding_kind(&self) -> Option<EncodingErrorKind> {
        match self {
            Self::Encoding { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Name of the exception class the runtime raises for this error.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Frozen { .. } => "FrozenError",
            Self::Encoding { kind, .. } => match kind {
                EncodingErrorKind::Compatibility => {
                    "Encoding::CompatibilityError"
                }
                EncodingErrorKind::InvalidByteSequence => {
                    "Encoding::InvalidByteSequenceError"
                }
                EncodingErrorKind::UndefinedConversion => {
                    "Encoding::UndefinedConversionError"
                }
                EncodingErrorKind::ConverterNotFound => {
                    "Encoding::ConverterNotFoundError"
                }
            },
            Self::Argument(_) => "ArgumentError",
            Self::Index(_) => "IndexError",
            Self::Type(_) => "TypeError",
            Self::LocalJump { .. } => "LocalJumpError",
        }
    }
}

impl fmt::Display for RubyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frozen { kind } => write!(f, "can't modify frozen {kind}"),
            Self::Encoding { message, .. }
            | Self::Argument(message)
            | Self::Index(message)
            | Self::Type(message)
            | Self::LocalJump { message, .. } => f.write_str(message),
        }
    }
}

impl std::error::Error for RubyError {}
