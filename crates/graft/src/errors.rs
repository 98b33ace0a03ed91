use std::fmt;

/// Error type for the patching surface, separating failures by cause.
///
/// Keeping configuration, lookup, and capture-request failures distinct lets
/// callers handle each accurately without string matching. All variants are
/// raised synchronously to the immediate caller; nothing in this crate
/// retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// An interceptor or wrapper was constructed over an unsuitable target,
    /// e.g. a script interceptor without the required `_result` parameter.
    Configuration(String),
    /// `prefix`/`postfix` was asked to apply against a module that does not
    /// contain the named symbol.
    SymbolNotFound { module: String, symbol: String },
    /// `patch` was given a capture name that is not a declared local of the
    /// target function. Raised up front rather than failing opaquely when
    /// the rewritten function is later called.
    UnknownParameter { function: String, parameter: String },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::SymbolNotFound { module, symbol } => {
                write!(f, "symbol '{symbol}' not found in module '{module}'")
            }
            Self::UnknownParameter { function, parameter } => {
                write!(f, "unknown parameter '{parameter}' in function '{function}'")
            }
        }
    }
}

impl std::error::Error for PatchError {}

/// Error raised while executing mini-language code or binding call arguments.
///
/// These surface from `Callable::call` and propagate unchanged through any
/// wrapper chain installed around the callable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// An operation was applied to operands of unsupported types.
    Type { message: String },
    /// A call passed the wrong number of positional arguments.
    Arity { function: String, expected: usize, given: usize },
    /// A call passed a keyword argument the function does not declare.
    UnexpectedKeyword { function: String, keyword: String },
    /// A call bound the same parameter twice (positionally and by keyword).
    DuplicateArgument { function: String, parameter: String },
    /// A required parameter received no argument and has no default.
    MissingArgument { function: String, parameter: String },
    /// A local variable was read before being bound.
    UnboundLocal { name: String },
    /// The instruction sequence ended without executing a `Return`.
    MissingReturn { function: String },
}

impl RunError {
    /// Builds a `Type` error from a formatted message.
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type { message: message.into() }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { message } => write!(f, "type error: {message}"),
            Self::Arity { function, expected, given } => {
                write!(f, "{function}() takes {expected} positional arguments but {given} were given")
            }
            Self::UnexpectedKeyword { function, keyword } => {
                write!(f, "{function}() got an unexpected keyword argument '{keyword}'")
            }
            Self::DuplicateArgument { function, parameter } => {
                write!(f, "{function}() got multiple values for argument '{parameter}'")
            }
            Self::MissingArgument { function, parameter } => {
                write!(f, "{function}() missing required argument '{parameter}'")
            }
            Self::UnboundLocal { name } => {
                write!(f, "local variable '{name}' referenced before assignment")
            }
            Self::MissingReturn { function } => {
                write!(f, "{function}() ended without returning")
            }
        }
    }
}

impl std::error::Error for RunError {}
