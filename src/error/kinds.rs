use std::{fmt, io};

use crate::error::store::format_driver_error;

/// Crate-wide `Result` type using [`ConsoleError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Top-level error type for console operations.
///
/// Every failure aborts the remainder of a command chain. Nothing is retried
/// and nothing already executed is rolled back.
#[derive(Debug)]
pub enum ConsoleError {
    /// Malformed input: literals, brackets, identifiers, call syntax.
    Parse(ParseError),

    /// Well-formed input that asks for something unsupported.
    Usage(UsageError),

    /// Request rejected by the read-only policy before reaching the store.
    Policy(PolicyError),

    /// Anything raised by the document store.
    Store(StoreError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Parsing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing left after trimming whitespace and semicolons.
    EmptyInput,

    /// Syntax error in a command.
    SyntaxError(String),

    /// An object/array literal or string that never closes.
    UnterminatedLiteral(String),

    /// Closing delimiters without a matching opener, or parens that never close.
    UnbalancedDelimiters(String),

    /// A literal that could not be converted into strict structured data.
    InvalidLiteral { fragment: String, reason: String },

    /// An identifier that is not 24 hexadecimal characters.
    InvalidObjectId(String),

    /// A sentinel wrapper whose payload cannot be decoded.
    InvalidExtendedJson(String),

    /// A chain segment that is not `identifier(args)`.
    InvalidCall(String),
}

/// Usage errors: the input parsed but cannot be served as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// No command shape matched; carries the help text.
    UnknownCommand { help: String },

    /// A terminal method the executor does not know.
    UnsupportedMethod {
        method: String,
        supported: &'static [&'static str],
    },

    /// Wrong argument count or shape for a method.
    InvalidArguments { method: String, expected: String },

    /// A cursor modifier used without an open cursor.
    CursorRequired(String),

    /// `find` called again while a cursor is already open.
    CursorAlreadyOpen,

    /// A terminal operation followed by more chained calls.
    TerminalNotLast { method: String, next: String },

    /// A command that needs a selected database.
    DatabaseRequired(String),

    /// `use` on a database that does not exist.
    UnknownDatabase(String),
}

/// Policy errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// A mutating operation attempted while the console is read-only.
    ReadOnly { operation: String },
}

/// Errors raised by a document store implementation.
#[derive(Debug)]
pub enum StoreError {
    /// MongoDB driver errors.
    Driver(mongodb::error::Error),

    /// Errors raised by other backends.
    Backend(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

impl ConsoleError {
    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            ConsoleError::Parse(_) => "parse",
            ConsoleError::Usage(_) => "usage",
            ConsoleError::Policy(_) => "policy",
            ConsoleError::Store(_) => "store",
            ConsoleError::Config(_) => "config",
            ConsoleError::Io(_) => "io",
            ConsoleError::Generic(_) => "generic",
        }
    }

    /// Error envelope for callers that wrap results in their own transport.
    ///
    /// ```json
    /// { "error": { "kind": "policy", "message": "..." } }
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        })
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Parse(e) => write!(f, "{e}"),
            ConsoleError::Usage(e) => write!(f, "{e}"),
            ConsoleError::Policy(e) => write!(f, "{e}"),
            ConsoleError::Store(e) => write!(f, "{e}"),
            ConsoleError::Config(e) => write!(f, "Configuration error: {e}"),
            ConsoleError::Io(e) => write!(f, "I/O error: {e}"),
            ConsoleError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::EmptyInput => write!(f, "Parse error: empty input"),
            ParseError::SyntaxError(msg) => write!(f, "Syntax error: {msg}"),
            ParseError::UnterminatedLiteral(fragment) => {
                write!(f, "Parse error: unterminated literal `{fragment}`")
            }
            ParseError::UnbalancedDelimiters(fragment) => {
                write!(f, "Parse error: unbalanced brackets in `{fragment}`")
            }
            ParseError::InvalidLiteral { fragment, reason } => {
                write!(f, "Parse error: invalid literal `{fragment}` ({reason})")
            }
            ParseError::InvalidObjectId(value) => write!(
                f,
                "Parse error: invalid ObjectId `{value}` (expected 24 hexadecimal characters)"
            ),
            ParseError::InvalidExtendedJson(msg) => {
                write!(f, "Parse error: invalid extended JSON: {msg}")
            }
            ParseError::InvalidCall(fragment) => {
                write!(f, "Parse error: expected `method(args)` at `{fragment}`")
            }
        }
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::UnknownCommand { help } => write!(f, "Unrecognized command.\n{help}"),
            UsageError::UnsupportedMethod { method, supported } => write!(
                f,
                "Unsupported operation `{method}`. Supported operations: {}",
                supported.join(", ")
            ),
            UsageError::InvalidArguments { method, expected } => {
                write!(f, "Invalid arguments for `{method}`: expected {expected}")
            }
            UsageError::CursorRequired(method) => write!(
                f,
                "`{method}` must follow `find(...)`, e.g. db.coll.find({{}}).{method}(...)"
            ),
            UsageError::CursorAlreadyOpen => write!(
                f,
                "`find` can only be called once per chain; combine the filters into a single find"
            ),
            UsageError::TerminalNotLast { method, next } => write!(
                f,
                "`{method}` ends the chain and cannot be followed by `.{next}(...)`"
            ),
            UsageError::DatabaseRequired(hint) => {
                write!(f, "No database selected. {hint}")
            }
            UsageError::UnknownDatabase(name) => write!(f, "Database `{name}` not found"),
        }
    }
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::ReadOnly { operation } => write!(
                f,
                "Permission denied: `{operation}` is not allowed while the console is read-only"
            ),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Driver(e) => format_driver_error(f, e),
            StoreError::Backend(msg) => write!(f, "Store error: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ConsoleError {}
impl std::error::Error for ParseError {}
impl std::error::Error for UsageError {}
impl std::error::Error for PolicyError {}
impl std::error::Error for StoreError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to ConsoleError ========================= */

impl From<io::Error> for ConsoleError {
    fn from(err: io::Error) -> Self {
        ConsoleError::Io(err)
    }
}

impl From<mongodb::error::Error> for ConsoleError {
    fn from(err: mongodb::error::Error) -> Self {
        ConsoleError::Store(StoreError::Driver(err))
    }
}

impl From<ParseError> for ConsoleError {
    fn from(err: ParseError) -> Self {
        ConsoleError::Parse(err)
    }
}

impl From<UsageError> for ConsoleError {
    fn from(err: UsageError) -> Self {
        ConsoleError::Usage(err)
    }
}

impl From<PolicyError> for ConsoleError {
    fn from(err: PolicyError) -> Self {
        ConsoleError::Policy(err)
    }
}

impl From<StoreError> for ConsoleError {
    fn from(err: StoreError) -> Self {
        ConsoleError::Store(err)
    }
}

impl From<ConfigError> for ConsoleError {
    fn from(err: ConfigError) -> Self {
        ConsoleError::Config(err)
    }
}

impl From<String> for ConsoleError {
    fn from(msg: String) -> Self {
        ConsoleError::Generic(msg)
    }
}

impl From<&str> for ConsoleError {
    fn from(msg: &str) -> Self {
        ConsoleError::Generic(msg.to_owned())
    }
}
