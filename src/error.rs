use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
///
/// The tree core never produces these on its own; mutation outcomes are plain
/// values. They appear at the boundary, where a failed outcome is turned into
/// something a user should see, and around file and terminal I/O.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from reading or writing library and shape files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a library or shape file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed TOML in a config file.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A structurally forbidden operation, such as touching the root.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A name collision.
    #[error("Item already exists: {0}")]
    ItemExists(String),

    /// The operation would make a node its own ancestor.
    #[error("Circular reference: {0}")]
    CircularReference(String),

    /// A bulk operation that completed none of its steps.
    #[error("Nothing could be done: {0}")]
    NoSuccess(String),
}
