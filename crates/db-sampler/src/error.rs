//! Error types for the sampling library.

use thiserror::Error;

/// Main error type for sampling operations.
#[derive(Error, Debug)]
pub enum SamplerError {
    /// Configuration error (invalid YAML, unknown sampler, missing keys, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source and destination speak different SQL dialects
    #[error("Source dialect '{source_dialect}' does not match destination dialect '{destination_dialect}'")]
    DialectMismatch {
        source_dialect: String,
        destination_dialect: String,
    },

    /// PostgreSQL connection or query error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// MySQL/MariaDB connection or query error
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    Mysql(#[from] sqlx::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Table, view or trigger definition could not be read from the source
    #[error("Schema extraction failed: {0}")]
    SchemaExtraction(String),

    /// Driver-level failure that is not a client library error
    #[error("{operation} failed: {message}")]
    Driver { operation: String, message: String },

    /// Operation not supported by a driver
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Sampling, cleaning or writing failed for a specific table
    #[error("Failed to migrate table '{table}' with sampler '{sampler}'")]
    Table {
        table: String,
        sampler: String,
        #[source]
        source: Box<SamplerError>,
    },

    /// View could not be recreated on the destination
    #[error("Failed to migrate view '{view}'")]
    View {
        view: String,
        #[source]
        source: Box<SamplerError>,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SamplerError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        SamplerError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Driver error for a named operation
    pub fn driver(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SamplerError::Driver {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Wrap an error raised while processing a table
    pub fn table(table: impl Into<String>, sampler: impl Into<String>, source: SamplerError) -> Self {
        SamplerError::Table {
            table: table.into(),
            sampler: sampler.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error raised while recreating a view
    pub fn view(view: impl Into<String>, source: SamplerError) -> Self {
        SamplerError::View {
            view: view.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error, skipping the table/view wrappers.
    pub fn root_cause(&self) -> &SamplerError {
        match self {
            SamplerError::Table { source, .. } | SamplerError::View { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Whether the root cause is a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(self.root_cause(), SamplerError::Config(_))
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self.root_cause() {
            SamplerError::Config(_) | SamplerError::Yaml(_) => 2,
            SamplerError::DialectMismatch { .. } => 3,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for sampling operations.
pub type Result<T> = std::result::Result<T, SamplerError>;
