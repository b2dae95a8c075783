//! Binding error types

/// Errors raised when attaching a group to an input source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BindError {
    /// The source cannot hold inputs or deliver events.
    #[error("Source is not a bindable input container: {0}")]
    NotAContainer(String),

    /// No tokio runtime is available to run the initial collection.
    #[error("No async runtime available to bind source")]
    NoRuntime,
}
