#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("invalid filter directive {directive:?}: {source}")]
    Filter { directive: String, source: tracing_subscriber::filter::ParseError },
}
