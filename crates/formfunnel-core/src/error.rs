use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormFunnelError {
    #[error("schema error: {0}")]
    Schema(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("mail error: {0}")]
    Mail(String),
    #[error("template error: {0}")]
    Template(String),
}
