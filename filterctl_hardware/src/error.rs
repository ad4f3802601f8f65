use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
