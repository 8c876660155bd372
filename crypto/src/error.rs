use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("EcdsaError {0}")]
    EcdsaError(#[from] k256::ecdsa::Error),
    #[error("invalid signature length {0}, expected 65")]
    InvalidSignatureLength(usize),
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("RSVInvalid")]
    RSVInvalid,
    #[error("`{0}`")]
    HexError(#[from] hex::FromHexError),
}
