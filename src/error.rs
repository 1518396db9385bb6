use thiserror::Error;

use crate::eval::EvalError;
use crate::provider::types::ProviderError;
use crate::transcript::TranscriptError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),
    // config file read/parse
    #[error("Config error: {0}")]
    Config(String),
}

pub type InternalResult<T> = Result<T, Error>;
