use thiserror::Error;

use crate::blob::StorageError;

/// Upload failure surfaced by the photo resolver.
///
/// This is the only error `resolve` raises, and only when the transfer of the
/// new payload itself fails. Cache lookups, cache writes and superseded-blob
/// cleanup degrade silently instead.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Erro no upload da imagem: {0}")]
    Transfer(#[from] StorageError),

    /// The local payload could not be read for transfer.
    #[error("Erro no upload da imagem: {path}: {source}")]
    UnreadableSource {
        path: String,
        source: std::io::Error,
    },
}
