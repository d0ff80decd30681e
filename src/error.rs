//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della libreria.
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Image`: Errori del codec integrato (`image` crate)
//! - `UnsupportedFormat`: Estensione senza motore registrato
//! - `Decode`: Il codec integrato non riesce a leggere il sorgente
//! - `Encode`: Il codec integrato non riesce a scrivere l'output
//! - `Validation` / `Config`: Parametri della richiesta non validi
//!
//! Tool mancanti o falliti NON sono errori: la catena passa al livello
//! successivo e infine al codec integrato. Anche un output più grande del
//! sorgente non è un errore (lo corregge il size guard).
//!
//! ## Esempio:
//! ```rust
//! use imgcompress::CompressError;
//!
//! let err = CompressError::UnsupportedFormat("tiff".to_string());
//! assert_eq!(err.to_string(), "unsupported format: tiff");
//! ```

/// Custom error types for image compression
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CompressError {
    /// Wraps a decoder failure, keeping the decoder's own message.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    /// Wraps an encoder failure, keeping the encoder's own message.
    pub fn encode(err: impl std::fmt::Display) -> Self {
        Self::Encode(err.to_string())
    }
}

pub type Result<T, E = CompressError> = std::result::Result<T, E>;
