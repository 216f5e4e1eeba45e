//! Error taxonomy of the decoder boundary.
//!
//! Opening and decoding fail in different ways and the caller reacts to them
//! differently, so they are kept as two types. End of stream is not an error
//! and is reported through [`DecodeStatus`](crate::DecodeStatus).

use std::io;

use thiserror::Error;

/// Why a locator could not be turned into a live stream handle.
///
/// No handle and no resources exist after any of these.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("invalid locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },
    #[error("unsupported scheme {0:?} (expected http, https or file)")]
    UnsupportedScheme(String),
    #[error("unable to open input: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP server answered {status} for {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("unrecognised container format: {0}")]
    UnsupportedFormat(String),
    #[error("stream contains no decodable audio track")]
    NoAudioTrack,
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),
}

/// Why a decode step failed.
///
/// A failure ends decoding for the handle; closing it stays valid.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O failure while reading the stream: {0}")]
    Io(#[source] io::Error),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("gave up after {0} corrupt packets in a row")]
    TooManyCorruptPackets(u32),
    #[error("the stream already failed and cannot be decoded further")]
    Terminated,
}
