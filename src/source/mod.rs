//! Byte sources feeding the demuxer.
//!
//! Local files are plain seekable [`std::fs::File`]s. HTTP(S) bodies are read
//! forward-only through [`HttpSource`].

mod http;

use std::fs::File;

use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;

use crate::config::DecoderOptions;
use crate::error::OpenError;
use crate::locator::Locator;

pub use http::HttpSource;

/// An opened byte source plus what is known about its format.
pub struct OpenedSource {
    pub source: Box<dyn MediaSource>,
    pub hint: Hint,
}

/// Acquire the I/O resource behind `locator`.
///
/// Nothing stays open when this fails.
pub fn open_source(locator: &Locator, options: &DecoderOptions) -> Result<OpenedSource, OpenError> {
    let mut hint = Hint::new();
    if let Some(ext) = locator.extension() {
        hint.with_extension(&ext);
    }

    let source: Box<dyn MediaSource> = match locator {
        Locator::File(path) => {
            let file = File::open(path)?;
            log::debug!("Opened file source {}", path.display());
            Box::new(file)
        }
        Locator::Http(url) => {
            let source = HttpSource::connect(url, options)?;
            if let Some(mime) = source.mime_type() {
                hint.mime_type(mime);
            }
            log::debug!(
                "Opened HTTP source {} (length: {:?}, type: {:?})",
                url,
                source.content_length(),
                source.mime_type()
            );
            Box::new(source)
        }
    };

    Ok(OpenedSource { source, hint })
}
