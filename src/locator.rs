//! Parsing of the locator string handed to `open`.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::OpenError;

/// A validated stream address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Remote resource fetched with a blocking HTTP(S) GET.
    Http(Url),
    /// Local file, given either as `file://` URL or as a plain path.
    File(PathBuf),
}

impl Locator {
    pub fn parse(locator: &str) -> Result<Self, OpenError> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(invalid(locator, "empty locator"));
        }

        let url = match Url::parse(trimmed) {
            Ok(url) => url,
            // Not an absolute URL, so it is a filesystem path
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Ok(Locator::File(PathBuf::from(trimmed)));
            }
            Err(e) => return Err(invalid(locator, &e.to_string())),
        };

        match url.scheme() {
            "http" | "https" => Ok(Locator::Http(url)),
            "file" => url
                .to_file_path()
                .map(Locator::File)
                .map_err(|_| invalid(locator, "file URL does not name a local path")),
            // "C:\music\a.mp3" parses with a one-letter scheme
            scheme if scheme.len() == 1 => Ok(Locator::File(PathBuf::from(trimmed))),
            scheme => Err(OpenError::UnsupportedScheme(scheme.to_string())),
        }
    }

    /// Lower-cased file extension, used as a probe hint.
    pub fn extension(&self) -> Option<String> {
        let ext = match self {
            Locator::File(path) => path.extension()?.to_str()?.to_string(),
            Locator::Http(url) => {
                let segment = url.path_segments()?.next_back()?;
                Path::new(segment).extension()?.to_str()?.to_string()
            }
        };
        Some(ext.to_ascii_lowercase())
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Locator::Http(_))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Http(url) => write!(f, "{}", url),
            Locator::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn invalid(locator: &str, reason: &str) -> OpenError {
    OpenError::InvalidLocator {
        locator: locator.to_string(),
        reason: reason.to_string(),
    }
}
