use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Mutex;

use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use symphonia::core::io::MediaSource;
use url::Url;

use crate::config::DecoderOptions;
use crate::error::OpenError;

/// Forward-only `MediaSource` over the body of a blocking HTTP response.
///
/// Seeking only answers "tell" (`SeekFrom::Current(0)`) with the number of
/// bytes read so far.
pub struct HttpSource {
    // `MediaSource` needs `Sync`; the body is only touched through `&mut self`
    response: Mutex<Response>,
    position: u64,
    length: Option<u64>,
    mime_type: Option<String>,
}

impl HttpSource {
    /// Issue the GET request and check the status line.
    pub fn connect(url: &Url, options: &DecoderOptions) -> Result<Self, OpenError> {
        let mut builder = Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.read_timeout);
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;

        let response = client.get(url.as_str()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(OpenError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let length = response.content_length();
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty());

        Ok(Self {
            response: Mutex::new(response),
            position: 0,
            length,
            mime_type,
        })
    }

    pub fn content_length(&self) -> Option<u64> {
        self.length
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
}

impl Read for HttpSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let response = self
            .response
            .get_mut()
            .map_err(|_| io::Error::other("HTTP body lock poisoned"))?;
        let n = response.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for HttpSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Current(0) => Ok(self.position),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "HTTP source is not seekable",
            )),
        }
    }
}

impl MediaSource for HttpSource {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        self.length
    }
}
