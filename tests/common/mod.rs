//! Fixtures for the integration tests: generated WAV audio, temp files and a
//! local HTTP server.
#![allow(dead_code)]

#[path = "../../src/test_util.rs"]
mod test_util;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use axum::Router;
use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use axum::routing::get;

pub use test_util::{TempFile, generate_sine_wav};

/// HTTP server on a background thread serving one audio file.
///
/// - `/audio.wav` - the file, typed `audio/wav`
/// - `/live`      - the same bytes without an extension in the path
/// - `/truncated` - the first half of the bytes, announced with the full length
/// - anything else answers 404
pub struct AudioServer {
    addr: SocketAddr,
}

impl AudioServer {
    pub fn start(audio_data: Vec<u8>) -> Self {
        let audio_data = Arc::new(audio_data);
        let live_data = Arc::clone(&audio_data);
        let truncated_data = Arc::clone(&audio_data);
        let router = Router::new()
            .route(
                "/audio.wav",
                get(move || {
                    let data = Arc::clone(&audio_data);
                    async move {
                        (
                            StatusCode::OK,
                            [(header::CONTENT_TYPE, "audio/wav")],
                            data.as_ref().clone(),
                        )
                    }
                }),
            )
            .route(
                "/live",
                get(move || {
                    let data = Arc::clone(&live_data);
                    async move { (StatusCode::OK, data.as_ref().clone()) }
                }),
            )
            .route(
                "/truncated",
                get(move || {
                    let data = Arc::clone(&truncated_data);
                    async move {
                        Response::builder()
                            .header(header::CONTENT_LENGTH, data.len())
                            .body(Body::from(data[..data.len() / 2].to_vec()))
                            .unwrap()
                    }
                }),
            );

        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        thread::Builder::new()
            .name("test-http".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                    addr_tx.send(listener.local_addr().unwrap()).unwrap();
                    axum::serve(listener, router).await.unwrap();
                });
            })
            .unwrap();

        Self {
            addr: addr_rx.recv().unwrap(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}
