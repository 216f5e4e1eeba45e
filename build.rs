use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    http: Http,
    decoder: Decoder,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Http {
    user_agent: String,
    connect_timeout_ms: u64,
    read_timeout_ms: u64,
}

#[derive(Deserialize)]
struct Decoder {
    max_consecutive_decode_errors: u32,
}

// Read config.toml at compile time and export it as environment variables
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // HTTP source
    println!("cargo:rustc-env=HTTP_USER_AGENT={}", config.http.user_agent);
    println!("cargo:rustc-env=HTTP_CONNECT_TIMEOUT_MS={}", config.http.connect_timeout_ms);
    println!("cargo:rustc-env=HTTP_READ_TIMEOUT_MS={}", config.http.read_timeout_ms);

    // Decoder
    println!(
        "cargo:rustc-env=DECODER_MAX_CONSECUTIVE_DECODE_ERRORS={}",
        config.decoder.max_consecutive_decode_errors
    );
}
