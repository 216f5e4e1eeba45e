use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::signal;
use tokio::sync::mpsc;

use ffsd::{AudioFormat, Config, DecodeWorker, DecoderOptions, PcmBlock, WorkerEvent};

#[derive(Parser, Debug)]
#[command(version, about = "Decode an audio stream to 48 kHz stereo and report what came out", long_about = None)]
struct Arguments {
    /// http://, https://, file:// URL or path of the stream.
    locator: String,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,

    /// Stop after this many blocks.
    #[arg(long)]
    max_blocks: Option<u64>,

    /// Corrupt packets skipped in a row before giving up.
    #[arg(long)]
    max_decode_errors: Option<u32>,

    /// HTTP read timeout in milliseconds, 0 waits forever.
    #[arg(long)]
    read_timeout_ms: Option<u64>,
}

/// Per-channel level statistics.
#[derive(Debug, Default, Serialize)]
struct ChannelLevel {
    peak: f32,
    rms: f32,
    #[serde(skip)]
    sum_squares: f64,
}

#[derive(Debug, Serialize)]
struct DrainSummary {
    locator: String,
    format: Option<AudioFormat>,
    blocks: u64,
    frames: u64,
    duration_secs: f64,
    channels: Vec<ChannelLevel>,
    completed: bool,
    error: Option<String>,
}

impl DrainSummary {
    fn new(locator: &str) -> Self {
        Self {
            locator: locator.to_string(),
            format: None,
            blocks: 0,
            frames: 0,
            duration_secs: 0.0,
            channels: Vec::new(),
            completed: false,
            error: None,
        }
    }

    fn add_block(&mut self, block: &PcmBlock) {
        if self.channels.len() < block.channels.len() {
            self.channels.resize_with(block.channels.len(), ChannelLevel::default);
        }
        for (level, samples) in self.channels.iter_mut().zip(&block.channels) {
            for &sample in samples {
                level.peak = level.peak.max(sample.abs());
                level.sum_squares += f64::from(sample) * f64::from(sample);
            }
        }
        self.blocks += 1;
        self.frames += block.frames() as u64;
    }

    fn finish(&mut self) {
        if let Some(format) = self.format {
            self.duration_secs = self.frames as f64 / f64::from(format.sample_rate.max(1));
        }
        for level in &mut self.channels {
            if self.frames > 0 {
                level.rms = (level.sum_squares / self.frames as f64).sqrt() as f32;
            }
        }
    }

    fn print_text(&self) {
        println!("locator:  {}", self.locator);
        if let Some(format) = self.format {
            println!(
                "format:   {} Hz, {} channels, {}",
                format.sample_rate,
                format.channels,
                if format.interleaved { "interleaved" } else { "planar" }
            );
        }
        println!("blocks:   {}", self.blocks);
        println!("frames:   {}", self.frames);
        println!("duration: {:.3} s", self.duration_secs);
        for (index, level) in self.channels.iter().enumerate() {
            println!("ch{}:      peak {:.4}, rms {:.4}", index, level.peak, level.rms);
        }
        match &self.error {
            Some(error) => println!("status:   failed ({})", error),
            None if self.completed => println!("status:   end of stream"),
            None => println!("status:   stopped early"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    let arguments = Arguments::parse();

    // 加载配置
    let config = Config::new().unwrap_or_default();
    log::info!("{} {} starting", config.app_name, config.app_version);

    let mut options = DecoderOptions::from(&config);
    if let Some(max) = arguments.max_decode_errors {
        options = options.with_max_consecutive_decode_errors(max);
    }
    if let Some(ms) = arguments.read_timeout_ms {
        options = options.with_read_timeout((ms > 0).then(|| Duration::from_millis(ms)));
    }

    let (tx_event, mut rx_event) = mpsc::channel::<WorkerEvent>(32);
    let mut worker = DecodeWorker::start(arguments.locator.clone(), options, tx_event)
        .context("failed to start decode worker")?;

    let mut summary = DrainSummary::new(&arguments.locator);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, stopping...");
                break;
            }

            event = rx_event.recv() => {
                match event {
                    Some(WorkerEvent::Opened(format)) => {
                        log::info!("Opened: {}Hz, {} channels", format.sample_rate, format.channels);
                        summary.format = Some(format);
                    }
                    Some(WorkerEvent::Block(block)) => {
                        summary.add_block(&block);
                        if arguments.max_blocks.is_some_and(|max| summary.blocks >= max) {
                            log::info!("Reached --max-blocks, stopping");
                            break;
                        }
                    }
                    Some(WorkerEvent::EndOfStream) => {
                        summary.completed = true;
                        break;
                    }
                    Some(WorkerEvent::Failed(error)) => {
                        summary.error = Some(error);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // The worker may be blocked on a full channel
    drop(rx_event);
    tokio::task::spawn_blocking(move || worker.stop())
        .await
        .context("decode worker did not shut down")?;

    summary.finish();
    if arguments.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print_text();
    }

    if let Some(error) = summary.error {
        anyhow::bail!("decoding {} failed: {}", arguments.locator, error);
    }
    Ok(())
}
