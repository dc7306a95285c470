// ABOUTME: Capture probe example
// ABOUTME: Opens the default input device and reports the PCM byte rate it delivers

use clap::Parser;
use peersync::audio::{CaptureSource, CpalCapture, PcmFormat};
use std::time::{Duration, Instant};

/// Measure microphone capture throughput
#[derive(Parser, Debug)]
#[command(name = "capture_probe")]
#[command(about = "Read PCM from the default input device", long_about = None)]
struct Args {
    /// Input device name (default input if omitted)
    #[arg(short, long)]
    device: Option<String>,

    /// Seconds to capture
    #[arg(short, long, default_value_t = 5)]
    seconds: u64,

    /// Sample rate to request
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let format = PcmFormat {
        sample_rate: args.sample_rate,
        ..PcmFormat::default()
    };

    let mut capture = match args.device {
        Some(name) => CpalCapture::with_device(name),
        None => CpalCapture::new(),
    };
    capture.start(&format, 8192)?;

    let expected = format.sample_rate as usize * format.bytes_per_frame();
    let mut buf = vec![0u8; 4096];
    let started = Instant::now();
    let mut window_start = Instant::now();
    let mut window_bytes = 0usize;
    let mut peak = 0i16;

    while started.elapsed() < Duration::from_secs(args.seconds) {
        let read = capture.read(&mut buf)?;
        window_bytes += read;
        for sample in buf[..read].chunks_exact(2) {
            peak = peak.max(i16::from_le_bytes([sample[0], sample[1]]).saturating_abs());
        }

        if window_start.elapsed() >= Duration::from_secs(1) {
            println!(
                "{} bytes/s (expected {}), peak {}, overruns {}",
                window_bytes,
                expected,
                peak,
                capture.overruns()
            );
            window_start = Instant::now();
            window_bytes = 0;
            peak = 0;
        }
    }

    capture.stop()?;
    Ok(())
}
