//! Record from the default microphone for a few seconds, printing the level
//! meter and a block summary.
//!
//! Usage: `mic-meter [seconds]` (default 5). Logging follows `RUST_LOG`.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use media_capture_core::{AudioEvent, AudioPlatform, AudioRecorder, RecorderConfig};
use media_capture_native::{CpalDeviceEnumerator, CpalMicrophone, SoftwareContextService, TokioRefreshScheduler};

const METER_WIDTH: usize = 40;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let seconds: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 5,
    };

    let devices = CpalDeviceEnumerator;
    for device in devices.list_capture_devices()? {
        log::info!("Input device: {} ({})", device.label, device.id);
    }

    let recorder = AudioRecorder::new(
        RecorderConfig::default(),
        AudioPlatform {
            microphone: Arc::new(CpalMicrophone::default_device()),
            contexts: Arc::new(SoftwareContextService),
            scheduler: Arc::new(TokioRefreshScheduler::new()?),
        },
    )?;
    let mut events = recorder.subscribe();
    recorder.start().await?;

    let mut blocks = 0usize;
    let mut bytes = 0usize;
    let mut peak = 0.0f32;
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Ok(AudioEvent::Data(block)) => {
                    blocks += 1;
                    bytes += block.as_bytes().len();
                }
                Ok(AudioEvent::Volume(level)) => {
                    peak = peak.max(level);
                    let filled = ((level * METER_WIDTH as f32) as usize).min(METER_WIDTH);
                    print!("\r[{:<width$}] {:.2}", "#".repeat(filled), level, width = METER_WIDTH);
                    std::io::stdout().flush()?;
                }
                Ok(AudioEvent::Error(e)) => log::warn!("{}", e),
                Ok(AudioEvent::State(state)) if state.is_idle() => {
                    log::warn!("Recording ended early");
                    break;
                }
                Ok(AudioEvent::State(_)) => {}
                Err(RecvError::Lagged(skipped)) => log::debug!("Meter lagged by {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    }

    recorder.stop().await;
    println!();
    println!(
        "{} blocks, {} bytes of 16-bit PCM at {} Hz, peak level {:.2}",
        blocks,
        bytes,
        recorder.config().sample_rate,
        peak
    );
    Ok(())
}
