// ABOUTME: End-to-end peer example
// ABOUTME: Joins a coordinator, follows its play/pause commands and keeps a simulated player in sync

use clap::Parser;
use peersync::audio::adts::AdtsHeader;
use peersync::audio::{Player, TrackRef};
use peersync::protocol::messages::{ClientPlayRequest, Message};
use peersync::{
    ControlEvent, Error, ProtocolClientBuilder, StatusReporter, SyncConfig, SyncController,
    SyncEngine,
};
use std::time::Instant;
use tokio::sync::mpsc;

/// peersync peer
#[derive(Parser, Debug)]
#[command(name = "peer")]
#[command(about = "Join a peersync coordinator and play in sync", long_about = None)]
struct Args {
    /// WebSocket URL of the coordinator
    #[arg(short, long, default_value = "ws://localhost:8927/peersync")]
    server: String,

    /// Peer name
    #[arg(short, long, default_value = "peersync demo peer")]
    name: String,

    /// Ask the coordinator to play this track after joining
    #[arg(long)]
    request: Option<String>,

    /// Delay requested before the track starts
    #[arg(long, default_value_t = 3000)]
    request_delay_ms: u64,
}

/// Player that renders nothing and derives its position from wall time.
#[derive(Default)]
struct SimulatedPlayer {
    track: Option<TrackRef>,
    base_position_ms: i64,
    started_at: Option<Instant>,
    rate: f64,
}

impl SimulatedPlayer {
    fn new() -> Self {
        Self {
            rate: 1.0,
            ..Default::default()
        }
    }

    fn position_now(&self) -> i64 {
        match self.started_at {
            Some(at) => {
                self.base_position_ms + (at.elapsed().as_secs_f64() * 1000.0 * self.rate) as i64
            }
            None => self.base_position_ms,
        }
    }

    fn rebase(&mut self) {
        self.base_position_ms = self.position_now();
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }
}

impl Player for SimulatedPlayer {
    fn load(&mut self, track: &TrackRef) -> Result<(), Error> {
        println!("load {}", track);
        self.track = Some(track.clone());
        self.base_position_ms = 0;
        self.started_at = None;
        Ok(())
    }

    fn seek_to(&mut self, position_ms: i64) -> Result<(), Error> {
        println!("seek {}ms", position_ms);
        self.base_position_ms = position_ms;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn play(&mut self) -> Result<(), Error> {
        if self.track.is_none() {
            return Err(Error::Player("nothing loaded".to_string()));
        }
        println!("play from {}ms", self.base_position_ms);
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) -> Result<(), Error> {
        self.rebase();
        self.started_at = None;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        println!("stop");
        self.started_at = None;
        self.base_position_ms = 0;
        Ok(())
    }

    fn current_position_ms(&self) -> Result<i64, Error> {
        Ok(self.position_now())
    }

    fn set_rate(&mut self, rate: f64) -> Result<(), Error> {
        self.rebase();
        self.rate = rate;
        Ok(())
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = SyncConfig::from_env();

    println!("Connecting to {}...", args.server);
    let client = ProtocolClientBuilder::builder()
        .device_id(uuid::Uuid::new_v4().to_string())
        .name(args.name.clone())
        .software_version(env!("CARGO_PKG_VERSION").to_string())
        .build()
        .connect(&args.server)
        .await?;
    println!("Joined session {}", client.welcome().session_id);

    let (mut message_rx, mut audio_rx, ws_tx) = client.split();

    if let Some(track) = args.request {
        ws_tx.send_message(Message::ClientPlayRequest(ClientPlayRequest {
            track: TrackRef::from(track),
            delay_ms: args.request_delay_ms,
            start_position_ms: 0,
        }))?;
    }

    let (status, mut status_rx) = StatusReporter::channel();
    let engine = SyncEngine::with_system_clock(SimulatedPlayer::new(), config, status);
    let (event_tx, event_rx) = mpsc::channel(64);
    let controller = SyncController::new(engine, ws_tx, event_rx).spawn();

    let mut first_chunk_logged = false;
    loop {
        tokio::select! {
            msg = message_rx.recv() => {
                let Some(msg) = msg else {
                    println!("Coordinator went away");
                    break;
                };
                match msg.into_control_event() {
                    Some(event) => {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    None => log::debug!("Unhandled message"),
                }
            }
            Some(chunk) = audio_rx.recv() => {
                if !first_chunk_logged {
                    match AdtsHeader::parse(&chunk.data) {
                        Ok(parsed) => println!(
                            "Live audio: profile {} freq_idx {} channels {} ({} byte frames)",
                            parsed.header.profile,
                            parsed.header.freq_idx,
                            parsed.header.chan_cfg,
                            parsed.frame_len
                        ),
                        Err(e) => eprintln!("Unparseable live chunk: {}", e),
                    }
                    first_chunk_logged = true;
                }
            }
            Some(event) = status_rx.recv() => {
                println!("[{}]", event);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down");
                break;
            }
        }
    }

    let _ = event_tx.send(ControlEvent::Shutdown).await;
    let engine = controller.await?;
    println!("Final telemetry: {:?}", engine.telemetry());
    Ok(())
}
