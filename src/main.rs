use std::collections::HashMap;
use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use clap::{Args, Parser, Subcommand};
use rand::RngCore;
use tokio::task::JoinHandle;
use tracing::Level;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use jizhi_stream::jzst::auth::AuthManager;
use jizhi_stream::jzst::control::{
    ControlClient, ControlConnection, ControlServer, ControlServerConfig,
};
use jizhi_stream::jzst::discovery::{DeviceInfo, DiscoveryConfig, DiscoveryService};
use jizhi_stream::jzst::protocol::StreamConfig;
use jizhi_stream::jzst::protocol::constants::{CONTROL_PORT, STREAM_PORT};
use jizhi_stream::jzst::session::{FrameSink, ScreenCapture, SessionOptions, StreamSession};
use jizhi_stream::jzst::transport::{FrameReceiver, FrameReceiverConfig};

/// LAN screen streaming peer
#[derive(Parser, Debug)]
#[command(name = "jizhi-stream")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Announce this device and serve stream requests with a test pattern
    Host(HostArgs),
    /// Authenticate to a host, request a stream and receive frames
    Connect(ConnectArgs),
    /// List devices announcing themselves on the LAN
    Discover(DiscoverArgs),
}

#[derive(Args, Debug)]
struct HostArgs {
    /// Shared passphrase peers must prove
    #[arg(short, long)]
    secret: String,

    /// Name announced to other peers
    #[arg(short, long, default_value = "JizhiStream")]
    name: String,
}

#[derive(Args, Debug)]
struct ConnectArgs {
    /// Address of the host
    host: IpAddr,

    #[arg(short, long)]
    secret: String,

    #[arg(long, default_value_t = CONTROL_PORT)]
    control_port: u16,

    /// Local port frames are received on
    #[arg(long, default_value_t = STREAM_PORT)]
    stream_port: u16,

    #[arg(long, default_value_t = 1920)]
    width: u32,

    #[arg(long, default_value_t = 1080)]
    height: u32,

    #[arg(long, default_value_t = 60)]
    fps: u32,
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// How long to listen before printing the device list
    #[arg(short, long, default_value_t = 6)]
    seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
    let filter_layer = filter::LevelFilter::from_level(level);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter_layer)
        .init();

    match cli.command {
        Command::Host(args) => host(args).await,
        Command::Connect(args) => connect(args).await,
        Command::Discover(args) => discover(args).await,
    }
}

async fn host(args: HostArgs) -> Result<(), Box<dyn Error>> {
    let discovery = DiscoveryService::start(
        DiscoveryConfig::builder().device_name(args.name.clone()).build(),
        |device: &DeviceInfo| {
            tracing::info!("Found {} ({}) at {}", device.name, device.platform, device.ip);
        },
    )
    .await?;

    // One live session per control connection, stopped when it closes.
    let sessions: Arc<tokio::sync::Mutex<HashMap<SocketAddr, StreamSession>>> = Arc::default();
    let handler_sessions = sessions.clone();
    let server = ControlServer::bind(
        ControlServerConfig::default(),
        Arc::new(AuthManager::new(&args.secret)),
        move |config: StreamConfig, conn: ControlConnection| {
            let sessions = handler_sessions.clone();
            tokio::spawn(async move {
                let peer = conn.peer_addr();
                tracing::info!("[{}] Stream requested: {}", peer, config);
                let capture: Arc<dyn ScreenCapture> = Arc::new(TestPattern::default());
                let session =
                    match StreamSession::start(capture, config, &conn, SessionOptions::default())
                        .await
                    {
                        Ok(session) => session,
                        Err(e) => {
                            tracing::error!("[{}] Failed to start session: {}", peer, e);
                            return;
                        }
                    };
                // A repeated START_STREAM on the same connection replaces the session.
                let watch = sessions.lock().await.insert(peer, session).is_none();
                if !watch {
                    return;
                }

                conn.closed().await;
                if let Some(session) = sessions.lock().await.remove(&peer) {
                    session.stop();
                    tracing::info!("[{}] Control connection closed, stream stopped", peer);
                }
            });
        },
    )
    .await?;

    tracing::info!(
        "Hosting as {:?}: control on {}, discovery on {}",
        args.name,
        server.local_addr(),
        discovery.local_addr()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    for (_, session) in sessions.lock().await.drain() {
        session.stop();
    }
    server.stop();
    discovery.stop();
    Ok(())
}

async fn connect(args: ConnectArgs) -> Result<(), Box<dyn Error>> {
    let frames = Arc::new(AtomicU64::new(0));
    let counter = frames.clone();
    let receiver = FrameReceiver::bind(
        FrameReceiverConfig::builder()
            .bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.stream_port)))
            .build(),
        move |frame: Bytes, timestamp: u64| {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(frame = n, len = frame.len(), timestamp, "frame received");
        },
    )
    .await?;

    let host = SocketAddr::new(args.host, args.control_port);
    let mut client = ControlClient::new(Arc::new(AuthManager::new(&args.secret)));
    if !client.connect(host).await {
        return Err(format!("could not authenticate to {}", host).into());
    }
    tracing::info!("Authenticated to {}", host);

    let config = StreamConfig {
        width: args.width,
        height: args.height,
        fps: args.fps,
        ..StreamConfig::default()
    };
    if !client.request_stream(&config).await {
        return Err("stream request failed".into());
    }
    tracing::info!("Requested {}; receiving on {}", config, receiver.local_addr());

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    let mut last = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let total = frames.load(Ordering::Relaxed);
                tracing::info!("{} frames ({} in the last 5s)", total, total - last);
                last = total;
                if !client.heartbeat().await {
                    tracing::warn!("Host stopped answering heartbeats");
                    break;
                }
            }
        }
    }

    client.stop_stream().await;
    client.disconnect().await;
    receiver.stop();
    Ok(())
}

async fn discover(args: DiscoverArgs) -> Result<(), Box<dyn Error>> {
    let service = DiscoveryService::start(DiscoveryConfig::default(), |device: &DeviceInfo| {
        tracing::info!("Found {} ({}) at {}", device.name, device.platform, device.ip);
    })
    .await?;

    tokio::time::sleep(Duration::from_secs(args.seconds)).await;
    service.stop();

    let mut devices = service.devices();
    devices.sort_by_key(|device| device.ip);
    for device in devices {
        println!("{}\t{}\t{}:{}", device.name, device.platform, device.ip, device.control_port);
    }
    Ok(())
}

/// Synthetic capture source: a moving gradient band plus a strip of noise,
/// sized like a lightly compressed frame of the requested resolution.
#[derive(Default)]
struct TestPattern {
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ScreenCapture for TestPattern {
    fn start(&self, width: u32, height: u32, fps: u32, on_frame: FrameSink) {
        self.stop();
        self.running.store(true, Ordering::Release);

        let frame_len = (width as usize * height as usize / 20).max(64);
        let period = Duration::from_secs(1) / fps.max(1);
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut tick: u32 = 0;
            while running.load(Ordering::Acquire) {
                ticker.tick().await;
                on_frame(render(frame_len, tick));
                tick = tick.wrapping_add(1);
            }
        });
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(task) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

fn render(len: usize, tick: u32) -> Bytes {
    let mut frame = BytesMut::with_capacity(len);
    frame.put_u32(tick);
    let noise_start = len - len / 8;
    while frame.len() < noise_start {
        frame.put_u8((frame.len() as u32).wrapping_add(tick) as u8);
    }
    let mut noise = vec![0u8; len - frame.len()];
    rand::rng().fill_bytes(&mut noise);
    frame.put_slice(&noise);
    frame.truncate(len);
    frame.freeze()
}
