// main.rs

use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use metrics::{get_metrics, install_global, MetricsBuilder, PipelineGauges};
use tokio::{runtime, time as tokioTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, Layer};

mod config;
mod error;
mod generators;
mod handlers;
mod ingress;
mod router;
mod services;
mod types;

use config::{Args, LogLevel, SessionConfig};
use generators::SyntheticSource;
use ingress::{encoder_channel, EncoderReceiver, DEFAULT_FEED_CAPACITY};
use services::session::{DashWebmStreaming, EncoderFeeds, StreamingStrategy};
use types::AppState;

#[instrument(skip_all)]
fn main() -> Result<(), Box<dyn std::error::Error>> {

    // Parse command-line arguments
    let args = Args::parse();

    // Build the FmtSubscriber layer
    let fmt_layer = tracing_subscriber::fmt::layer()
        .pretty()
        .compact()
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_filter(match args.log_level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        });

    // Initialize console tracing if enabled
    #[cfg(feature = "console-tracing")]
    let subscriber = {
        let console_layer = console_subscriber::ConsoleLayer::builder()
            .retention(std::time::Duration::from_secs(60))
            .server_addr(([127, 0, 0, 1], 5556))
            .spawn();
        let tracy_layer = tracing_tracy::TracyLayer::default();
        tracing_subscriber::registry()
            .with(console_layer)
            .with(tracy_layer)
            .with(fmt_layer)
    };

    #[cfg(not(feature = "console-tracing"))]
    let subscriber = {
        tracing_subscriber::registry()
            .with(fmt_layer)
    };

    tracing::subscriber::set_global_default(subscriber)?;

    info!("{:?}", args);
    let config = SessionConfig::load(&args)?;

    let runtime = runtime::Builder::new_multi_thread()
        .thread_name_fn(|| {
            static ATOMIC_WORKER_ID: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
            let id = ATOMIC_WORKER_ID.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            format!("MAIN_R w-{}", id)
        })
        .enable_all()
        .build()?;

    // Process gauges are refreshed by the update loop, pipeline gauges by the session
    let metrics = MetricsBuilder::new().add_label("mode", "server").build()?;
    install_global(metrics)?;
    let pipeline = get_metrics().map(|metrics| metrics.pipeline().clone());
    runtime.spawn(update_metrics_loop());

    runtime.block_on(run(config, pipeline))
}

async fn run(
    config: SessionConfig,
    pipeline: Option<PipelineGauges>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = DashWebmStreaming::new(config.clone());
    if let Some(pipeline) = pipeline {
        session = session.with_metrics(pipeline);
    }
    let session = Arc::new(session);
    session.start().await?;

    // Synthetic capture stands in for the platform encoders
    let sources = CancellationToken::new();
    let video = spawn_source(SyntheticSource::video(&config), &sources);
    let audio = config
        .record_audio
        .then(|| spawn_source(SyntheticSource::audio(&config), &sources));

    let streaming = {
        let session = session.clone();
        tokio::spawn(async move { session.encode_and_publish(EncoderFeeds { video, audio }).await })
    };

    let app = router::create_router(AppState {
        session: session.clone(),
    });
    let listener = bind_listener(config.port)?;
    info!(
        "Serving {:?} on http://0.0.0.0:{}/",
        config.output_dir, config.port
    );

    let shutdown = {
        let session = session.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Shutting down");
            session.stop().await;
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    sources.cancel();
    if let Err(e) = streaming.await? {
        error!("Streaming session ended with an error: {}", e);
        return Err(e.into());
    }
    Ok(())
}

fn spawn_source(source: SyntheticSource, cancel: &CancellationToken) -> EncoderReceiver {
    let (sender, receiver) = encoder_channel(source.kind, DEFAULT_FEED_CAPACITY);
    let cancel = cancel.clone();
    tokio::spawn(async move {
        let kind = sender.kind();
        let frames = source.run(sender, cancel).await;
        debug!("{} source stopped after {} frames", kind, frames);
    });
    receiver
}

fn bind_listener(port: u16) -> std::io::Result<tokio::net::TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let sock = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM, // Will become SOCK_CLOEXEC internally on Linux
        None,
    )?;

    sock.set_reuse_address(true)?;
    #[cfg(unix)]
    sock.set_reuse_port(true)?;
    sock.set_nonblocking(true)?;
    sock.bind(&addr.into())?;
    sock.listen(1024)?;

    tokio::net::TcpListener::from_std(sock.into())
}

#[instrument(skip_all)]
async fn update_metrics_loop() {
    let mut interval = tokioTime::interval(tokioTime::Duration::from_secs(1));
    loop {
        interval.tick().await;
        let Some(metrics) = get_metrics() else {
            return;
        };
        match metrics.update() {
            Ok(()) => debug!("Metrics updated"),
            Err(e) => warn!("Failed to update metrics: {}", e),
        }
    }
}
