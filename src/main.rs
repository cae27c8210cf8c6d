//! Entry point: runs the server or the interactive client.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use memora::commands::CommandHandler;
use memora::connection::{handle_connection, ConnectionStats};
use memora::storage::{snapshot, start_expiry_sweeper, start_snapshot_writer, DataStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Server,
    Client,
}

#[derive(Parser, Debug)]
#[command(
    name = "memora",
    version,
    about = "Memora, an in-memory key/value server speaking the Redis protocol"
)]
struct Args {
    /// Run as a server or as an interactive client.
    #[arg(long, value_enum, default_value = "server")]
    mode: Mode,

    /// Address to bind (server) or connect to (client).
    #[arg(long, default_value = memora::DEFAULT_HOST)]
    host: String,

    /// Port to listen on or connect to.
    #[arg(long, default_value_t = memora::DEFAULT_PORT)]
    port: u16,

    /// Snapshot file loaded at startup and rewritten periodically.
    #[arg(long, value_name = "FILE", default_value = snapshot::SNAPSHOT_FILE)]
    snapshot: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    match args.mode {
        Mode::Server => run_server(args).await,
        Mode::Client => memora::client::run(&args.host, args.port).await,
    }
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    let store = Arc::new(DataStore::new());

    match snapshot::load(&store, &args.snapshot) {
        Ok(true) => info!(
            path = %args.snapshot.display(),
            keys = store.len(),
            "snapshot loaded"
        ),
        Ok(false) => info!("no snapshot found, starting empty"),
        Err(e) => warn!(error = %e, "could not load snapshot, starting empty"),
    }

    let _sweeper = start_expiry_sweeper(Arc::clone(&store));
    let _snapshotter = start_snapshot_writer(Arc::clone(&store), args.snapshot.clone());

    let stats = Arc::new(ConnectionStats::new());
    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    print_banner(&addr);
    info!("listening on {}", addr);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&store), stats, shutdown_tx.clone()) => {}
        _ = signal::ctrl_c() => {
            info!("shutdown signal received, stopping server");
        }
    }

    // The listener is gone with the accept loop; now tell every
    // tracked connection to close.
    let _ = shutdown_tx.send(());

    info!("server shutdown complete");
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    store: Arc<DataStore>,
    stats: Arc<ConnectionStats>,
    shutdown_tx: broadcast::Sender<()>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&store));
                let stats = Arc::clone(&stats);
                let shutdown_rx = shutdown_tx.subscribe();

                tokio::spawn(handle_connection(stream, addr, handler, stats, shutdown_rx));
            }
            Err(e) => {
                error!("failed to accept connection: {}", e);
            }
        }
    }
}

fn print_banner(addr: &str) {
    println!(
        r#"
Memora v{}, an in-memory key/value server
Listening on {}
Connect with redis-cli or `memora --mode=client`.
Use Ctrl+C to shut down.
"#,
        memora::VERSION,
        addr
    );
}
