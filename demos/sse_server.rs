//! Minimal event-stream server
//!
//! Run with: cargo run --example sse_server [--port PORT] [--channel NAME] [--gzip]
//!
//! ## Watching the channel
//!
//!   curl -N http://localhost:8080/events/ticks
//!   curl -N --compressed http://localhost:8080/events/ticks   # with --gzip
//!
//! ## Resuming after a disconnect
//!
//!   curl -N -H "Last-Event-ID: 5" http://localhost:8080/events/ticks
//!
//! ## Features
//!
//! - One tick event per second on the served channel
//! - Keep-alive comments every 15 seconds
//! - Reconnecting clients replay missed ticks from in-memory history
//! - Slow clients are disconnected instead of buffering indefinitely

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use sse_broker::history::MemoryHistory;
use sse_broker::sse::{self, BodyEncoding, StreamEnd};
use sse_broker::{Broker, BrokerConfig, Event};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CHANNEL: &str = "ticks";

/// Request line and the headers the stream cares about
struct Request {
    path: String,
    last_event_id: String,
    accept_encoding: Option<String>,
}

async fn read_request(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
) -> std::io::Result<Option<Request>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let (Some("GET"), Some(path)) = (parts.next(), parts.next()) else {
        return Ok(None);
    };

    let mut request = Request {
        path: path.to_string(),
        last_event_id: String::new(),
        accept_encoding: None,
    };

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }

        if let Some((name, value)) = header.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case(sse::LAST_EVENT_ID) {
                request.last_event_id = value.to_string();
            } else if name.eq_ignore_ascii_case("Accept-Encoding") {
                request.accept_encoding = Some(value.to_string());
            }
        }
    }

    Ok(Some(request))
}

async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    broker: Arc<Broker>,
) -> sse_broker::Result<()> {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    let Some(request) = read_request(&mut reader).await? else {
        return Ok(());
    };

    let Some(channel) = request.path.strip_prefix("/events/").filter(|c| !c.is_empty()) else {
        write
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
            .await?;
        return Ok(());
    };

    // Checked before writing headers so a closed broker gets a clean refusal
    if broker.is_closed() {
        write
            .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n")
            .await?;
        return Ok(());
    }

    let accept_encoding = request.accept_encoding.as_deref();
    let encoding = BodyEncoding::negotiate(broker.config(), accept_encoding);

    let mut response = String::from("HTTP/1.1 200 OK\r\n");
    for (name, value) in sse::response_headers(broker.config(), accept_encoding) {
        response.push_str(name);
        response.push_str(": ");
        response.push_str(value);
        response.push_str("\r\n");
    }
    response.push_str("\r\n");
    write.write_all(response.as_bytes()).await?;
    write.flush().await?;

    let mut subscription = broker.subscribe(channel, request.last_event_id)?;
    tracing::info!(
        peer = %peer,
        subscription = %subscription.id(),
        channel = %channel,
        last_event_id = %subscription.last_event_id(),
        encoding = ?encoding,
        "Client attached"
    );

    // Any further input or EOF from the client ends the stream
    let disconnected = async move {
        let mut buf = [0u8; 64];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    };

    let end = sse::stream_events(&mut subscription, &mut write, encoding, disconnected).await?;
    tracing::info!(peer = %peer, end = ?end, "Client detached");
    if end == StreamEnd::Closed {
        let _ = write.shutdown().await;
    }

    Ok(())
}

async fn run_ticker(broker: Arc<Broker>, history: MemoryHistory, channel: String) {
    let mut ticks = tokio::time::interval(Duration::from_secs(1));
    let mut tick: u64 = 0;

    loop {
        ticks.tick().await;
        tick += 1;

        let event = Event::new(format!("{{\"tick\":{}}}", tick))
            .with_id(tick.to_string())
            .with_event("tick");
        history.record(channel.as_str(), event.clone()).await;

        if broker.publish([channel.as_str()], event).is_err() {
            break;
        }
        if tick % 15 == 0 && broker.publish_comment([channel.as_str()], "keep-alive").is_err() {
            break;
        }
    }
}

async fn accept_loop(listener: TcpListener, broker: Arc<Broker>) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                let _ = socket.set_nodelay(true);
                let broker = Arc::clone(&broker);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(socket, peer, broker).await {
                        tracing::debug!(peer = %peer, error = %e, "Connection error");
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

/// Command line options
struct Options {
    port: u16,
    channel: String,
    gzip: bool,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>, String> {
        let mut options = Options {
            port: DEFAULT_PORT,
            channel: DEFAULT_CHANNEL.to_string(),
            gzip: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(None),
                "--gzip" => options.gzip = true,
                "--port" => {
                    let value = args.next().ok_or("--port needs a value")?;
                    options.port = value
                        .parse()
                        .map_err(|_| format!("Invalid port: '{}'", value))?;
                }
                "--channel" => {
                    let value = args.next().ok_or("--channel needs a value")?;
                    if value.is_empty() || value.contains('/') {
                        return Err(format!("Invalid channel name: '{}'", value));
                    }
                    options.channel = value;
                }
                other => return Err(format!("Unknown argument: '{}'", other)),
            }
        }

        Ok(Some(options))
    }
}

fn print_usage() {
    eprintln!("Usage: sse_server [--port PORT] [--channel NAME] [--gzip]");
    eprintln!();
    eprintln!("  --port PORT      Port to listen on (default: {})", DEFAULT_PORT);
    eprintln!("  --channel NAME   Channel the ticker publishes to (default: {})", DEFAULT_CHANNEL);
    eprintln!("  --gzip           Compress streams for clients that accept gzip");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sse_broker=debug".parse()?)
                .add_directive("sse_server=debug".parse()?),
        )
        .init();

    let config = BrokerConfig::default().allow_cors(true).gzip(options.gzip);
    let broker = Arc::new(Broker::with_config(config));
    let history = MemoryHistory::with_limits(300, 1024 * 1024);
    broker.register(options.channel.as_str(), history.clone())?;

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], options.port));
    let listener = TcpListener::bind(bind_addr).await?;
    println!("Streaming on http://{}/events/{}", bind_addr, options.channel);

    let ticker = tokio::spawn(run_ticker(Arc::clone(&broker), history, options.channel));

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&broker)) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    broker.close().await;
    ticker.abort();

    Ok(())
}
