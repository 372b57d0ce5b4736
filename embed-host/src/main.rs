// Embed handshake host: runs one embed session against a page-wide message bus.
// Each stdin line is posted to the bus as a raw payload (what the framed peer
// would send); presentation changes are printed to stdout, logs go to stderr.

use std::time::Duration;

use anyhow::{bail, Context};
use embed_core::{encode_message, nonce_from_location, EmbedMessage, EmbedState, Presentation};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use embed_host::bus::MessageBus;
use embed_host::config;
use embed_host::embed::Embed;
use embed_host::session::{SessionEvent, SessionSettings};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, PartialEq)]
struct Args {
    version: bool,
    source: Option<String>,
    simulate_ready: Option<Duration>,
    simulate_height: Option<u32>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<Args> {
    let mut out = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => out.version = true,
            "--source" => out.source = Some(args.next().context("--source needs a value")?),
            "--simulate-ready" => {
                let ms: u64 = args
                    .next()
                    .context("--simulate-ready needs milliseconds")?
                    .parse()
                    .context("--simulate-ready expects milliseconds")?;
                out.simulate_ready = Some(Duration::from_millis(ms));
            }
            "--simulate-height" => {
                let px: u32 = args
                    .next()
                    .context("--simulate-height needs pixels")?
                    .parse()
                    .context("--simulate-height expects pixels")?;
                out.simulate_height = Some(px);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(out)
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.version {
        println!("embed-host {}", VERSION);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = config::load();
    if let Some(source) = args.source.clone() {
        cfg.source = Some(source);
    }
    let Some(source) = cfg.source.clone() else {
        bail!("no embed source configured (use --source, EMBED_SOURCE or the config file)");
    };

    // Single-threaded: the session's handlers run on one task and never race.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    rt.block_on(run(source, cfg.settings(), args))
}

async fn run(source: String, settings: SessionSettings, args: Args) -> anyhow::Result<()> {
    let bus = MessageBus::new();
    let mut embed = Embed::new(bus.clone(), settings);
    let location = embed.mount(&source).target_location().to_string();
    println!("load {}", location);
    if let Some(p) = embed.presentation() {
        println!("{}", render(p));
    }

    if let Some(delay) = args.simulate_ready {
        tokio::spawn(simulated_peer(
            bus.clone(),
            location.clone(),
            delay,
            args.simulate_height,
        ));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = embed.next_event() => match event {
                Some(SessionEvent::Rendered(p)) => println!("{}", render(p)),
                Some(_) => {}
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !line.trim().is_empty() {
                        bus.post(line);
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(target: "embed.host", error = %e, "stdin read failed");
                    stdin_open = false;
                }
            },
            res = &mut shutdown => {
                res?;
                info!(target: "embed.host", "shutting down");
                break;
            }
        }
        // Nothing else can reach a settled session once input is exhausted.
        let settled = embed
            .presentation()
            .map_or(true, |p| p.state.is_terminal());
        if !stdin_open && settled {
            break;
        }
    }
    embed.unmount();
    Ok(())
}

fn render(p: Presentation) -> String {
    match p.state {
        EmbedState::Loading => "loading".to_string(),
        EmbedState::Ready => format!("ready height={}px", p.height),
        EmbedState::TimedOut => "error: integration load timeout".to_string(),
    }
}

/// In-process stand-in for the framed peer: reads its nonce from the location it
/// was loaded from and reports ready after `delay`.
async fn simulated_peer(bus: MessageBus, location: String, delay: Duration, height: Option<u32>) {
    let Some(nonce) = nonce_from_location(&location) else {
        warn!(target: "embed.host", "simulated peer found no nonce in location");
        return;
    };
    tokio::time::sleep(delay).await;
    match encode_message(&EmbedMessage::ready(nonce, height)) {
        Ok(raw) => {
            bus.post(raw);
        }
        Err(e) => warn!(target: "embed.host", error = %e, "simulated peer failed to encode"),
    }
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("waiting for Ctrl+C")?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    }
    Ok(())
}
