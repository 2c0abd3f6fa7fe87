//! FriendRadar CLI entry point

use anyhow::{Context, Result};
use friendradar::config::{cli::Cli, toml::load_config, validator::validate_config, Config};
use friendradar::display::{self, MapView};
use friendradar::fetcher::HttpFetcher;
use friendradar::poll::{PollEvent, PollHandle, PollLoop};
use friendradar::registry::LocationRegistry;
use std::future::Future;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    let config = load_config(&cli)?;
    validate_config(&config).context("Configuration validation failed")?;

    friendradar::logging::init_logging(&config.logging.level)?;

    println!("FriendRadar v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("{}", config);

    if cli.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    // The only fatal error: an unusable endpoint stops us before anything runs
    let fetcher = HttpFetcher::new(&config.endpoint.url, config.fetch_timeout())
        .context("Cannot poll endpoint")?;
    let registry = Arc::new(LocationRegistry::new(config.reference));

    // Poll work runs on the worker threads; block_on keeps the foreground on main
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("friendradar-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    if cli.once {
        runtime.block_on(run_once(fetcher, registry))
    } else {
        runtime.block_on(run_interactive(fetcher, registry, &config))
    }
}

/// Single headless poll cycle
async fn run_once(fetcher: HttpFetcher, registry: Arc<LocationRegistry>) -> Result<()> {
    let poll = PollLoop::new(fetcher, Arc::clone(&registry));

    let count = tokio::spawn(async move { poll.poll_once().await })
        .await
        .context("Poll task failed")?
        .context("Poll failed")?;

    println!();
    println!("{} friends found", count);

    let mut view = MapView::new();
    view.on_data_changed();
    print_markers(&view, &registry);
    println!("{}", view.closest_message(&registry));

    Ok(())
}

/// Interactive session: background polling plus a stdin command loop
async fn run_interactive(
    fetcher: HttpFetcher,
    registry: Arc<LocationRegistry>,
    config: &Config,
) -> Result<()> {
    let (tx, events) = mpsc::unbounded_channel();
    let handle = PollLoop::new(fetcher, Arc::clone(&registry))
        .with_events(tx)
        .start(config.poll_interval());

    let input = spawn_stdin_reader().context("Failed to start stdin reader")?;
    let mut view = MapView::new();

    println!();
    print_help();

    let exit = command_loop(
        input,
        events,
        tokio::signal::ctrl_c(),
        &mut view,
        &registry,
        &handle,
    )
    .await?;
    tracing::debug!(exit = ?exit, "Command loop finished");

    handle.stop();
    handle.join().await.context("Poll loop task failed")?;

    Ok(())
}

/// Forward stdin lines from a plain thread, left detached at exit
fn spawn_stdin_reader() -> std::io::Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("friendradar-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        })?;

    Ok(rx)
}

/// Why the command loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Quit,
    InputClosed,
    Interrupted,
}

/// Dispatch commands and poll events until quit, end of input or `shutdown`
///
/// `shutdown` is pinned once and polled across iterations.
async fn command_loop<S>(
    mut input: mpsc::UnboundedReceiver<String>,
    mut events: mpsc::UnboundedReceiver<PollEvent>,
    shutdown: S,
    view: &mut MapView,
    registry: &LocationRegistry,
    handle: &PollHandle,
) -> Result<Exit>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else {
                    return Ok(Exit::InputClosed);
                };
                match Command::parse(&line) {
                    Some(Command::Quit) => return Ok(Exit::Quit),
                    Some(command) => execute(command, view, registry, handle),
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command '{}' (try 'help')", line.trim()),
                }
            }
            Some(event) = events.recv() => on_event(event, view),
            signal = &mut shutdown => {
                signal.context("Failed to listen for Ctrl-C")?;
                println!();
                handle.interrupt();
                return Ok(Exit::Interrupted);
            }
        }
    }
}

/// Foreground commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    List,
    Closest,
    Toggle,
    Me,
    Status,
    Help,
    Quit,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "list" | "ls" => Some(Self::List),
            "closest" | "nearest" => Some(Self::Closest),
            "toggle" => Some(Self::Toggle),
            "me" | "findme" => Some(Self::Me),
            "status" => Some(Self::Status),
            "help" | "?" => Some(Self::Help),
            "quit" | "exit" | "q" => Some(Self::Quit),
            _ => None,
        }
    }
}

fn execute(command: Command, view: &mut MapView, registry: &LocationRegistry, handle: &PollHandle) {
    match command {
        Command::List => print_markers(view, registry),
        Command::Closest => println!("{}", view.closest_message(registry)),
        Command::Toggle => {
            let visible = view.toggle_visibility();
            println!("{}", display::visibility_message(visible));
        }
        Command::Me => {
            println!("{}", display::recenter_message());
            println!("  {}", registry.reference());
        }
        Command::Status => print_status(view, registry, handle),
        Command::Help => print_help(),
        Command::Quit => {}
    }
}

fn on_event(event: PollEvent, view: &mut MapView) {
    match event {
        PollEvent::DataChanged { entities: Some(count) } => {
            view.on_data_changed();
            println!("[update] {} friends loaded", count);
        }
        PollEvent::DataChanged { entities: None } => {
            view.on_data_changed();
            println!("[update] Feed rejected, keeping previous friends");
        }
        PollEvent::NoResponse { url, status } => {
            println!("[notice] No response from '{}' (status {})", url, status);
        }
        PollEvent::Stopped { reason } => {
            println!("[notice] Polling stopped ({:?})", reason);
        }
    }
}

fn print_markers(view: &MapView, registry: &LocationRegistry) {
    for marker in view.markers(registry) {
        println!("  {:<20} {}  {}", marker.title, marker.position, marker.snippet);
    }
    if !view.friends_visible() {
        println!("  (friends hidden)");
    }
}

fn print_status(view: &MapView, registry: &LocationRegistry, handle: &PollHandle) {
    let snapshot = registry.snapshot();
    let stats = handle.stats();

    println!("Poll loop:   {}", handle.state());
    println!(
        "Cycles:      {} ({} refreshed, {} no response, {} rejected)",
        stats.cycles, stats.refreshes, stats.no_response, stats.parse_failures
    );
    println!("Friends:     {} (generation {})", snapshot.entities.len(), snapshot.generation);
    match snapshot.refreshed_at {
        Some(at) => println!("Refreshed:   {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Refreshed:   never"),
    }
    println!("Visible:     {}", view.friends_visible());
}

fn print_help() {
    println!("Commands:");
    println!("  list     Show your position and visible friends");
    println!("  closest  Find the closest friend");
    println!("  toggle   Show or hide friends");
    println!("  me       Show your position");
    println!("  status   Show poll loop and registry status");
    println!("  help     Show this help");
    println!("  quit     Exit");
}
