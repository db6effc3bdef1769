//! sway-focus CLI
//!
//! Query and control tool for sway over its IPC socket.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing::debug;
use sway_focus_ipc::{
    get_socket_path, Client, Context, EventStream, EventType, IpcError, MessageType, Node,
};

#[derive(Parser, Debug)]
#[command(name = "sway-focus")]
#[command(about = "Query and control sway over IPC")]
#[command(version)]
struct Cli {
    /// Path to the sway socket (defaults to $SWAYSOCK)
    #[arg(short, long, global = true)]
    socket: Option<PathBuf>,

    /// Deadline for each request, in milliseconds
    #[arg(
        short,
        long,
        global = true,
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run sway commands, e.g. `focus left; mark x`
    Run {
        command: String,
    },

    /// Query sway state
    Get {
        #[arg(value_enum)]
        what: Query,
    },

    /// Show the config of one bar
    BarConfig {
        id: String,
    },

    /// Send a tick event to tick subscribers
    Tick {
        #[arg(default_value = "")]
        payload: String,
    },

    /// Show the focused node
    Focused,

    /// Print events as JSON lines until interrupted
    Subscribe {
        /// Event kinds, e.g. `window workspace`
        #[arg(required = true)]
        events: Vec<EventType>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Query {
    Workspaces,
    Outputs,
    Tree,
    Marks,
    BarIds,
    Version,
    BindingModes,
    Config,
    Inputs,
    Seats,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let socket_path = match cli.socket {
        Some(path) => path,
        None => get_socket_path().into_diagnostic()?,
    };
    let timeout = Duration::from_millis(cli.timeout_ms);

    let ctx = Context::background().with_timeout(timeout);

    match cli.command {
        Commands::Run { command } => {
            let mut client = connect(&ctx, &socket_path).await?;
            cmd_run(&mut client, &ctx, &command).await
        }
        Commands::Get { what } => {
            let mut client = connect(&ctx, &socket_path).await?;
            cmd_get(&mut client, &ctx, what).await
        }
        Commands::BarConfig { id } => {
            let mut client = connect(&ctx, &socket_path).await?;
            print_json(&client.get_bar_config(&ctx, &id).await.into_diagnostic()?)
        }
        Commands::Tick { payload } => {
            let mut client = connect(&ctx, &socket_path).await?;
            print_json(&client.send_tick(&ctx, &payload).await.into_diagnostic()?)
        }
        Commands::Focused => {
            let mut client = connect(&ctx, &socket_path).await?;
            cmd_focused(&mut client, &ctx).await
        }
        // No deadline: runs until interrupted
        Commands::Subscribe { events } => cmd_subscribe(&socket_path, &events).await,
    }
}

async fn connect(ctx: &Context, socket_path: &Path) -> miette::Result<Client> {
    debug!("Connecting to {}", socket_path.display());
    let client = Client::connect(ctx, socket_path).await.into_diagnostic()?;
    debug!("Connected to {}", socket_path.display());
    Ok(client)
}

fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

async fn cmd_run(client: &mut Client, ctx: &Context, command: &str) -> miette::Result<()> {
    match client.run_command(ctx, command).await {
        Ok(replies) => print_json(&replies),
        Err(IpcError::CommandFailed(failure)) => {
            print_json(&failure.replies)?;
            Err(miette::miette!("{}", failure))
        }
        Err(e) => Err(e).into_diagnostic(),
    }
}

async fn cmd_get(client: &mut Client, ctx: &Context, what: Query) -> miette::Result<()> {
    match what {
        Query::Workspaces => print_json(&client.get_workspaces(ctx).await.into_diagnostic()?),
        Query::Outputs => print_json(&client.get_outputs(ctx).await.into_diagnostic()?),
        Query::Tree => {
            // Print the nested form sway sends rather than the arena
            let reply = client
                .call(ctx, MessageType::GetTree, &[])
                .await
                .into_diagnostic()?;
            let root: Node = reply.decode().into_diagnostic()?;
            print_json(&root)
        }
        Query::Marks => print_json(&client.get_marks(ctx).await.into_diagnostic()?),
        Query::BarIds => print_json(&client.get_bar_ids(ctx).await.into_diagnostic()?),
        Query::Version => print_json(&client.get_version(ctx).await.into_diagnostic()?),
        Query::BindingModes => {
            print_json(&client.get_binding_modes(ctx).await.into_diagnostic()?)
        }
        Query::Config => print_json(&client.get_config(ctx).await.into_diagnostic()?),
        Query::Inputs => print_json(&client.get_inputs(ctx).await.into_diagnostic()?),
        Query::Seats => print_json(&client.get_seats(ctx).await.into_diagnostic()?),
    }
}

async fn cmd_focused(client: &mut Client, ctx: &Context) -> miette::Result<()> {
    let tree = client.get_tree(ctx).await.into_diagnostic()?;
    match tree.focused_node() {
        Some(node) => print_json(node),
        None => Err(miette::miette!("No node has focus")),
    }
}

async fn cmd_subscribe(socket_path: &Path, events: &[EventType]) -> miette::Result<()> {
    let ctx = Context::background();

    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    debug!("Subscribing to {:?} on {}", events, socket_path.display());
    let mut stream = EventStream::connect(&ctx, socket_path, events)
        .await
        .into_diagnostic()?;
    debug!("Subscription accepted");

    loop {
        match stream.next_event(&ctx).await {
            Ok(event) => {
                debug!("Received {} event", event.event_type());
                let line = serde_json::to_string(&event).into_diagnostic()?;
                println!("{}", line);
            }
            Err(IpcError::Canceled) => {
                debug!("Subscription interrupted");
                return Ok(());
            }
            Err(e) => return Err(e).into_diagnostic(),
        }
    }
}
