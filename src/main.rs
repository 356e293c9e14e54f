mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;

use eb_av::{select_recipe, ToolRegistry, FFMPEG};
use eb_core::config::{Config, LogFormat, StorageBackend};
use eb_core::{EncodingProgress, EncodingRequest};
use eb_pipeline::{AssetCollection, EncodeBox, EncodeBoxOptions, JobEvent, JobWorkspace};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, load_warning) = Config::load_lenient(cli.config.as_deref());
    init_logging(cli.verbose, config.logging.format);
    if let Some(warning) = load_warning {
        tracing::warn!("{warning}");
    }
    config.apply_env();

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            tracing::info!("Starting encodebox server");
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(eb_server::start(config, CancellationToken::new()))?;
            Ok(())
        }
        Commands::Encode {
            request,
            output,
            store_root,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(encode_file(config, &request, output, store_root))
        }
        Commands::Graph { request } => print_graph(&config, &request),
        Commands::CheckTools => check_tools(&config),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("encodebox {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Install the global subscriber. Respects `RUST_LOG` when set.
fn init_logging(verbose: bool, format: LogFormat) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "encodebox=debug,eb_core=debug,eb_av=trace,eb_storage=debug,eb_pipeline=debug,eb_server=debug,tower_http=debug".to_string()
        } else {
            "encodebox=info,eb_av=info,eb_storage=info,eb_pipeline=info,eb_server=info,tower_http=info".to_string()
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn read_request(path: &Path) -> Result<EncodingRequest> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request {}", path.display()))?;
    let request: EncodingRequest = serde_json::from_str(&contents)
        .with_context(|| format!("invalid request {}", path.display()))?;
    request.validate()?;
    Ok(request)
}

async fn encode_file(
    mut config: Config,
    request_path: &Path,
    output: Option<PathBuf>,
    store_root: Option<PathBuf>,
) -> Result<()> {
    let request = read_request(request_path)?;
    let output = output.unwrap_or_else(|| PathBuf::from(request.output_name()));

    let root = match store_root {
        Some(root) => root,
        None => request_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    config.storage.backend = StorageBackend::Local;
    config.storage.local_root = Some(root);

    let store = eb_storage::from_config(&config)?;
    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let encode_box = EncodeBox::new(store, tools, EncodeBoxOptions::from_config(&config));
    let workspace = JobWorkspace::new(
        config.encoder.work_root.as_deref(),
        &request.job_id,
        &request.output_name(),
    )?;

    let cancel = CancellationToken::new();
    tokio::spawn(eb_server::shutdown_signal(cancel.clone()));

    println!("Encoding job {}", request.job_id);
    let mut events = encode_box.start(request, workspace.output(), cancel);
    while let Some(event) = events.recv().await {
        match event {
            JobEvent::State(state) => println!("[{state}]"),
            JobEvent::Progress(progress) => println!("  {}", format_progress(&progress)),
            JobEvent::Done(path) => {
                tokio::fs::copy(&path, &output)
                    .await
                    .with_context(|| format!("failed to write {}", output.display()))?;
                println!("\nOutput: {}", output.display());
            }
            JobEvent::Failed(e) => {
                anyhow::bail!("encode failed: {e}");
            }
        }
    }

    workspace.close()?;
    Ok(())
}

fn format_progress(p: &EncodingProgress) -> String {
    let mut line = format!(
        "frame={} fps={} size={}kB time={}s speed={}x",
        p.frames,
        p.fps,
        p.size,
        p.time.as_secs(),
        p.speed
    );
    if let Some(ratio) = p.ratio() {
        line.push_str(&format!(" ({:.0}%)", ratio * 100.0));
    }
    line
}

fn print_graph(config: &Config, request_path: &Path) -> Result<()> {
    let request = read_request(request_path)?;

    // Keys stand in for the local paths downloads would produce.
    let mut assets = AssetCollection::from_request(&request);
    for asset in assets.iter_mut() {
        asset.path = Some(PathBuf::from(&asset.key));
    }
    let recipe = select_recipe(&assets.to_asset_paths(), Path::new(&request.output_name()))?;

    let tools = ToolRegistry::discover(&config.tools);
    let ffmpeg = tools
        .require(FFMPEG)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(FFMPEG));

    println!("Recipe: {:?}", recipe.kind);
    if let Some(graph) = recipe.filter_complex() {
        println!("Filter graph: {graph}");
    }
    println!("{}", recipe.command_line(&ffmpeg));
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Encoding requires ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Storage: {:?} ({})", config.storage.backend, config.storage.component);
    println!(
        "  Pubsub: {}",
        if config.pubsub.enabled {
            format!("{}/{}", config.pubsub.component, config.pubsub.topic)
        } else {
            "disabled".to_string()
        }
    );
    println!("  Dapr endpoint: {}", config.dapr.endpoint);

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
