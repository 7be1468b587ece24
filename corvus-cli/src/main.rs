//! Corvus CLI
//!
//! Multi-agent OSINT investigations with full execution tracing.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use corvus_agents::{
    builtin_registry, create_anthropic_backend, create_backend, AnthropicConfig,
    OpenAiBackendConfig, SharedBackend,
};
use corvus_core::Depth;
use corvus_runtime::{
    build_continuation, ContinuationOptions, InvestigationOutcome, InvestigationRequest,
    MemoryStore, Orchestrator, TraceRecorder, WebhookPublisher,
};

#[derive(Parser)]
#[command(name = "corvus")]
#[command(author, version, about = "Corvus: multi-agent OSINT investigations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Args)]
struct BackendArgs {
    /// LLM model to use
    #[arg(short, long, default_value = "claude-sonnet-4-20250514")]
    model: String,

    /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY")]
    anthropic_key: Option<String>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// OpenRouter API key (or set OPENROUTER_API_KEY env var)
    #[arg(long, env = "OPENROUTER_API_KEY")]
    openrouter_key: Option<String>,

    /// Use OpenAI instead of Anthropic
    #[arg(long)]
    openai: bool,

    /// Use OpenRouter instead of Anthropic
    #[arg(long)]
    openrouter: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an investigation
    Investigate {
        /// Investigation topic
        #[arg(short, long)]
        topic: String,

        /// Investigation depth: quick, standard or deep
        #[arg(short, long, default_value = "standard")]
        depth: Depth,

        /// Specific agents to run (default: selected by topic keywords)
        #[arg(short, long)]
        agents: Vec<String>,

        /// Webhook URL to publish the finished report to
        #[arg(long, env = "CORVUS_WEBHOOK_URL")]
        webhook: Option<String>,

        /// Output file for the report (default: report_<timestamp>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Continue a prior investigation with its findings as context
    Continue {
        /// Run id to continue from
        #[arg(short, long)]
        run: i64,

        /// New instructions for the follow-up (default: deepen the prior topic)
        #[arg(short, long)]
        instructions: Option<String>,

        /// Only carry forward IOCs with these exact values
        #[arg(long)]
        iocs: Vec<String>,

        /// Specific agents for the follow-up
        #[arg(short, long)]
        agents: Vec<String>,

        /// Investigation depth for the follow-up (default: the prior run's)
        #[arg(short, long)]
        depth: Option<Depth>,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// List registered agents and their availability
    Agents,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Investigate {
            topic,
            depth,
            agents,
            webhook,
            output,
            backend,
        } => {
            run_investigation(&topic, depth, agents, webhook, output, backend).await?;
        }
        Commands::Continue {
            run,
            instructions,
            iocs,
            agents,
            depth,
            backend,
        } => {
            run_continuation(run, instructions, iocs, agents, depth, backend).await?;
        }
        Commands::Agents => {
            list_agents();
        }
    }

    Ok(())
}

/// Configure the LLM backend (Anthropic is the default).
fn make_backend(args: &BackendArgs) -> Result<SharedBackend> {
    let backend = if args.openrouter {
        let key = args.openrouter_key.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "OpenRouter API key required. Set OPENROUTER_API_KEY or use --openrouter-key"
            )
        })?;
        create_backend(OpenAiBackendConfig::openrouter(&key, &args.model))?
    } else if args.openai {
        let key = args.api_key.clone().ok_or_else(|| {
            anyhow::anyhow!("OpenAI API key required. Set OPENAI_API_KEY or use --api-key")
        })?;
        create_backend(OpenAiBackendConfig::openai(&key, &args.model))?
    } else {
        let key = args.anthropic_key.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "Anthropic API key required. Set ANTHROPIC_API_KEY or use --anthropic-key"
            )
        })?;
        create_anthropic_backend(AnthropicConfig::new(&key, &args.model))?
    };
    Ok(backend)
}

fn provider_name(args: &BackendArgs) -> &'static str {
    if args.openrouter {
        "OpenRouter"
    } else if args.openai {
        "OpenAI"
    } else {
        "Anthropic"
    }
}

async fn run_investigation(
    topic: &str,
    depth: Depth,
    agents: Vec<String>,
    webhook: Option<String>,
    output: Option<PathBuf>,
    backend_args: BackendArgs,
) -> Result<()> {
    println!("🔎 Corvus - Multi-Agent OSINT Investigation\n");
    println!(
        "📡 Provider: {} | Model: {}",
        provider_name(&backend_args),
        backend_args.model
    );
    println!("🎯 Topic: {}", topic);
    println!(
        "⏱️  Depth: {} ({}s per agent)\n",
        depth,
        depth.agent_timeout().as_secs()
    );

    let backend = make_backend(&backend_args)?;
    let registry = Arc::new(builtin_registry(backend));
    let store = Arc::new(MemoryStore::new());

    let mut orchestrator = Orchestrator::new(registry, store.clone());
    let mut request = InvestigationRequest::new(topic).with_depth(depth);
    if !agents.is_empty() {
        request = request.with_agents(agents);
    }
    if let Some(url) = &webhook {
        orchestrator = orchestrator.with_publisher(Arc::new(WebhookPublisher::new(url)?));
        request = request.with_publish();
    }

    let outcome = orchestrator.investigate(request).await?;
    print_outcome(&outcome, &store, output)?;
    Ok(())
}

async fn run_continuation(
    prior_run: i64,
    instructions: Option<String>,
    iocs: Vec<String>,
    agents: Vec<String>,
    depth: Option<Depth>,
    backend_args: BackendArgs,
) -> Result<()> {
    println!("🔎 Corvus - Continuing run {}\n", prior_run);

    let backend = make_backend(&backend_args)?;
    let registry = Arc::new(builtin_registry(backend));
    // The bundled store is process-local; continuing a run from an earlier
    // process needs a persistent store behind the same trait.
    let store = Arc::new(MemoryStore::new());

    let options = ContinuationOptions {
        new_instructions: instructions,
        selected_iocs: if iocs.is_empty() { None } else { Some(iocs) },
        agents: if agents.is_empty() { None } else { Some(agents) },
        depth,
    };
    let context = build_continuation(store.as_ref(), prior_run, options)?;
    println!("🧵 Prior topic: {}", context.prior_topic);
    println!("🧩 Evidence carried: {}\n", context.evidence.len());

    let orchestrator = Orchestrator::new(registry, store.clone());
    let mut request = InvestigationRequest::new(&context.topic())
        .with_depth(context.depth.unwrap_or_default());
    if let Some(agents) = context.agents.clone() {
        request = request.with_agents(agents);
    }
    request = request.with_continuation(context);

    let outcome = orchestrator.investigate(request).await?;
    print_outcome(&outcome, &store, None)?;
    Ok(())
}

fn list_agents() {
    // Availability is env-derived, so a placeholder backend is fine here
    let backend = match create_backend(OpenAiBackendConfig::openai("placeholder", "gpt-4o-mini")) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("failed to build registry: {}", e);
            return;
        }
    };
    let registry = builtin_registry(backend);

    println!("Registered agents:\n");
    for entry in registry.list_available() {
        let marker = if entry.available { "✅" } else { "⚠️ " };
        println!("  {} {} - {}", marker, entry.name, entry.reason);
    }
}

fn print_outcome(
    outcome: &InvestigationOutcome,
    store: &Arc<MemoryStore>,
    output: Option<PathBuf>,
) -> Result<()> {
    println!("\n✅ Run {} finished: {}", outcome.run_id, outcome.status);
    println!(
        "🤖 Agents: {} succeeded, {} failed | 🧩 Evidence: {} items",
        outcome.summary.agents_succeeded,
        outcome.summary.agents_failed,
        outcome.evidence.len()
    );
    if let Some(warning) = &outcome.publish_warning {
        println!("⚠️  Publish warning: {}", warning);
    }

    let recorder = TraceRecorder::new(store.clone());
    if let Ok(summary) = recorder.summary(outcome.run_id) {
        println!(
            "🧾 Traces: {} total, {} completed, {} failed",
            summary.total_traces, summary.completed_traces, summary.failed_traces
        );
    }

    let output_path = output.unwrap_or_else(|| {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
        PathBuf::from(format!("report_{}.md", timestamp))
    });
    fs::write(&output_path, &outcome.report)?;
    println!("📄 Report saved to: {}", output_path.display());

    println!("\n{}", "=".repeat(60));
    let preview: String = outcome.report.chars().take(1000).collect();
    println!("{}", preview);
    if outcome.report.chars().count() > 1000 {
        println!("...\n[truncated - see full report in output file]");
    }
    Ok(())
}
