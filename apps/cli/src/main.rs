use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use mindtrace_core::{ScoringConfig, ScoringEngine, Segmenter, SegmenterConfig, Session};
use mindtrace_llm::{Gateway, GatewayConfig, GeminiClient, GroqClient, ProviderSettings};
use mindtrace_pipeline::{
    DemoTranscriber, MemoryStore, PipelineConfig, PipelineController, SessionStore, Transcriber,
    WhisperApiTranscriber,
};

use crate::format::format_evaluation_readable;

mod format;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", secs / 60.0, secs % 60.0)
    }
}

#[derive(Parser)]
#[command(name = "mindtrace")]
#[command(about = "Transcribe a teaching session and score it with AI-powered evaluation")]
struct Cli {
    /// Path to the session recording. Omit to run the built-in demo
    /// lecture.
    media: Option<String>,

    /// Declared topic of the session, used for relevance scoring
    #[arg(short, long, default_value = "General teaching session")]
    topic: String,

    /// Session title shown in the report. Defaults to the topic.
    #[arg(long)]
    title: Option<String>,

    /// Verbose pipeline logging
    #[arg(short, long)]
    verbose: bool,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Register every provider with a configured key. With no keys at all
/// the gateway runs degraded and serves deterministic mock results.
fn build_gateway(http: &reqwest::Client) -> Gateway {
    let mut gateway = Gateway::new(GatewayConfig::default());

    if let Ok(api_key) = std::env::var("GOOGLE_API_KEY") {
        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());
        gateway = gateway.with_provider(Arc::new(GeminiClient::new(
            ProviderSettings { api_key, model },
            http.clone(),
        )));
    }
    if let Ok(api_key) = std::env::var("GROQ_API_KEY") {
        let model = std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_GROQ_MODEL.to_string());
        gateway = gateway.with_provider(Arc::new(GroqClient::new(
            ProviderSettings { api_key, model },
            http.clone(),
        )));
    }

    if !gateway.has_providers() {
        gateway = Gateway::new(GatewayConfig {
            permit_degraded: true,
            ..GatewayConfig::default()
        });
    }
    gateway
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    println!(
        "\n{}  {}\n",
        style("mindtrace").cyan().bold(),
        style("Teaching Session Evaluator").dim()
    );

    let http = reqwest::Client::new();
    let gateway = Arc::new(build_gateway(&http));
    if !gateway.has_providers() {
        println!(
            "{} No LLM provider keys set (GOOGLE_API_KEY / GROQ_API_KEY), running in degraded mode",
            style("!").yellow().bold()
        );
    }

    let transcriber: Arc<dyn Transcriber> = match (&cli.media, std::env::var("OPENAI_API_KEY")) {
        (Some(_), Ok(api_key)) => Arc::new(WhisperApiTranscriber::new(api_key, http.clone())),
        (Some(_), Err(_)) => {
            println!(
                "{} OPENAI_API_KEY not set, using the built-in demo lecture instead of the media file",
                style("!").yellow().bold()
            );
            Arc::new(DemoTranscriber)
        }
        (None, _) => {
            println!(
                "{} No media file given, evaluating the built-in demo lecture",
                style("✓").green().bold()
            );
            Arc::new(DemoTranscriber)
        }
    };

    let store = Arc::new(MemoryStore::new());
    let controller = Arc::new(PipelineController::new(
        store.clone(),
        transcriber,
        gateway,
        Segmenter::new(SegmenterConfig::default()),
        ScoringEngine::new(ScoringConfig::default()),
        PipelineConfig::default(),
    ));

    let title = cli.title.clone().unwrap_or_else(|| cli.topic.clone());
    let media_locator = cli.media.clone().unwrap_or_else(|| "demo".to_string());
    let session = Session::new(title, cli.topic.clone(), media_locator);
    let session_id = session.id;
    store.create_session(session).await?;

    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();
    let spinner = create_spinner("Transcribing and evaluating session...");
    let handle = controller.trigger(session_id).await?;
    let evaluation = handle
        .done_rx
        .await
        .map_err(|_| anyhow::anyhow!("pipeline task dropped before finishing"))??;
    spinner.finish_with_message(format!(
        "{} Evaluation complete {}",
        style("✓").green().bold(),
        style(format!("[{}]", format_duration(total_start.elapsed()))).dim()
    ));

    let session = store
        .session(session_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("session disappeared from the store"))?;
    let transcript = match session.transcript_ref {
        Some(id) => store.transcript(id).await?,
        None => None,
    };

    let scoring = ScoringEngine::new(ScoringConfig::default());
    let summary = scoring.summarize(&evaluation);

    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{}",
        format_evaluation_readable(&session, &evaluation, &summary, transcript.as_ref())
    );

    Ok(())
}
