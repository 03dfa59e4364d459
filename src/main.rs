use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use tutor_gateway::{ApiServer, Config, ConversationEngine};

/// Tutor - voice and text gateway for an AI tutoring assistant
#[derive(Parser)]
#[command(name = "tutor", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "TUTOR_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive console chat with the tutor
    Chat,
    /// Test TTS output
    TestTts {
        /// Text to synthesize
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,tutor_gateway=info",
        1 => "info,tutor_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Chat => chat(config).await,
            Command::TestTts { text } => test_tts(config, &text).await,
        };
    }

    // Configuration errors are the only class allowed to stop the process
    config.validate()?;

    tracing::info!(
        model = %config.llm.model,
        port = config.server.port,
        voice = config.voice.enabled,
        "starting tutor gateway"
    );

    let config = Arc::new(config);
    let engine = Arc::new(ConversationEngine::new(Arc::clone(&config)));
    let server = ApiServer::new(config, engine);

    server.serve().await?;
    Ok(())
}

/// Interactive console chat loop
async fn chat(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let config = Arc::new(config);
    let engine = Arc::new(ConversationEngine::new(Arc::clone(&config)));
    let session_id = format!("console-{}", uuid::Uuid::new_v4());
    engine.ensure_session(&session_id).await;

    let mut rl = DefaultEditor::new()?;
    println!("Tutor chat ready (model: {}).", config.llm.model);
    println!("Ask a question, or say \"quit\" to exit.\n");

    loop {
        let readline = rl.readline("You: ");
        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if config.exit_phrases.contains(&line.to_lowercase()) {
                    println!("Exit phrase detected. Goodbye!");
                    break;
                }
                let _ = rl.add_history_entry(&line);

                run_console_turn(&engine, &session_id, &line).await;
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// One console turn with live streamed output
async fn run_console_turn(engine: &Arc<ConversationEngine>, session_id: &str, line: &str) {
    use std::io::Write as _;

    print!("Tutor: ");
    let _ = std::io::stdout().flush();

    let (tx, mut rx) = mpsc::channel::<String>(32);
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(chunk) = rx.recv().await {
            print!("{chunk}");
            let _ = stdout.flush();
        }
    });

    let result = engine.send_message(session_id, line, Some(tx)).await;
    let _ = printer.await;

    match result {
        Ok(text) if text.is_empty() => println!("(no response)"),
        Ok(_) => println!(),
        Err(e) => eprintln!("\n[tutor error] {e}"),
    }
}

/// Synthesize a test phrase and write it next to the temp dir
async fn test_tts(config: Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let format = config.voice.tts_format.clone();
    let config = Arc::new(config);
    let engine = ConversationEngine::new(config);

    let Some(tts) = engine.tts() else {
        anyhow::bail!("TTS not configured (set OPENAI_API_KEY and enable voice)");
    };

    println!("Synthesizing speech...");
    let audio = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", audio.len());

    let path = std::env::temp_dir().join(format!("tutor-tts-test.{format}"));
    std::fs::write(&path, &audio)?;
    println!("Wrote audio to {}", path.display());

    Ok(())
}
