use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medbot_agents::{
    AgentConfig, ChatAgent, DEFAULT_CATALOG_PATH, DEFAULT_EMBEDDING_DIMS, MIN_SIMILARITY,
};
use medbot_core::{ChatInput, ChatReply, IntentCatalog, DEFAULT_CONFIDENCE_THRESHOLD};
use medbot_observability::{init_tracing, AppMetrics};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Parser)]
#[command(name = "medbot")]
#[command(about = "Medical intent chatbot CLI")]
struct Cli {
    #[arg(long, env = "MEDBOT_CATALOG_PATH", default_value = DEFAULT_CATALOG_PATH)]
    catalog: PathBuf,

    #[arg(long, env = "MEDBOT_TRAINING_PATH")]
    training: Option<PathBuf>,

    #[arg(long, env = "MEDBOT_CONFIDENCE_THRESHOLD", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    threshold: f32,

    #[arg(long, env = "MEDBOT_EMBEDDING_DIMS", default_value_t = DEFAULT_EMBEDDING_DIMS)]
    dims: usize,

    /// Questions less similar than this to every intent get the fallback reply.
    #[arg(long, env = "MEDBOT_MIN_SIMILARITY", default_value_t = MIN_SIMILARITY)]
    min_similarity: f32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive question/answer loop.
    Chat,
    /// Answer a single question.
    Ask {
        text: String,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show the ranked intent candidates for a question.
    Rank { text: String },
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

#[derive(Debug, Subcommand)]
enum CatalogCommand {
    /// Load the catalog and print its statistics.
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("medbot_cli");
    let cli = Cli::parse();

    let config = AgentConfig {
        catalog_path: cli.catalog.clone(),
        training_path: cli.training.clone(),
        confidence_threshold: cli.threshold,
        embedding_dims: cli.dims,
        min_similarity: cli.min_similarity,
    };

    match cli.command {
        Command::Catalog {
            command: CatalogCommand::Validate,
        } => {
            let catalog = IntentCatalog::from_path(&config.catalog_path).with_context(|| {
                format!("invalid intent catalog {}", config.catalog_path.display())
            })?;
            println!("{}", serde_json::to_string_pretty(&catalog.stats())?);
        }
        Command::Chat => run_chat(build_agent(&config)?).await?,
        Command::Ask { text, json, seed } => {
            let agent = build_agent(&config)?;
            let reply = match seed {
                Some(seed) => agent.respond_with_rng(&text, &mut StdRng::seed_from_u64(seed))?,
                None => agent.respond(&text)?,
            };
            print_reply(&reply, json)?;
        }
        Command::Rank { text } => {
            let agent = build_agent(&config)?;
            let candidates = agent.rank(&text)?;
            if candidates.is_empty() {
                println!("no intent above {}", agent.ranker().threshold());
            }
            for candidate in candidates {
                println!("{:<32} {:.4}", candidate.tag, candidate.score);
            }
        }
    }

    Ok(())
}

fn build_agent(config: &AgentConfig) -> Result<ChatAgent> {
    ChatAgent::load(config, AppMetrics::shared())
}

fn print_reply(reply: &ChatReply, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reply)?);
    } else {
        println!("{}", reply.reply_text);
    }
    Ok(())
}

async fn run_chat(agent: ChatAgent) -> Result<()> {
    println!("Hi! I'm your medical chatbot. What medical question can I help with today?");
    println!("type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        match agent
            .handle_chat(ChatInput {
                text: message.to_string(),
            })
            .await
        {
            Ok(reply) => println!("\n{}\n", reply.reply_text),
            Err(err) => eprintln!("\nclassifier unavailable ({}), try again\n", err.code()),
        }
    }

    Ok(())
}
