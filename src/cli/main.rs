use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::error::Error;
use std::path::PathBuf;
use threadseek::models::{parse_timestamp, AttachmentType};
use threadseek::search::{SearchFilters, SearchRequest, SearchType};

#[derive(Parser)]
#[command(name = "threadseek-cli")]
#[command(about = "Search conversation history from the command line", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search messages or conversations
    Search {
        /// Free text; omit to browse
        #[arg(value_name = "QUERY", default_value = "")]
        query: String,

        /// message or conversation
        #[arg(short = 't', long = "type", default_value = "message")]
        search_type: SearchType,

        /// Author handle
        #[arg(short, long)]
        from: Option<String>,

        /// Mentioned handle
        #[arg(short, long)]
        mentions: Option<String>,

        /// Attachment type: image, file or link
        #[arg(long)]
        has: Option<AttachmentType>,

        /// Strictly before (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_timestamp)]
        before: Option<DateTime<Utc>>,

        /// Strictly after (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_timestamp)]
        after: Option<DateTime<Utc>>,

        /// Exactly at this instant
        #[arg(long, value_parser = parse_timestamp)]
        during: Option<DateTime<Utc>>,

        /// Pinned messages only
        #[arg(short, long)]
        pinned: bool,

        /// Restrict to one conversation
        #[arg(short, long, value_name = "CONVERSATION_ID")]
        conversation: Option<String>,
    },

    /// Drop and recreate the search indices
    Setup,

    /// Show live index mappings
    Mappings,

    /// Check server and cluster health
    Health,

    /// Bulk-index documents from a JSON file
    Index {
        /// File with `conversations` and/or `messages` arrays
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

async fn print_response(response: Response) -> Result<(), Box<dyn Error>> {
    let status = response.status();
    let body: Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        return Err(format!("server responded with {}", status).into());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Search {
            query,
            search_type,
            from,
            mentions,
            has,
            before,
            after,
            during,
            pinned,
            conversation,
        } => {
            let request = SearchRequest {
                query: Some(query),
                search_type,
                filters: SearchFilters {
                    from,
                    mentions,
                    has,
                    before,
                    after,
                    during,
                    pinned: pinned.then_some(true),
                },
                conversation_id: conversation,
            };

            let response = client
                .post(format!("{}/api/search", cli.endpoint))
                .json(&request)
                .send()
                .await?;
            print_response(response).await?;
        }

        Commands::Setup => {
            let response = client
                .post(format!("{}/api/search/setup", cli.endpoint))
                .send()
                .await?;
            print_response(response).await?;
        }

        Commands::Mappings => {
            let response = client
                .get(format!("{}/api/search/mappings", cli.endpoint))
                .send()
                .await?;
            print_response(response).await?;
        }

        Commands::Health => {
            let server: Value = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?
                .json()
                .await?;
            let cluster: Value = client
                .get(format!("{}/api/search/health", cli.endpoint))
                .send()
                .await?
                .json()
                .await?;

            let body = json!({ "server": server, "cluster": cluster });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Index { file } => {
            let contents = tokio::fs::read_to_string(&file).await?;
            let documents: Value = serde_json::from_str(&contents)?;

            let response = client
                .post(format!("{}/api/search/index-data", cli.endpoint))
                .json(&documents)
                .send()
                .await?;
            print_response(response).await?;
        }
    }

    Ok(())
}
