use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use std::error::Error;

#[derive(Parser)]
#[command(name = "incident-tracker-cli")]
#[command(about = "Incident Tracker CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    endpoint: String,

    /// Bearer token from `login`
    #[arg(long, env = "INCIDENT_TRACKER_TOKEN", global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short = 'm', long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Log in and print a token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create an incident
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        description: String,

        #[arg(short = 'E', long, default_value = "Production")]
        environment: String,

        #[arg(short = 'S', long, default_value = "Low")]
        severity: String,

        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// List incidents
    List {
        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Search incidents
    Search {
        /// Free-text term matched against title, description, tags, severity and environment
        #[arg(value_name = "TERM")]
        term: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        severity: Option<String>,

        #[arg(long)]
        environment: Option<String>,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Get incident details
    Get {
        #[arg(value_name = "INCIDENT_ID")]
        id: String,
    },

    /// Add a message to an incident's case discussion
    Discuss {
        #[arg(value_name = "INCIDENT_ID")]
        id: String,

        #[arg(short, long)]
        message: String,
    },
}

fn authorized(request: RequestBuilder, token: &Option<String>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn print_response(request: RequestBuilder) -> Result<(), Box<dyn Error>> {
    let response = request.send().await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await?;

    if !status.is_success() {
        eprintln!("Request failed with status {}", status);
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let token = cli.token;

    match cli.command {
        Commands::Health => {
            print_response(client.get(format!("{}/health", cli.endpoint))).await?;
        }

        Commands::Register {
            username,
            email,
            password,
        } => {
            let request = client
                .post(format!("{}/auth/register", cli.endpoint))
                .json(&json!({
                    "username": username,
                    "email": email,
                    "password": password,
                }));
            print_response(request).await?;
        }

        Commands::Login { username, password } => {
            let request = client
                .post(format!("{}/auth/login", cli.endpoint))
                .json(&json!({
                    "username": username,
                    "password": password,
                }));
            print_response(request).await?;
        }

        Commands::Create {
            title,
            description,
            environment,
            severity,
            tags,
        } => {
            let request = client
                .post(format!("{}/incidents", cli.endpoint))
                .json(&json!({
                    "title": title,
                    "description": description,
                    "environment": environment,
                    "severity": severity,
                    "tags": tags,
                }));
            print_response(authorized(request, &token)).await?;
        }

        Commands::List { page, limit } => {
            let request = client
                .get(format!("{}/incidents", cli.endpoint))
                .query(&[("page", page), ("limit", limit)]);
            print_response(authorized(request, &token)).await?;
        }

        Commands::Search {
            term,
            title,
            status,
            severity,
            environment,
            tags,
            page,
            limit,
        } => {
            let mut params = vec![
                ("page".to_string(), page.to_string()),
                ("limit".to_string(), limit.to_string()),
            ];
            let optional = [
                ("search", term),
                ("title", title),
                ("status", status),
                ("severity", severity),
                ("environment", environment),
                ("tags", tags),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    params.push((key.to_string(), value));
                }
            }

            let request = client
                .get(format!("{}/incidents/search", cli.endpoint))
                .query(&params);
            print_response(authorized(request, &token)).await?;
        }

        Commands::Get { id } => {
            let request = client.get(format!("{}/incidents/{}", cli.endpoint, id));
            print_response(authorized(request, &token)).await?;
        }

        Commands::Discuss { id, message } => {
            let request = client
                .post(format!("{}/incidents/{}/discussion", cli.endpoint, id))
                .json(&json!({ "message": message }));
            print_response(authorized(request, &token)).await?;
        }
    }

    Ok(())
}
