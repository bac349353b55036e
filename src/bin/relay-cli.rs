use clap::{Args, Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the edge relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5173")]
    url: String,

    /// Admin API key, if the relay requires one.
    #[arg(short, long, env = "RELAY_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check relay status, store health and channel state
    Status,
    /// Inspect or change the upstream configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the current configuration
    Show,
    /// Change one or more upstream URLs
    Set(SetArgs),
    /// Re-read the persisted document
    Reload,
}

#[derive(Args)]
struct SetArgs {
    #[arg(long)]
    api_base_url: Option<String>,

    #[arg(long)]
    websocket_url: Option<String>,

    #[arg(long)]
    file_server_url: Option<String>,
}

impl SetArgs {
    fn is_empty(&self) -> bool {
        self.api_base_url.is_none() && self.websocket_url.is_none() && self.file_server_url.is_none()
    }

    /// Overlay the given fields on `config`, leaving everything else as-is.
    fn apply(&self, config: &mut Value) {
        let fields = [
            ("apiBaseUrl", &self.api_base_url),
            ("websocketUrl", &self.websocket_url),
            ("fileServerUrl", &self.file_server_url),
        ];
        if let Some(object) = config.as_object_mut() {
            for (name, value) in fields {
                if let Some(value) = value {
                    object.insert(name.to_string(), Value::String(value.clone()));
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", base))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Config(ConfigCommand::Show) => {
            let res = client
                .get(format!("{}/admin/config", base))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Config(ConfigCommand::Set(args)) => {
            if args.is_empty() {
                eprintln!("Nothing to change: pass at least one of --api-base-url, --websocket-url, --file-server-url");
                return Ok(());
            }

            let current = client
                .get(format!("{}/admin/config", base))
                .headers(headers.clone())
                .send()
                .await?;
            if !current.status().is_success() {
                return print_response(current).await;
            }

            let mut config: Value = current.json().await?;
            args.apply(&mut config);

            let res = client
                .put(format!("{}/admin/config", base))
                .headers(headers)
                .json(&config)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Config(ConfigCommand::Reload) => {
            let res = client
                .post(format!("{}/admin/config/reload", base))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
