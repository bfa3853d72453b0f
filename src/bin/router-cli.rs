use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "router-cli")]
#[command(about = "Management CLI for the capacity router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route one invocation and show the chosen backend
    Route {
        endpoint: String,
        #[arg(long)]
        input_location: String,
    },
    /// Show the backend pool
    Pool,
    /// Replace the pool, e.g. `set-weights server1=2 server2=1`
    SetWeights {
        #[arg(required = true, value_parser = parse_weight)]
        weights: Vec<(String, i64)>,
    },
    /// Show a scaling dimension
    Dimension { id: String },
    /// Declare a desired capacity for a dimension
    Scale { id: String, desired: u64 },
    /// Send an endpoint status event
    Event {
        resource: String,
        backend: String,
        /// Endpoint status, e.g. IN_SERVICE or FAILED
        status: String,
        #[arg(long)]
        count: Option<u64>,
        #[arg(long)]
        reason: Option<String>,
    },
}

fn parse_weight(arg: &str) -> Result<(String, i64), String> {
    let (server, weight) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected server=weight, got {}", arg))?;
    let weight = weight
        .parse()
        .map_err(|_| format!("weight for {} is not an integer", server))?;
    Ok((server.to_string(), weight))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Route {
            endpoint,
            input_location,
        } => {
            client
                .post(format!("{}/endpoints/{}/invocations", base, endpoint))
                .header("InputLocation", input_location)
                .send()
                .await?
        }
        Commands::Pool => client.get(format!("{}/pool", base)).send().await?,
        Commands::SetWeights { weights } => {
            let (servers, weights): (Vec<String>, Vec<i64>) = weights.into_iter().unzip();
            client
                .put(format!("{}/pool", base))
                .json(&json!({ "servers": servers, "weights": weights }))
                .send()
                .await?
        }
        Commands::Dimension { id } => {
            client
                .get(format!("{}/scalableTargetDimensions/{}", base, id))
                .send()
                .await?
        }
        Commands::Scale { id, desired } => {
            client
                .patch(format!("{}/scalableTargetDimensions/{}", base, id))
                .json(&json!({ "desiredCapacity": desired }))
                .send()
                .await?
        }
        Commands::Event {
            resource,
            backend,
            status,
            count,
            reason,
        } => {
            client
                .post(format!("{}/events/endpoint-status", base))
                .json(&json!({
                    "resourceName": resource,
                    "backendId": backend,
                    "status": status,
                    "reportedInstanceCount": count,
                    "failureReason": reason,
                }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: router returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
