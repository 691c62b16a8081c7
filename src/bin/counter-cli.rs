use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, ORIGIN};
use reqwest::Method;

#[derive(Parser)]
#[command(name = "counter-cli")]
#[command(about = "Client for the visitor counter endpoint", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Origin header to send, as a browser would.
    #[arg(short, long)]
    origin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a visit and print the new count
    Visit,
    /// Send a CORS preflight and print the advertised headers
    Preflight,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(origin) = &cli.origin {
        headers.insert(ORIGIN, origin.parse()?);
    }

    match cli.command {
        Commands::Visit => {
            let res = client.get(&cli.url).headers(headers).send().await?;
            let status = res.status();
            let body = res.text().await?;
            if !status.is_success() {
                return Err(format!("counter returned status {}: {}", status, body.trim()).into());
            }
            println!("{}", body.trim());
        }
        Commands::Preflight => {
            headers.insert("Access-Control-Request-Method", "GET".parse()?);
            let res = client
                .request(Method::OPTIONS, &cli.url)
                .headers(headers)
                .send()
                .await?;
            let status = res.status();
            println!("{}", status);
            for (name, value) in res.headers() {
                if name.as_str().starts_with("access-control-") {
                    println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
                }
            }
            if !status.is_success() {
                return Err(format!("preflight returned status {}", status).into());
            }
        }
    }

    Ok(())
}
