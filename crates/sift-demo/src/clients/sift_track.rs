//! Track words and phrases on the live stream
//!
//! ```text
//! SIFT_USERNAME=me SIFT_API_KEY=... sift-track rust tokio "async await"
//! ```
//!
//! Builds a definition matching any of the words, compiles it and prints
//! matching interactions until interrupted with Ctrl-C.

use std::process::ExitCode;

use clap::Parser;
use siftstream::{ClientConfig, ConsumerType, Credentials, Error, StreamTarget, User};
use siftstream_demo::{PrintingHandler, track_csdl};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sift-track", version, about = "Print interactions matching words or phrases")]
struct Args {
    /// Account username
    #[arg(long, env = "SIFT_USERNAME")]
    username: String,

    /// Account API key
    #[arg(long, env = "SIFT_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Stream existing hashes instead of compiling the words
    #[arg(long = "hash", value_name = "HASH")]
    hashes: Vec<String>,

    /// Consumer protocol
    #[arg(long, default_value = "http")]
    consumer_type: String,

    /// Do not reconnect when the connection drops
    #[arg(long)]
    no_reconnect: bool,

    /// Words or phrases to track
    words: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "sift-track failed");
            eprintln!("ERR: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> siftstream::Result<()> {
    let consumer_type: ConsumerType = args.consumer_type.parse()?;
    let config = ClientConfig::from_env()?;
    let credentials = Credentials::new(args.username, args.api_key, siftstream::USER_AGENT);
    let user = User::with_config(credentials, config)?;

    let target = if args.hashes.is_empty() {
        let csdl = track_csdl(args.words.as_slice()).ok_or_else(|| {
            Error::invalid_usage("Please specify the words and/or phrases to track")
        })?;
        println!("Definition:");
        println!("  {csdl}");
        StreamTarget::Csdl(csdl)
    } else {
        StreamTarget::Hashes(args.hashes)
    };

    let consumer = user
        .consumer_for(&target, PrintingHandler::new(), consumer_type)
        .await?;
    info!(url = %consumer.url(), "consuming");

    let stopper = consumer.handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, stopping consumer");
            let _ = stopper.stop();
        }
    });

    consumer.consume(!args.no_reconnect)?;
    let result = consumer.wait().await;
    interrupt.abort();
    result
}
