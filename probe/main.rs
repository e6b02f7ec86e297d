#![forbid(unsafe_code)]

//! `vim-harness-probe`: send raw protocol messages to a running analysis
//! server and print what comes back.
//!
//! Each message is framed with a `Content-Length` header. Responses are
//! printed one per line until nothing arrives for `--timeout` seconds.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;

use vim_harness::protocol;

#[derive(Debug, Parser)]
#[command(
    name = "vim-harness-probe",
    about = "Send JSON messages to an analysis server",
    version,
    long_about = None
)]
struct Cli {
    /// Server address, e.g. `127.0.0.1:9527`.
    #[arg(long)]
    address: String,

    /// Seconds to wait for each further response.
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// JSON messages to send, in order.
    #[arg(required = true)]
    messages: Vec<String>,
}

fn main() -> ExitCode {
    let args = Cli::parse();

    let messages = match args
        .messages
        .iter()
        .map(|raw| serde_json::from_str(raw))
        .collect::<Result<Vec<Value>, _>>()
    {
        Ok(messages) => messages,
        Err(err) => {
            eprintln!("Invalid JSON message: {err}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let timeout = Duration::from_secs(args.timeout);
    runtime.block_on(async move {
        let mut conn = match protocol::connect(&args.address).await {
            Ok(conn) => conn,
            Err(err) => {
                eprintln!("Failed to connect to {}: {err}", args.address);
                return ExitCode::FAILURE;
            }
        };

        for message in &messages {
            if let Err(err) = conn.send(message).await {
                eprintln!("Failed to send message: {err}");
                return ExitCode::FAILURE;
            }
        }

        let mut received = 0_usize;
        while let Some(response) = conn.receive(timeout).await {
            received += 1;
            println!("{response}");
        }
        if received == 0 {
            eprintln!("No response within {}s", timeout.as_secs());
        }
        ExitCode::SUCCESS
    })
}
