// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Command-line entry point: run the demo server or issue calls against one.
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use wirerpc::config::Config;
use wirerpc::engine_core::models::Request;
use wirerpc::rpc::{Client, Server};
use wirerpc::services::Calculator;

#[derive(Parser, Debug)]
#[command(name = "wirerpc", version, about, long_about = None)]
struct Cli {
    /// Host to bind (serve) or connect to (call, batch)
    #[arg(long, global = true)]
    host: Option<String>,

    /// TCP port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the Calculator service until Ctrl-C
    Serve {
        /// Set SO_REUSEPORT so several servers can share the port
        #[arg(long)]
        reuse_port: bool,
    },
    /// Send one request and print the response
    Call {
        /// Method key, e.g. "Calculator.sum"
        method: String,
        /// Positional params as a JSON array
        #[arg(default_value = "[]")]
        params: String,
        /// Request id (defaults to a generated one)
        #[arg(long)]
        id: Option<i64>,
    },
    /// Send a batch, e.g. '[{"method":"Calculator.sum","params":[1,2]}]'
    Batch {
        /// JSON array of {"method", "params", "id"} objects
        calls: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    install_panic_hook();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        eprintln!(
            "Warning: Failed to load config from env, using defaults: {}",
            e
        );
        Config::default()
    });

    if let Some(host) = &cli.host {
        config.server.host = host.clone();
        config.pool.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
        config.pool.port = port;
    }

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to init tracing: {}", e);
    }

    match cli.command {
        Command::Serve { reuse_port } => {
            config.server.reuse_port |= reuse_port;
            serve(config).await
        }
        Command::Call { method, params, id } => {
            let client = Client::connect(config.pool);
            let params = parse_params(&params)?;
            let id = id.map(Value::from).unwrap_or_else(|| client.next_id().into());
            let response = client.call(Request::new(method, params, id)).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Batch { calls } => {
            let client = Client::connect(config.pool);
            let requests = parse_batch(&calls, &client)?;
            let responses = client.call_multiple(requests).await?;
            println!("{}", serde_json::to_string_pretty(&responses)?);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    let mut server = Server::new(config.server);
    server.register(Calculator);
    let running = server.start().await?;
    info!("Serving methods on {}", running.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");
    running.shutdown().await
}

fn parse_params(raw: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(raw).context("params must be JSON")? {
        Value::Array(params) => Ok(params),
        other => bail!("params must be a JSON array, got {}", other),
    }
}

fn parse_batch(raw: &str, client: &Client) -> Result<Vec<Request>> {
    let Value::Array(calls) = serde_json::from_str::<Value>(raw).context("batch must be JSON")? else {
        bail!("batch must be a JSON array of calls");
    };
    calls
        .into_iter()
        .enumerate()
        .map(|(i, call)| -> Result<Request> {
            let method = call
                .get("method")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("call {} has no method", i))?
                .to_string();
            let params = match call.get("params") {
                None => Vec::new(),
                Some(Value::Array(params)) => params.clone(),
                Some(other) => bail!("call {} params must be an array, got {}", i, other),
            };
            let id = match call.get("id") {
                Some(id) if !id.is_null() => id.clone(),
                _ => client.next_id().into(),
            };
            Ok(Request::new(method, params, id))
        })
        .collect()
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("PANIC: {} at {}", message, location);
    }));
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("wirerpc=debug,info"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
