//! Thin admin client: send one action call over the line protocol and
//! print the envelope.
//!
//! ```text
//! admin_client --port 27015 agent.walk_to '{"agent_id":1,"goal":{"x":10,"y":0}}'
//! ```

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "admin_client", version, about)]
struct Args {
    /// Server host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Admin port.
    #[arg(long, default_value_t = 27015)]
    port: u16,

    /// Optional queue key.
    #[arg(long)]
    key: Option<String>,

    /// Queue priority (lower drains earlier).
    #[arg(long, default_value_t = 0)]
    priority: i32,

    /// Dotted action name, e.g. `agent.walk_to`.
    action: String,

    /// Parameters as a JSON object.
    #[arg(default_value = "{}")]
    params: String,
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let params: serde_json::Value = serde_json::from_str(&args.params).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("params is not valid JSON: {}", e),
        )
    })?;

    let mut call = serde_json::json!({
        "action": args.action,
        "params": params,
        "priority": args.priority,
    });
    if let Some(key) = &args.key {
        call["key"] = serde_json::json!(key);
    }

    let mut stream = TcpStream::connect((args.host.as_str(), args.port))?;
    stream.write_all(call.to_string().as_bytes())?;
    stream.write_all(b"\n")?;

    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    reader.read_line(&mut response)?;
    println!("{}", response.trim_end());
    Ok(())
}
