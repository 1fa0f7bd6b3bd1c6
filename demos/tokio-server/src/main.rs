//! Minimal collector daemon: binds a listen socket, accepts shipping
//! connections, and prints every successfully-parsed `WRITE` message to
//! stdout. Ctrl-C requests a graceful shutdown.

use anyhow::Context;
use clap::Parser;
use logline_proto::server::{Server, ServerConfig, DEFAULT_ADDR};
use tokio::signal;

#[derive(Parser, Debug)]
#[command(about = "Demo log-shipping collector")]
struct Args {
    #[arg(long, default_value = DEFAULT_ADDR)]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let server = Server::bind(args.listen.as_str(), ServerConfig::default())
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    log::info!("listening on {}", server.local_addr()?);

    server
        .run(
            |channel| {
                channel.on_write(|msg| {
                    println!(
                        "[{}] {} {}/{}: {}",
                        msg.timestamp,
                        msg.log_level_name,
                        msg.application_name,
                        msg.process_name,
                        msg.text
                    );
                });
                channel.on_shutdown_completed(|cause| {
                    log::debug!("connection closed: {cause:?}");
                });
            },
            async {
                let _ = signal::ctrl_c().await;
                log::info!("ctrl-c received");
            },
        )
        .await;

    Ok(())
}
