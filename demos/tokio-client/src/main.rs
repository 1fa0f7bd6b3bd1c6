//! Minimal shipping client: auto-reconnects to a collector and sends one
//! `WRITE` a second for as long as a connection is up.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use logline_proto::client::{AutoReconnect, ClientConfig};
use logline_proto::server::DEFAULT_ADDR;
use logline_types::message::{LogMessage, TagSet};
use tokio::signal;

#[derive(Parser, Debug)]
#[command(about = "Demo log-shipping client")]
struct Args {
    #[arg(long, default_value = DEFAULT_ADDR)]
    connect: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let active = Arc::new(Mutex::new(None));
    let active_for_callback = active.clone();
    let reconnector = AutoReconnect::start(args.connect.clone(), ClientConfig::default(), move |channel| {
        log::info!("connected to {}", args.connect);
        *active_for_callback.lock().unwrap() = Some(channel);
    });

    let mut sequence: u64 = 0;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                let channel = active.lock().unwrap().clone();
                if let Some(channel) = channel {
                    sequence += 1;
                    let msg = sample_message(sequence);
                    if let Err(err) = channel.send_message(&msg).await {
                        log::warn!("send failed: {err}");
                    }
                }
            }
            _ = signal::ctrl_c() => {
                log::info!("ctrl-c received, stopping");
                break;
            }
        }
    }

    reconnector.stop().await;
    Ok(())
}

fn sample_message(sequence: u64) -> LogMessage {
    let mut tags = TagSet::new();
    tags.insert("demo");
    LogMessage {
        timestamp: chrono::Utc::now().fixed_offset(),
        high_precision_timestamp: 0,
        lost_message_count: 0,
        log_writer_name: "demo".to_owned(),
        log_level_name: "Note".to_owned(),
        application_name: "logline-demo-client".to_owned(),
        process_name: "logline-demo-client".to_owned(),
        process_id: std::process::id() as i64,
        tags,
        text: format!("heartbeat message #{sequence}"),
    }
}
