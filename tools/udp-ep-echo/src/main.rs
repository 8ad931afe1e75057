// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! udp-ep-echo - UDP echo server on the udp-ep pipeline
//!
//! Every datagram is handled on a worker thread and sent back to its sender
//! (optionally with a deadline). Ctrl+C stops the endpoint and prints the
//! counters.

use clap::Parser;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use udp_ep::{Backpressure, Endpoint, EndpointConfig, Transmitter};

/// UDP echo server
#[derive(Parser, Debug)]
#[command(name = "udp-ep-echo")]
#[command(version = "0.1.0")]
#[command(about = "Echo UDP datagrams back to their sender")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// UDP port to bind (0 = ephemeral)
    #[arg(short, long, default_value = "9000")]
    port: u16,

    /// Receive buffer size in bytes
    #[arg(short, long, default_value = "1500")]
    buffer: usize,

    /// Worker threads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Dispatch queue length
    #[arg(short, long, default_value = "1024")]
    queue: usize,

    /// Drop datagrams instead of blocking when the queue is full
    #[arg(long)]
    drop_when_full: bool,

    /// Echo with a send deadline in milliseconds (0 = plain send)
    #[arg(long, default_value = "0")]
    timeout_ms: u64,

    /// Do not print each datagram
    #[arg(short = 's', long)]
    quiet: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let backpressure = if args.drop_when_full {
        Backpressure::Drop
    } else {
        Backpressure::Block
    };
    let config = EndpointConfig::new(args.buffer, args.workers, args.queue)
        .with_backpressure(backpressure)
        .with_env_overrides();

    let transmitter: Arc<OnceLock<Transmitter>> = Arc::new(OnceLock::new());
    let echoed = Arc::new(AtomicU64::new(0));
    let send_failures = Arc::new(AtomicU64::new(0));

    let tx = Arc::clone(&transmitter);
    let echoed_cb = Arc::clone(&echoed);
    let failures_cb = Arc::clone(&send_failures);
    let quiet = args.quiet;
    let timeout = Duration::from_millis(args.timeout_ms);

    let endpoint = Endpoint::builder(args.buffer, args.workers, args.queue)
        .config(config)
        .on_receive(move |from, payload, n| {
            if !quiet {
                println!("{} bytes from {}", n, from);
            }
            let Some(tx) = tx.get() else {
                return;
            };
            let sent = if timeout.is_zero() {
                tx.send_to(from, payload)
            } else {
                tx.send_to_timeout(from, payload, timeout)
            };
            match sent {
                Ok(()) => {
                    echoed_cb.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    failures_cb.fetch_add(1, Ordering::Relaxed);
                    log::warn!("echo to {} failed: {}", from, e);
                }
            }
        })
        .on_error(|code, err| log::warn!("{}: {}", code, err))
        .build()?;
    let endpoint = Arc::new(endpoint);

    let local = endpoint.bind(&args.host, args.port)?;
    if transmitter.set(endpoint.transmitter()?).is_err() {
        return Err("transmitter already initialized".into());
    }

    // Setup Ctrl+C handler
    let stopper = Arc::clone(&endpoint);
    ctrlc::set_handler(move || {
        stopper.stop();
    })?;

    println!(
        "Echoing on {} (workers={}, queue={}, buffer={}B). Ctrl+C to stop.",
        local, args.workers, args.queue, args.buffer
    );

    let exit = endpoint.run()?;
    endpoint.stop();

    let metrics = endpoint.metrics();
    println!();
    println!("Receive loop ended: {:?}", exit);
    println!("  datagrams received : {}", metrics.datagrams_received);
    println!("  bytes received     : {}", metrics.bytes_received);
    println!("  echoed             : {}", echoed.load(Ordering::Relaxed));
    println!("  echo failures      : {}", send_failures.load(Ordering::Relaxed));
    println!("  buffer pool misses : {}", metrics.buffer_exhausted);
    println!("  requests dropped   : {}", metrics.requests_dropped);
    println!("  callback panics    : {}", metrics.callback_panics);
    Ok(())
}
