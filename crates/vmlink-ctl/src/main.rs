//! vmlink-ctl — command-line interface for the vmlink daemon.

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 9101;

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    interface:    String,
    entries:      usize,
    ip_entries:   usize,
    suspended:    usize,
    with_channel: usize,
    buckets:      usize,
    capacity:     usize,
    staleness_ms: u64,
}

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<PeerInfo>,
}

#[derive(Deserialize)]
struct PeerInfo {
    mac:         String,
    ip:          Option<String>,
    peer_id:     u16,
    status:      String,
    age_ms:      u64,
    listen_role: bool,
    has_channel: bool,
    retry_count: u32,
}

#[derive(Deserialize)]
struct RemoveResponse {
    mac:     String,
    removed: bool,
}

#[derive(Deserialize)]
struct FreezeResponse {
    cleared:   bool,
    remaining: usize,
}

#[derive(Deserialize)]
struct ShutdownResponse {
    shutting_down: bool,
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

async fn parse<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("daemon returned {}: {}", status, body);
    }
    resp.json::<T>().await.context("failed to parse response")
}

async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to vmlinkd at {} (is it running?)", url))?;
    parse(resp).await
}

async fn post_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::Client::new()
        .post(url)
        .send()
        .await
        .with_context(|| format!("failed to connect to vmlinkd at {} (is it running?)", url))?;
    parse(resp).await
}

async fn delete_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::Client::new()
        .delete(url)
        .send()
        .await
        .with_context(|| format!("failed to connect to vmlinkd at {} (is it running?)", url))?;
    parse(resp).await
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  vmlink Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Interface        : {}", resp.interface);
    println!("  Entries          : {} / {}", resp.entries, resp.capacity);
    println!("  With IP          : {}", resp.ip_entries);
    println!("  With channel     : {}", resp.with_channel);
    println!("  Suspended        : {}", resp.suspended);
    println!("  Buckets          : {}", resp.buckets);
    println!("  Staleness        : {} ms", resp.staleness_ms);

    Ok(())
}

async fn cmd_peers(port: u16) -> Result<()> {
    let resp: PeersResponse = get_json(&format!("{}/peers", base_url(port))).await?;

    if resp.peers.is_empty() {
        println!("No peers registered.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Registered Peers ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        let role = match (p.has_channel, p.listen_role) {
            (false, _)    => "none",
            (true, true)  => "listener",
            (true, false) => "connector",
        };
        println!("  ┌─ {}", p.mac);
        println!("  │  ip        : {}", p.ip.as_deref().unwrap_or("-"));
        println!("  │  peer id   : {}", p.peer_id);
        println!("  │  status    : {}", p.status);
        println!("  │  channel   : {}", role);
        println!("  │  retries   : {}", p.retry_count);
        println!("  └─ last seen : {}ms ago", p.age_ms);
    }

    Ok(())
}

async fn cmd_remove(port: u16, mac: &str) -> Result<()> {
    let resp: RemoveResponse = delete_json(&format!("{}/peers/{}", base_url(port), mac)).await?;
    if resp.removed {
        println!("Removed {}.", resp.mac);
    } else {
        println!("{} was not registered.", resp.mac);
    }
    Ok(())
}

async fn cmd_freeze(port: u16) -> Result<()> {
    let resp: FreezeResponse = post_json(&format!("{}/freeze", base_url(port))).await?;
    if resp.cleared {
        println!("Freeze complete; table is clear.");
    } else {
        println!("Freeze timed out with {} entries left.", resp.remaining);
    }
    Ok(())
}

async fn cmd_shutdown(port: u16) -> Result<()> {
    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    if resp.shutting_down {
        println!("Daemon shutting down.");
    } else {
        println!("Daemon did not acknowledge shutdown.");
    }
    Ok(())
}

fn print_usage() {
    println!("Usage: vmlink-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status          Show registry status");
    println!("  peers           List registered peers");
    println!("  remove <mac>    Remove a peer and notify its VM");
    println!("  freeze          Suspend all peers ahead of migration");
    println!("  shutdown        Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | []                => cmd_status(port).await,
        ["peers"]                      => cmd_peers(port).await,
        ["remove", mac]                => cmd_remove(port, mac).await,
        ["freeze"]                     => cmd_freeze(port).await,
        ["shutdown"]                   => cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
