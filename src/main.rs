// auction - command line marketplace node
//
// Commands on stdin:
//   add <id> <starting_bid> <name> [description...]
//   bid <id> <amount>
//   list
//   peers
//   quit

use clap::Parser;
use p2pauction::transport::{TcpDiscovery, TcpDiscoveryConfig};
use p2pauction::{AuctionNode, NodeConfig, NodeError, NodeEvent};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "auction", version, about = "Peer-to-peer auction node")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:0")]
    listen: SocketAddr,

    /// Peer to dial on startup (repeatable)
    #[arg(short, long = "peer")]
    peers: Vec<String>,

    /// Discovery topic name
    #[arg(short, long, default_value = p2pauction::transport::APP_TOPIC_NAME)]
    topic: String,

    /// Seconds allowed for dialing and the topic handshake
    #[arg(long, default_value_t = 10)]
    handshake_timeout: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), NodeError> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = NodeConfig::new().with_topic_name(&args.topic);
    let node = AuctionNode::new(config.clone())?;

    let mut discovery_config = TcpDiscoveryConfig::new()
        .with_bind_address(&args.listen.ip().to_string())
        .with_bind_port(args.listen.port())
        .with_handshake_timeout(args.handshake_timeout);
    for peer in &args.peers {
        discovery_config = discovery_config.with_bootstrap_peer(peer);
    }
    let discovery = TcpDiscovery::bind(discovery_config, config.topic()).await?;

    println!("Peer ID: {}", node.local_id());
    println!("Listening on {}", discovery.local_addr());

    let mut events = node.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(&event);
        }
    });

    node.start(discovery);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["add", id, starting_bid, name, description @ ..] => match starting_bid.parse() {
                Ok(starting_bid) => {
                    if let Err(e) = node
                        .add_item(id, name, &description.join(" "), starting_bid)
                        .await
                    {
                        println!("item refused: {}", e);
                    }
                }
                Err(_) => println!("starting bid must be a whole number"),
            },
            ["bid", id, amount] => match amount.parse() {
                Ok(amount) => match node.bid_on_item(id, amount).await {
                    Ok(()) => {}
                    Err(e) => println!("bid rejected: {}", e),
                },
                Err(_) => println!("amount must be a whole number"),
            },
            ["list"] => {
                for item in node.items().await {
                    let bidder = item
                        .highest_bidder()
                        .map_or_else(|| "-".to_string(), |p| p.to_string());
                    println!(
                        "{:<12} {:<24} {:>10} (start {:>6}) by {}",
                        item.id(),
                        item.name(),
                        item.current_bid(),
                        item.starting_bid(),
                        bidder
                    );
                }
            }
            ["peers"] => println!("{} connected", node.connection_count().await),
            ["quit"] | ["exit"] => break,
            [] => {}
            _ => println!("commands: add <id> <starting_bid> <name> [description], bid <id> <amount>, list, peers, quit"),
        }
    }

    node.shutdown();
    Ok(())
}

fn print_event(event: &NodeEvent) {
    match event {
        NodeEvent::Ready => println!("ready"),
        NodeEvent::PeerConnected { remote } => println!("peer connected: {}", remote),
        NodeEvent::PeerIdentified { remote, peer } => println!("peer {} is {}", remote, peer),
        NodeEvent::PeerDisconnected { remote } => println!("peer disconnected: {}", remote),
        NodeEvent::ItemAdded(item) => println!("item added: {} ({})", item.name(), item.id()),
        NodeEvent::ItemReceived(item) => println!("new item: {} ({})", item.name(), item.id()),
        NodeEvent::BidPlaced { item_id, amount } => println!("bid placed on {}: {}", item_id, amount),
        NodeEvent::BidReceived {
            item_id,
            amount,
            bidder,
        } => println!("new bid on {}: {} by {}", item_id, amount, bidder),
        NodeEvent::ItemsReceived(items) => println!("received {} items from peer", items.len()),
    }
}
