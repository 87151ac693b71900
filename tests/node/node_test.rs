// Auction Node Tests
// Scenarios for one or two nodes, plus hand-driven peers on the wire

use crate::support::{RawPeer, TestNode};
use p2pauction::sync::{tags, ItemsList, Message, NewBid, NewItem, RequestItems};
use p2pauction::{AuctionNode, BidRejection, Item, NodeConfig, NodeEvent, PeerId};
use std::time::Duration;

#[tokio::test]
async fn test_node_emits_ready_on_start() {
    let mut a = TestNode::start();
    a.wait_for(|e| matches!(e, NodeEvent::Ready)).await;
    assert!(!a.node.is_shut_down());
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = NodeConfig::new().with_topic_name("");
    assert!(AuctionNode::new(config).is_err());
}

#[tokio::test]
async fn test_isolated_node_still_trades_locally() {
    let mut a = TestNode::start();

    a.node.add_item("lamp", "Desk Lamp", "brass", 40).await.unwrap();
    a.wait_for(|e| matches!(e, NodeEvent::ItemAdded(item) if item.id() == "lamp"))
        .await;

    a.node.bid_on_item("lamp", 45).await.unwrap();
    a.wait_for(|e| matches!(e, NodeEvent::BidPlaced { amount: 45, .. }))
        .await;

    let lamp = a.node.item("lamp").await.unwrap();
    assert_eq!(lamp.current_bid(), 45);
    assert_eq!(lamp.highest_bidder(), Some(&a.node.local_id()));
    assert_eq!(a.node.connection_count().await, 0);
}

#[tokio::test]
async fn test_local_bid_rejections() {
    let a = TestNode::start();
    a.node.add_item("lamp", "Desk Lamp", "", 40).await.unwrap();

    assert_eq!(
        a.node.bid_on_item("missing", 100).await,
        Err(BidRejection::UnknownItem)
    );
    assert_eq!(
        a.node.bid_on_item("lamp", 40).await,
        Err(BidRejection::TooLow { current: 40 })
    );
    assert_eq!(a.node.item("lamp").await.unwrap().current_bid(), 40);
}

#[tokio::test]
async fn test_two_nodes_connect() {
    let mut a = TestNode::start();
    let mut b = TestNode::start();
    a.connect(&b);

    a.wait_for(|e| matches!(e, NodeEvent::PeerConnected { .. }))
        .await;
    b.wait_for(|e| matches!(e, NodeEvent::PeerConnected { .. }))
        .await;
    assert_eq!(a.node.connection_count().await, 1);
    assert_eq!(b.node.connection_count().await, 1);
}

#[tokio::test]
async fn test_item_reaches_connected_peer() {
    let mut a = TestNode::start();
    let mut b = TestNode::start();
    a.connect(&b);
    b.wait_for(|e| matches!(e, NodeEvent::PeerConnected { .. }))
        .await;
    a.wait_for(|e| matches!(e, NodeEvent::PeerConnected { .. }))
        .await;

    a.node
        .add_item("item1", "Rare Coin", "1909 penny", 100)
        .await
        .unwrap();

    let event = b
        .wait_for(|e| matches!(e, NodeEvent::ItemReceived(_)))
        .await;
    let NodeEvent::ItemReceived(item) = event else {
        unreachable!()
    };
    assert_eq!(item.id(), "item1");
    assert_eq!(item.name(), "Rare Coin");
    assert_eq!(item.current_bid(), 100);
    assert_eq!(item.highest_bidder(), None);
    assert_eq!(b.node.item("item1").await, Some(item));
}

#[tokio::test]
async fn test_marketplace_scenario() {
    let mut a = TestNode::start();
    let mut b = TestNode::start();
    a.connect(&b);
    b.wait_for(|e| matches!(e, NodeEvent::PeerConnected { .. }))
        .await;

    a.node.add_item("item1", "Rare Coin", "", 100).await.unwrap();
    b.wait_for(|e| matches!(e, NodeEvent::ItemReceived(_))).await;

    // B outbids the starting price
    b.node.bid_on_item("item1", 150).await.unwrap();
    let event = a
        .wait_for(|e| matches!(e, NodeEvent::BidReceived { .. }))
        .await;
    assert_eq!(
        event,
        NodeEvent::BidReceived {
            item_id: "item1".to_string(),
            amount: 150,
            bidder: b.node.local_id(),
        }
    );
    let on_a = a.node.item("item1").await.unwrap();
    assert_eq!(on_a.current_bid(), 150);
    assert_eq!(on_a.highest_bidder(), Some(&b.node.local_id()));

    // C joins through B and catches up with the current price
    let mut c = TestNode::start();
    c.connect(&b);
    c.wait_for(|e| matches!(e, NodeEvent::ItemsReceived(_))).await;
    eventually!(c
        .node
        .item("item1")
        .await
        .is_some_and(|item| item.current_bid() == 150));

    assert_eq!(
        c.node.bid_on_item("item1", 120).await,
        Err(BidRejection::TooLow { current: 150 })
    );

    for node in [&a, &b, &c] {
        let item = node.node.item("item1").await.unwrap();
        assert_eq!(item.current_bid(), 150);
        assert_eq!(item.highest_bidder(), Some(&b.node.local_id()));
    }
}

#[tokio::test]
async fn test_late_joiner_catches_up() {
    let a = TestNode::start();
    let mut b = TestNode::start();
    a.connect(&b);
    b.wait_for(|e| matches!(e, NodeEvent::PeerConnected { .. }))
        .await;

    a.node.add_item("item1", "Rare Coin", "", 100).await.unwrap();
    a.node.add_item("item2", "Old Map", "", 30).await.unwrap();
    eventually!(b.node.items().await.len() == 2);

    let mut d = TestNode::start();
    d.connect(&a);

    let event = d
        .wait_for(|e| matches!(e, NodeEvent::ItemsReceived(items) if !items.is_empty()))
        .await;
    let NodeEvent::ItemsReceived(items) = event else {
        unreachable!()
    };
    assert_eq!(items.len(), 2);

    let item1 = d.node.item("item1").await.unwrap();
    assert_eq!(item1.name(), "Rare Coin");
    assert_eq!(item1.current_bid(), 100);
    assert!(d.node.item("item2").await.is_some());
}

#[tokio::test]
async fn test_catalog_exchange_is_mutual() {
    let a = TestNode::start();
    let b = TestNode::start();
    a.node.add_item("from-a", "Chair", "", 10).await.unwrap();
    b.node.add_item("from-b", "Table", "", 20).await.unwrap();

    a.connect(&b);

    eventually!(
        a.node.item("from-b").await.is_some() && b.node.item("from-a").await.is_some()
    );
}

#[tokio::test]
async fn test_peer_disconnect_is_reported() {
    let mut a = TestNode::start();
    let mut b = TestNode::start();
    a.connect(&b);
    a.wait_for(|e| matches!(e, NodeEvent::PeerConnected { .. }))
        .await;
    b.wait_for(|e| matches!(e, NodeEvent::PeerConnected { .. }))
        .await;

    b.node.shutdown();

    a.wait_for(|e| matches!(e, NodeEvent::PeerDisconnected { .. }))
        .await;
    eventually!(a.node.connection_count().await == 0);

    // A keeps working without its peer
    a.node.add_item("solo", "Vase", "", 5).await.unwrap();
    assert!(a.node.item("solo").await.is_some());
}

#[tokio::test]
async fn test_first_frame_is_catalog_request() {
    let a = TestNode::start();
    let mut raw = RawPeer::attach(&a).await;

    match raw.recv().await {
        Message::RequestItems(request) => assert_eq!(request.sender(), &a.node.local_id()),
        other => panic!("expected RequestItems, got {:?}", other),
    }
}

#[tokio::test]
async fn test_catalog_request_answered_with_snapshot() {
    let a = TestNode::start();
    a.node.add_item("item1", "Rare Coin", "", 100).await.unwrap();
    a.node.bid_on_item("item1", 110).await.unwrap();

    let mut raw = RawPeer::attach(&a).await;
    raw.recv().await;

    raw.send(&Message::RequestItems(RequestItems::new(PeerId::generate())))
        .await;

    match raw.recv().await {
        Message::ItemsList(list) => {
            assert_eq!(list.sender(), &a.node.local_id());
            assert_eq!(list.items().len(), 1);
            assert_eq!(list.items()[0].current_bid(), 110);
            assert_eq!(list.items()[0].highest_bidder(), Some(&a.node.local_id()));
        }
        other => panic!("expected ItemsList, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let mut a = TestNode::start();
    let mut raw = RawPeer::attach(&a).await;
    raw.recv().await;

    raw.send_raw(&[]).await;
    raw.send_raw(&[tags::NEW_BID, 0xff, 0xff, 0xff]).await;
    raw.send_raw(&[0x7f, 1, 2, 3]).await;

    let item = Item::new("item1", "Rare Coin", "", 100);
    raw.send(&Message::NewItem(NewItem::new(PeerId::generate(), item.clone())))
        .await;

    a.wait_for(|e| matches!(e, NodeEvent::ItemReceived(_))).await;
    assert_eq!(a.node.item("item1").await, Some(item));
    assert_eq!(a.node.connection_count().await, 1);

    let stats = a.node.stats().await;
    assert_eq!(stats.unknown_messages, 1);
}

#[tokio::test]
async fn test_gossip_not_echoed_to_origin() {
    let mut a = TestNode::start();
    let mut origin = RawPeer::attach(&a).await;
    let mut other = RawPeer::attach(&a).await;
    origin.recv().await;
    other.recv().await;
    eventually!(a.node.connection_count().await == 2);

    let item = Item::new("item1", "Rare Coin", "", 100);
    origin
        .send(&Message::NewItem(NewItem::new(PeerId::generate(), item.clone())))
        .await;
    a.wait_for(|e| matches!(e, NodeEvent::ItemReceived(_))).await;

    match other.recv().await {
        Message::NewItem(forwarded) => assert_eq!(forwarded.item(), &item),
        unexpected => panic!("expected NewItem, got {:?}", unexpected),
    }
    assert!(origin
        .recv_within(Duration::from_millis(200))
        .await
        .is_none());
}

#[tokio::test]
async fn test_duplicate_gossip_forwarded_once() {
    let mut a = TestNode::start();
    let mut origin = RawPeer::attach(&a).await;
    let mut other = RawPeer::attach(&a).await;
    origin.recv().await;
    other.recv().await;
    eventually!(a.node.connection_count().await == 2);

    let announce = Message::NewItem(NewItem::new(
        PeerId::generate(),
        Item::new("item1", "Rare Coin", "", 100),
    ));
    origin.send(&announce).await;
    origin.send(&announce).await;
    a.wait_for(|e| matches!(e, NodeEvent::ItemReceived(_))).await;

    assert!(matches!(other.recv().await, Message::NewItem(_)));
    assert!(other
        .recv_within(Duration::from_millis(200))
        .await
        .is_none());
}

#[tokio::test]
async fn test_stale_bid_not_forwarded() {
    let a = TestNode::start();
    a.node.add_item("item1", "Rare Coin", "", 100).await.unwrap();
    a.node.bid_on_item("item1", 200).await.unwrap();

    let mut origin = RawPeer::attach(&a).await;
    let mut other = RawPeer::attach(&a).await;
    origin.recv().await;
    other.recv().await;
    eventually!(a.node.connection_count().await == 2);

    origin
        .send(&Message::NewBid(NewBid::new(PeerId::generate(), "item1", 150)))
        .await;

    eventually!(a.node.stats().await.bids_rejected == 1);
    assert!(other
        .recv_within(Duration::from_millis(200))
        .await
        .is_none());
    assert_eq!(a.node.item("item1").await.unwrap().current_bid(), 200);
}

#[tokio::test]
async fn test_own_messages_ignored() {
    let a = TestNode::start();
    let mut raw = RawPeer::attach(&a).await;
    raw.recv().await;

    let me = a.node.local_id();
    let item = Item::new("echo", "Mirror", "", 10);
    raw.send(&Message::NewItem(NewItem::new(me, item.clone())))
        .await;
    raw.send(&Message::ItemsList(ItemsList::new(me, vec![item])))
        .await;
    raw.send(&Message::RequestItems(RequestItems::new(me)))
        .await;

    eventually!(a.node.stats().await.self_messages_dropped == 3);
    assert!(a.node.item("echo").await.is_none());
    assert!(raw.recv_within(Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let a = TestNode::start();
    let mut b = TestNode::start();
    a.connect(&b);
    b.wait_for(|e| matches!(e, NodeEvent::PeerConnected { .. }))
        .await;

    a.node.shutdown();
    assert!(a.node.is_shut_down());

    b.wait_for(|e| matches!(e, NodeEvent::PeerDisconnected { .. }))
        .await;
    eventually!(a.node.connection_count().await == 0);
}

#[tokio::test]
async fn test_nodes_trade_over_tcp() {
    use p2pauction::transport::{TcpDiscovery, TcpDiscoveryConfig, Topic};

    let local = || {
        TcpDiscoveryConfig::new()
            .with_bind_address("127.0.0.1")
            .with_handshake_timeout(2)
    };

    let a = AuctionNode::new(NodeConfig::default()).unwrap();
    let a_discovery = TcpDiscovery::bind(local(), Topic::default()).await.unwrap();
    let a_addr = a_discovery.local_addr().to_string();
    a.start(a_discovery);

    let b = AuctionNode::new(NodeConfig::default()).unwrap();
    let mut b_events = b.subscribe();
    let b_discovery = TcpDiscovery::bind(local().with_bootstrap_peer(&a_addr), Topic::default())
        .await
        .unwrap();
    b.start(b_discovery);

    eventually!(a.connection_count().await == 1 && b.connection_count().await == 1);

    a.add_item("item1", "Rare Coin", "", 100).await.unwrap();
    eventually!(b.item("item1").await.is_some());

    b.bid_on_item("item1", 150).await.unwrap();
    eventually!(a.item("item1").await.map(|i| i.current_bid()) == Some(150));

    assert!(matches!(b_events.recv().await, Ok(NodeEvent::Ready)));
}
