//! Channel connection against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use poll_live::live::{ChannelConnection, LikeUpdate, PollEvent, VoteUpdate};
use poll_live::EventBroadcaster;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const WAIT: Duration = Duration::from_secs(5);

async fn next_event(rx: &mut mpsc::UnboundedReceiver<PollEvent>) -> PollEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("handler channel closed")
}

#[tokio::test]
async fn test_receives_events_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let (sent_tx, sent_rx) = oneshot::channel::<String>();

    let server = tokio::spawn(async move {
        // First connection: two events around a malformed frame, then hang up.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"vote","payload":{"poll_id":1,"option_id":10,"votes_count":5}}"#.to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text("definitely not json".to_string()))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"type":"like","payload":{"poll_id":1,"likes_count":1}}"#.to_string(),
        ))
        .await
        .unwrap();
        ws.close(None).await.unwrap();
        drop(ws);

        // Second connection after the client retries.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"like","payload":{"poll_id":1,"likes_count":2}}"#.to_string(),
        ))
        .await
        .unwrap();

        let mut reply = None;
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                reply = Some(text);
                break;
            }
        }
        if let Some(text) = reply {
            let _ = sent_tx.send(text);
        }
    });

    let channel = ChannelConnection::new(url, Duration::from_millis(50));
    let (tx, mut rx) = mpsc::unbounded_channel();
    channel.on_message(move |event| {
        let _ = tx.send(event.clone());
    });
    channel.connect();
    channel.connect();

    assert_eq!(
        next_event(&mut rx).await,
        PollEvent::Vote(VoteUpdate {
            poll_id: 1,
            option_id: 10,
            votes_count: 5
        })
    );
    assert_eq!(
        next_event(&mut rx).await,
        PollEvent::Like(LikeUpdate {
            poll_id: 1,
            likes_count: 1
        })
    );
    assert_eq!(
        next_event(&mut rx).await,
        PollEvent::Like(LikeUpdate {
            poll_id: 1,
            likes_count: 2
        })
    );

    assert!(channel.is_open());
    let outgoing = PollEvent::Like(LikeUpdate {
        poll_id: 1,
        likes_count: 3,
    });
    channel.send(&outgoing);

    let sent = timeout(WAIT, sent_rx).await.unwrap().unwrap();
    assert_eq!(PollEvent::decode(&sent).unwrap(), outgoing);

    channel.disconnect();
    assert_eq!(channel.handler_count(), 0);
    timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_broadcaster_attached_to_channel() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"poll_created","payload":{"id":8,"question":"Lunch?"}}"#.to_string(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            r#"{"type":"poll_closed","payload":{"poll_id":8}}"#.to_string(),
        ))
        .await
        .unwrap();
        // Keep the socket open until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let channel = ChannelConnection::new(url, Duration::from_millis(50));
    let broadcaster = Arc::new(EventBroadcaster::new());
    broadcaster.attach(&channel);

    let (tx, mut rx) = mpsc::unbounded_channel();
    broadcaster.subscribe_messages(move |event| {
        let _ = tx.send(event.clone());
    });
    channel.connect();

    let first = next_event(&mut rx).await;
    assert!(matches!(first, PollEvent::PollCreated(ref poll) if poll.id == 8));
    let second = next_event(&mut rx).await;
    assert_eq!(second.kind(), "poll_closed");
    assert_eq!(broadcaster.len(), 2);

    channel.disconnect();
}

#[tokio::test]
async fn test_reconnects_after_connection_drops_without_close_frame() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"like","payload":{"poll_id":4,"likes_count":1}}"#.to_string(),
        ))
        .await
        .unwrap();
        // Tear down the TCP connection without a closing handshake.
        drop(ws);

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"like","payload":{"poll_id":4,"likes_count":2}}"#.to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let channel = ChannelConnection::new(url, Duration::from_millis(50));
    let (tx, mut rx) = mpsc::unbounded_channel();
    channel.on_message(move |event| {
        let _ = tx.send(event.clone());
    });
    channel.connect();

    assert_eq!(
        next_event(&mut rx).await,
        PollEvent::Like(LikeUpdate {
            poll_id: 4,
            likes_count: 1
        })
    );
    assert_eq!(
        next_event(&mut rx).await,
        PollEvent::Like(LikeUpdate {
            poll_id: 4,
            likes_count: 2
        })
    );

    channel.disconnect();
}
