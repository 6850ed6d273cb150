//! Session integration tests against a local WebSocket gateway

use futures_util::{SinkExt, StreamExt};
use mfd_panel::session::Backoff;
use mfd_panel::{EventSender, PanelClient, PanelEvent, SessionError, SessionOptions};
use mfd_protocol::{decode, Envelope};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

async fn gateway() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    (listener, url)
}

fn options(url: &str, subscription: Option<&str>) -> SessionOptions {
    SessionOptions {
        url: url.to_string(),
        watchdog_interval: Duration::from_millis(5_000),
        heartbeat_timeout: Duration::from_millis(10_000),
        subscription: subscription.map(str::to_string),
        reconnect: None,
    }
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    accept_async(stream).await.unwrap()
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        let msg = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = msg {
            return text.as_str().to_string();
        }
    }
}

async fn next_envelope(ws: &mut WebSocketStream<TcpStream>) -> Envelope {
    decode(&next_text(ws).await).unwrap()
}

async fn next_event(rx: &mut UnboundedReceiver<PanelEvent>) -> PanelEvent {
    timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

/// Wait for a specific event, skipping others
async fn wait_for(rx: &mut UnboundedReceiver<PanelEvent>, wanted: PanelEvent) {
    loop {
        if next_event(rx).await == wanted {
            return;
        }
    }
}

async fn send(ws: &mut WebSocketStream<TcpStream>, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

#[tokio::test]
async fn test_heartbeat_is_acknowledged() {
    let (listener, url) = gateway().await;
    let (events, mut rx) = EventSender::channel();
    let client = PanelClient::connect(options(&url, None), events);

    let mut ws = accept(&listener).await;
    wait_for(&mut rx, PanelEvent::Connected).await;
    assert!(client.is_connected());

    send(&mut ws, r#"{"messagetype":48,"messagecmd":5,"size":0,"data":[]}"#).await;
    assert_eq!(
        next_text(&mut ws).await,
        r#"{"messagetype":128,"messagecmd":0,"size":1,"data":[0]}"#
    );
    wait_for(&mut rx, PanelEvent::Heartbeat).await;
}

#[tokio::test]
async fn test_status_report_survives_garbage_frame() {
    let (listener, url) = gateway().await;
    let (events, mut rx) = EventSender::channel();
    let client = PanelClient::connect(options(&url, None), events);

    let mut ws = accept(&listener).await;
    wait_for(&mut rx, PanelEvent::Connected).await;

    send(&mut ws, "this is not json").await;
    send(&mut ws, r#"{"messagetype":16,"messagecmd":0,"data":[5,0,1]}"#).await;

    wait_for(&mut rx, PanelEvent::SignalChanged { signal_id: 5, state: 1 }).await;
    assert!(client.is_connected());
    assert_eq!(client.signal_state(5), Some(1));
    assert_eq!(client.signal_state(6), None);
}

#[tokio::test]
async fn test_subscription_is_first_frame() {
    let blob = r#"{"messagetype":96,"messagecmd":0,"size":4,"data":[5,0,6,0]}"#;
    let (listener, url) = gateway().await;
    let (events, _rx) = EventSender::channel();
    let _client = PanelClient::connect(options(&url, Some(blob)), events);

    let mut ws = accept(&listener).await;
    assert_eq!(next_text(&mut ws).await, blob);
}

#[tokio::test]
async fn test_channel_commands_reach_gateway() {
    let (listener, url) = gateway().await;
    let (events, mut rx) = EventSender::channel();
    let client = PanelClient::connect(options(&url, None), events);

    let mut ws = accept(&listener).await;
    wait_for(&mut rx, PanelEvent::Connected).await;

    assert_ok!(client.try_send(mfd_protocol::momentary(0x1234, true)));
    client.send_dimmer(3, 5_000);
    client.send_momentary(0x1234, false);

    let press = next_envelope(&mut ws).await;
    assert_eq!((press.message_type, press.message_cmd), (17, 1));
    assert_eq!(press.data, vec![0x34, 0x12, 1]);

    let dim = next_envelope(&mut ws).await;
    assert_eq!((dim.message_type, dim.message_cmd, dim.size), (17, 3, 5));
    assert_eq!(dim.data, vec![3, 0, 0, 0xE8, 0x03]);

    let release = next_envelope(&mut ws).await;
    assert_eq!(release.data, vec![0x34, 0x12, 0]);
}

#[tokio::test]
async fn test_watchdog_probes_silent_gateway() {
    let (listener, url) = gateway().await;
    let (events, _rx) = EventSender::channel();
    let mut opts = options(&url, None);
    opts.watchdog_interval = Duration::from_millis(50);
    opts.heartbeat_timeout = Duration::from_millis(120);
    let _client = PanelClient::connect(opts, events);

    let mut ws = accept(&listener).await;
    let probe = next_envelope(&mut ws).await;
    assert_eq!((probe.message_type, probe.message_cmd), (49, 1));
    assert_eq!(probe.data, vec![0, 0, 0]);

    // Probes already in flight may arrive before the ack
    send(&mut ws, r#"{"messagetype":48,"messagecmd":5,"size":0,"data":[]}"#).await;
    loop {
        let env = next_envelope(&mut ws).await;
        if env.message_type == 128 {
            break;
        }
        assert_eq!(env.message_type, 49);
    }
}

#[tokio::test]
async fn test_closed_session_stays_closed() {
    let (listener, url) = gateway().await;
    let (events, mut rx) = EventSender::channel();
    let mut client = PanelClient::connect(options(&url, None), events);

    let mut ws = accept(&listener).await;
    wait_for(&mut rx, PanelEvent::Connected).await;

    ws.close(None).await.unwrap();
    wait_for(&mut rx, PanelEvent::Disconnected).await;
    assert!(!client.is_connected());
    let err = assert_err!(client.try_send(mfd_protocol::momentary(1, true)));
    assert!(matches!(err, SessionError::ChannelUnavailable));

    timeout(WAIT, client.closed()).await.unwrap();
    assert!(timeout(Duration::from_millis(300), listener.accept()).await.is_err());
}

#[tokio::test]
async fn test_reconnect_resends_subscription() {
    let blob = r#"{"messagetype":96,"messagecmd":0,"size":2,"data":[9,0]}"#;
    let (listener, url) = gateway().await;
    let (events, mut rx) = EventSender::channel();
    let mut opts = options(&url, Some(blob));
    opts.reconnect = Some(Backoff {
        initial: Duration::from_millis(20),
        max: Duration::from_millis(100),
    });
    let client = PanelClient::connect(opts, events);

    let mut first = accept(&listener).await;
    assert_eq!(next_text(&mut first).await, blob);
    first.close(None).await.unwrap();
    wait_for(&mut rx, PanelEvent::Disconnected).await;

    let mut second = accept(&listener).await;
    assert_eq!(next_text(&mut second).await, blob);
    wait_for(&mut rx, PanelEvent::Connected).await;
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_close_sends_close_frame() {
    let (listener, url) = gateway().await;
    let (events, mut rx) = EventSender::channel();
    let mut client = PanelClient::connect(options(&url, None), events);

    let mut ws = accept(&listener).await;
    wait_for(&mut rx, PanelEvent::Connected).await;

    client.close();
    timeout(WAIT, client.closed()).await.unwrap();
    assert!(!client.is_connected());

    let msg = timeout(WAIT, ws.next()).await.unwrap();
    assert!(matches!(msg, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
}

#[tokio::test]
async fn test_close_while_handshake_pending() {
    // The listener never accepts, so the WebSocket handshake never completes
    let (_listener, url) = gateway().await;
    let (events, mut rx) = EventSender::channel();
    let mut client = PanelClient::connect(options(&url, None), events);

    tokio::time::sleep(Duration::from_millis(100)).await;
    client.close();
    timeout(WAIT, client.closed()).await.unwrap();
    assert!(!client.is_connected());
    assert_eq!(next_event(&mut rx).await, PanelEvent::Disconnected);
}
