//! Connection manager behaviour against an in-process broker.
//!
//! The fake broker speaks just enough MQTT 3.1.1 (CONNECT/CONNACK,
//! SUBSCRIBE/SUBACK, PINGREQ/PINGRESP, QoS 0 PUBLISH) to exercise the
//! reconnection timer, explicit teardown and inbound forwarding.
#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use sitewatch_api::{BrokerOptions, ConnectionEvent, ConnectionManager, ConnectionState, Error};

// ── Fake broker ─────────────────────────────────────────────────────

#[derive(Clone)]
enum Behavior {
    /// Read CONNECT, then hang up without CONNACK.
    Reject,
    /// Acknowledge and serve; close after `drop_after` if set.
    Accept {
        drop_after: Option<Duration>,
        publish: Option<(&'static str, &'static str)>,
    },
}

fn accept() -> Behavior {
    Behavior::Accept {
        drop_after: None,
        publish: None,
    }
}

fn accept_then_drop(after: Duration) -> Behavior {
    Behavior::Accept {
        drop_after: Some(after),
        publish: None,
    }
}

struct FakeBroker {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    subscribes: Arc<Mutex<Vec<usize>>>,
}

impl FakeBroker {
    async fn start(script: impl Fn(usize) -> Behavior + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let subscribes = Arc::new(Mutex::new(Vec::new()));

        let counter = Arc::clone(&connections);
        let subs = Arc::clone(&subscribes);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let index = counter.fetch_add(1, Ordering::SeqCst);
                subs.lock().unwrap().push(0);
                let behavior = script(index);
                let subs = Arc::clone(&subs);
                tokio::spawn(serve(stream, behavior, index, subs));
            }
        });

        Self {
            addr,
            connections,
            subscribes,
        }
    }

    fn options(&self, reconnect: Duration) -> BrokerOptions {
        let mut opts = BrokerOptions::new("127.0.0.1", self.addr.port());
        opts.client_id_prefix = "sitewatch_test".into();
        opts.connect_timeout = Duration::from_secs(2);
        opts.reconnect_interval = reconnect;
        opts
    }

    fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn subscribes_on(&self, index: usize) -> usize {
        self.subscribes.lock().unwrap().get(index).copied().unwrap_or(0)
    }
}

async fn read_packet(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let header = stream.read_u8().await?;
    let mut len: usize = 0;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        len |= usize::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok((header, body))
}

fn suback(body: &[u8]) -> Vec<u8> {
    // pkid, then (len, filter, qos) triples
    let mut filters = 0u8;
    let mut pos = 2;
    while pos + 2 <= body.len() {
        let len = usize::from(u16::from_be_bytes([body[pos], body[pos + 1]]));
        pos += 2 + len + 1;
        filters += 1;
    }
    let mut out = vec![0x90, 2 + filters, body[0], body[1]];
    out.extend(std::iter::repeat_n(0x00, usize::from(filters)));
    out
}

fn publish_packet(topic: &str, payload: &str) -> Vec<u8> {
    let topic_len = u16::try_from(topic.len()).unwrap();
    let remaining = 2 + topic.len() + payload.len();
    assert!(remaining < 128, "test publish must fit a one-byte length");
    let mut out = vec![0x30, u8::try_from(remaining).unwrap()];
    out.extend_from_slice(&topic_len.to_be_bytes());
    out.extend_from_slice(topic.as_bytes());
    out.extend_from_slice(payload.as_bytes());
    out
}

async fn serve(
    mut stream: TcpStream,
    behavior: Behavior,
    index: usize,
    subscribes: Arc<Mutex<Vec<usize>>>,
) {
    if read_packet(&mut stream).await.is_err() {
        return;
    }

    let Behavior::Accept {
        drop_after,
        publish,
    } = behavior
    else {
        return;
    };

    if stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.is_err() {
        return;
    }
    if let Some((topic, payload)) = publish {
        let _ = stream.write_all(&publish_packet(topic, payload)).await;
    }

    let session = async {
        while let Ok((header, body)) = read_packet(&mut stream).await {
            match header >> 4 {
                8 => {
                    subscribes.lock().unwrap()[index] += 1;
                    if stream.write_all(&suback(&body)).await.is_err() {
                        break;
                    }
                }
                12 => {
                    if stream.write_all(&[0xd0, 0x00]).await.is_err() {
                        break;
                    }
                }
                14 => break,
                _ => {}
            }
        }
    };

    match drop_after {
        Some(after) => {
            let _ = tokio::time::timeout(after, session).await;
        }
        None => session.await,
    }
}

async fn wait_for_state(
    manager: &ConnectionManager,
    wanted: impl Fn(&ConnectionState) -> bool,
    within: Duration,
) {
    let mut rx = manager.state();
    tokio::time::timeout(within, rx.wait_for(|s| wanted(s)))
        .await
        .expect("state not reached in time")
        .unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_reports_connected_and_status_event() {
    let broker = FakeBroker::start(|_| accept()).await;
    let (manager, _rx) = ConnectionManager::new(16);
    let mut events = manager.events();

    manager.connect(broker.options(Duration::from_millis(200))).await.unwrap();

    assert!(manager.is_connected());
    let mut saw_status = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ConnectionEvent::StatusChanged(true)) {
            saw_status = true;
        }
    }
    assert!(saw_status, "expected StatusChanged(true)");

    manager.disconnect().await;
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn failed_initial_connect_is_not_retried() {
    let broker = FakeBroker::start(|_| Behavior::Reject).await;
    let (manager, _rx) = ConnectionManager::new(16);

    let err = manager
        .connect(broker.options(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connect { .. }), "got {err:?}");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(broker.connection_count(), 1);
    assert_eq!(*manager.state().borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnects_on_fixed_interval_until_success() {
    let interval = Duration::from_millis(150);
    let broker = FakeBroker::start(|index| match index {
        0 => accept_then_drop(Duration::from_millis(100)),
        1 | 2 => Behavior::Reject,
        _ => accept(),
    })
    .await;
    let (manager, _rx) = ConnectionManager::new(16);

    manager.connect(broker.options(interval)).await.unwrap();
    wait_for_state(
        &manager,
        |s| matches!(s, ConnectionState::Reconnecting { .. }),
        Duration::from_secs(2),
    )
    .await;
    let lost_at = Instant::now();

    wait_for_state(&manager, ConnectionState::is_connected, Duration::from_secs(5)).await;

    assert_eq!(broker.connection_count(), 4);
    // three timer waits: before each of the two rejected attempts and the final one
    assert!(lost_at.elapsed() >= interval * 2, "reconnected too quickly");
    manager.disconnect().await;
}

#[tokio::test]
async fn explicit_disconnect_cancels_pending_reconnect() {
    let interval = Duration::from_millis(400);
    let broker = FakeBroker::start(|index| match index {
        0 => accept_then_drop(Duration::from_millis(50)),
        _ => accept(),
    })
    .await;
    let (manager, _rx) = ConnectionManager::new(16);

    manager.connect(broker.options(interval)).await.unwrap();
    wait_for_state(
        &manager,
        |s| matches!(s, ConnectionState::Reconnecting { attempt: 1 }),
        Duration::from_secs(2),
    )
    .await;

    manager.disconnect().await;
    tokio::time::sleep(interval * 2).await;

    assert_eq!(broker.connection_count(), 1);
    assert_eq!(*manager.state().borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn subscriptions_are_reissued_after_reconnect() {
    let broker = FakeBroker::start(|index| match index {
        0 => accept_then_drop(Duration::from_millis(300)),
        _ => accept(),
    })
    .await;
    let (manager, _rx) = ConnectionManager::new(16);

    manager.connect(broker.options(Duration::from_millis(100))).await.unwrap();
    manager.subscribe_all().await.unwrap();

    wait_for_state(
        &manager,
        |s| matches!(s, ConnectionState::Reconnecting { .. }),
        Duration::from_secs(2),
    )
    .await;
    wait_for_state(&manager, ConnectionState::is_connected, Duration::from_secs(2)).await;

    // the broker needs a moment to read the re-issued SUBSCRIBE packets
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(broker.subscribes_on(0) > 0);
    assert!(broker.subscribes_on(1) > 0);
    manager.disconnect().await;
}

#[tokio::test]
async fn inbound_publish_is_forwarded_to_queue() {
    let broker = FakeBroker::start(|_| Behavior::Accept {
        drop_after: None,
        publish: Some(("PLCNEXT/7_NorthSite/CH12", r#"{"strCH12_TAG":"KGD-007"}"#)),
    })
    .await;
    let (manager, mut rx) = ConnectionManager::new(16);
    let before = chrono::Utc::now();

    manager.connect(broker.options(Duration::from_millis(200))).await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.topic, "PLCNEXT/7_NorthSite/CH12");
    assert_eq!(&message.payload[..], br#"{"strCH12_TAG":"KGD-007"}"#);
    assert!(message.received_at >= before);

    tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(1), manager.disconnect()).await);
}
