//! SDE round-trips against an in-process responder on an ephemeral port.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use lantern_core::sde::{ChunkType, MAX_DATAGRAM};
use lantern_core::tlv::chunks;
use lantern_ctl::SdeClient;
use lanternd::Responder;

use crate::*;

struct RunningResponder {
    addr: SocketAddr,
    stop: watch::Sender<bool>,
    task: JoinHandle<anyhow::Result<()>>,
}

async fn start_responder(store: &TestStore) -> RunningResponder {
    let mut responder = Responder::bind(
        0,
        store.db_path(),
        Arc::clone(&store.ssid) as Arc<dyn SsidBinding>,
    )
    .await
    .expect("cannot bind responder");

    let port = responder.local_addr().expect("no local addr").port();
    let (stop, stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move { responder.run(stop_rx).await });

    RunningResponder {
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        stop,
        task,
    }
}

impl RunningResponder {
    async fn shut_down(self) {
        self.stop.send(true).expect("responder already gone");
        timeout(Duration::from_secs(2), self.task)
            .await
            .expect("responder did not stop")
            .expect("responder task panicked")
            .expect("responder returned an error");
    }
}

#[tokio::test]
async fn get_metadata_round_trip() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);

    let expected: Vec<u64> = (0..3)
        .map(|i| list.get(i).unwrap().unwrap().mod_time)
        .collect();

    let server = start_responder(&store).await;
    let mut client = SdeClient::connect(server.addr).await.unwrap();

    let timestamps = client.metadata().await.unwrap();
    assert_eq!(timestamps, expected);

    server.shut_down().await;
}

#[tokio::test]
async fn metadata_reply_pair_echoes_seq_on_the_wire() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);
    let server = start_responder(&store).await;

    // A raw exchange, to pin the exact bytes: GET_METADATA{seq=7}.
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut request = Vec::new();
    request.extend_from_slice(&0u32.to_be_bytes());
    request.extend_from_slice(&7u32.to_be_bytes());
    socket.send_to(&request, server.addr).await.unwrap();

    let mut buf = vec![0u8; MAX_DATAGRAM];

    // METADATA{seq=7, count=3}
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("no announce")
        .unwrap();
    assert_eq!(&buf[..len], [0, 0, 0, 1, 0, 0, 0, 7, 0, 0, 0, 3]);

    // METADATA_DATA{seq=7, count=3, unused, ts[3]}
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("no data packet")
        .unwrap();
    assert_eq!(len, 16 + 3 * 8);
    assert_eq!(&buf[..4], [0, 0, 0, 2]);
    assert_eq!(&buf[4..8], [0, 0, 0, 7]);
    assert_eq!(&buf[8..12], [0, 0, 0, 3]);

    let ts0 = u64::from_be_bytes(buf[16..24].try_into().unwrap());
    assert_eq!(ts0, list.get(0).unwrap().unwrap().mod_time);

    server.shut_down().await;
}

#[tokio::test]
async fn service_descriptions_come_back_in_ascending_position_order() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);
    let server = start_responder(&store).await;
    let mut client = SdeClient::connect(server.addr).await.unwrap();

    // Requested out of order; the responder sorts.
    let descriptions = client.describe(&[2, 0]).await.unwrap();
    assert_eq!(descriptions.len(), 2);

    assert_eq!(descriptions[0].pos, 0);
    assert_eq!(descriptions[0].cat_id, 1);
    assert_eq!(descriptions[0].uri, "uri1");
    assert_eq!(descriptions[0].short_desc, None);
    assert_eq!(descriptions[0].long_desc.as_deref(), Some("service1"));

    assert_eq!(descriptions[1].pos, 2);
    assert_eq!(descriptions[1].cat_id, 3);
    assert_eq!(descriptions[1].uri, "uri3");

    server.shut_down().await;
}

#[tokio::test]
async fn positions_past_the_end_select_nothing() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);
    let server = start_responder(&store).await;
    let mut client = SdeClient::connect(server.addr).await.unwrap();

    let descriptions = client.describe(&[9]).await.unwrap();
    assert!(descriptions.is_empty());

    server.shut_down().await;
}

#[tokio::test]
async fn caches_follow_commits() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);
    let server = start_responder(&store).await;
    let mut client = SdeClient::connect(server.addr).await.unwrap();

    let before = client.metadata().await.unwrap();
    // Repeated requests with no intervening commit serve the same cache.
    assert_eq!(client.metadata().await.unwrap(), before);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let mut editor = store.open();
    editor.replace(&draft(5, "uri5-v2"), 1).unwrap();
    editor.commit().unwrap();

    let after = client.metadata().await.unwrap();
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[0]);
    assert!(after[1] > before[1], "edited record must carry the new time");

    let descriptions = client.describe(&[1]).await.unwrap();
    assert_eq!(descriptions[0].cat_id, 5);
    assert_eq!(descriptions[0].uri, "uri5-v2");

    server.shut_down().await;
}

#[tokio::test]
async fn malformed_datagrams_are_discarded_without_wedging_the_loop() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);
    let server = start_responder(&store).await;

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    // Too short for the common header.
    socket.send_to(&[1, 2, 3], server.addr).await.unwrap();
    // Unknown type.
    socket
        .send_to(&[0, 0, 0, 42, 0, 0, 0, 1], server.addr)
        .await
        .unwrap();
    // GET_SERVICE_DESC_DATA whose count overruns the datagram.
    socket
        .send_to(&[0, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 9], server.addr)
        .await
        .unwrap();

    // The loop is still serving.
    let mut client = SdeClient::connect(server.addr).await.unwrap();
    assert_eq!(client.metadata().await.unwrap().len(), 3);

    server.shut_down().await;
}

#[tokio::test]
async fn description_chunks_are_wire_aligned() {
    let store = TestStore::new();
    let mut list = store.open();
    seed_catalog(&mut list);
    let server = start_responder(&store).await;
    let mut client = SdeClient::connect(server.addr).await.unwrap();

    // Drive the raw pair to look at the TLV blob itself.
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut announce = Vec::new();
    announce.extend_from_slice(&3u32.to_be_bytes());
    announce.extend_from_slice(&9u32.to_be_bytes());
    announce.extend_from_slice(&1u32.to_be_bytes());
    socket.send_to(&announce, server.addr).await.unwrap();

    let mut data = Vec::new();
    data.extend_from_slice(&4u32.to_be_bytes());
    data.extend_from_slice(&9u32.to_be_bytes());
    data.extend_from_slice(&1u32.to_be_bytes());
    data.push(1);
    socket.send_to(&data, server.addr).await.unwrap();

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("no announce")
        .unwrap();
    let declared = u32::from_be_bytes(buf[8..12].try_into().unwrap()) as usize;
    assert_eq!(len, 12);

    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("no data")
        .unwrap();
    assert_eq!(len, 12 + declared, "data repeats the announce-declared size");

    let blob = &buf[12..len];
    let outer: Vec<_> = chunks(blob).collect();
    assert_eq!(outer.len(), 1);
    assert_eq!(outer[0].chunk_type, u32::from(ChunkType::Description));
    assert_eq!(blob.len() % 4, 0, "chunks stay 4-byte aligned");

    // And the client-level view agrees.
    let parsed = client.describe(&[1]).await.unwrap();
    assert_eq!(parsed[0].pos, 1);
    assert_eq!(parsed[0].short_desc.as_deref(), Some("service2"));

    server.shut_down().await;
}
