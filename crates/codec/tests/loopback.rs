use std::net::UdpSocket;
use std::time::Duration;

use bytes::Bytes;
use wamble_codec::{Control, Flags, Frame, UciBytes};

fn bind_loopback() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind loopback socket");
    socket
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();
    socket
}

#[test]
fn frame_survives_a_real_udp_round_trip() {
    let server = bind_loopback();
    let client = bind_loopback();
    let server_addr = server.local_addr().unwrap();

    let sent = Frame {
        ctrl: Control::PlayerMove,
        flags: Flags::new(false),
        header_version: wamble_codec::SERVER_VERSION,
        token: [3u8; 16],
        board_id: 7,
        seq_num: 1,
        uci: UciBytes::from_str("g1f3").unwrap(),
        payload: Bytes::new(),
    };

    client.send_to(&sent.encode(), server_addr).unwrap();

    let mut buf = [0u8; 256];
    let (len, from) = server.recv_from(&mut buf).expect("receive datagram");
    let received = Frame::decode(&buf[..len]).expect("decode received frame");

    assert_eq!(received, sent);
    assert_eq!(from, client.local_addr().unwrap());
}

#[test]
fn retransmitted_duplicate_produces_exactly_one_accepted_frame() {
    use wamble_codec::session::{PeerKey, PeerSessionTable};

    let table = PeerSessionTable::new(Duration::from_secs(30));
    let key = PeerKey {
        addr: "127.0.0.1:9999".parse().unwrap(),
        token: [9u8; 16],
    };

    let frame = Frame {
        ctrl: Control::PlayerMove,
        flags: Flags::new(false),
        header_version: wamble_codec::SERVER_VERSION,
        token: [9u8; 16],
        board_id: 1,
        seq_num: 42,
        uci: UciBytes::from_str("e2e4").unwrap(),
        payload: Bytes::new(),
    };
    let wire = frame.encode();

    let mut accepted = 0;
    for _ in 0..3 {
        let decoded = Frame::decode(&wire).unwrap();
        let is_new = table.with_session(key, |s| s.accept_inbound(decoded.seq_num));
        if is_new {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
}
