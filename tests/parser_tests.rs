//! Integration tests for wire framing and payload decoding

use consensus_wire::network::{encode_inv_list, InvItem, InvType, VersionPayload};
use consensus_wire::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn genesis_payload() -> Vec<u8> {
    hex::decode(Network::Main.params().genesis_block).unwrap()
}

#[test]
fn test_chunked_feed_matches_single_feed() {
    init();
    let node = ConsensusWire::new(Network::Main);
    let mut raw = node.frame("block", &genesis_payload()).unwrap();
    raw.extend(node.frame("ping", &1u64.to_le_bytes()).unwrap());

    let expected = node.parser().feed(&raw).unwrap();
    assert_eq!(expected.len(), 2);

    for chunk_size in [1, 2, 3, 7, 24, 25, 100] {
        let mut parser = node.parser();
        let mut events = Vec::new();
        for chunk in raw.chunks(chunk_size) {
            events.extend(parser.feed(chunk).unwrap());
        }
        assert_eq!(events, expected, "chunk size {}", chunk_size);
        assert_eq!(parser.state(), &ParserState::WaitingHeader);
    }
}

#[test]
fn test_block_message_yields_compact_view() {
    init();
    let node = ConsensusWire::new(Network::Main);
    let raw = node.frame("block", &genesis_payload()).unwrap();
    let events = node.parser().feed(&raw).unwrap();

    let view = match &events[0] {
        Event::Message {
            payload: Payload::Block(view),
            ..
        } => view.clone(),
        other => panic!("unexpected event {:?}", other),
    };
    assert_eq!(view.total_tx, 1);
    // Genesis predates version 2 headers
    assert_eq!(view.coinbase_height, None);
    assert_eq!(view.hash(), node.params().genesis_hash());

    let block = view.decode_full().unwrap();
    assert!(node.verify_block(&block).is_ok());
}

#[test]
fn test_oversized_length_never_waits_for_payload() {
    init();
    let node = ConsensusWire::new(Network::Testnet);
    let mut header = node.frame("tx", &[]).unwrap();
    let declared = (node.params().max_message_size as u32) + 1;
    header[16..20].copy_from_slice(&declared.to_le_bytes());

    let mut parser = node.parser();
    match parser.feed(&header) {
        Err(FrameError::PayloadTooLarge { length, max }) => {
            assert_eq!(length, declared as usize);
            assert_eq!(max, node.params().max_message_size);
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(parser.state(), &ParserState::Closed);
    assert_eq!(parser.feed(&[0u8; 64]), Err(FrameError::Closed));
}

#[test]
fn test_corrupted_payload_is_fatal() {
    init();
    let node = ConsensusWire::new(Network::Main);
    let mut raw = node.frame("ping", &9u64.to_le_bytes()).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x01;

    let mut parser = node.parser();
    assert!(matches!(
        parser.feed(&raw),
        Err(FrameError::ChecksumMismatch { .. })
    ));
    assert!(parser.is_closed());
}

#[test]
fn test_malformed_tx_does_not_end_stream() {
    init();
    let node = ConsensusWire::new(Network::Main);
    let mut raw = node.frame("tx", &[1, 0, 0, 0, 5]).unwrap();
    let items = vec![InvItem::new(InvType::Block, [3u8; 32])];
    raw.extend(node.frame("inv", &encode_inv_list(&items)).unwrap());

    let mut parser = node.parser();
    let events = parser.feed(&raw).unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::Malformed { command, .. } if command == "tx"));
    assert_eq!(
        events[1],
        Event::Message {
            command: "inv".into(),
            payload: Payload::Inv(items),
        }
    );
}

#[test]
fn test_version_over_the_wire() {
    init();
    let node = ConsensusWire::new(Network::Regtest);
    let sent = VersionPayload::decode(&sample_version()).unwrap();
    let raw = node.frame("version", &sent.encode()).unwrap();

    let events = node.parser().feed(&raw).unwrap();
    match &events[0] {
        Event::Message {
            payload: Payload::Version(version),
            ..
        } => assert_eq!(version, &sent),
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_wrong_network_is_rejected() {
    init();
    let raw = frame_message(Network::Testnet.params(), "ping", &[0; 8]).unwrap();
    let mut parser = ConsensusWire::new(Network::Main).parser();
    assert_eq!(
        parser.feed(&raw),
        Err(FrameError::BadMagic(Network::Testnet.params().magic))
    );
}

/// A version payload as a 0.12-era node sends it
fn sample_version() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&70012i32.to_le_bytes());
    p.extend_from_slice(&9u64.to_le_bytes());
    p.extend_from_slice(&1_460_000_000u64.to_le_bytes());
    for port in [18444u16, 18445] {
        p.extend_from_slice(&1u64.to_le_bytes());
        let mut ip = [0u8; 16];
        ip[10] = 0xff;
        ip[11] = 0xff;
        ip[12..].copy_from_slice(&[127, 0, 0, 1]);
        p.extend_from_slice(&ip);
        p.extend_from_slice(&port.to_be_bytes());
    }
    p.extend_from_slice(&0x1122334455667788u64.to_le_bytes());
    let agent = b"/Satoshi:0.12.1/";
    p.push(agent.len() as u8);
    p.extend_from_slice(agent);
    p.extend_from_slice(&0i32.to_le_bytes());
    p.push(1);
    p
}
