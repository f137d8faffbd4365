//! Integration tests for outputs, amounts and coin records

use consensus_wire::script::{Destination, OutputType};
use consensus_wire::*;
use std::collections::HashSet;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_value_range() {
    init();
    assert!(Output::from_sat(i64::MAX as u64, vec![0x51]).is_ok());
    assert_eq!(
        Output::from_sat(1u64 << 63, vec![0x51]).unwrap_err(),
        ValueError::Overflow
    );
    assert_eq!(Output::from_signed(-1, vec![]).unwrap_err(), ValueError::Negative);

    // A sign bit set on the wire is a decode failure, not a huge value
    let mut raw = Output::from_sat(1, vec![]).unwrap().to_raw();
    raw[7] = 0x80;
    assert!(matches!(
        Output::from_raw(&raw),
        Err(DecodeError::InvalidValue(ValueError::Negative))
    ));
}

#[test]
fn test_genesis_output_address() {
    init();
    let params = Network::Main.params();
    let genesis = Block::genesis(params).unwrap();
    let output = &genesis.txs()[0].outputs()[0];

    assert_eq!(output.value().as_sat(), 5_000_000_000);
    assert_eq!(output.output_type(), OutputType::PubKey);
    assert!(matches!(output.destination(), Some(Destination::PubKeyHash(_))));

    let address = output.address(params).unwrap();
    assert_eq!(address, "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa");

    let mut watched = HashSet::new();
    watched.insert(address);
    assert!(output.test(params, &watched));
    // Same destination renders differently on testnet
    assert!(!output.test(Network::Testnet.params(), &watched));
}

#[test]
fn test_output_json_uses_decimal_strings() {
    init();
    let output = Output::from_sat(50_000_000, vec![0x51]).unwrap();
    let json = serde_json::to_string(&output).unwrap();
    assert_eq!(json, r#"{"value":"0.5","script":"51"}"#);

    let back: Output = serde_json::from_str(&json).unwrap();
    assert_eq!(back, output);

    assert!(serde_json::from_str::<Output>(r#"{"value":"-1","script":""}"#).is_err());
    assert!(serde_json::from_str::<Output>(r#"{"value":"0.000000001","script":""}"#).is_err());
}

#[test]
fn test_compact_output() {
    init();
    let mut program = vec![0x00, 0x14];
    program.extend_from_slice(&[7u8; 20]);
    let output = Output::from_sat(1_000, program).unwrap();
    assert_eq!(output.output_type(), OutputType::WitnessPubKeyHash);

    let compact = output.to_compact();
    let json = serde_json::to_value(&compact).unwrap();
    assert_eq!(json["type"], "output");
    assert_eq!(Output::from_compact(&compact).unwrap(), output);

    let mut wrong = compact.clone();
    wrong.kind = "tx".to_string();
    assert!(Output::from_compact(&wrong).is_err());
}

#[test]
fn test_amount_strings() {
    assert_eq!(Amount::from_sat(123_456_789).unwrap().to_coin_string(), "1.23456789");
    assert_eq!("21000000".parse::<Amount>().unwrap().as_sat(), 2_100_000_000_000_000);
    assert!("1.5.0".parse::<Amount>().is_err());
}

#[test]
fn test_finalized_transaction_outputs() {
    init();
    let tx = Transaction::builder()
        .input(Input::new(OutPoint::new([1; 32], 0), vec![], 0xffffffff))
        .output(Output::from_sat(400, vec![0x51]).unwrap())
        .output(Output::from_sat(600, vec![0x6a]).unwrap())
        .finalize();
    assert_eq!(tx.total_output_value(), Some(Amount::from_sat(1_000).unwrap()));
    assert_eq!(tx.outputs()[1].output_type(), OutputType::NullData);

    // Reopening for edits yields a fresh value with fresh ids
    let edited = tx.clone().into_builder().locktime(10).finalize();
    assert_ne!(edited.txid(), tx.txid());
    assert_eq!(edited.outputs(), tx.outputs());

    let coin = Coin::from_transaction(&edited, 1, Some(500)).unwrap();
    let raw = coin.to_raw(true);
    let back = Coin::from_raw(&raw, true).unwrap();
    assert_eq!(back, coin);
    assert_eq!(back.prevout, OutPoint::new(edited.txid(), 1));
}
