use uds_proto::{
    build_data_payload, build_eapol_logoff_frame, build_eapol_start_frame, decrypt_data_frame,
    derive_data_key, deserialize_node_info_from_frame, eapol_frame_type, encrypt_data_frame,
    frame_ether_type, parse_data_payload, parse_eapol_logoff_frame, EtherType, InMemoryKeyStorage,
    KeySlotId, MacAddress, NetworkInfo, NodeInfo, EAPOL_LOGOFF_TYPE, EAPOL_START_TYPE, FC_FROM_DS,
    FC_TO_DS, LLC_HEADER_SIZE,
};

const HOST: MacAddress = MacAddress([0x40, 0xD2, 0x8A, 0x00, 0x00, 0x01]);
const CLIENT: MacAddress = MacAddress([0x40, 0xD2, 0x8A, 0x00, 0x00, 0x02]);
const DATA_FC: u16 = 0x0800; // data frame, protected bit left to the link layer

fn network() -> NetworkInfo {
    NetworkInfo {
        host_mac_address: HOST,
        wlan_comm_id: 0x000B_8B00,
        id: 1,
        network_id: 0xCAFE_0001,
    }
}

fn console_keys() -> InMemoryKeyStorage {
    InMemoryKeyStorage::new().with_key(KeySlotId::UDS_DATA_KEY, [0x7E; 16])
}

#[test]
fn join_exchange_data_then_logoff() {
    let passphrase = b"Smash4LocalPlay";
    let host_key = derive_data_key(passphrase, &network(), &console_keys());
    let client_key = derive_data_key(passphrase, &network(), &console_keys());
    assert_eq!(host_key, client_key);

    // Client announces itself.
    let me = NodeInfo::new(0x0000_1234_5678_9ABC, "Client");
    let start = build_eapol_start_frame(0x0002, &me);
    assert_eq!(frame_ether_type(&start), Ok(EtherType::Eapol));
    assert_eq!(eapol_frame_type(&start), Ok(EAPOL_START_TYPE));

    let joined = deserialize_node_info_from_frame(&start).expect("start frame");
    assert_eq!(joined.username_lossy(), "Client");
    let joined = joined.with_network_node_id(2);

    // Host -> client data frame (from-DS).
    let frame = build_data_payload(b"welcome", 1, 2, 1, 10).expect("payload");
    let sealed = encrypt_data_frame(&frame, &host_key, &HOST, &CLIENT, &HOST, 10, DATA_FC | FC_FROM_DS)
        .expect("encrypt");
    assert_ne!(&sealed[..frame.len()], frame.as_slice());

    let opened = decrypt_data_frame(&sealed, &client_key, &HOST, &CLIENT, &HOST, 10, DATA_FC | FC_FROM_DS)
        .expect("decrypt");
    let (header, body) = parse_data_payload(&opened).expect("parse");
    assert_eq!(body, b"welcome");
    assert_eq!((header.src_node_id, header.dest_node_id), (1, 2));
    assert_eq!(header.sequence_number, 10);
    assert!(!header.is_management);

    // Client -> host reply (to-DS).
    let reply = build_data_payload(b"thanks", 1, 1, 2, 1).expect("payload");
    let sealed = encrypt_data_frame(&reply, &client_key, &CLIENT, &HOST, &HOST, 1, DATA_FC | FC_TO_DS)
        .expect("encrypt");
    let opened = decrypt_data_frame(&sealed, &host_key, &CLIENT, &HOST, &HOST, 1, DATA_FC | FC_TO_DS)
        .expect("decrypt");
    assert_eq!(opened, reply);

    // Host tells the client it was dropped, with the current table.
    let host_node = NodeInfo::new(0x99, "Host").with_network_node_id(1);
    let logoff =
        build_eapol_logoff_frame(&CLIENT, 2, &[host_node, joined], 8, 2).expect("logoff frame");
    assert_eq!(eapol_frame_type(&logoff), Ok(EAPOL_LOGOFF_TYPE));

    let packet = parse_eapol_logoff_frame(&logoff).expect("parse logoff");
    assert_eq!(packet.assigned_node_id, 2);
    assert!(logoff[LLC_HEADER_SIZE + 6..LLC_HEADER_SIZE + 18].iter().all(|&b| b == 0));
    assert_eq!(packet.nodes.len(), 8);
    assert_eq!(packet.connected(), &[host_node, joined]);
}

#[test]
fn wrong_passphrase_cannot_read_frames() {
    let good = derive_data_key(b"right", &network(), &console_keys());
    let bad = derive_data_key(b"wrong", &network(), &console_keys());

    let frame = build_data_payload(b"secret", 0, 0xFFFF, 1, 3).expect("payload");
    let sealed = encrypt_data_frame(&frame, &good, &HOST, &CLIENT, &HOST, 3, DATA_FC | FC_FROM_DS)
        .expect("encrypt");

    assert_eq!(
        decrypt_data_frame(&sealed, &bad, &HOST, &CLIENT, &HOST, 3, DATA_FC | FC_FROM_DS),
        None
    );
}

#[test]
fn other_network_derives_other_key() {
    let mut other = network();
    other.network_id += 1;

    let a = derive_data_key(b"pass", &network(), &console_keys());
    let b = derive_data_key(b"pass", &other, &console_keys());
    assert_ne!(a, b);
}
