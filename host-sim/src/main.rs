use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uds_proto::{
    build_aad, build_data_payload, build_eapol_logoff_frame, build_eapol_start_frame,
    build_nonce, derive_crypto_counter, derive_data_key, deserialize_node_info_from_frame,
    frame_ether_type, parse_data_payload, parse_eapol_logoff_frame, AddressingMode, AesCcm,
    AesKey, EtherType, FrameCipher, InMemoryKeyStorage, KeySlotId, MacAddress, NetworkInfo, NodeInfo,
    SecureDataHeader, KEY_BYTES,
};

const DATA_FRAME_CONTROL: u16 = 0x0800;

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let network = NetworkInfo {
        host_mac_address: args.host_mac,
        wlan_comm_id: args.wlan_comm_id,
        id: args.network_instance,
        network_id: args.network_id,
    };
    let storage = InMemoryKeyStorage::new()
        .with_key(KeySlotId::UDS_DATA_KEY, args.normal_key.unwrap_or([0x00; KEY_BYTES]));
    let mode = if args.from_ds {
        AddressingMode::FromDs
    } else {
        AddressingMode::ToDs
    };
    let frame_control = DATA_FRAME_CONTROL | mode.frame_control_bits();

    println!("UDS frame trace");
    println!(
        "network: host={} comm_id={:#010x} id={} network_id={:#010x}",
        network.host_mac_address, network.wlan_comm_id, network.id, network.network_id
    );

    let counter = derive_crypto_counter(&network);
    let key = derive_data_key(args.passphrase.as_bytes(), &network, &storage);
    println!("ctr block: {}", hex(&counter));
    println!("ccmp key:  {}", hex(&key));
    println!();

    // Join: the client announces itself to the host.
    let client = NodeInfo::new(args.friend_code_seed, &args.username);
    let start = build_eapol_start_frame(args.association_id, &client);
    let announced = deserialize_node_info_from_frame(&start)?;
    println!(
        "eapol-start ({} bytes, {:?}) user={:?}: {}",
        start.len(),
        frame_ether_type(&start)?,
        announced.username_lossy(),
        hex(&start)
    );

    // Data frame in the chosen direction.
    let (sender, receiver) = match mode {
        AddressingMode::FromDs => (args.host_mac, args.client_mac),
        AddressingMode::ToDs => (args.client_mac, args.host_mac),
    };
    let frame = build_data_payload(
        args.payload.as_bytes(),
        args.channel,
        args.dest_node,
        args.src_node,
        args.sequence,
    )?;
    let aad = build_aad(&sender, &receiver, &args.host_mac, frame_control);
    let nonce = build_nonce(&sender, args.sequence);
    println!("data frame ({} bytes): {}", frame.len(), hex(&frame));
    println!("aad:   {}", hex(&aad));
    println!("nonce: {}", hex(&nonce));

    let cipher = FrameCipher::new(AesCcm);
    let sealed = cipher
        .seal(&frame, &key, &sender, &receiver, &args.host_mac, args.sequence, frame_control)
        .context("sealing data frame")?;
    println!("sealed ({} bytes): {}", sealed.len(), hex(&sealed));

    let opened = cipher
        .open(&sealed, &key, &sender, &receiver, &args.host_mac, args.sequence, frame_control)
        .context("opening data frame")?;
    let (header, body) = parse_data_payload(&opened)?;
    if body != args.payload.as_bytes() {
        bail!("payload changed across seal/open");
    }
    println!("opened: {:?}", String::from_utf8_lossy(body));

    let mut tampered = sealed.clone();
    if let Some(last) = tampered.last_mut() {
        *last ^= 0x01;
    }
    let tamper_rejected = cipher
        .decrypt(&tampered, &key, &sender, &receiver, &args.host_mac, args.sequence, frame_control)
        .is_none();
    println!("tampered tag rejected: {tamper_rejected}");

    // Leave: the host drops the client.
    let host_node = NodeInfo::new(0, "Host").with_network_node_id(1);
    let joined = announced.with_network_node_id(args.src_node);
    let logoff = build_eapol_logoff_frame(
        &args.client_mac,
        args.src_node,
        &[host_node, joined],
        args.max_nodes,
        2,
    )?;
    let logoff_packet = parse_eapol_logoff_frame(&logoff)?;
    println!(
        "eapol-logoff ({} bytes) connected={}/{}",
        logoff.len(),
        logoff_packet.connected_nodes,
        logoff_packet.max_nodes
    );

    let summary = Summary {
        network,
        ccmp_key: hex(&key),
        addressing: mode,
        frame_control,
        header,
        start_frame_len: start.len(),
        data_frame_len: frame.len(),
        sealed_len: sealed.len(),
        logoff_frame_len: logoff.len(),
        logoff_ether_type: frame_ether_type(&logoff)?,
        tamper_rejected,
    };
    println!("\nsummary json: {}", serde_json::to_string(&summary)?);

    if let Some(path) = args.summary_json.as_ref() {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing summary to {path}"))?;
        tracing::info!(path = %path, "summary written");
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[derive(Parser, Debug)]
#[command(about = "Build, seal and open a round of UDS frames")]
struct Args {
    /// Network passphrase fed to the data-key derivation.
    #[arg(long, default_value = "uds-local-play")]
    passphrase: String,

    /// 16-byte normal key for key slot 0x2D as hex (32 chars). Defaults to all zero.
    #[arg(long, value_parser = parse_key)]
    normal_key: Option<AesKey>,

    /// Host (and BSSID) MAC address.
    #[arg(long, default_value = "40:d2:8a:00:00:01")]
    host_mac: MacAddress,

    /// Client MAC address.
    #[arg(long, default_value = "40:d2:8a:00:00:02")]
    client_mac: MacAddress,

    /// Wireless community id (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0x000b8b00", value_parser = parse_u32)]
    wlan_comm_id: u32,

    /// Network id (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0x12345678", value_parser = parse_u32)]
    network_id: u32,

    /// Network instantiation id.
    #[arg(long, default_value_t = 1)]
    network_instance: u8,

    /// Send the data frame host -> client (from-DS) instead of client -> host (to-DS).
    #[arg(long, default_value_t = false)]
    from_ds: bool,

    #[arg(long, default_value_t = 1)]
    channel: u8,

    #[arg(long, default_value_t = 1)]
    dest_node: u16,

    #[arg(long, default_value_t = 2)]
    src_node: u16,

    #[arg(long, default_value_t = 1)]
    sequence: u16,

    #[arg(long, default_value = "hello from uds")]
    payload: String,

    #[arg(long, default_value_t = 2)]
    association_id: u16,

    #[arg(long, default_value_t = 0x0000_1234_5678_9ABC)]
    friend_code_seed: u64,

    #[arg(long, default_value = "Client")]
    username: String,

    /// Node slots advertised in the logoff frame.
    #[arg(long, default_value_t = 8)]
    max_nodes: u8,

    /// Path to write the summary as pretty JSON (optional).
    #[arg(long)]
    summary_json: Option<String>,
}

#[derive(Serialize)]
struct Summary {
    network: NetworkInfo,
    ccmp_key: String,
    addressing: AddressingMode,
    frame_control: u16,
    header: SecureDataHeader,
    start_frame_len: usize,
    data_frame_len: usize,
    sealed_len: usize,
    logoff_frame_len: usize,
    logoff_ether_type: EtherType,
    tamper_rejected: bool,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_key(s: &str) -> Result<AesKey, String> {
    let bytes = parse_hex_bytes(s, KEY_BYTES)?;
    bytes
        .try_into()
        .map_err(|_| format!("expected {KEY_BYTES} bytes"))
}

fn parse_u32(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| e.to_string())
}

fn parse_hex_bytes(s: &str, expected: usize) -> Result<Vec<u8>, String> {
    if s.len() != expected * 2 {
        return Err(format!(
            "expected {} hex chars ({} bytes), got {}",
            expected * 2,
            expected,
            s.len()
        ));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .ok_or_else(|| "non-ascii hex".to_string())
                .and_then(|pair| u8::from_str_radix(pair, 16).map_err(|e| e.to_string()))
        })
        .collect()
}
