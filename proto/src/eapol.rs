//! EAPoL-Start / EAPoL-Logoff control frames and the node-info records they carry.
//!
//! Both packets follow an LLC header tagged [`EtherType::Eapol`]. Layouts are fixed
//! (BE fields, reserved bytes zero):
//!
//! ```text
//! node record (40):  friend_code_seed(8) username(10 x u16) reserved(4) network_node_id(2) reserved(6)
//! Start (48):        type=0x0201(2) association_id(2) 0x0001(2) reserved(2) node record
//! Logoff (664):      type=0x0202(2) reserved(2) assigned_node_id(2) reserved(12)
//!                    connected_nodes(1) max_nodes(1) reserved(4) node record x 16
//! ```

use crate::frame::{build_llc_header, EtherType};
use crate::{
    ensure_len, read_u16_be, FrameError, MacAddress, EAPOL_LOGOFF_PACKET_SIZE,
    EAPOL_NODE_INFO_SIZE, EAPOL_START_PACKET_SIZE, LLC_HEADER_SIZE, UDS_MAX_NODES,
    USERNAME_UNITS,
};

pub const EAPOL_START_TYPE: u16 = 0x0201;
pub const EAPOL_LOGOFF_TYPE: u16 = 0x0202;

// Hardcoded to 1 by the console's NWM module.
const START_FIXED_FIELD: u16 = 1;

const LOGOFF_NODES_OFFSET: usize = 24;

/// A peer's identity as exchanged in EAPoL frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeInfo {
    pub friend_code_seed: u64,
    /// UTF-16 code units, zero-padded.
    pub username: [u16; USERNAME_UNITS],
    /// Zero until the host assigns an id.
    pub network_node_id: u16,
}

impl NodeInfo {
    /// Username longer than the fixed buffer is truncated.
    pub fn new(friend_code_seed: u64, username: &str) -> Self {
        let mut units = [0u16; USERNAME_UNITS];
        for (slot, unit) in units.iter_mut().zip(username.encode_utf16()) {
            *slot = unit;
        }
        Self {
            friend_code_seed,
            username: units,
            network_node_id: 0,
        }
    }

    pub fn with_network_node_id(mut self, network_node_id: u16) -> Self {
        self.network_node_id = network_node_id;
        self
    }

    /// Username up to the first zero unit; invalid surrogates become U+FFFD.
    pub fn username_lossy(&self) -> String {
        let len = self
            .username
            .iter()
            .position(|&unit| unit == 0)
            .unwrap_or(USERNAME_UNITS);
        String::from_utf16_lossy(&self.username[..len])
    }
}

pub fn serialize_node_info(node: &NodeInfo) -> [u8; EAPOL_NODE_INFO_SIZE] {
    let mut out = [0u8; EAPOL_NODE_INFO_SIZE];
    out[0..8].copy_from_slice(&node.friend_code_seed.to_be_bytes());
    for (chunk, unit) in out[8..28].chunks_exact_mut(2).zip(node.username.iter()) {
        chunk.copy_from_slice(&unit.to_be_bytes());
    }
    // [28..32] reserved
    out[32..34].copy_from_slice(&node.network_node_id.to_be_bytes());
    // [34..40] reserved
    out
}

/// Decode a single 40-byte node record.
pub fn deserialize_node_info(record: &[u8]) -> Result<NodeInfo, FrameError> {
    ensure_len(record, EAPOL_NODE_INFO_SIZE)?;

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&record[0..8]);

    let mut username = [0u16; USERNAME_UNITS];
    for (i, unit) in username.iter_mut().enumerate() {
        *unit = read_u16_be(record, 8 + i * 2);
    }

    Ok(NodeInfo {
        friend_code_seed: u64::from_be_bytes(seed),
        username,
        network_node_id: read_u16_be(record, 32),
    })
}

/// Packet type of an EAPoL frame (the u16 right after the LLC header).
pub fn eapol_frame_type(frame: &[u8]) -> Result<u16, FrameError> {
    ensure_len(frame, LLC_HEADER_SIZE + 2)?;
    Ok(read_u16_be(frame, LLC_HEADER_SIZE))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EapolStartPacket {
    pub association_id: u16,
    pub node: NodeInfo,
}

impl EapolStartPacket {
    /// The network node id is never sent in a Start packet.
    pub fn new(association_id: u16, node: &NodeInfo) -> Self {
        Self {
            association_id,
            node: node.with_network_node_id(0),
        }
    }

    pub fn encode(&self) -> [u8; EAPOL_START_PACKET_SIZE] {
        let mut out = [0u8; EAPOL_START_PACKET_SIZE];
        out[0..2].copy_from_slice(&EAPOL_START_TYPE.to_be_bytes());
        out[2..4].copy_from_slice(&self.association_id.to_be_bytes());
        out[4..6].copy_from_slice(&START_FIXED_FIELD.to_be_bytes());
        // [6..8] reserved
        out[8..].copy_from_slice(&serialize_node_info(&self.node));
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        ensure_len(bytes, EAPOL_START_PACKET_SIZE)?;
        if read_u16_be(bytes, 0) != EAPOL_START_TYPE {
            return Err(FrameError::MalformedFrame("not an EAPoL-Start packet"));
        }
        Ok(Self {
            association_id: read_u16_be(bytes, 2),
            node: deserialize_node_info(&bytes[8..EAPOL_START_PACKET_SIZE])?,
        })
    }
}

/// LLC (EAPoL) || EAPoL-Start packet
pub fn build_eapol_start_frame(association_id: u16, node_info: &NodeInfo) -> Vec<u8> {
    let packet = EapolStartPacket::new(association_id, node_info);
    let mut out = Vec::with_capacity(LLC_HEADER_SIZE + EAPOL_START_PACKET_SIZE);
    out.extend_from_slice(&build_llc_header(EtherType::Eapol));
    out.extend_from_slice(&packet.encode());
    out
}

pub fn parse_eapol_start_frame(frame: &[u8]) -> Result<EapolStartPacket, FrameError> {
    ensure_len(frame, LLC_HEADER_SIZE + EAPOL_START_PACKET_SIZE)?;
    EapolStartPacket::decode(&frame[LLC_HEADER_SIZE..])
}

/// Identity of the peer that sent an EAPoL-Start frame. The node id is left unassigned.
pub fn deserialize_node_info_from_frame(frame: &[u8]) -> Result<NodeInfo, FrameError> {
    let node_offset = LLC_HEADER_SIZE + 8;
    ensure_len(frame, LLC_HEADER_SIZE + EAPOL_START_PACKET_SIZE)?;
    let node = deserialize_node_info(&frame[node_offset..node_offset + EAPOL_NODE_INFO_SIZE])?;
    Ok(node.with_network_node_id(0))
}

/// Host-to-client departure notice carrying the current node table.
///
/// `nodes` always holds exactly `max_nodes` records; the first `connected_nodes`
/// are live and the rest are zeroed slots.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EapolLogoffPacket {
    pub assigned_node_id: u16,
    pub connected_nodes: u8,
    pub max_nodes: u8,
    pub nodes: Vec<NodeInfo>,
}

impl EapolLogoffPacket {
    pub fn new(
        assigned_node_id: u16,
        nodes: &[NodeInfo],
        max_nodes: u8,
        connected_nodes: u8,
    ) -> Result<Self, FrameError> {
        if usize::from(max_nodes) > UDS_MAX_NODES {
            return Err(FrameError::InvalidArgument("max_nodes exceeds the UDS node limit"));
        }
        if connected_nodes > max_nodes {
            return Err(FrameError::InvalidArgument("total_nodes exceeds max_nodes"));
        }
        if nodes.len() > usize::from(max_nodes) {
            return Err(FrameError::InvalidArgument("more node records than max_nodes"));
        }

        let mut slots = nodes.to_vec();
        slots.resize(usize::from(max_nodes), NodeInfo::default());

        Ok(Self {
            assigned_node_id,
            connected_nodes,
            max_nodes,
            nodes: slots,
        })
    }

    /// Records of the nodes currently connected.
    pub fn connected(&self) -> &[NodeInfo] {
        let live = usize::from(self.connected_nodes).min(self.nodes.len());
        &self.nodes[..live]
    }

    pub fn encode(&self) -> [u8; EAPOL_LOGOFF_PACKET_SIZE] {
        let mut out = [0u8; EAPOL_LOGOFF_PACKET_SIZE];
        out[0..2].copy_from_slice(&EAPOL_LOGOFF_TYPE.to_be_bytes());
        // [2..4] reserved
        out[4..6].copy_from_slice(&self.assigned_node_id.to_be_bytes());
        // [6..18] reserved, sent as zeros
        out[18] = self.connected_nodes;
        out[19] = self.max_nodes;
        // [20..24] reserved

        let records = out[LOGOFF_NODES_OFFSET..].chunks_exact_mut(EAPOL_NODE_INFO_SIZE);
        for (record, node) in records.zip(self.nodes.iter().take(UDS_MAX_NODES)) {
            record.copy_from_slice(&serialize_node_info(node));
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        ensure_len(bytes, EAPOL_LOGOFF_PACKET_SIZE)?;
        if read_u16_be(bytes, 0) != EAPOL_LOGOFF_TYPE {
            return Err(FrameError::MalformedFrame("not an EAPoL-Logoff packet"));
        }

        let connected_nodes = bytes[18];
        let max_nodes = bytes[19];
        if usize::from(max_nodes) > UDS_MAX_NODES {
            return Err(FrameError::MalformedFrame("max_nodes exceeds the UDS node limit"));
        }
        if connected_nodes > max_nodes {
            return Err(FrameError::MalformedFrame("connected_nodes exceeds max_nodes"));
        }

        let nodes = bytes[LOGOFF_NODES_OFFSET..EAPOL_LOGOFF_PACKET_SIZE]
            .chunks_exact(EAPOL_NODE_INFO_SIZE)
            .take(usize::from(max_nodes))
            .map(deserialize_node_info)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            assigned_node_id: read_u16_be(bytes, 4),
            connected_nodes,
            max_nodes,
            nodes,
        })
    }
}

/// LLC (EAPoL) || EAPoL-Logoff packet. All 16 record slots are transmitted;
/// slots at or past `max_nodes` are zero.
///
/// `mac_address` names the departing client in logs only; the packet carries no address.
pub fn build_eapol_logoff_frame(
    mac_address: &MacAddress,
    assigned_node_id: u16,
    nodes: &[NodeInfo],
    max_nodes: u8,
    total_nodes: u8,
) -> Result<Vec<u8>, FrameError> {
    let packet = EapolLogoffPacket::new(assigned_node_id, nodes, max_nodes, total_nodes)?;

    let mut out = Vec::with_capacity(LLC_HEADER_SIZE + EAPOL_LOGOFF_PACKET_SIZE);
    out.extend_from_slice(&build_llc_header(EtherType::Eapol));
    out.extend_from_slice(&packet.encode());

    tracing::debug!(
        client = %mac_address,
        assigned_node_id,
        total_nodes,
        max_nodes,
        "built EAPoL-Logoff frame"
    );
    Ok(out)
}

pub fn parse_eapol_logoff_frame(frame: &[u8]) -> Result<EapolLogoffPacket, FrameError> {
    ensure_len(frame, LLC_HEADER_SIZE + EAPOL_LOGOFF_PACKET_SIZE)?;
    EapolLogoffPacket::decode(&frame[LLC_HEADER_SIZE..])
}
