use std::fmt;

use serde::{Deserialize, Serialize};

/// Database identifier, unique within one node.
pub type DatabaseId = u32;
/// Timeline identifier of a node's storage history.
pub type TimelineId = u32;

/// The sysid column of a connections row is textual and may not parse as a
/// decimal u64 when the table was edited by hand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sysid {raw:?} is not a decimal u64")]
pub struct MalformedSysid {
    pub raw: String,
}

/// Identity triple of one replicating node.
///
/// Two nodes are the same node exactly when all three parts match. The triple
/// is what apply workers are keyed on and what the self-exclusion filter of
/// the reconciler compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub sysid: u64,
    pub timeline: TimelineId,
    pub dboid: DatabaseId,
}

impl NodeId {
    pub fn new(sysid: u64, timeline: TimelineId, dboid: DatabaseId) -> Self {
        NodeId {
            sysid,
            timeline,
            dboid,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.sysid, self.timeline, self.dboid)
    }
}

/// One row of the connections table, as this subsystem reads it.
///
/// Only the three identity columns matter here; whatever else the table
/// carries (DSNs, options) is owned by other layers. `sysid` stays textual
/// because that is the column type, parsing happens when the row is turned
/// into a peer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRow {
    pub sysid: String,
    pub timeline: TimelineId,
    pub dboid: DatabaseId,
}

impl ConnectionRow {
    pub fn new(sysid: impl Into<String>, timeline: TimelineId, dboid: DatabaseId) -> Self {
        ConnectionRow {
            sysid: sysid.into(),
            timeline,
            dboid,
        }
    }

    /// Parse the row into a peer identity. Fails when the sysid column does
    /// not hold a decimal u64.
    pub fn node_id(&self) -> Result<NodeId, MalformedSysid> {
        let sysid = self.sysid.parse::<u64>().map_err(|_| MalformedSysid {
            raw: self.sysid.clone(),
        })?;
        Ok(NodeId::new(sysid, self.timeline, self.dboid))
    }

    /// Whether this row identifies `node` itself.
    ///
    /// The comparison is textual on the sysid side, the way the table query
    /// compares it, so a malformed row never matches any node.
    pub fn is_node(&self, node: &NodeId) -> bool {
        self.timeline == node.timeline
            && self.dboid == node.dboid
            && self.sysid == node.sysid.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        let node = NodeId::new(6012345678901234567, 1, 16384);
        assert_eq!(node.to_string(), "6012345678901234567,1,16384");
    }

    #[test]
    fn row_parses_into_node_id() {
        let row = ConnectionRow::new("100", 1, 5);
        assert_eq!(row.node_id().unwrap(), NodeId::new(100, 1, 5));
    }

    #[test]
    fn malformed_sysid_is_reported() {
        let row = ConnectionRow::new("not-a-sysid", 1, 5);
        let err = row.node_id().unwrap_err();
        assert_eq!(err.raw, "not-a-sysid");
    }

    #[test]
    fn self_match_is_textual_on_sysid() {
        let local = NodeId::new(100, 1, 5);
        assert!(ConnectionRow::new("100", 1, 5).is_node(&local));
        assert!(!ConnectionRow::new("100", 1, 6).is_node(&local));
        assert!(!ConnectionRow::new("0100", 1, 5).is_node(&local));
        assert!(!ConnectionRow::new("garbage", 1, 5).is_node(&local));
    }
}
