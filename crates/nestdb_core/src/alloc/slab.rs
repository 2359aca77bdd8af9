//! Shared node table and the append-only node log.

use super::node::Node;
use crate::error::{CoreError, CoreResult};
use crate::types::Ref;
use nestdb_codec::{from_cbor, to_canonical_cbor};
use nestdb_storage::StorageBackend;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// One record of the node log.
#[derive(Debug, Clone, PartialEq)]
enum LogRecord {
    /// First record of every log.
    Header { format_version: (u16, u16) },
    /// A node written by a commit.
    Node { node: Ref, payload: Vec<u8> },
    /// Seals every node record since the previous commit.
    Commit { version: u64, top: Ref },
}

impl LogRecord {
    const KIND_HEADER: u8 = 0;
    const KIND_NODE: u8 = 1;
    const KIND_COMMIT: u8 = 2;
    /// record_len (4) + kind (1) + id (8)
    const HEADER_SIZE: usize = 13;
    const CRC_SIZE: usize = 4;

    #[allow(clippy::cast_possible_truncation)]
    fn encode_into(&self, buf: &mut Vec<u8>) {
        let (kind, id, payload): (u8, u64, Vec<u8>) = match self {
            LogRecord::Header { format_version } => (
                Self::KIND_HEADER,
                (u64::from(format_version.0) << 16) | u64::from(format_version.1),
                Vec::new(),
            ),
            LogRecord::Node { node, payload } => (Self::KIND_NODE, node.as_u64(), payload.clone()),
            LogRecord::Commit { version, top } => {
                (Self::KIND_COMMIT, *version, top.as_u64().to_le_bytes().to_vec())
            }
        };

        let start = buf.len();
        let record_len = Self::HEADER_SIZE + payload.len() + Self::CRC_SIZE;
        buf.extend_from_slice(&(record_len as u32).to_le_bytes());
        buf.push(kind);
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(&payload);
        let crc = crc32fast::hash(&buf[start..]);
        buf.extend_from_slice(&crc.to_le_bytes());
    }

    /// Decodes the record at the start of `data`.
    ///
    /// Returns `None` for a torn or corrupt record.
    fn decode(data: &[u8]) -> Option<(Self, usize)> {
        let len_bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
        let record_len = u32::from_le_bytes(len_bytes) as usize;
        if record_len < Self::HEADER_SIZE + Self::CRC_SIZE {
            return None;
        }
        let record = data.get(..record_len)?;
        let (body, crc_bytes) = record.split_at(record_len - Self::CRC_SIZE);
        let stored_crc = u32::from_le_bytes(crc_bytes.try_into().ok()?);
        if crc32fast::hash(body) != stored_crc {
            return None;
        }

        let kind = body[4];
        let id = u64::from_le_bytes(body[5..13].try_into().ok()?);
        let payload = &body[Self::HEADER_SIZE..];
        let record = match kind {
            Self::KIND_HEADER => LogRecord::Header {
                format_version: (u16::try_from(id >> 16).ok()?, (id & 0xffff) as u16),
            },
            Self::KIND_NODE => LogRecord::Node {
                node: Ref(id),
                payload: payload.to_vec(),
            },
            Self::KIND_COMMIT => LogRecord::Commit {
                version: id,
                top: Ref(u64::from_le_bytes(payload.try_into().ok()?)),
            },
            _ => return None,
        };
        Some((record, record_len))
    }
}

/// State found in the node log when opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovered {
    /// Format version from the log header.
    pub format_version: (u16, u16),
    /// Last committed version and its group top, if any commit survived.
    pub last_commit: Option<(u64, Ref)>,
}

/// The committed node table shared by every transaction of a database.
pub struct SlabAlloc {
    committed: RwLock<HashMap<Ref, Arc<Node>>>,
    next_ref: AtomicU64,
    log: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl SlabAlloc {
    /// Opens the node log, replaying every committed node.
    ///
    /// An empty log gets a header with `format_version`. Node records not
    /// followed by a commit record, and any torn or corrupt tail, are truncated.
    pub fn open(
        mut log: Box<dyn StorageBackend>,
        format_version: (u16, u16),
        sync_on_commit: bool,
    ) -> CoreResult<(Self, Recovered)> {
        let data = log.read_all()?;
        let mut recovered = Recovered {
            format_version,
            last_commit: None,
        };
        let mut committed: HashMap<Ref, Arc<Node>> = HashMap::new();

        if data.is_empty() {
            let mut buf = Vec::new();
            LogRecord::Header { format_version }.encode_into(&mut buf);
            log.append(&buf)?;
            log.flush()?;
        } else {
            let mut pending: Vec<(Ref, Node)> = Vec::new();
            let mut pos = 0;
            let mut valid_end = 0;
            let mut saw_header = false;

            while let Some((record, len)) = LogRecord::decode(&data[pos..]) {
                pos += len;
                match record {
                    LogRecord::Header { format_version } if !saw_header => {
                        recovered.format_version = format_version;
                        saw_header = true;
                        valid_end = pos;
                    }
                    LogRecord::Node { node, payload } if saw_header => {
                        let decoded = from_cbor(&payload)
                            .map_err(CoreError::from)
                            .and_then(|value| Node::from_cbor(node, &value));
                        match decoded {
                            Ok(decoded) => pending.push((node, decoded)),
                            Err(err) => {
                                warn!(node = node.as_u64(), error = %err, "undecodable node record");
                                break;
                            }
                        }
                    }
                    LogRecord::Commit { version, top } if saw_header => {
                        committed.extend(pending.drain(..).map(|(r, n)| (r, Arc::new(n))));
                        recovered.last_commit = Some((version, top));
                        valid_end = pos;
                    }
                    _ => break,
                }
            }

            if !saw_header {
                return Err(CoreError::invalid_format("node log has no header record"));
            }

            let size = data.len() as u64;
            if (valid_end as u64) < size {
                warn!(
                    dropped_bytes = size - valid_end as u64,
                    "dropping uncommitted or corrupt tail of node log"
                );
                log.truncate(valid_end as u64)?;
            }
        }

        if let Some((_, top)) = recovered.last_commit {
            retain_reachable(&mut committed, top);
        }
        let next_ref = committed.keys().map(|r| r.as_u64()).max().unwrap_or(0) + 1;
        if let Some((version, _)) = recovered.last_commit {
            info!(version, nodes = committed.len(), "recovered node log");
        }

        Ok((
            Self {
                committed: RwLock::new(committed),
                next_ref: AtomicU64::new(next_ref),
                log: Mutex::new(log),
                sync_on_commit,
            },
            recovered,
        ))
    }

    /// Looks up a committed node.
    #[must_use]
    pub fn get(&self, node: Ref) -> Option<Arc<Node>> {
        self.committed.read().get(&node).cloned()
    }

    /// Hands out a fresh, never used ref.
    pub fn reserve_ref(&self) -> Ref {
        Ref(self.next_ref.fetch_add(1, Ordering::SeqCst))
    }

    /// Number of committed nodes held in memory.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.committed.read().len()
    }

    /// Persists and publishes the scratch nodes reachable from `top`.
    ///
    /// Returns the number of nodes written.
    pub fn commit(
        &self,
        scratch: &HashMap<Ref, Arc<Node>>,
        top: Ref,
        version: u64,
    ) -> CoreResult<usize> {
        let mut written = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![top];
        while let Some(node) = stack.pop() {
            if let Some(content) = scratch.get(&node) {
                if seen.insert(node) {
                    written.push(node);
                    stack.extend(content.children());
                }
            }
        }

        let mut buf = Vec::new();
        for node in &written {
            let content = scratch
                .get(node)
                .ok_or_else(|| CoreError::corrupt_node(node.as_u64(), "scratch node vanished"))?;
            let payload = to_canonical_cbor(&content.to_cbor())?;
            LogRecord::Node {
                node: *node,
                payload,
            }
            .encode_into(&mut buf);
        }
        LogRecord::Commit { version, top }.encode_into(&mut buf);

        {
            let mut log = self.log.lock();
            log.append(&buf)?;
            log.flush()?;
            if self.sync_on_commit {
                log.sync()?;
            }
        }

        let mut committed = self.committed.write();
        for node in &written {
            if let Some(content) = scratch.get(node) {
                committed.insert(*node, Arc::clone(content));
            }
        }
        Ok(written.len())
    }

    /// Size of the node log in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        Ok(self.log.lock().size()?)
    }
}

fn retain_reachable(nodes: &mut HashMap<Ref, Arc<Node>>, top: Ref) {
    let mut live = HashSet::new();
    let mut stack = vec![top];
    while let Some(node) = stack.pop() {
        if live.insert(node) {
            if let Some(content) = nodes.get(&node) {
                stack.extend(content.children());
            }
        }
    }
    nodes.retain(|r, _| live.contains(r));
}
