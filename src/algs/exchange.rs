//! Collective exchange primitives built from matched `isend`/`irecv` pairs.
//!
//! Two tiers:
//!
//! - **Construction-time collectives** ([`all_gather_u64`],
//!   [`all_to_allv_u64`]) involve every rank. They are used once per mesh
//!   generation, when neighbor relations are not yet known (index map
//!   construction, dual-graph postmaster routing).
//! - **Neighbor-only collectives** ([`neighbor_all_to_all`]) exchange data
//!   only inside an explicit [`NeighborGroup`]. Every exchange is two
//!   sequential stages: a size stage (payload lengths are not known a
//!   priori) and a payload stage. A member with nothing to say still posts
//!   a zero count, so empty payloads need no special-casing anywhere above.
//!
//! All functions drain every posted handle before returning, even on error,
//! so a failed exchange never leaves stray messages for a later tag.

use std::collections::HashMap;

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, WireIndex, cast_slice};
use crate::mesh_error::MeshHaloError;
use crate::topology::index_map::NeighborGroup;

// Received buffers are not guaranteed 8-byte aligned; decode by copying.
fn decode_u64s(neighbor: usize, data: &[u8], expect: usize) -> Result<Vec<u64>, MeshHaloError> {
    if data.len() != expect * 8 {
        return Err(MeshHaloError::comm(
            neighbor,
            format!("expected {} payload bytes, got {}", expect * 8, data.len()),
        ));
    }
    Ok(bytemuck::pod_collect_to_vec::<u8, WireIndex>(data)
        .iter()
        .map(|w| w.get())
        .collect())
}

fn encode_u64s(items: &[u64]) -> Vec<WireIndex> {
    items.iter().map(|&v| WireIndex::new(v)).collect()
}

fn decode_count(data: &[u8]) -> usize {
    bytemuck::pod_read_unaligned::<WireCount>(data).get()
}

/// Gather one `u64` from every rank; result is indexed by rank.
pub fn all_gather_u64<C: Communicator>(
    comm: &C,
    value: u64,
    tag: CommTag,
) -> Result<Vec<u64>, MeshHaloError> {
    let (rank, size) = (comm.rank(), comm.size());
    let mut out = vec![0u64; size];
    out[rank] = value;

    let mut recvs = Vec::with_capacity(size.saturating_sub(1));
    let mut buf = [0u8; 8];
    for peer in (0..size).filter(|&p| p != rank) {
        recvs.push((peer, comm.irecv(peer, tag.as_u16(), &mut buf)));
    }
    let mut sends = Vec::with_capacity(size.saturating_sub(1));
    for peer in (0..size).filter(|&p| p != rank) {
        sends.push(comm.isend(peer, tag.as_u16(), &value.to_le_bytes()));
    }

    let mut maybe_err = None;
    for (peer, h) in recvs {
        match h.wait() {
            Some(data) if data.len() == 8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&data);
                out[peer] = u64::from_le_bytes(bytes);
            }
            Some(data) => {
                maybe_err.get_or_insert(MeshHaloError::comm(
                    peer,
                    format!("expected 8 bytes in all-gather, got {}", data.len()),
                ));
            }
            None => {
                maybe_err.get_or_insert(MeshHaloError::comm(
                    peer,
                    "no data received in all-gather".to_string(),
                ));
            }
        }
    }
    for s in sends {
        let _ = s.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Exclusive prefix sum of an all-gathered count, plus the total.
pub fn exclusive_scan_u64<C: Communicator>(
    comm: &C,
    value: u64,
    tag: CommTag,
) -> Result<(u64, u64), MeshHaloError> {
    let all = all_gather_u64(comm, value, tag)?;
    let offset = all[..comm.rank()].iter().sum();
    let total = all.iter().sum();
    Ok((offset, total))
}

/// Full variable-length exchange: `send[p]` goes to rank `p`. The result is
/// indexed by source rank. Construction-time only; steady-state code paths
/// use [`neighbor_all_to_all`].
pub fn all_to_allv_u64<C: Communicator>(
    comm: &C,
    mut send: Vec<Vec<u64>>,
    tag: CommTag,
) -> Result<Vec<Vec<u64>>, MeshHaloError> {
    let (rank, size) = (comm.rank(), comm.size());
    if send.len() != size {
        return Err(MeshHaloError::ShapeMismatch {
            what: "all-to-all send buffers (one per rank)",
            expected: size,
            found: send.len(),
        });
    }

    // Stage 1: counts.
    let peers: Vec<usize> = (0..size).filter(|&p| p != rank).collect();
    let mut count_recvs = Vec::with_capacity(peers.len());
    let mut cnt_buf = [0u8; 8];
    for &peer in &peers {
        count_recvs.push((peer, comm.irecv(peer, tag.as_u16(), &mut cnt_buf)));
    }
    let mut count_sends = Vec::with_capacity(peers.len());
    for &peer in &peers {
        let c = WireCount::new(send[peer].len());
        count_sends.push(comm.isend(peer, tag.as_u16(), cast_slice(std::slice::from_ref(&c))));
    }

    let mut counts_in = vec![0usize; size];
    let mut maybe_err = None;
    for (peer, h) in count_recvs {
        match h.wait() {
            Some(data) if data.len() == 8 => {
                counts_in[peer] = decode_count(&data);
            }
            _ => {
                maybe_err.get_or_insert(MeshHaloError::comm(
                    peer,
                    "failed to receive size header".to_string(),
                ));
            }
        }
    }
    for s in count_sends {
        let _ = s.wait();
    }
    if let Some(err) = maybe_err.take() {
        return Err(err);
    }

    // Stage 2: payloads, only where counts are non-zero.
    let payload_tag = tag.payload();
    let mut recvs = Vec::new();
    for &peer in &peers {
        if counts_in[peer] > 0 {
            let mut buf = vec![0u8; counts_in[peer] * 8];
            let h = comm.irecv(peer, payload_tag.as_u16(), &mut buf);
            recvs.push((peer, h));
        }
    }
    let mut payload_sends = Vec::new();
    for &peer in &peers {
        if !send[peer].is_empty() {
            let enc = encode_u64s(&send[peer]);
            payload_sends.push(comm.isend(peer, payload_tag.as_u16(), cast_slice(&enc)));
        }
    }

    let mut out: Vec<Vec<u64>> = vec![Vec::new(); size];
    out[rank] = std::mem::take(&mut send[rank]);
    for (peer, h) in recvs {
        match h.wait() {
            Some(data) => match decode_u64s(peer, &data, counts_in[peer]) {
                Ok(vals) => out[peer] = vals,
                Err(e) => {
                    maybe_err.get_or_insert(e);
                }
            },
            None => {
                maybe_err.get_or_insert(MeshHaloError::comm(
                    peer,
                    "no payload received".to_string(),
                ));
            }
        }
    }
    for s in payload_sends {
        let _ = s.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Neighbor-only variable-length exchange over an explicit group.
///
/// Sends `send[p]` to each destination `p` of `group` (missing entries mean
/// an empty message) and receives one, possibly empty, message from every
/// source. The result has an entry for *every* source rank so callers can
/// iterate the group deterministically.
pub fn neighbor_all_to_all<C: Communicator>(
    comm: &C,
    group: &NeighborGroup,
    tag: CommTag,
    send: &HashMap<usize, Vec<u64>>,
) -> Result<HashMap<usize, Vec<u64>>, MeshHaloError> {
    for &p in send.keys() {
        if !group.destinations().contains(&p) {
            return Err(MeshHaloError::InvalidNeighbor(p));
        }
    }

    // Stage 1: sizes. Every member posts to every neighbor, zero included;
    // a rank in the group may legitimately have no data for a given call.
    let mut count_recvs = Vec::with_capacity(group.sources().len());
    let mut cnt_buf = [0u8; 8];
    for &src in group.sources() {
        count_recvs.push((src, comm.irecv(src, tag.as_u16(), &mut cnt_buf)));
    }
    let mut count_sends = Vec::with_capacity(group.destinations().len());
    for &dst in group.destinations() {
        let c = WireCount::new(send.get(&dst).map_or(0, Vec::len));
        count_sends.push(comm.isend(dst, tag.as_u16(), cast_slice(std::slice::from_ref(&c))));
    }

    let mut counts_in: HashMap<usize, usize> = HashMap::with_capacity(group.sources().len());
    let mut maybe_err = None;
    for (src, h) in count_recvs {
        match h.wait() {
            Some(data) if data.len() == 8 => {
                counts_in.insert(src, decode_count(&data));
            }
            _ => {
                maybe_err.get_or_insert(MeshHaloError::comm(
                    src,
                    "failed to receive size header".to_string(),
                ));
            }
        }
    }
    for s in count_sends {
        let _ = s.wait();
    }
    if let Some(err) = maybe_err.take() {
        return Err(err);
    }

    // Stage 2: payloads.
    let payload_tag = tag.payload();
    let mut recvs = Vec::new();
    for &src in group.sources() {
        let n = counts_in[&src];
        if n > 0 {
            let mut buf = vec![0u8; n * 8];
            recvs.push((src, comm.irecv(src, payload_tag.as_u16(), &mut buf)));
        }
    }
    let mut payload_sends = Vec::new();
    for &dst in group.destinations() {
        if let Some(items) = send.get(&dst) {
            if !items.is_empty() {
                let enc = encode_u64s(items);
                payload_sends.push(comm.isend(dst, payload_tag.as_u16(), cast_slice(&enc)));
            }
        }
    }

    let mut out: HashMap<usize, Vec<u64>> = group
        .sources()
        .iter()
        .map(|&src| (src, Vec::new()))
        .collect();
    for (src, h) in recvs {
        match h.wait() {
            Some(data) => match decode_u64s(src, &data, counts_in[&src]) {
                Ok(vals) => {
                    out.insert(src, vals);
                }
                Err(e) => {
                    maybe_err.get_or_insert(e);
                }
            },
            None => {
                maybe_err.get_or_insert(MeshHaloError::comm(
                    src,
                    "no payload received".to_string(),
                ));
            }
        }
    }
    for s in payload_sends {
        let _ = s.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_tolerates_unaligned_buffers() {
        let vals = [7u64, u64::MAX, 0];
        let enc = encode_u64s(&vals);
        let mut bytes = vec![0u8; 1 + enc.len() * 8];
        bytes[1..].copy_from_slice(cast_slice(&enc));
        // odd start offset: the payload slice cannot be 8-byte aligned
        let decoded = decode_u64s(0, &bytes[1..], vals.len()).unwrap();
        assert_eq!(decoded, vals);

        let c = WireCount::new(1234);
        let mut cbytes = vec![0u8; 9];
        cbytes[1..].copy_from_slice(cast_slice(std::slice::from_ref(&c)));
        assert_eq!(decode_count(&cbytes[1..]), 1234);
    }

    #[test]
    fn truncated_payload_is_a_comm_error() {
        assert!(matches!(
            decode_u64s(3, &[0u8; 12], 2),
            Err(MeshHaloError::CommError { neighbor: 3, .. })
        ));
    }
}
