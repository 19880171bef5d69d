use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use crate::protocol::{DecodeError, FramePacket};

struct FrameBuffer {
    timestamp: u64,
    chunks: Vec<Option<Bytes>>,
    received: usize,
    created_at: Instant,
}

/// A frame whose every chunk has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFrame {
    pub frame_id: u32,
    /// Timestamp carried by the frame's chunks.
    pub timestamp: u64,
    pub data: Bytes,
}

/// Reassembles frames from chunks arriving in any order.
///
/// One buffer is kept per frame id. A buffer completes exactly when each of
/// its slots has been filled once; later duplicates are ignored. Buffers
/// older than the ttl are dropped by [`FrameAssembler::prune`] and never
/// emitted. Ids of completed frames are remembered for one ttl, so chunks
/// re-delivered after completion are dropped instead of emitting the frame
/// again.
pub struct FrameAssembler {
    entries: HashMap<u32, FrameBuffer>,
    completed: HashMap<u32, Instant>,
    completed_order: VecDeque<u32>,
    ttl: Duration,
    max_pending: usize,
}

impl FrameAssembler {
    pub fn new(ttl: Duration, max_pending: usize) -> Self {
        Self {
            entries: HashMap::new(),
            completed: HashMap::new(),
            completed_order: VecDeque::new(),
            ttl,
            max_pending: max_pending.max(1),
        }
    }

    /// Number of frames currently being reassembled.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn add(
        &mut self,
        packet: FramePacket,
        now: Instant,
    ) -> Result<Option<AssembledFrame>, DecodeError> {
        if self.completed.contains_key(&packet.frame_id) {
            tracing::trace!(
                frame_id = packet.frame_id,
                chunk_index = packet.chunk_index,
                "chunk_for_completed_frame"
            );
            return Ok(None);
        }
        if packet.total_chunks == 0 {
            return Err(DecodeError::ZeroChunks);
        }
        if packet.chunk_index >= packet.total_chunks {
            return Err(DecodeError::ChunkIndexOutOfRange {
                index: packet.chunk_index,
                total: packet.total_chunks,
            });
        }
        if self.entries.len() >= self.max_pending && !self.entries.contains_key(&packet.frame_id)
        {
            return Err(DecodeError::ReassemblyBufferFull);
        }

        let entry = self
            .entries
            .entry(packet.frame_id)
            .or_insert_with(|| FrameBuffer {
                timestamp: packet.timestamp,
                chunks: vec![None; packet.total_chunks as usize],
                received: 0,
                created_at: now,
            });

        if entry.chunks.len() != packet.total_chunks as usize {
            return Err(DecodeError::ChunkCountMismatch);
        }

        let slot = &mut entry.chunks[packet.chunk_index as usize];
        if slot.is_some() {
            tracing::trace!(
                frame_id = packet.frame_id,
                chunk_index = packet.chunk_index,
                "duplicate_chunk"
            );
            return Ok(None);
        }
        *slot = Some(packet.data);
        entry.received += 1;

        if entry.received != entry.chunks.len() {
            return Ok(None);
        }

        let Some(entry) = self.entries.remove(&packet.frame_id) else {
            return Ok(None);
        };
        self.remember_completed(packet.frame_id, now);
        let size = entry.chunks.iter().flatten().map(Bytes::len).sum();
        let mut buf = BytesMut::with_capacity(size);
        for chunk in entry.chunks.iter().flatten() {
            buf.extend_from_slice(chunk);
        }

        tracing::trace!(frame_id = packet.frame_id, size, "reassembled_frame");

        Ok(Some(AssembledFrame {
            frame_id: packet.frame_id,
            timestamp: entry.timestamp,
            data: buf.freeze(),
        }))
    }

    fn remember_completed(&mut self, frame_id: u32, now: Instant) {
        // Bounded: beyond this many ids the oldest completion is forgotten early.
        let capacity = self.max_pending.saturating_mul(4);
        while self.completed_order.len() >= capacity {
            let Some(oldest) = self.completed_order.pop_front() else {
                break;
            };
            self.completed.remove(&oldest);
        }
        self.completed.insert(frame_id, now);
        self.completed_order.push_back(frame_id);
    }

    /// Drops every buffer older than the ttl, and forgets completed frame ids
    /// older than the ttl. Returns how many incomplete buffers were dropped.
    pub fn prune(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        while let Some(&oldest) = self.completed_order.front() {
            let expired = self
                .completed
                .get(&oldest)
                .is_none_or(|at| now.saturating_duration_since(*at) > ttl);
            if !expired {
                break;
            }
            self.completed_order.pop_front();
            self.completed.remove(&oldest);
        }

        let before = self.entries.len();
        self.entries.retain(|frame_id, entry| {
            let age = now.saturating_duration_since(entry.created_at);
            if age > self.ttl {
                tracing::warn!(
                    frame_id,
                    received = entry.received,
                    total = entry.chunks.len(),
                    ?age,
                    "dropping_expired_frame"
                );
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::split_frame;

    fn frame_bytes(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i * 31 % 251) as u8).collect::<Vec<_>>())
    }

    fn assembler() -> FrameAssembler {
        FrameAssembler::new(Duration::from_secs(2), 256)
    }

    #[test]
    fn single_chunk_completes_immediately() {
        let frame = frame_bytes(10);
        let mut packets = split_frame(1, 42, &frame, 100).unwrap();
        let out = assembler()
            .add(packets.remove(0), Instant::now())
            .unwrap()
            .unwrap();
        assert_eq!(out.data, frame);
        assert_eq!(out.timestamp, 42);
    }

    #[test]
    fn reassembles_any_order_with_duplicates() {
        let frame = frame_bytes(1000);
        let packets = split_frame(9, 7, &frame, 128).unwrap();
        assert_eq!(packets.len(), 8);

        // A few fixed permutations plus a reversed order, each with duplicates mixed in.
        let orders: [Vec<usize>; 4] = [
            vec![7, 6, 5, 4, 3, 2, 1, 0],
            vec![3, 3, 0, 7, 1, 1, 6, 2, 5, 4],
            vec![0, 2, 4, 6, 1, 3, 5, 7],
            vec![5, 0, 5, 1, 6, 2, 7, 3, 4, 4],
        ];

        for order in orders {
            let mut asm = assembler();
            let now = Instant::now();
            let mut emitted = Vec::new();
            for &i in &order {
                if let Some(done) = asm.add(packets[i].clone(), now).unwrap() {
                    emitted.push(done);
                }
            }
            assert_eq!(emitted.len(), 1, "order {order:?}");
            assert_eq!(emitted[0].data, frame);
            assert_eq!(emitted[0].frame_id, 9);
        }
    }

    #[test]
    fn interleaved_frames_complete_independently() {
        let a = frame_bytes(300);
        let b = frame_bytes(500);
        let pa = split_frame(1, 1, &a, 100).unwrap();
        let pb = split_frame(2, 2, &b, 100).unwrap();
        let mut asm = assembler();
        let now = Instant::now();

        let mut done = Vec::new();
        for (x, y) in pb.iter().zip(pa.iter().chain(std::iter::repeat(&pa[0]))) {
            done.extend(asm.add(y.clone(), now).unwrap());
            done.extend(asm.add(x.clone(), now).unwrap());
        }
        let ids: Vec<u32> = done.iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(done[0].data, a);
        assert_eq!(done[1].data, b);
    }

    #[test]
    fn rejects_invalid_chunks() {
        let mut asm = assembler();
        let now = Instant::now();
        let packet = |index, total| FramePacket {
            frame_id: 5,
            chunk_index: index,
            total_chunks: total,
            timestamp: 0,
            data: Bytes::from_static(b"x"),
        };

        assert_eq!(asm.add(packet(0, 0), now), Err(DecodeError::ZeroChunks));
        assert_eq!(
            asm.add(packet(3, 3), now),
            Err(DecodeError::ChunkIndexOutOfRange { index: 3, total: 3 })
        );
        assert_eq!(asm.add(packet(0, 3), now), Ok(None));
        assert_eq!(
            asm.add(packet(1, 4), now),
            Err(DecodeError::ChunkCountMismatch)
        );
    }

    #[test]
    fn rejects_when_buffer_full() {
        let mut asm = FrameAssembler::new(Duration::from_secs(2), 4);
        let now = Instant::now();
        let packet = |frame_id| FramePacket {
            frame_id,
            chunk_index: 0,
            total_chunks: 2,
            timestamp: 0,
            data: Bytes::from_static(b"abcd"),
        };

        for id in 0..4 {
            assert_eq!(asm.add(packet(id), now), Ok(None));
        }
        assert_eq!(asm.add(packet(999), now), Err(DecodeError::ReassemblyBufferFull));
    }

    #[test]
    fn prunes_only_frames_past_ttl() {
        let frame = frame_bytes(300);
        let packets = split_frame(3, 0, &frame, 100).unwrap();
        let mut asm = assembler();
        let t0 = Instant::now();

        asm.add(packets[0].clone(), t0).unwrap();
        asm.add(packets[1].clone(), t0 + Duration::from_millis(1500)).unwrap();

        assert_eq!(asm.prune(t0 + Duration::from_secs(2)), 0);
        assert_eq!(asm.prune(t0 + Duration::from_millis(2001)), 1);
        assert_eq!(asm.pending(), 0);

        // The missing chunk arriving late starts over and cannot complete on its own.
        assert_eq!(
            asm.add(packets[2].clone(), t0 + Duration::from_millis(2100)),
            Ok(None)
        );
    }

    #[test]
    fn duplicate_single_chunk_frame_emits_once() {
        let mut asm = assembler();
        let now = Instant::now();
        let packet = split_frame(1, 5, &Bytes::from_static(b"hello frame"), 1000)
            .unwrap()
            .remove(0);

        assert!(asm.add(packet.clone(), now).unwrap().is_some());
        assert_eq!(asm.add(packet.clone(), now), Ok(None));
        assert_eq!(asm.add(packet, now + Duration::from_millis(500)), Ok(None));
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn full_redelivery_after_completion_is_ignored() {
        let frame = frame_bytes(250);
        let packets = split_frame(4, 0, &frame, 100).unwrap();
        let mut asm = assembler();
        let now = Instant::now();

        let mut emitted = 0;
        for round in 0..2 {
            for packet in &packets {
                if asm.add(packet.clone(), now).unwrap().is_some() {
                    emitted += 1;
                }
            }
            assert_eq!(emitted, 1, "round {round}");
        }
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn completed_ids_expire_with_ttl() {
        let packet = split_frame(8, 0, &frame_bytes(10), 100).unwrap().remove(0);
        let mut asm = assembler();
        let t0 = Instant::now();

        assert!(asm.add(packet.clone(), t0).unwrap().is_some());
        assert_eq!(asm.prune(t0 + Duration::from_secs(2)), 0);
        assert_eq!(asm.add(packet.clone(), t0 + Duration::from_secs(2)), Ok(None));

        asm.prune(t0 + Duration::from_millis(2001));
        // Past the ttl the id is free again, as after a counter wrap.
        assert!(asm.add(packet, t0 + Duration::from_millis(2002)).unwrap().is_some());
    }

    #[test]
    fn completed_id_record_is_bounded() {
        let mut asm = FrameAssembler::new(Duration::from_secs(2), 2);
        let now = Instant::now();
        for id in 0..20 {
            let packet = split_frame(id, 0, &frame_bytes(4), 100).unwrap().remove(0);
            assert!(asm.add(packet, now).unwrap().is_some());
        }
        assert_eq!(asm.completed.len(), 8);
        assert_eq!(asm.completed_order.len(), 8);
    }
}
