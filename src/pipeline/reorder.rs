//! Sequence-ordered result emission

use std::collections::BTreeMap;

use crate::emotion::FusedResult;

/// Outcome of one clip's fusion work
///
/// `Skipped` records a clip whose branches both failed; it produces no sink
/// emission but must still advance the ordering cursor so later clips are
/// not held back waiting for it.
#[derive(Debug)]
pub enum ClipOutcome {
    /// Fusion produced a result for this clip
    Fused(Box<FusedResult>),
    /// Both branches failed; nothing to emit for this sequence number
    Skipped(u64),
}

impl ClipOutcome {
    /// Sequence number this outcome belongs to
    #[must_use]
    pub fn seq(&self) -> u64 {
        match self {
            Self::Fused(result) => result.seq,
            Self::Skipped(seq) => *seq,
        }
    }
}

/// Buffers out-of-order fusion outcomes and releases them in sequence order
///
/// Clip n+1 can finish fusion before clip n when branch latencies differ;
/// results are held here until every earlier sequence number has been
/// accounted for. Owned by the single emitter task - the one piece of
/// mutable state shared across concurrent fusion work, kept behind a
/// single-writer queue.
#[derive(Debug)]
pub struct ReorderBuffer {
    next_seq: u64,
    pending: BTreeMap<u64, ClipOutcome>,
}

impl ReorderBuffer {
    /// Create a buffer expecting sequence numbers from `start_seq` upward
    #[must_use]
    pub const fn new(start_seq: u64) -> Self {
        Self {
            next_seq: start_seq,
            pending: BTreeMap::new(),
        }
    }

    /// Record one clip's outcome, returning every result now ready to emit
    ///
    /// Returned results are in strictly increasing sequence order and each
    /// sequence number is released at most once.
    pub fn push(&mut self, outcome: ClipOutcome) -> Vec<FusedResult> {
        let seq = outcome.seq();
        if seq < self.next_seq {
            // Duplicate or stale outcome; emitting it would break ordering
            tracing::warn!(seq, next = self.next_seq, "dropping stale clip outcome");
            return Vec::new();
        }
        self.pending.insert(seq, outcome);
        self.drain_ready()
    }

    /// Release the contiguous run starting at the cursor
    fn drain_ready(&mut self) -> Vec<FusedResult> {
        let mut ready = Vec::new();
        while let Some(outcome) = self.pending.remove(&self.next_seq) {
            self.next_seq += 1;
            match outcome {
                ClipOutcome::Fused(result) => ready.push(*result),
                ClipOutcome::Skipped(seq) => {
                    tracing::debug!(seq, "clip produced no result, advancing past gap");
                }
            }
        }
        ready
    }

    /// Emit everything still buffered, in sequence order, regardless of gaps
    ///
    /// Used at shutdown: clips that never completed will not arrive, so
    /// waiting for contiguity would discard real results.
    pub fn flush(&mut self) -> Vec<FusedResult> {
        let pending = std::mem::take(&mut self.pending);
        let mut flushed = Vec::new();
        for (seq, outcome) in pending {
            self.next_seq = seq + 1;
            if let ClipOutcome::Fused(result) = outcome {
                flushed.push(*result);
            }
        }
        flushed
    }

    /// Number of outcomes waiting on earlier sequence numbers
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Next sequence number the buffer is waiting for
    #[must_use]
    pub const fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::CanonicalEmotion;

    fn fused(seq: u64) -> ClipOutcome {
        ClipOutcome::Fused(Box::new(FusedResult {
            seq,
            label: CanonicalEmotion::Neutral,
            confidence: 0.5,
            agreement: true,
            partial: false,
            voice: None,
            text: None,
        }))
    }

    #[test]
    fn test_in_order_passthrough() {
        let mut buffer = ReorderBuffer::new(0);

        for seq in 0..3 {
            let ready = buffer.push(fused(seq));
            assert_eq!(ready.len(), 1);
            assert_eq!(ready[0].seq, seq);
        }
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn test_out_of_order_held_back() {
        let mut buffer = ReorderBuffer::new(0);

        // Clip 2 and 1 finish before clip 0
        assert!(buffer.push(fused(2)).is_empty());
        assert!(buffer.push(fused(1)).is_empty());
        assert_eq!(buffer.buffered(), 2);

        // Clip 0 arrives and releases the whole run
        let ready = buffer.push(fused(0));
        let seqs: Vec<u64> = ready.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn test_skipped_clip_advances_cursor() {
        let mut buffer = ReorderBuffer::new(0);

        assert!(buffer.push(fused(1)).is_empty());

        // Clip 0 failed entirely; its skip releases clip 1
        let ready = buffer.push(ClipOutcome::Skipped(0));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].seq, 1);
        assert_eq!(buffer.next_seq(), 2);
    }

    #[test]
    fn test_stale_outcome_dropped() {
        let mut buffer = ReorderBuffer::new(0);
        let _ = buffer.push(fused(0));

        // A duplicate of an already-emitted seq must not be re-released
        assert!(buffer.push(fused(0)).is_empty());
        assert_eq!(buffer.next_seq(), 1);
    }

    #[test]
    fn test_flush_emits_past_gaps() {
        let mut buffer = ReorderBuffer::new(0);
        assert!(buffer.push(fused(2)).is_empty());
        assert!(buffer.push(fused(5)).is_empty());

        let flushed = buffer.flush();
        let seqs: Vec<u64> = flushed.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![2, 5]);
        assert_eq!(buffer.buffered(), 0);
    }
}
