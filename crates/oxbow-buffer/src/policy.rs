//! Page replacement policies for the buffer pool.

use crate::frame::{Frame, FrameId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Replacement strategies supported by the buffer pool.
///
/// The set is closed: each variant selects one victim-scan rule and the
/// per-pin metadata that rule consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementPolicy {
    /// Evict pages in the order they were loaded from disk.
    Fifo,
    /// Evict the unpinned page whose last pin is oldest.
    #[default]
    Lru,
    /// LRU with a K-pin history. The history currently tracks the most
    /// recent pin only, so selection matches plain LRU.
    LruK,
    /// Evict the unpinned page with the fewest pins since it was loaded.
    Lfu,
    /// Second-chance sweep over per-frame reference bits.
    Clock,
}

/// Victim selector for the buffer pool.
///
/// Holds the policy tag and the scan hands the CLOCK and LFU sweeps
/// resume from. All per-frame metadata (recency stamp, reference count,
/// reference bit) lives in the frames themselves and is maintained
/// through [`note_hit`](Replacer::note_hit) and
/// [`note_install`](Replacer::note_install).
pub struct Replacer {
    /// Active replacement policy.
    policy: ReplacementPolicy,
    /// Scan positions protected by mutex.
    state: Mutex<ScanState>,
}

struct ScanState {
    /// Current CLOCK hand position.
    clock_hand: usize,
    /// Position the next LFU scan starts from.
    lfu_hand: usize,
}

impl Replacer {
    /// Creates a replacer for the given policy.
    pub fn new(policy: ReplacementPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(ScanState {
                clock_hand: 0,
                lfu_hand: 0,
            }),
        }
    }

    /// Returns the active policy.
    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    /// Records a pin of an already-resident page.
    ///
    /// `tick` is the pool's pin counter after this pin.
    pub fn note_hit(&self, frame: &Frame, tick: u64) {
        match self.policy {
            ReplacementPolicy::Fifo => {}
            ReplacementPolicy::Lru | ReplacementPolicy::LruK => frame.set_hit_tick(tick),
            ReplacementPolicy::Lfu => frame.bump_ref(),
            ReplacementPolicy::Clock => frame.set_reference_bit(true),
        }
    }

    /// Records the installation of a freshly loaded page.
    ///
    /// The frame arrives with cleared metadata; only the policy's own
    /// marker is stamped.
    pub fn note_install(&self, frame: &Frame, tick: u64) {
        match self.policy {
            ReplacementPolicy::Fifo | ReplacementPolicy::Lfu => {}
            ReplacementPolicy::Lru | ReplacementPolicy::LruK => frame.set_hit_tick(tick),
            ReplacementPolicy::Clock => frame.set_reference_bit(true),
        }
    }

    /// Selects a victim frame with a fix count of zero.
    ///
    /// `loads` is the number of pages the pool has loaded from disk so
    /// far; FIFO derives its cursor from it. Returns None when every
    /// frame is pinned.
    pub fn select_victim(&self, frames: &[Frame], loads: u64) -> Option<FrameId> {
        if frames.is_empty() {
            return None;
        }
        match self.policy {
            ReplacementPolicy::Fifo => Self::select_fifo(frames, loads),
            ReplacementPolicy::Lru | ReplacementPolicy::LruK => Self::select_lru(frames),
            ReplacementPolicy::Lfu => self.select_lfu(frames),
            ReplacementPolicy::Clock => self.select_clock(frames),
        }
    }

    /// FIFO: from the load cursor, the first unpinned frame wins.
    fn select_fifo(frames: &[Frame], loads: u64) -> Option<FrameId> {
        let n = frames.len();
        let start = (loads % n as u64) as usize;
        for i in 0..n {
            let idx = (start + i) % n;
            if frames[idx].fix_count() == 0 {
                return Some(FrameId(idx as u32));
            }
        }
        None
    }

    /// LRU: the unpinned frame with the smallest recency stamp wins;
    /// ties go to the lowest index.
    fn select_lru(frames: &[Frame]) -> Option<FrameId> {
        let mut best: Option<(usize, u64)> = None;
        for (idx, frame) in frames.iter().enumerate() {
            if frame.fix_count() != 0 {
                continue;
            }
            let tick = frame.hit_tick();
            match best {
                Some((_, best_tick)) if tick >= best_tick => {}
                _ => best = Some((idx, tick)),
            }
        }
        best.map(|(idx, _)| FrameId(idx as u32))
    }

    /// LFU: the first unpinned frame from the hand anchors the minimum;
    /// the rest of the sweep may lower it. The hand resumes just past
    /// the victim.
    fn select_lfu(&self, frames: &[Frame]) -> Option<FrameId> {
        let n = frames.len();
        let mut state = self.state.lock();

        let mut anchor = None;
        for step in 0..n {
            let idx = (state.lfu_hand + step) % n;
            if frames[idx].fix_count() == 0 {
                anchor = Some((idx, step));
                break;
            }
        }
        let (mut victim, anchor_step) = anchor?;
        let mut least_refs = frames[victim].ref_count();

        for step in (anchor_step + 1)..n {
            let idx = (state.lfu_hand + step) % n;
            let frame = &frames[idx];
            if frame.fix_count() == 0 && frame.ref_count() < least_refs {
                victim = idx;
                least_refs = frame.ref_count();
            }
        }

        state.lfu_hand = (victim + 1) % n;
        Some(FrameId(victim as u32))
    }

    /// CLOCK: sweep from the hand; a set reference bit buys one more
    /// rotation, a clear bit on an unpinned frame is the victim. The
    /// hand stops just past the victim.
    fn select_clock(&self, frames: &[Frame]) -> Option<FrameId> {
        let n = frames.len();
        if frames.iter().all(|frame| frame.fix_count() > 0) {
            return None;
        }

        let mut state = self.state.lock();
        // With at least one unpinned frame, two rotations always suffice:
        // the first pass clears its bit, the second finds it clear.
        for _ in 0..(2 * n) {
            let idx = state.clock_hand;
            let frame = &frames[idx];
            if frame.fix_count() == 0 {
                if !frame.reference_bit() {
                    state.clock_hand = (idx + 1) % n;
                    return Some(FrameId(idx as u32));
                }
                frame.set_reference_bit(false);
            }
            state.clock_hand = (idx + 1) % n;
        }
        None
    }
}
