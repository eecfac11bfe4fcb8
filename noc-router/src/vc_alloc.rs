// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Output VC allocation.

/// Read-only view of the credit and usage state of an output port.
pub trait VcSnapshot {
    fn num_vcs(&self) -> usize;
    fn credits_for(&self, vc: usize) -> u32;
    fn usage_for(&self, vc: usize) -> u32;
}

/// Chooses the output VC for each packet leaving an input port.
///
/// Consecutive packets of the same flow `(src, dst)` (which always share an
/// output port under deterministic routing) stay on the VC chosen
/// for the first of them. Otherwise the VC with the most credits wins, ties
/// going to the least used VC and then to the lowest index.
#[derive(Debug, Default)]
pub struct VcAllocator {
    last: Option<LastDecision>,
}

#[derive(Debug, Clone, Copy)]
struct LastDecision {
    out_port: usize,
    src_id: usize,
    dst_id: usize,
    vc: usize,
}

impl VcAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(
        &mut self,
        out_port: usize,
        src_id: usize,
        dst_id: usize,
        snapshot: &impl VcSnapshot,
    ) -> usize {
        if let Some(last) = self.last {
            if last.out_port == out_port && last.src_id == src_id && last.dst_id == dst_id {
                return last.vc;
            }
        }

        let mut best_vc = 0;
        let mut best_credits = 0;
        let mut best_usage = u32::MAX;
        for vc in 0..snapshot.num_vcs() {
            let credits = snapshot.credits_for(vc);
            let usage = snapshot.usage_for(vc);
            if credits > best_credits || (credits == best_credits && usage < best_usage) {
                best_vc = vc;
                best_credits = credits;
                best_usage = usage;
            }
        }

        self.last = Some(LastDecision {
            out_port,
            src_id,
            dst_id,
            vc: best_vc,
        });
        best_vc
    }
}
