use memory::{SweepStats, Value};
use tracing::debug;

/// Trait for garbage collection operations
pub trait GarbageCollector {
    fn collect_garbage(&mut self) -> SweepStats;
    fn mark_roots(&self) -> Vec<Value>;
}

impl GarbageCollector for super::vm::VM {
    fn collect_garbage(&mut self) -> SweepStats {
        let before = self.heap.bytes_allocated;

        let roots = self.mark_roots();
        self.heap.trace(roots);
        let stats = self.heap.sweep();

        // Tracking lists are weak: forget continuations that were swept.
        for thread in &mut self.threads {
            thread.tracking.retain_live(&self.heap);
        }

        // Dynamic Threshold: Double it or set reasonable limits
        self.heap.next_gc_threshold = std::cmp::max(
            self.heap.bytes_allocated * 2,
            self.config.gc_threshold,
        );

        debug!(
            before,
            after = self.heap.bytes_allocated,
            released = stats.total(),
            stress = self.config.stress_gc,
            "gc cycle"
        );
        stats
    }

    fn mark_roots(&self) -> Vec<Value> {
        let mut roots = Vec::new();

        // 1. Globals (natives and host-defined names)
        roots.push(Value::scope(self.globals));

        // 2. Module constants
        for loaded in &self.modules {
            roots.extend(loaded.constants.values().copied());
        }

        // 3. Threads: results and every frame, generators included
        for thread in &self.threads {
            roots.extend(thread.result);
            for frame in thread.running.frames() {
                frame.roots(&mut roots);
            }
        }

        roots
    }
}
