//=========================================================================
// Profiler Subsystem
//=========================================================================
//
// Hierarchical wall-clock profiler. Named blocks nest into a tree; each
// block keeps this frame's time and count, the last finished frame's, and
// the totals since creation.
//
// Frame lifecycle:
//   begin_frame() → ends the open frame, opens the "RunFrame" block
//   begin_block(name) / end_block()   (nested freely inside the frame)
//   end_frame()   → closes open blocks, rolls frame stats into totals
//
// When the context also carries the Time subsystem, the profiler follows
// its E_BEGINFRAME / E_ENDFRAME events.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::RefCell;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

//=== Internal Dependencies ===============================================

use super::event::core_events::{E_BEGINFRAME, E_ENDFRAME};
use super::{Object, ObjectBase, ObjectId, ObjectType, TypeKey, VariantMap};
use crate::context::Context;

//=== Constants ===========================================================

/// Block opened by [`Profiler::begin_frame`] around the whole frame.
pub const FRAME_BLOCK: &str = "RunFrame";

const ROOT: usize = 0;

//=== BlockStats ==========================================================

/// Snapshot of one profiled block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStats {
    pub name: String,
    /// Nesting depth; top-level blocks are at depth 0.
    pub depth: usize,
    /// Time and entry count in the frame in progress.
    pub frame_time: Duration,
    pub frame_count: u32,
    /// Time and entry count of the last finished frame.
    pub last_frame_time: Duration,
    pub last_frame_count: u32,
    /// Longest single entry so far.
    pub max_time: Duration,
    /// Totals across all finished frames.
    pub total_time: Duration,
    pub total_count: u64,
}

//=== Block Tree ==========================================================

#[derive(Debug)]
struct BlockNode {
    name: String,
    parent: usize,
    children: Vec<usize>,
    started: Option<Instant>,
    frame_time: Duration,
    frame_count: u32,
    last_frame_time: Duration,
    last_frame_count: u32,
    max_time: Duration,
    total_time: Duration,
    total_count: u64,
}

impl BlockNode {
    fn new(name: &str, parent: usize) -> Self {
        Self {
            name: name.to_owned(),
            parent,
            children: Vec::new(),
            started: None,
            frame_time: Duration::ZERO,
            frame_count: 0,
            last_frame_time: Duration::ZERO,
            last_frame_count: 0,
            max_time: Duration::ZERO,
            total_time: Duration::ZERO,
            total_count: 0,
        }
    }

    fn finish(&mut self, now: Instant) {
        if let Some(started) = self.started.take() {
            let elapsed = now.saturating_duration_since(started);
            self.frame_time += elapsed;
            self.frame_count += 1;
            self.max_time = self.max_time.max(elapsed);
        }
    }

    fn roll_over(&mut self) {
        self.last_frame_time = self.frame_time;
        self.last_frame_count = self.frame_count;
        self.total_time += self.frame_time;
        self.total_count += u64::from(self.frame_count);
        self.frame_time = Duration::ZERO;
        self.frame_count = 0;
    }
}

#[derive(Debug)]
struct ProfilerState {
    nodes: Vec<BlockNode>,
    current: usize,
    total_frames: u64,
}

impl ProfilerState {
    fn new() -> Self {
        Self {
            nodes: vec![BlockNode::new("Root", ROOT)],
            current: ROOT,
            total_frames: 0,
        }
    }

    fn child_named(&self, parent: usize, name: &str) -> Option<usize> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child].name == name)
    }

    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.current;
        while node != ROOT {
            depth += 1;
            node = self.nodes[node].parent;
        }
        depth
    }

    fn collect(&self, node: usize, depth: usize, out: &mut Vec<BlockStats>) {
        for &child in &self.nodes[node].children {
            let block = &self.nodes[child];
            out.push(BlockStats {
                name: block.name.clone(),
                depth,
                frame_time: block.frame_time,
                frame_count: block.frame_count,
                last_frame_time: block.last_frame_time,
                last_frame_count: block.last_frame_count,
                max_time: block.max_time,
                total_time: block.total_time,
                total_count: block.total_count,
            });
            self.collect(child, depth + 1, out);
        }
    }
}

//=== Profiler ============================================================

/// Hierarchical block profiler subsystem.
///
/// Registered by default when a [`Context`] is built.
///
/// ```rust
/// use aetheric_runtime::prelude::*;
///
/// let context = Context::new();
/// let profiler = context.subsystem::<Profiler>().expect("created by default");
///
/// profiler.begin_frame();
/// {
///     let _physics = profiler.scope("Physics");
/// }
/// profiler.end_frame();
///
/// assert_eq!(profiler.total_frames(), 1);
/// assert_eq!(profiler.blocks()[1].name, "Physics");
/// ```
pub struct Profiler {
    base: ObjectBase,
    state: RefCell<ProfilerState>,
}

impl ObjectType for Profiler {
    const TYPE_NAME: &'static str = "Profiler";
}

impl Object for Profiler {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn on_event(
        &self,
        _context: &Context,
        _sender: Option<ObjectId>,
        event_type: TypeKey,
        _data: &mut VariantMap,
    ) {
        if event_type == E_BEGINFRAME {
            self.begin_frame();
        } else if event_type == E_ENDFRAME {
            self.end_frame();
        }
    }
}

impl Profiler {
    /// Creates a profiler with no blocks.
    pub fn new(context: &Context) -> Self {
        Self {
            base: ObjectBase::new::<Profiler>(context),
            state: RefCell::new(ProfilerState::new()),
        }
    }

    //--- Blocks -----------------------------------------------------------

    /// Opens a block named `name` under the current one.
    ///
    /// Re-entering a name under the same parent reuses its block, so stats
    /// accumulate per call site rather than per call.
    pub fn begin_block(&self, name: &str) {
        let mut state = self.state.borrow_mut();
        let parent = state.current;

        let block = match state.child_named(parent, name) {
            Some(block) => block,
            None => {
                let block = state.nodes.len();
                state.nodes.push(BlockNode::new(name, parent));
                state.nodes[parent].children.push(block);
                block
            }
        };

        state.nodes[block].started = Some(Instant::now());
        state.current = block;
    }

    /// Closes the innermost open block.
    pub fn end_block(&self) {
        let mut state = self.state.borrow_mut();
        let current = state.current;
        if current == ROOT {
            warn!("Profiler::end_block without a matching begin_block");
            return;
        }

        state.nodes[current].finish(Instant::now());
        state.current = state.nodes[current].parent;
    }

    /// Opens a block that closes when the returned guard drops.
    pub fn scope(&self, name: &str) -> ProfileScope<'_> {
        self.begin_block(name);
        ProfileScope { profiler: self }
    }

    //--- Frames -----------------------------------------------------------

    /// Ends the open frame, if any, and opens a new [`FRAME_BLOCK`].
    pub fn begin_frame(&self) {
        self.end_frame();
        self.begin_block(FRAME_BLOCK);
    }

    /// Closes every open block and moves this frame's stats into the
    /// last-frame and total figures. No-op when no block is open.
    pub fn end_frame(&self) {
        let mut state = self.state.borrow_mut();
        if state.current == ROOT {
            return;
        }

        let open = state.depth();
        if open > 1 {
            warn!("Profiler frame ended with {} unclosed block(s)", open - 1);
        }

        let now = Instant::now();
        while state.current != ROOT {
            let current = state.current;
            state.nodes[current].finish(now);
            state.current = state.nodes[current].parent;
        }

        for node in state.nodes.iter_mut() {
            node.roll_over();
        }
        state.total_frames += 1;

        let frame_time: Duration = state.nodes[ROOT]
            .children
            .iter()
            .map(|&child| state.nodes[child].last_frame_time)
            .sum();
        debug!("Profiler frame {} took {:?}", state.total_frames, frame_time);
    }

    //--- Queries ----------------------------------------------------------

    /// Number of frames finished so far.
    pub fn total_frames(&self) -> u64 {
        self.state.borrow().total_frames
    }

    /// Number of blocks currently open.
    pub fn depth(&self) -> usize {
        self.state.borrow().depth()
    }

    /// Name of the innermost open block.
    pub fn current_block(&self) -> Option<String> {
        let state = self.state.borrow();
        (state.current != ROOT).then(|| state.nodes[state.current].name.clone())
    }

    /// All blocks in depth-first order.
    pub fn blocks(&self) -> Vec<BlockStats> {
        let mut out = Vec::new();
        self.state.borrow().collect(ROOT, 0, &mut out);
        out
    }

    /// Renders the block tree as an indented table of last-frame and
    /// total figures. Blocks never entered in the last frame are skipped
    /// unless `show_unused` is set.
    pub fn print_data(&self, show_unused: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<40} {:>6} {:>12} {:>12} {:>12}",
            "Block", "Count", "Last (ms)", "Max (ms)", "Total (ms)"
        );

        for block in self.blocks() {
            if block.last_frame_count == 0 && !show_unused {
                continue;
            }
            let label = format!("{}{}", "  ".repeat(block.depth), block.name);
            let _ = writeln!(
                out,
                "{:<40} {:>6} {:>12.3} {:>12.3} {:>12.3}",
                label,
                block.last_frame_count,
                block.last_frame_time.as_secs_f64() * 1000.0,
                block.max_time.as_secs_f64() * 1000.0,
                block.total_time.as_secs_f64() * 1000.0,
            );
        }
        out
    }

    /// Writes [`Profiler::print_data`] to the log at `info` level.
    pub fn log_data(&self) {
        info!("Profiler after {} frame(s):\n{}", self.total_frames(), self.print_data(false));
    }
}

//=== ProfileScope ========================================================

/// Guard returned by [`Profiler::scope`]. Ends its block on drop.
pub struct ProfileScope<'a> {
    profiler: &'a Profiler,
}

impl Drop for ProfileScope<'_> {
    fn drop(&mut self) {
        self.profiler.end_block();
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::core::Time;
    use crate::ContextBuilder;

    fn profiler() -> (Rc<Context>, Rc<Profiler>) {
        let context = Context::new();
        let profiler = context.subsystem::<Profiler>().expect("profiler subsystem");
        (context, profiler)
    }

    fn names(profiler: &Profiler) -> Vec<(String, usize)> {
        profiler
            .blocks()
            .into_iter()
            .map(|block| (block.name, block.depth))
            .collect()
    }

    //=====================================================================
    // Registration
    //=====================================================================

    #[test]
    fn context_registers_profiler_by_default() {
        let (_context, profiler) = profiler();
        assert_eq!(profiler.total_frames(), 0);
        assert_eq!(profiler.depth(), 0);
        assert!(profiler.blocks().is_empty());
    }

    #[test]
    fn builder_can_disable_profiler() {
        let context = ContextBuilder::new().with_profiler(false).build();
        assert!(context.subsystem::<Profiler>().is_none());
        assert!(context.subsystem::<Time>().is_some());
    }

    //=====================================================================
    // Blocks
    //=====================================================================

    #[test]
    fn blocks_nest_into_a_tree() {
        let (_context, profiler) = profiler();

        profiler.begin_block("Update");
        profiler.begin_block("Physics");
        assert_eq!(profiler.depth(), 2);
        assert_eq!(profiler.current_block().as_deref(), Some("Physics"));
        profiler.end_block();
        profiler.begin_block("Scripts");
        profiler.end_block();
        profiler.end_block();
        profiler.begin_block("Render");
        profiler.end_block();

        assert_eq!(profiler.depth(), 0);
        assert!(profiler.current_block().is_none());
        assert_eq!(
            names(&profiler),
            [
                ("Update".to_owned(), 0),
                ("Physics".to_owned(), 1),
                ("Scripts".to_owned(), 1),
                ("Render".to_owned(), 0),
            ]
        );
    }

    #[test]
    fn same_name_under_same_parent_reuses_block() {
        let (_context, profiler) = profiler();

        for _ in 0..3 {
            let _scope = profiler.scope("Tick");
        }

        let blocks = profiler.blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].frame_count, 3);
    }

    #[test]
    fn same_name_under_different_parents_is_distinct() {
        let (_context, profiler) = profiler();

        profiler.begin_block("A");
        profiler.begin_block("Work");
        profiler.end_block();
        profiler.end_block();
        profiler.begin_block("B");
        profiler.begin_block("Work");
        profiler.end_block();
        profiler.end_block();

        assert_eq!(profiler.blocks().len(), 4);
    }

    #[test]
    fn unbalanced_end_block_is_ignored() {
        let (_context, profiler) = profiler();
        profiler.end_block();
        assert_eq!(profiler.depth(), 0);
        assert!(profiler.blocks().is_empty());
    }

    #[test]
    fn scope_guard_closes_block() {
        let (_context, profiler) = profiler();
        {
            let _outer = profiler.scope("Outer");
            let _inner = profiler.scope("Inner");
            assert_eq!(profiler.depth(), 2);
        }
        assert_eq!(profiler.depth(), 0);
    }

    //=====================================================================
    // Frames
    //=====================================================================

    #[test]
    fn frame_rollover_moves_counts_into_last_and_total() {
        let (_context, profiler) = profiler();

        profiler.begin_frame();
        profiler.begin_block("Work");
        profiler.end_block();
        profiler.begin_block("Work");
        profiler.end_block();
        profiler.end_frame();

        let blocks = profiler.blocks();
        assert_eq!(names(&profiler), [("RunFrame".to_owned(), 0), ("Work".to_owned(), 1)]);
        let work = &blocks[1];
        assert_eq!(work.frame_count, 0);
        assert_eq!(work.frame_time, Duration::ZERO);
        assert_eq!(work.last_frame_count, 2);
        assert_eq!(work.total_count, 2);
        assert!(work.max_time <= work.total_time);

        // Second frame without any "Work" block.
        profiler.begin_frame();
        profiler.end_frame();

        let work = &profiler.blocks()[1];
        assert_eq!(work.last_frame_count, 0);
        assert_eq!(work.last_frame_time, Duration::ZERO);
        assert_eq!(work.total_count, 2);
        assert_eq!(profiler.total_frames(), 2);
        assert_eq!(profiler.blocks()[0].total_count, 2);
    }

    #[test]
    fn begin_frame_ends_the_previous_frame() {
        let (_context, profiler) = profiler();

        profiler.begin_frame();
        profiler.begin_frame();
        assert_eq!(profiler.total_frames(), 1);
        assert_eq!(profiler.depth(), 1);
        assert_eq!(profiler.current_block().as_deref(), Some(FRAME_BLOCK));
    }

    #[test]
    fn end_frame_closes_unbalanced_blocks() {
        let (_context, profiler) = profiler();

        profiler.begin_frame();
        profiler.begin_block("Leaked");
        profiler.end_frame();

        assert_eq!(profiler.depth(), 0);
        assert_eq!(profiler.blocks()[1].last_frame_count, 1);
    }

    #[test]
    fn end_frame_without_frame_is_noop() {
        let (_context, profiler) = profiler();
        profiler.end_frame();
        assert_eq!(profiler.total_frames(), 0);
    }

    #[test]
    fn follows_time_frame_events() {
        let (context, profiler) = profiler();
        let time = context.subsystem::<Time>().expect("time subsystem");

        time.begin_frame(0.016);
        assert_eq!(profiler.current_block().as_deref(), Some(FRAME_BLOCK));
        time.end_frame();
        assert_eq!(profiler.total_frames(), 1);
        assert_eq!(profiler.depth(), 0);
    }

    #[test]
    fn print_data_skips_unused_blocks() {
        let (_context, profiler) = profiler();

        profiler.begin_frame();
        profiler.begin_block("Audio");
        profiler.end_block();
        profiler.end_frame();
        profiler.begin_frame();
        profiler.end_frame();

        let compact = profiler.print_data(false);
        assert!(compact.contains("RunFrame"));
        assert!(!compact.contains("Audio"));

        let full = profiler.print_data(true);
        assert!(full.contains("  Audio"));
    }
}
