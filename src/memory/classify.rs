use super::smaps::MemoryChunk;
use super::summary::{Category, Summary};

/// Bounds of the thread-stack heuristic: a small inaccessible guard mapping
/// directly followed by a writable anonymous mapping of typical stack size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub guard_kb: u64,
    pub stack_min_kb: u64,
    pub stack_max_kb: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            guard_kb: 4,
            stack_min_kb: 10_000,
            stack_max_kb: 20_000,
        }
    }
}

fn set(chunk: &mut MemoryChunk, category: Category, effective_kb: u64) {
    chunk.category = Some(category);
    chunk.effective_kb = effective_kb;
}

fn is_stack_guard(chunk: &MemoryChunk, config: &ClassifierConfig) -> bool {
    chunk.size_kb == config.guard_kb
        && chunk.perms.contains("---p")
        && chunk.tag.is_empty()
        && chunk.offset == chunk.begin
}

fn is_guarded_stack(guard: &MemoryChunk, next: &MemoryChunk, config: &ClassifierConfig) -> bool {
    next.begin == guard.end
        && next.perms.contains('w')
        && next.tag.is_empty()
        && next.offset == next.begin
        && (config.stack_min_kb..=config.stack_max_kb).contains(&next.size_kb)
}

/// Assigns a category and effective size to every chunk, in address order.
///
/// A chunk that already has a category is left untouched, so running this
/// twice over the same chunks is a no-op.
pub fn classify_chunks(chunks: &mut [MemoryChunk], config: &ClassifierConfig) {
    for idx in 0..chunks.len() {
        if chunks[idx].category.is_some() {
            continue;
        }

        let chunk = &chunks[idx];
        if chunk.perms.contains('s') {
            let category = if chunk.tag.contains("SYSV") {
                Category::SharedSysv
            } else {
                Category::SharedOther
            };
            let pss = chunk.pss_kb;
            set(&mut chunks[idx], category, pss);
            continue;
        }

        if chunk.tag.contains("[stack]") {
            let private = chunk.private_kb;
            set(&mut chunks[idx], Category::Stack, private);
            continue;
        }

        if let Some(next) = chunks.get(idx + 1)
            && next.category.is_none()
            && is_stack_guard(chunk, config)
            && is_guarded_stack(chunk, next, config)
        {
            let stack_kb = next.private_kb + next.swap_kb;
            set(&mut chunks[idx], Category::Data, 0);
            set(&mut chunks[idx + 1], Category::Stack, stack_kb);
            continue;
        }

        let (category, effective) = if chunk.perms.contains("---") {
            (Category::Data, 0)
        } else if chunk.perms.contains('w') {
            (Category::Data, chunk.rss_kb + chunk.swap_kb)
        } else {
            (Category::Text, chunk.pss_kb + chunk.swap_kb)
        };
        set(&mut chunks[idx], category, effective);
    }
}

/// Folds classified chunks into a per-process summary.
pub fn summarize_chunks(pid: u32, chunks: &[MemoryChunk]) -> Summary {
    let mut summary = Summary::for_pid(pid);
    for chunk in chunks {
        if let Some(category) = chunk.category {
            *summary.category_mut(category) += chunk.effective_kb;
            summary.ptotal += chunk.effective_kb;
        }
        summary.pswap += chunk.swap_pss_kb;
    }
    summary
}
