//! Trace-id correlation: context lookup and stable per-id console colors.
//!
//! A trace id is hashed to an index in the xterm 256-color cube. The range
//! skips the 16 system colors, black and the gray ramp; pure red and the
//! cube's grays are nudged to a neighbor so a tag is never mistaken for an
//! error highlight or lost against the background.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

/// Zero-argument lookup of the current correlation id.
pub type TraceProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Default number of trace ids whose colors are remembered.
pub const DEFAULT_COLOR_CACHE: usize = 1024;

const PALETTE_START: u32 = 18;
const PALETTE_LEN: u32 = 210;
const PURE_RED: u8 = 196;
const RED_SUBSTITUTE: u8 = 202;

/// 31-multiplier string hash over UTF-16 units, wrapping at 32 bits, made
/// non-negative.
pub fn hash_trace_id(trace_id: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in trace_id.encode_utf16() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32);
    }
    hash.unsigned_abs()
}

/// Palette index (xterm 256) for a trace id.
pub fn color_index(trace_id: &str) -> u8 {
    let index = (PALETTE_START + hash_trace_id(trace_id) % PALETTE_LEN) as u8;
    substitute(index)
}

fn substitute(index: u8) -> u8 {
    if index == PURE_RED {
        return RED_SUBSTITUTE;
    }
    // Cube entries 16..=231 encode r, g, b in base 6
    let cube = index - 16;
    let (r, g, b) = (cube / 36, (cube / 6) % 6, cube % 6);
    if r == g && g == b {
        index + 1
    } else {
        index
    }
}

/// Bounded cache of trace id → color index.
pub struct TraceColors {
    cache: Mutex<LruCache<String, u8>>,
}

impl TraceColors {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Color for `trace_id`; computed once and reused while cached.
    pub fn color_for(&self, trace_id: &str) -> u8 {
        let mut cache = self.cache.lock();
        if let Some(color) = cache.get(trace_id) {
            return *color;
        }
        let color = color_index(trace_id);
        cache.put(trace_id.to_string(), color);
        color
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TraceColors {
    fn default() -> Self {
        Self::new(DEFAULT_COLOR_CACHE)
    }
}
