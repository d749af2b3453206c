//! A single-producer/single-consumer frame precacher: a producer thread
//! fills a byte-capped ring forward of the consumer, a request/reply
//! condvar pair hands frames back across the boundary, and an idle
//! producer tops the ring back up so a bursty consumer doesn't stall it.
//!
//! Capacity is accounted in bytes rather than frame count (`used_bytes`
//! against `capacity_bytes`), since frames can vary in size across
//! grayscale/RGB streams; this crate doesn't carve the frames out of a
//! literal raw memory arena (that would need unsafe byte-level aliasing
//! of heterogeneous [`Frame`] payloads for no behavior a caller can
//! observe), but admission and eviction are decided on the same basis a
//! byte-sized ring would use.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{BgsError, BgsResult};
use crate::frame::Frame;
use crate::{tele_debug, tele_warn};

/// Buffer size used when the caller doesn't supply one.
pub const DEFAULT_BUFFER_BYTES: u64 = 6 * 1024 * 1024 * 1024;
/// Hard ceiling no caller-supplied buffer size may exceed.
pub const PLATFORM_CAP_BYTES: u64 = 64 * 1024 * 1024 * 1024;

const REPLY_WAIT: Duration = Duration::from_millis(1);
const REQUEST_WAIT: Duration = Duration::from_millis(10);
const IDLE_TOPUP_FRAMES: usize = 10;
const IDLE_TOPUP_FRACTION: f64 = 0.25;

fn validate_capacity(buffer_bytes: u64) -> BgsResult<()> {
    if buffer_bytes > PLATFORM_CAP_BYTES {
        return Err(BgsError::PrecacheOverflow {
            requested: buffer_bytes,
            cap: PLATFORM_CAP_BYTES,
        });
    }
    Ok(())
}

struct Shared {
    state: Mutex<State>,
    request: Condvar,
    reply: Condvar,
}

struct State {
    queue: VecDeque<(usize, Frame)>,
    used_bytes: u64,
    capacity_bytes: u64,
    frame_bytes: u64,
    total_count: usize,
    /// Index the producer has fully resolved through; the in-order window
    /// is `[expected, next_prefetch)`.
    expected: usize,
    /// Next index the producer will fetch to extend the queue forward.
    next_prefetch: usize,
    last_served: Option<(usize, Frame)>,
    pending_request: Option<usize>,
    /// `Some((index, None))` marks index as permanently unavailable
    /// (`fetch` returned `None`, i.e. past end of stream).
    reply_slot: Option<(usize, Option<Frame>)>,
    stopped: bool,
}

/// Ring-buffer frame precacher.
pub struct FramePrecacher {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl FramePrecacher {
    /// Spawns the producer and begins forward-filling from index 0.
    ///
    /// `frame_bytes` is the (uniform) per-frame footprint used for byte
    /// accounting; `buffer_bytes` defaults to [`DEFAULT_BUFFER_BYTES`] when
    /// `None`.
    pub fn start(
        mut fetch: impl FnMut(usize) -> Option<Frame> + Send + 'static,
        total_count: usize,
        buffer_bytes: Option<u64>,
        frame_bytes: u64,
    ) -> BgsResult<Self> {
        let capacity_bytes = buffer_bytes.unwrap_or(DEFAULT_BUFFER_BYTES);
        validate_capacity(capacity_bytes)?;
        if frame_bytes == 0 {
            return Err(BgsError::config("frame_bytes must be > 0"));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                used_bytes: 0,
                capacity_bytes,
                frame_bytes,
                total_count,
                expected: 0,
                next_prefetch: 0,
                last_served: None,
                pending_request: None,
                reply_slot: None,
                stopped: false,
            }),
            request: Condvar::new(),
            reply: Condvar::new(),
        });

        let producer_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || producer_loop(producer_shared, &mut fetch));

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Blocks until frame `index` is available, or returns `None` once
    /// `fetch` itself reports that index as past the end of the stream.
    pub fn get(&self, index: usize) -> Option<Frame> {
        let mut state = self.shared.state.lock().unwrap();

        if let Some((served_idx, frame)) = &state.last_served {
            if *served_idx == index {
                return Some(frame.clone());
            }
        }

        state.pending_request = Some(index);
        self.shared.request.notify_one();

        loop {
            if let Some((idx, _)) = state.reply_slot {
                if idx == index {
                    let (_, frame) = state.reply_slot.take().unwrap();
                    if let Some(frame) = &frame {
                        state.last_served = Some((index, frame.clone()));
                    }
                    return frame;
                }
            }
            if state.stopped && state.pending_request.is_none() && state.reply_slot.is_none() {
                return None;
            }
            let (guard, timeout) = self
                .shared
                .reply
                .wait_timeout(state, REPLY_WAIT)
                .unwrap();
            state = guard;
            if timeout.timed_out() {
                state.pending_request = Some(index);
                self.shared.request.notify_one();
            }
        }
    }

    /// Signals the producer to stop and joins its thread.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.stopped = true;
        }
        self.shared.request.notify_all();
        self.shared.reply.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn producer_loop(shared: Arc<Shared>, fetch: &mut dyn FnMut(usize) -> Option<Frame>) {
    // Initial forward-fill, matching the startup behavior of filling
    // ahead until the buffer is full or the stream is exhausted.
    {
        let mut state = shared.state.lock().unwrap();
        while !state.stopped
            && state.next_prefetch < state.total_count
            && state.used_bytes + state.frame_bytes <= state.capacity_bytes
        {
            let idx = state.next_prefetch;
            let frame_bytes = state.frame_bytes;
            drop(state);
            let fetched = fetch(idx);
            state = shared.state.lock().unwrap();
            match fetched {
                Some(f) => {
                    state.queue.push_back((idx, f));
                    state.used_bytes += frame_bytes;
                    state.next_prefetch = idx + 1;
                }
                None => {
                    state.total_count = idx;
                    break;
                }
            }
        }
    }

    let mut last_request_at = Instant::now();
    loop {
        let mut state = shared.state.lock().unwrap();
        if state.stopped {
            shared.reply.notify_all();
            return;
        }

        let (guard, timeout) = shared.request.wait_timeout(state, REQUEST_WAIT).unwrap();
        state = guard;
        if state.stopped {
            shared.reply.notify_all();
            return;
        }

        if let Some(idx) = state.pending_request.take() {
            last_request_at = Instant::now();
            handle_request(&mut state, fetch, idx);
            drop(state);
            shared.reply.notify_all();
            continue;
        }

        if timeout.timed_out() {
            let used_fraction = state.used_bytes as f64 / state.capacity_bytes.max(1) as f64;
            if last_request_at.elapsed() >= REQUEST_WAIT && used_fraction < IDLE_TOPUP_FRACTION {
                tele_debug!("precache idle top-up: used_fraction={used_fraction:.2}");
                idle_topup(&mut state, fetch);
            }
        }
    }
}

/// Services one `get(idx)` request: in-order hands back a buffered frame,
/// out-of-order drops the cache and fetches synchronously.
fn handle_request(state: &mut State, fetch: &mut dyn FnMut(usize) -> Option<Frame>, idx: usize) {
    if idx >= state.expected && idx < state.next_prefetch {
        while let Some(&(front_idx, _)) = state.queue.front() {
            if front_idx >= idx {
                break;
            }
            let (_, _dropped) = state.queue.pop_front().unwrap();
            state.used_bytes = state.used_bytes.saturating_sub(state.frame_bytes);
        }
        if let Some((front_idx, _)) = state.queue.front() {
            if *front_idx == idx {
                let (_, frame) = state.queue.pop_front().unwrap();
                state.used_bytes = state.used_bytes.saturating_sub(state.frame_bytes);
                state.expected = idx + 1;
                state.reply_slot = Some((idx, Some(frame)));
                return;
            }
        }
        // Fell through: the expected frame was never actually fetched
        // (e.g. short read near end of stream). Fall back to sync fetch.
    }

    // Out-of-order: behind `expected`, past `next_prefetch`, or a gap the
    // in-order path couldn't fill.
    tele_warn!("precache resync: requested {idx}, expected window was [{}, {})", state.expected, state.next_prefetch);
    state.queue.clear();
    state.used_bytes = 0;
    let frame = fetch(idx);
    if frame.is_none() {
        state.total_count = state.total_count.min(idx);
    }
    state.expected = idx + 1;
    state.next_prefetch = idx + 1;
    state.reply_slot = Some((idx, frame));
}

fn idle_topup(state: &mut State, fetch: &mut dyn FnMut(usize) -> Option<Frame>) {
    for _ in 0..IDLE_TOPUP_FRAMES {
        if state.next_prefetch >= state.total_count {
            break;
        }
        if state.used_bytes + state.frame_bytes > state.capacity_bytes {
            break;
        }
        let idx = state.next_prefetch;
        match fetch(idx) {
            Some(frame) => {
                state.queue.push_back((idx, frame));
                state.used_bytes += state.frame_bytes;
                state.next_prefetch = idx + 1;
            }
            None => {
                state.total_count = idx;
                break;
            }
        }
    }
}

impl Drop for FramePrecacher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn frame(v: u8) -> Frame {
        Frame::Gray(GrayImage::from_pixel(4, 4, Luma([v])))
    }

    const FRAME_BYTES: u64 = 16;

    #[test]
    fn sequential_consumption_returns_frames_in_order() {
        let mut cache =
            FramePrecacher::start(move |i| (i < 20).then(|| frame(i as u8)), 20, None, FRAME_BYTES)
                .unwrap();

        for i in 0..20 {
            let f = cache.get(i).expect("frame available");
            assert_eq!(f.channel(0, 0, 0), i as u8);
        }
        assert!(cache.get(20).is_none());
        cache.stop();
    }

    #[test]
    fn repeated_get_of_last_served_index_is_a_fast_path() {
        let mut cache =
            FramePrecacher::start(move |i| (i < 10).then(|| frame(i as u8)), 10, None, FRAME_BYTES)
                .unwrap();
        let first = cache.get(3).unwrap();
        let again = cache.get(3).unwrap();
        assert_eq!(first.channel(0, 0, 0), again.channel(0, 0, 0));
        cache.stop();
    }

    #[test]
    fn out_of_order_request_after_reaching_the_end_resyncs() {
        let mut cache = FramePrecacher::start(
            move |i| (i < 100).then(|| frame(i as u8)),
            100,
            Some(1024 * 1024),
            FRAME_BYTES,
        )
        .unwrap();

        for i in 0..100 {
            let f = cache.get(i).expect("frame available");
            assert_eq!(f.channel(0, 0, 0), i as u8);
        }
        let resynced = cache.get(50).expect("resynced frame");
        assert_eq!(resynced.channel(0, 0, 0), 50);
        cache.stop();
    }

    #[test]
    fn oversized_buffer_request_is_rejected() {
        let result = FramePrecacher::start(
            move |i| Some(frame(i as u8)),
            10,
            Some(PLATFORM_CAP_BYTES + 1),
            FRAME_BYTES,
        );
        assert!(matches!(result, Err(BgsError::PrecacheOverflow { .. })));
    }

    #[test]
    fn zero_frame_bytes_is_a_config_error() {
        let result = FramePrecacher::start(move |i| Some(frame(i as u8)), 10, None, 0);
        assert!(matches!(result, Err(BgsError::Config { .. })));
    }
}
