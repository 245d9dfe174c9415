//! Partial redraw buffering.
//!
//! A backend whose presentation is itself double or triple buffered cannot
//! simply draw the tiles that changed this frame: the surface it draws onto
//! may be showing content from several frames ago. [`PartialRedrawBuffer`]
//! keeps every tile submitted during the last `redraw_depth` frames ("eras")
//! and redraws all of them each frame, so a change reaches every buffer in the
//! swap chain before it is dropped.
//!
//! Storage is a flat ring of primitives. `head` is the first free slot, `tail`
//! the oldest live one. When an insert finds the ring full the capacity
//! doubles and the physical `tail..end` segment moves to the end of the new
//! storage, so live primitives keep their logical order.

use crate::backend::BackendSink;
use crate::primitive::{PrimitiveArrays, TilePrimitive};
use log::debug;
use std::collections::VecDeque;

/// Growable ring buffer of tile primitives with era-based retirement.
#[derive(Debug, Clone)]
pub struct PartialRedrawBuffer {
    arrays: PrimitiveArrays,
    capacity: usize,
    /// First unused slot.
    head: usize,
    /// First used slot.
    tail: usize,
    /// Primitives between `tail` and `head`.
    live: usize,
    /// Primitives submitted since the last `end_era`.
    current_era: usize,
    /// Primitive counts of completed, not yet retired eras, oldest first.
    eras: VecDeque<usize>,
    redraw_depth: usize,
}

impl PartialRedrawBuffer {
    /// Create a buffer with room for `capacity` tiles that keeps the last
    /// `redraw_depth` eras alive.
    pub fn new(capacity: usize, redraw_depth: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            arrays: PrimitiveArrays::with_len(capacity),
            capacity,
            head: 0,
            tail: 0,
            live: 0,
            current_era: 0,
            eras: VecDeque::new(),
            redraw_depth: redraw_depth.max(1),
        }
    }

    /// Append one tile to the current era.
    pub fn submit_tile(&mut self, primitive: &TilePrimitive) {
        if self.live == self.capacity {
            self.grow();
        }
        self.arrays.write(self.head, primitive);
        self.head = (self.head + 1) % self.capacity;
        self.live += 1;
        self.current_era += 1;
    }

    /// Double the capacity. Only called when full, so `head == tail`.
    fn grow(&mut self) {
        let old_capacity = self.capacity;
        let new_capacity = old_capacity * 2;
        debug!(
            target: "tile_renderer",
            "Expanding partial redraw buffer: {old_capacity} -> {new_capacity} tiles"
        );
        self.arrays.resize(new_capacity);
        // Move the tail to the end of the newly allocated space
        self.arrays
            .copy_within(self.tail..old_capacity, self.tail + old_capacity);
        self.tail += old_capacity;
        self.capacity = new_capacity;
    }

    /// Close the current era. Once more than `redraw_depth` eras are queued
    /// the oldest is retired; returns its primitive count.
    pub fn end_era(&mut self) -> Option<usize> {
        self.eras.push_back(self.current_era);
        self.current_era = 0;
        if self.eras.len() <= self.redraw_depth {
            return None;
        }
        let retired = self.eras.pop_front()?;
        self.tail = (self.tail + retired) % self.capacity;
        self.live -= retired;
        Some(retired)
    }

    /// Issue draw calls for every live primitive, oldest first.
    ///
    /// A live range straddling the end of the storage takes two calls.
    /// Returns the number of calls made.
    pub fn draw<B: BackendSink + ?Sized>(&self, sink: &mut B) -> usize {
        if self.live == 0 {
            return 0;
        }
        if self.tail + self.live > self.capacity {
            sink.draw_primitives(self.arrays.slice(self.tail..self.capacity));
            sink.draw_primitives(self.arrays.slice(0..self.head));
            2
        } else {
            sink.draw_primitives(self.arrays.slice(self.tail..self.tail + self.live));
            1
        }
    }

    /// Drop every primitive and era, keeping the allocated capacity.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.live = 0;
        self.current_era = 0;
        self.eras.clear();
    }

    /// Live primitives in logical (submission) order.
    pub fn live_primitives(&self) -> Vec<TilePrimitive> {
        (0..self.live)
            .filter_map(|offset| self.arrays.get((self.tail + offset) % self.capacity))
            .collect()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Primitives that will be drawn by the next `draw`.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Completed eras still alive.
    #[inline]
    pub fn era_count(&self) -> usize {
        self.eras.len()
    }

    /// Primitives submitted since the last `end_era`.
    #[inline]
    pub fn current_era_len(&self) -> usize {
        self.current_era
    }

    #[inline]
    pub fn redraw_depth(&self) -> usize {
        self.redraw_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureHandle;
    use crate::primitive::PrimitiveSlice;
    use crate::tile::PixelRect;
    use anyhow::Result as AnyResult;
    use image::RgbaImage;

    fn tile(id: u64) -> TilePrimitive {
        TilePrimitive::rich_text(PixelRect::new(id as i32, 0, 1, 1), TextureHandle(id))
    }

    fn ids(buffer: &PartialRedrawBuffer) -> Vec<u64> {
        buffer
            .live_primitives()
            .iter()
            .map(|primitive| primitive.texture.0)
            .collect()
    }

    /// Records the texture ids of each draw call.
    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<Vec<u64>>,
    }

    impl BackendSink for RecordingSink {
        fn create_texture(&mut self, _pixels: &RgbaImage) -> AnyResult<TextureHandle> {
            Ok(TextureHandle(0))
        }

        fn destroy_texture(&mut self, _texture: TextureHandle) {}

        fn draw_primitives(&mut self, primitives: PrimitiveSlice<'_>) {
            self.calls
                .push(primitives.textures.iter().map(|texture| texture.0).collect());
        }

        fn present(&mut self) -> AnyResult<()> {
            Ok(())
        }
    }

    #[test]
    fn eras_retire_oldest_beyond_depth() {
        let mut buffer = PartialRedrawBuffer::new(64, 2);
        let mut next = 0;
        let mut retired = Vec::new();
        for era_len in [5, 3, 4] {
            for _ in 0..era_len {
                buffer.submit_tile(&tile(next));
                next += 1;
            }
            retired.push(buffer.end_era());
        }
        assert_eq!(retired, vec![None, None, Some(5)]);
        assert_eq!(buffer.tail(), 5);
        assert_eq!(buffer.live_count(), 7);
        assert_eq!(buffer.era_count(), 2);
        assert_eq!(ids(&buffer), (5..12).collect::<Vec<_>>());
    }

    #[test]
    fn growth_relocates_wrapped_segment() {
        let mut buffer = PartialRedrawBuffer::new(8, 1);
        let mut next = 0;
        for _ in 0..3 {
            for _ in 0..3 {
                buffer.submit_tile(&tile(next));
                next += 1;
            }
            buffer.end_era();
        }
        assert_eq!((buffer.tail(), buffer.head(), buffer.live_count()), (6, 1, 3));
        for id in 9..14 {
            buffer.submit_tile(&tile(id));
        }
        // Full: tail 6, head 6.
        assert_eq!((buffer.capacity(), buffer.tail(), buffer.head()), (8, 6, 6));
        assert_eq!(buffer.live_count(), 8);

        buffer.submit_tile(&tile(14));
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.tail(), 14);
        assert_eq!(buffer.head(), 7);
        assert_eq!(buffer.live_count(), 9);
        assert_eq!(ids(&buffer), (6..15).collect::<Vec<_>>());
    }

    #[test]
    fn growth_from_unwrapped_full_buffer() {
        let mut buffer = PartialRedrawBuffer::new(4, 3);
        for id in 0..9 {
            buffer.submit_tile(&tile(id));
            assert!(buffer.live_count() <= buffer.capacity());
        }
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(ids(&buffer), (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn draw_splits_wrapped_range() {
        let mut buffer = PartialRedrawBuffer::new(8, 1);
        for id in 0..5 {
            buffer.submit_tile(&tile(id));
        }
        buffer.end_era();
        for id in 5..8 {
            buffer.submit_tile(&tile(id));
        }
        assert_eq!(buffer.end_era(), Some(5));
        buffer.submit_tile(&tile(8));

        let mut sink = RecordingSink::default();
        assert_eq!(buffer.draw(&mut sink), 2);
        assert_eq!(sink.calls, vec![vec![5, 6, 7], vec![8]]);
    }

    #[test]
    fn draw_single_call_when_contiguous() {
        let mut buffer = PartialRedrawBuffer::new(8, 2);
        let mut sink = RecordingSink::default();
        assert_eq!(buffer.draw(&mut sink), 0);
        for id in 0..3 {
            buffer.submit_tile(&tile(id));
        }
        assert_eq!(buffer.draw(&mut sink), 1);
        assert_eq!(sink.calls, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn fifo_order_survives_many_growths() {
        let mut buffer = PartialRedrawBuffer::new(2, 3);
        let mut expected: VecDeque<Vec<u64>> = VecDeque::new();
        let mut next = 0;
        for era_len in [1_u64, 7, 3, 0, 12, 5, 9, 2] {
            let era: Vec<u64> = (next..next + era_len).collect();
            next += era_len;
            for id in &era {
                buffer.submit_tile(&tile(*id));
            }
            expected.push_back(era);
            if buffer.end_era().is_some() {
                expected.pop_front();
            }
            let flat: Vec<u64> = expected.iter().flatten().copied().collect();
            assert_eq!(ids(&buffer), flat);
            assert!(buffer.live_count() <= buffer.capacity());
        }
    }

    #[test]
    fn reset_empties_but_keeps_capacity() {
        let mut buffer = PartialRedrawBuffer::new(2, 1);
        for id in 0..5 {
            buffer.submit_tile(&tile(id));
        }
        buffer.end_era();
        buffer.reset();
        assert_eq!(buffer.live_count(), 0);
        assert_eq!(buffer.era_count(), 0);
        assert_eq!(buffer.capacity(), 8);
    }
}
