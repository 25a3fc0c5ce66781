// Grid - dense (scale, frame) views with valid-margin bookkeeping
//
// A time-frequency representation is a flat row-major buffer with one row
// per scale: index(scale, frame) = scale * noof_frames + frame. Every stage
// of the pipeline attaches a Margin to its output describing the
// sub-rectangle that is free of edge effects.
//
// - Grid: non-owning view over a caller buffer
// - GridBuffer: owned derived array (PAS / texture), rebuilt zeroed for
//   every input and swapped in whole

pub mod margin;

pub use margin::{MarginCalculator, RegionDescriptor};

use std::cell::Cell;
use std::ops::Range;

/// Frame/scale offsets bounding the valid sub-rectangle of a grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Margin {
    pub first_frame_offset: usize,
    pub last_frame_offset: usize,
    pub first_scale_offset: usize,
    pub last_scale_offset: usize,
}

impl Margin {
    pub fn new(
        first_frame_offset: usize,
        last_frame_offset: usize,
        first_scale_offset: usize,
        last_scale_offset: usize,
    ) -> Self {
        Self {
            first_frame_offset,
            last_frame_offset,
            first_scale_offset,
            last_scale_offset,
        }
    }

    /// True when no scale survives the margin
    pub fn is_degenerate(&self, noof_scales: usize) -> bool {
        self.first_scale_offset + self.last_scale_offset >= noof_scales
    }

    /// Component-wise `self >= other`
    pub fn contains(&self, other: &Margin) -> bool {
        self.first_frame_offset >= other.first_frame_offset
            && self.last_frame_offset >= other.last_frame_offset
            && self.first_scale_offset >= other.first_scale_offset
            && self.last_scale_offset >= other.last_scale_offset
    }

    /// Valid frame range for a grid with `noof_frames` columns
    pub fn frame_range(&self, noof_frames: usize) -> Range<usize> {
        let end = noof_frames.saturating_sub(self.last_frame_offset);
        self.first_frame_offset.min(end)..end
    }

    /// Valid scale range for a grid with `noof_scales` rows
    pub fn scale_range(&self, noof_scales: usize) -> Range<usize> {
        let end = noof_scales.saturating_sub(self.last_scale_offset);
        self.first_scale_offset.min(end)..end
    }
}

/// Non-owning (scale, frame) view over a flat row-major buffer
#[derive(Debug, Clone)]
pub struct Grid<'a> {
    data: &'a [f64],
    noof_scales: usize,
    noof_frames: usize,
    margin: Margin,
    reported_invalid: Cell<bool>,
}

impl<'a> Grid<'a> {
    /// Create a view with a zero margin
    ///
    /// # Panics
    /// If `data.len() != noof_scales * noof_frames`
    pub fn new(data: &'a [f64], noof_scales: usize, noof_frames: usize) -> Self {
        assert_eq!(
            data.len(),
            noof_scales * noof_frames,
            "grid buffer does not match {} scales x {} frames",
            noof_scales,
            noof_frames
        );
        Self {
            data,
            noof_scales,
            noof_frames,
            margin: Margin::default(),
            reported_invalid: Cell::new(false),
        }
    }

    /// Rebind to a new buffer with the same scale count
    ///
    /// The frame count may change between calls, e.g. for streaming chunks of
    /// varying length. Returns false (and leaves the view untouched) when the
    /// scale count differs or the buffer length does not match.
    pub fn reset(&mut self, data: &'a [f64], noof_scales: usize, noof_frames: usize) -> bool {
        if noof_scales != self.noof_scales || data.len() != noof_scales * noof_frames {
            return false;
        }
        self.data = data;
        self.noof_frames = noof_frames;
        self.reported_invalid.set(false);
        true
    }

    pub fn noof_scales(&self) -> usize {
        self.noof_scales
    }

    pub fn noof_frames(&self) -> usize {
        self.noof_frames
    }

    pub fn as_slice(&self) -> &'a [f64] {
        self.data
    }

    #[inline]
    pub fn index(&self, scale: usize, frame: usize) -> usize {
        scale * self.noof_frames + frame
    }

    #[inline]
    pub fn element_at(&self, scale: usize, frame: usize) -> f64 {
        self.data[scale * self.noof_frames + frame]
    }

    /// Bounds-checked access for diagnostics
    ///
    /// Out-of-array requests are logged and yield `None`. Requests inside the
    /// array but outside the valid margin are reported once per binding and
    /// still return the stored value.
    pub fn checked_element_at(&self, scale: isize, frame: isize, caller: &str) -> Option<f64> {
        if scale < 0
            || frame < 0
            || scale as usize >= self.noof_scales
            || frame as usize >= self.noof_frames
        {
            log::warn!(
                "[Grid] {}: ({}, {}) is out of bounds for {} scales x {} frames",
                caller,
                scale,
                frame,
                self.noof_scales,
                self.noof_frames
            );
            return None;
        }

        let (scale, frame) = (scale as usize, frame as usize);
        let inside_margin = self.margin.scale_range(self.noof_scales).contains(&scale)
            && self.margin.frame_range(self.noof_frames).contains(&frame);
        if !inside_margin && !self.reported_invalid.get() {
            log::warn!(
                "[Grid] {}: ({}, {}) lies outside the valid margin {:?}",
                caller,
                scale,
                frame,
                self.margin
            );
            self.reported_invalid.set(true);
        }

        Some(self.element_at(scale, frame))
    }

    pub fn set_margin(&mut self, margin: Margin) {
        self.margin = margin;
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    pub fn first_valid_frame(&self) -> usize {
        self.margin.first_frame_offset
    }

    /// Last valid frame; negative when the margin swallows the whole grid
    pub fn last_valid_frame(&self) -> isize {
        self.noof_frames as isize - self.margin.last_frame_offset as isize - 1
    }

    pub fn first_valid_scale(&self) -> usize {
        self.margin.first_scale_offset
    }

    pub fn last_valid_scale(&self) -> isize {
        self.noof_scales as isize - self.margin.last_scale_offset as isize - 1
    }

    pub fn valid_frames(&self) -> Range<usize> {
        self.margin.frame_range(self.noof_frames)
    }

    pub fn is_valid(&self, scale: usize) -> bool {
        scale >= self.first_valid_scale() && (scale as isize) <= self.last_valid_scale()
    }
}

/// Owned derived array with its own margin
///
/// Calculators fill a fresh zeroed buffer and then swap it in, so a
/// half-updated state is never observable.
#[derive(Debug, Clone, PartialEq)]
pub struct GridBuffer {
    data: Vec<f64>,
    noof_scales: usize,
    noof_frames: usize,
    margin: Margin,
}

impl GridBuffer {
    pub fn zeroed(noof_scales: usize, noof_frames: usize, margin: Margin) -> Self {
        Self {
            data: vec![0.0; noof_scales * noof_frames],
            noof_scales,
            noof_frames,
            margin,
        }
    }

    pub fn view(&self) -> Grid<'_> {
        let mut grid = Grid::new(&self.data, self.noof_scales, self.noof_frames);
        grid.set_margin(self.margin);
        grid
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn noof_scales(&self) -> usize {
        self.noof_scales
    }

    pub fn noof_frames(&self) -> usize {
        self.noof_frames
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    pub fn set_margin(&mut self, margin: Margin) {
        self.margin = margin;
    }
}
