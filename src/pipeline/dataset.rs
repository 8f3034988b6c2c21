//! Columnar step-function storage.
//!
//! A [`Dataset`] holds every time series of one device pipeline. Storage is
//! split into timestamp axes and value axes; a value axis belongs to exactly
//! one timestamp axis and always has the same length. A 2D step function is
//! two value axes sharing one timestamp axis.
//!
//! Buffers are reused across ticks: [`Dataset::begin_tick`] rolls the last
//! sample of every axis into its "previous" slot and truncates lengths to
//! zero without releasing capacity. Lengths only grow through the `map_*`
//! helpers (or the demultiplexer's `push_*`) and only shrink through
//! [`Dataset::shrink_size_to`].

use super::error::{PipelineError, PipelineResult};
use super::id::{IntAxisId, TimeAxisId, ValueAxisId};
use crate::types::Timestamp;

/// Handle to an N-component step function: N value axes on one timestamp axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepFunction<const N: usize> {
    pub axes: [ValueAxisId; N],
}

pub type StepFunction1D = StepFunction<1>;
pub type StepFunction2D = StepFunction<2>;
pub type StepFunction3D = StepFunction<3>;

impl<const N: usize> StepFunction<N> {
    pub const fn new(axes: [ValueAxisId; N]) -> Self {
        Self { axes }
    }

    /// First component.
    #[inline]
    pub fn x(&self) -> ValueAxisId {
        self.axes[0]
    }

    /// One component viewed as a 1D step function on the same timestamps.
    #[inline]
    pub fn component(&self, index: usize) -> StepFunction1D {
        StepFunction1D::new([self.axes[index]])
    }
}

/// Handle to a step function of raw integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepFunctionInt {
    pub axis: IntAxisId,
}

/// Shape of a dataset, fixed at pipeline compile time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetLayout {
    time_axes: usize,
    value_axes: Vec<TimeAxisId>,
    int_axes: Vec<TimeAxisId>,
}

impl DatasetLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_time_axis(&mut self) -> TimeAxisId {
        self.time_axes += 1;
        TimeAxisId::from_index(self.time_axes - 1)
    }

    pub fn add_value_axis(&mut self, time: TimeAxisId) -> ValueAxisId {
        self.value_axes.push(time);
        ValueAxisId::from_index(self.value_axes.len() - 1)
    }

    pub fn add_int_axis(&mut self, time: TimeAxisId) -> IntAxisId {
        self.int_axes.push(time);
        IntAxisId::from_index(self.int_axes.len() - 1)
    }

    /// New timestamp axis carrying `N` fresh value axes.
    pub fn add_step_function<const N: usize>(&mut self) -> StepFunction<N> {
        let time = self.add_time_axis();
        StepFunction::new(std::array::from_fn(|_| self.add_value_axis(time)))
    }

    /// `N` fresh value axes on an existing timestamp axis.
    pub fn add_step_function_on<const N: usize>(&mut self, time: TimeAxisId) -> StepFunction<N> {
        StepFunction::new(std::array::from_fn(|_| self.add_value_axis(time)))
    }

    pub fn add_int_step_function(&mut self) -> StepFunctionInt {
        let time = self.add_time_axis();
        StepFunctionInt {
            axis: self.add_int_axis(time),
        }
    }

    pub fn time_axis_count(&self) -> usize {
        self.time_axes
    }

    pub fn value_axis_count(&self) -> usize {
        self.value_axes.len()
    }

    pub fn int_axis_count(&self) -> usize {
        self.int_axes.len()
    }

    pub fn time_axis_of(&self, axis: ValueAxisId) -> TimeAxisId {
        self.value_axes[axis.index()]
    }

    pub fn time_axis_of_int(&self, axis: IntAxisId) -> TimeAxisId {
        self.int_axes[axis.index()]
    }
}

#[derive(Debug, Default)]
struct TimeAxis {
    timestamps: Vec<Timestamp>,
    previous: Option<Timestamp>,
    values: Vec<ValueAxisId>,
    ints: Vec<IntAxisId>,
}

#[derive(Debug)]
struct ValueAxis {
    time: TimeAxisId,
    samples: Vec<f32>,
    previous: f32,
}

#[derive(Debug)]
struct IntAxis {
    time: TimeAxisId,
    samples: Vec<u32>,
    previous: Option<u32>,
}

/// Columns moved out of a dataset while a stage writes them.
#[derive(Debug)]
pub struct Columns<const N: usize> {
    pub timestamps: Vec<Timestamp>,
    pub values: [Vec<f32>; N],
}

/// Per-device step-function storage.
#[derive(Debug, Default)]
pub struct Dataset {
    time_axes: Vec<TimeAxis>,
    value_axes: Vec<ValueAxis>,
    int_axes: Vec<IntAxis>,
}

impl Dataset {
    /// Instantiate `layout`, reserving `capacity` samples per axis.
    pub fn from_layout(layout: &DatasetLayout, capacity: usize) -> PipelineResult<Self> {
        let mut time_axes: Vec<TimeAxis> =
            (0..layout.time_axes).map(|_| TimeAxis::default()).collect();
        let mut value_axes = Vec::with_capacity(layout.value_axes.len());
        let mut int_axes = Vec::with_capacity(layout.int_axes.len());

        for (i, &time) in layout.value_axes.iter().enumerate() {
            time_axes[time.index()].values.push(ValueAxisId::from_index(i));
            value_axes.push(ValueAxis {
                time,
                samples: Vec::new(),
                previous: f32::NAN,
            });
        }
        for (i, &time) in layout.int_axes.iter().enumerate() {
            time_axes[time.index()].ints.push(IntAxisId::from_index(i));
            int_axes.push(IntAxis {
                time,
                samples: Vec::new(),
                previous: None,
            });
        }

        let mut dataset = Self {
            time_axes,
            value_axes,
            int_axes,
        };
        for t in 0..dataset.time_axes.len() {
            dataset.reserve(TimeAxisId::from_index(t), capacity)?;
        }
        Ok(dataset)
    }

    pub fn time_axis_count(&self) -> usize {
        self.time_axes.len()
    }

    #[inline]
    pub fn time_axis_of(&self, axis: ValueAxisId) -> TimeAxisId {
        self.value_axes[axis.index()].time
    }

    #[inline]
    pub fn time_axis_of_int(&self, axis: IntAxisId) -> TimeAxisId {
        self.int_axes[axis.index()].time
    }

    #[inline]
    pub fn len(&self, time: TimeAxisId) -> usize {
        self.time_axes[time.index()].timestamps.len()
    }

    #[inline]
    pub fn is_empty(&self, time: TimeAxisId) -> bool {
        self.len(time) == 0
    }

    /// Samples held across all timestamp axes.
    pub fn total_samples(&self) -> usize {
        self.time_axes.iter().map(|t| t.timestamps.len()).sum()
    }

    #[inline]
    pub fn timestamps(&self, time: TimeAxisId) -> &[Timestamp] {
        &self.time_axes[time.index()].timestamps
    }

    /// Timestamps of the axis carrying `axis`.
    #[inline]
    pub fn timestamps_of(&self, axis: ValueAxisId) -> &[Timestamp] {
        self.timestamps(self.time_axis_of(axis))
    }

    #[inline]
    pub fn values(&self, axis: ValueAxisId) -> &[f32] {
        &self.value_axes[axis.index()].samples
    }

    #[inline]
    pub fn values_mut(&mut self, axis: ValueAxisId) -> &mut [f32] {
        &mut self.value_axes[axis.index()].samples
    }

    #[inline]
    pub fn ints(&self, axis: IntAxisId) -> &[u32] {
        &self.int_axes[axis.index()].samples
    }

    #[inline]
    pub fn previous_timestamp(&self, time: TimeAxisId) -> Option<Timestamp> {
        self.time_axes[time.index()].previous
    }

    /// Last value of the previous tick, NaN before the first sample.
    #[inline]
    pub fn previous_value(&self, axis: ValueAxisId) -> f32 {
        self.value_axes[axis.index()].previous
    }

    #[inline]
    pub fn previous_int(&self, axis: IntAxisId) -> Option<u32> {
        self.int_axes[axis.index()].previous
    }

    /// Latest known value: last sample this tick, else the previous value.
    #[inline]
    pub fn current_value(&self, axis: ValueAxisId) -> f32 {
        let a = &self.value_axes[axis.index()];
        a.samples.last().copied().unwrap_or(a.previous)
    }

    /// Roll the last sample of every axis into its previous slot and empty
    /// all axes, keeping their capacity.
    pub fn begin_tick(&mut self) {
        for axis in &mut self.value_axes {
            if let Some(&last) = axis.samples.last() {
                axis.previous = last;
            }
            axis.samples.clear();
        }
        for axis in &mut self.int_axes {
            if let Some(&last) = axis.samples.last() {
                axis.previous = Some(last);
            }
            axis.samples.clear();
        }
        for axis in &mut self.time_axes {
            if let Some(&last) = axis.timestamps.last() {
                axis.previous = Some(last);
            }
            axis.timestamps.clear();
        }
    }

    fn reserve(&mut self, time: TimeAxisId, additional: usize) -> PipelineResult<()> {
        let growth = |requested| PipelineError::DatasetGrowth {
            axis: time,
            requested,
        };
        let axis = &mut self.time_axes[time.index()];
        let requested = axis.timestamps.len() + additional;
        axis.timestamps
            .try_reserve(additional)
            .map_err(|_| growth(requested))?;
        for v in &axis.values {
            self.value_axes[v.index()]
                .samples
                .try_reserve(additional)
                .map_err(|_| growth(requested))?;
        }
        for i in &axis.ints {
            self.int_axes[i.index()]
                .samples
                .try_reserve(additional)
                .map_err(|_| growth(requested))?;
        }
        Ok(())
    }

    /// Set the length of a timestamp axis and every value axis on it.
    /// New slots are zeroed and must be written by the caller.
    pub fn resize(&mut self, time: TimeAxisId, len: usize) -> PipelineResult<()> {
        let current = self.len(time);
        if len > current {
            self.reserve(time, len - current)?;
        }
        let axis = &mut self.time_axes[time.index()];
        axis.timestamps.resize(len, 0);
        for v in &axis.values {
            self.value_axes[v.index()].samples.resize(len, 0.0);
        }
        for i in &axis.ints {
            self.int_axes[i.index()].samples.resize(len, 0);
        }
        Ok(())
    }

    /// Trim a timestamp axis (and its value axes) to `len` samples.
    pub fn shrink_size_to(&mut self, time: TimeAxisId, len: usize) {
        debug_assert!(len <= self.len(time), "shrink_size_to cannot grow");
        let axis = &mut self.time_axes[time.index()];
        axis.timestamps.truncate(len);
        for v in &axis.values {
            self.value_axes[v.index()].samples.truncate(len);
        }
        for i in &axis.ints {
            self.int_axes[i.index()].samples.truncate(len);
        }
    }

    /// Size `dst` for a sample-per-sample map of `src`. When both are the same
    /// axis nothing changes.
    pub fn map_n_to_n(&mut self, src: TimeAxisId, dst: TimeAxisId) -> PipelineResult<usize> {
        let n = self.len(src);
        if src != dst {
            self.resize(dst, n)?;
        }
        Ok(n)
    }

    /// Size `dst` for the worst case merge of `a` and `b`.
    pub fn map_n_plus_m(
        &mut self,
        a: TimeAxisId,
        b: TimeAxisId,
        dst: TimeAxisId,
    ) -> PipelineResult<usize> {
        let n = self.len(a) + self.len(b);
        self.resize(dst, n)?;
        Ok(n)
    }

    /// Append a sample to a float axis. Other axes sharing the timestamp
    /// axis repeat their current value.
    pub fn push_value(
        &mut self,
        axis: ValueAxisId,
        timestamp: Timestamp,
        value: f32,
    ) -> PipelineResult<()> {
        let time = self.time_axis_of(axis);
        self.push_timestamp(time, timestamp)?;
        if let Some(slot) = self.value_axes[axis.index()].samples.last_mut() {
            *slot = value;
        }
        Ok(())
    }

    /// Append a sample to an integer axis.
    pub fn push_int(
        &mut self,
        axis: IntAxisId,
        timestamp: Timestamp,
        value: u32,
    ) -> PipelineResult<()> {
        let time = self.time_axis_of_int(axis);
        self.push_timestamp(time, timestamp)?;
        if let Some(slot) = self.int_axes[axis.index()].samples.last_mut() {
            *slot = value;
        }
        Ok(())
    }

    fn push_timestamp(&mut self, time: TimeAxisId, timestamp: Timestamp) -> PipelineResult<()> {
        self.reserve(time, 1)?;
        let axis = &mut self.time_axes[time.index()];
        debug_assert!(
            axis.timestamps.last().map_or(true, |&last| last <= timestamp),
            "timestamps must be non-decreasing"
        );
        axis.timestamps.push(timestamp);
        for v in &axis.values {
            let a = &mut self.value_axes[v.index()];
            let carry = a.samples.last().copied().unwrap_or(a.previous);
            a.samples.push(carry);
        }
        for i in &axis.ints {
            let a = &mut self.int_axes[i.index()];
            let carry = a.samples.last().copied().or(a.previous).unwrap_or(0);
            a.samples.push(carry);
        }
        Ok(())
    }

    /// Copy values of `src` into `dst` (and timestamps when the axes differ).
    /// Both must already have the same length.
    pub fn copy_samples(&mut self, src: ValueAxisId, dst: ValueAxisId) {
        if src == dst {
            return;
        }
        let mut out = std::mem::take(&mut self.value_axes[dst.index()].samples);
        out.copy_from_slice(&self.value_axes[src.index()].samples);
        self.value_axes[dst.index()].samples = out;

        let (src_time, dst_time) = (self.time_axis_of(src), self.time_axis_of(dst));
        if src_time != dst_time {
            let mut ts = std::mem::take(&mut self.time_axes[dst_time.index()].timestamps);
            ts.copy_from_slice(&self.time_axes[src_time.index()].timestamps);
            self.time_axes[dst_time.index()].timestamps = ts;
        }
    }

    /// Move the columns of `step` out so a stage can write them while
    /// reading other axes.
    pub fn detach<const N: usize>(&mut self, step: StepFunction<N>) -> Columns<N> {
        let time = self.time_axis_of(step.x());
        Columns {
            timestamps: std::mem::take(&mut self.time_axes[time.index()].timestamps),
            values: std::array::from_fn(|i| {
                std::mem::take(&mut self.value_axes[step.axes[i].index()].samples)
            }),
        }
    }

    /// Return columns moved out by [`Dataset::detach`].
    pub fn attach<const N: usize>(&mut self, step: StepFunction<N>, columns: Columns<N>) {
        let time = self.time_axis_of(step.x());
        self.time_axes[time.index()].timestamps = columns.timestamps;
        for (axis, values) in step.axes.iter().zip(columns.values) {
            self.value_axes[axis.index()].samples = values;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_series() -> (Dataset, StepFunction1D, StepFunction1D) {
        let mut layout = DatasetLayout::new();
        let a = layout.add_step_function::<1>();
        let b = layout.add_step_function::<1>();
        (Dataset::from_layout(&layout, 4).unwrap(), a, b)
    }

    #[test]
    fn test_push_and_read() {
        let (mut ds, a, _) = two_series();
        ds.push_value(a.x(), 10, 1.0).unwrap();
        ds.push_value(a.x(), 20, 2.0).unwrap();
        assert_eq!(ds.timestamps_of(a.x()), &[10, 20]);
        assert_eq!(ds.values(a.x()), &[1.0, 2.0]);
        assert!(ds.previous_value(a.x()).is_nan());
    }

    #[test]
    fn test_begin_tick_rolls_previous() {
        let (mut ds, a, b) = two_series();
        ds.push_value(a.x(), 10, 3.5).unwrap();
        ds.begin_tick();

        let t = ds.time_axis_of(a.x());
        assert!(ds.is_empty(t));
        assert_eq!(ds.previous_value(a.x()), 3.5);
        assert_eq!(ds.previous_timestamp(t), Some(10));
        assert_eq!(ds.current_value(a.x()), 3.5);
        assert!(ds.previous_value(b.x()).is_nan());
    }

    #[test]
    fn test_shared_time_axis_carries_values() {
        let mut layout = DatasetLayout::new();
        let xy = layout.add_step_function::<2>();
        let mut ds = Dataset::from_layout(&layout, 0).unwrap();

        ds.push_value(xy.axes[0], 1, 0.5).unwrap();
        ds.push_value(xy.axes[1], 2, -0.5).unwrap();
        assert_eq!(ds.values(xy.axes[0]), &[0.5, 0.5]);
        assert!(ds.values(xy.axes[1])[0].is_nan());
        assert_eq!(ds.values(xy.axes[1])[1], -0.5);
    }

    #[test]
    fn test_map_n_plus_m_and_shrink() {
        let (mut ds, a, b) = two_series();
        ds.push_value(a.x(), 1, 1.0).unwrap();
        ds.push_value(b.x(), 2, 2.0).unwrap();
        ds.push_value(b.x(), 3, 3.0).unwrap();

        let ta = ds.time_axis_of(a.x());
        let tb = ds.time_axis_of(b.x());
        // Merge into `a`'s own axis is nonsense but exercises sizing.
        let n = ds.map_n_plus_m(tb, tb, ta).unwrap();
        assert_eq!(n, 4);
        assert_eq!(ds.len(ta), 4);
        ds.shrink_size_to(ta, 1);
        assert_eq!(ds.values(a.x()).len(), 1);
    }

    #[test]
    fn test_copy_samples_across_axes() {
        let (mut ds, a, b) = two_series();
        ds.push_value(a.x(), 5, 7.0).unwrap();
        let (ta, tb) = (ds.time_axis_of(a.x()), ds.time_axis_of(b.x()));
        ds.map_n_to_n(ta, tb).unwrap();
        ds.copy_samples(a.x(), b.x());
        assert_eq!(ds.timestamps(tb), &[5]);
        assert_eq!(ds.values(b.x()), &[7.0]);
    }

    #[test]
    fn test_detach_attach_round_trip() {
        let (mut ds, a, _) = two_series();
        ds.push_value(a.x(), 1, 1.0).unwrap();
        let mut cols = ds.detach(a);
        assert!(ds.values(a.x()).is_empty());
        cols.values[0][0] = 9.0;
        ds.attach(a, cols);
        assert_eq!(ds.values(a.x()), &[9.0]);
        assert_eq!(ds.timestamps_of(a.x()), &[1]);
    }

    #[test]
    fn test_int_axis_push() {
        let mut layout = DatasetLayout::new();
        let codes = layout.add_int_step_function();
        let mut ds = Dataset::from_layout(&layout, 2).unwrap();
        ds.push_int(codes.axis, 4, 0x1F).unwrap();
        assert_eq!(ds.ints(codes.axis), &[0x1F]);
        ds.begin_tick();
        assert_eq!(ds.previous_int(codes.axis), Some(0x1F));
    }
}
