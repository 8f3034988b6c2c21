//! Merger stages: two timestamped sources into one destination.
//!
//! All mergers reserve `N + M` samples in `map` and trim the destination to
//! the number of samples actually emitted at the end of `execute`.

use crate::pipeline::dataset::{Dataset, DatasetLayout, StepFunction1D, StepFunction2D};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::port::{AxisPort, PortList};
use crate::pipeline::stage::StagePlugin;
use crate::types::Timestamp;

/// Default tolerance for the max-value mergers.
pub const DEFAULT_MERGE_TOLERANCE: f32 = f32::EPSILON;

fn validate_distinct_destination(
    layout: &DatasetLayout,
    sources: &[crate::pipeline::id::ValueAxisId],
    dst: crate::pipeline::id::ValueAxisId,
) -> Result<(), String> {
    let dst_time = layout.time_axis_of(dst);
    if sources.iter().any(|&s| layout.time_axis_of(s) == dst_time) {
        return Err("destination must not share a timestamp axis with a source".to_string());
    }
    Ok(())
}

/// Index of the next source to consume: `Some(true)` for source 1.
#[inline]
fn next_is_first(t1: &[Timestamp], i: usize, t2: &[Timestamp], j: usize) -> Option<bool> {
    match (t1.get(i), t2.get(j)) {
        (Some(a), Some(b)) => Some(a <= b),
        (Some(_), None) => Some(true),
        (None, Some(_)) => Some(false),
        (None, None) => None,
    }
}

/// Next distinct timestamp across both sources.
#[inline]
fn next_timestamp(t1: &[Timestamp], i: usize, t2: &[Timestamp], j: usize) -> Option<Timestamp> {
    match (t1.get(i), t2.get(j)) {
        (Some(&a), Some(&b)) => Some(a.min(b)),
        (Some(&a), None) => Some(a),
        (None, Some(&b)) => Some(b),
        (None, None) => None,
    }
}

/// Stable merge by timestamp; source 1 wins ties by going first.
#[derive(Debug, Clone, PartialEq)]
pub struct Latest1D {
    pub src1: StepFunction1D,
    pub src2: StepFunction1D,
    pub dst: StepFunction1D,
}

impl StagePlugin for Latest1D {
    fn name(&self) -> &str {
        "Latest1D"
    }

    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        PortList::new()
            .read(&self.src1)
            .read(&self.src2)
            .write_resized(&self.dst, layout)
            .finish()
    }

    fn validate(&self, layout: &DatasetLayout) -> Result<(), String> {
        validate_distinct_destination(layout, &[self.src1.x(), self.src2.x()], self.dst.x())
    }

    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dataset.map_n_plus_m(
            dataset.time_axis_of(self.src1.x()),
            dataset.time_axis_of(self.src2.x()),
            dataset.time_axis_of(self.dst.x()),
        )
    }

    fn execute(&self, dataset: &mut Dataset) {
        let mut out = dataset.detach(self.dst);
        let (t1, v1) = (dataset.timestamps_of(self.src1.x()), dataset.values(self.src1.x()));
        let (t2, v2) = (dataset.timestamps_of(self.src2.x()), dataset.values(self.src2.x()));

        let (mut i, mut j, mut k) = (0, 0, 0);
        while let Some(first) = next_is_first(t1, i, t2, j) {
            let (t, v) = if first {
                i += 1;
                (t1[i - 1], v1[i - 1])
            } else {
                j += 1;
                (t2[j - 1], v2[j - 1])
            };
            out.timestamps[k] = t;
            out.values[0][k] = v;
            k += 1;
        }

        dataset.attach(self.dst, out);
        dataset.shrink_size_to(dataset.time_axis_of(self.dst.x()), k);
    }
}

/// Emits the max of both sources whenever it changes beyond `tolerance`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaxValue1D {
    pub src1: StepFunction1D,
    pub src2: StepFunction1D,
    pub dst: StepFunction1D,
    pub tolerance: f32,
}

impl MaxValue1D {
    pub fn new(src1: StepFunction1D, src2: StepFunction1D, dst: StepFunction1D) -> Self {
        Self {
            src1,
            src2,
            dst,
            tolerance: DEFAULT_MERGE_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl StagePlugin for MaxValue1D {
    fn name(&self) -> &str {
        "MaxValue1D"
    }

    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        PortList::new()
            .read(&self.src1)
            .read(&self.src2)
            .write_resized(&self.dst, layout)
            .finish()
    }

    fn validate(&self, layout: &DatasetLayout) -> Result<(), String> {
        validate_distinct_destination(layout, &[self.src1.x(), self.src2.x()], self.dst.x())
    }

    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dataset.map_n_plus_m(
            dataset.time_axis_of(self.src1.x()),
            dataset.time_axis_of(self.src2.x()),
            dataset.time_axis_of(self.dst.x()),
        )
    }

    fn execute(&self, dataset: &mut Dataset) {
        let mut out = dataset.detach(self.dst);
        let (t1, v1) = (dataset.timestamps_of(self.src1.x()), dataset.values(self.src1.x()));
        let (t2, v2) = (dataset.timestamps_of(self.src2.x()), dataset.values(self.src2.x()));

        let mut current1 = dataset.previous_value(self.src1.x());
        let mut current2 = dataset.previous_value(self.src2.x());
        let mut last = dataset.previous_value(self.dst.x());

        let (mut i, mut j, mut k) = (0, 0, 0);
        while let Some(t) = next_timestamp(t1, i, t2, j) {
            while i < t1.len() && t1[i] == t {
                current1 = v1[i];
                i += 1;
            }
            while j < t2.len() && t2[j] == t {
                current2 = v2[j];
                j += 1;
            }

            // f32::max ignores a NaN operand.
            let max = current1.max(current2);
            if max.is_nan() {
                continue;
            }
            if last.is_nan() || (max - last).abs() > self.tolerance {
                out.timestamps[k] = t;
                out.values[0][k] = max;
                k += 1;
                last = max;
            }
        }

        dataset.attach(self.dst, out);
        dataset.shrink_size_to(dataset.time_axis_of(self.dst.x()), k);
    }
}

/// 2D max merger: carries the vector with the larger magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct MaxValue2D {
    pub src1: StepFunction2D,
    pub src2: StepFunction2D,
    pub dst: StepFunction2D,
    pub tolerance: f32,
}

impl MaxValue2D {
    pub fn new(src1: StepFunction2D, src2: StepFunction2D, dst: StepFunction2D) -> Self {
        Self {
            src1,
            src2,
            dst,
            tolerance: DEFAULT_MERGE_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }
}

#[inline]
fn squared_magnitude(v: [f32; 2]) -> f32 {
    let m = v[0] * v[0] + v[1] * v[1];
    if m.is_nan() {
        f32::NEG_INFINITY
    } else {
        m
    }
}

impl StagePlugin for MaxValue2D {
    fn name(&self) -> &str {
        "MaxValue2D"
    }

    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        PortList::new()
            .read(&self.src1)
            .read(&self.src2)
            .write_resized(&self.dst, layout)
            .finish()
    }

    fn validate(&self, layout: &DatasetLayout) -> Result<(), String> {
        validate_distinct_destination(layout, &[self.src1.x(), self.src2.x()], self.dst.x())
    }

    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dataset.map_n_plus_m(
            dataset.time_axis_of(self.src1.x()),
            dataset.time_axis_of(self.src2.x()),
            dataset.time_axis_of(self.dst.x()),
        )
    }

    fn execute(&self, dataset: &mut Dataset) {
        let mut out = dataset.detach(self.dst);
        let t1 = dataset.timestamps_of(self.src1.x());
        let t2 = dataset.timestamps_of(self.src2.x());
        let (x1, y1) = (dataset.values(self.src1.axes[0]), dataset.values(self.src1.axes[1]));
        let (x2, y2) = (dataset.values(self.src2.axes[0]), dataset.values(self.src2.axes[1]));

        let previous = |step: &StepFunction2D| {
            [
                dataset.previous_value(step.axes[0]),
                dataset.previous_value(step.axes[1]),
            ]
        };
        let mut current1 = previous(&self.src1);
        let mut current2 = previous(&self.src2);
        let mut last = previous(&self.dst);

        let (mut i, mut j, mut k) = (0, 0, 0);
        while let Some(t) = next_timestamp(t1, i, t2, j) {
            while i < t1.len() && t1[i] == t {
                current1 = [x1[i], y1[i]];
                i += 1;
            }
            while j < t2.len() && t2[j] == t {
                current2 = [x2[j], y2[j]];
                j += 1;
            }

            let (m1, m2) = (squared_magnitude(current1), squared_magnitude(current2));
            if m1 == f32::NEG_INFINITY && m2 == f32::NEG_INFINITY {
                continue;
            }
            let winner = if m1 >= m2 { current1 } else { current2 };

            let differs = last[0].is_nan()
                || last[1].is_nan()
                || (winner[0] - last[0]).abs() > self.tolerance
                || (winner[1] - last[1]).abs() > self.tolerance;
            if differs {
                out.timestamps[k] = t;
                out.values[0][k] = winner[0];
                out.values[1][k] = winner[1];
                k += 1;
                last = winner;
            }
        }

        dataset.attach(self.dst, out);
        dataset.shrink_size_to(dataset.time_axis_of(self.dst.x()), k);
    }
}
