//! Type-conversion stages: integer codes to floats, pairing scalar axes into
//! vectors, vector magnitude and running sums.

use crate::pipeline::dataset::{
    Dataset, DatasetLayout, StepFunction1D, StepFunction2D, StepFunctionInt,
};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::port::{AxisPort, PortList};
use crate::pipeline::stage::StagePlugin;

/// Masks an integer code and looks it up in a table.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumToFloat {
    pub src: StepFunctionInt,
    pub dst: StepFunction1D,
    pub mask: u32,
    pub table: Vec<f32>,
    /// Value for codes past the end of `table`.
    pub fallback: f32,
}

impl EnumToFloat {
    pub fn new(src: StepFunctionInt, dst: StepFunction1D, mask: u32, table: Vec<f32>) -> Self {
        Self {
            src,
            dst,
            mask,
            table,
            fallback: 0.0,
        }
    }

    #[inline]
    pub fn convert(&self, code: u32) -> f32 {
        self.table
            .get((code & self.mask) as usize)
            .copied()
            .unwrap_or(self.fallback)
    }
}

impl StagePlugin for EnumToFloat {
    fn name(&self) -> &str {
        "EnumToFloat"
    }

    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        PortList::new()
            .read_int(&self.src)
            .write_mapped(&self.dst, layout.time_axis_of_int(self.src.axis), layout)
            .finish()
    }

    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dataset.map_n_to_n(
            dataset.time_axis_of_int(self.src.axis),
            dataset.time_axis_of(self.dst.x()),
        )
    }

    fn execute(&self, dataset: &mut Dataset) {
        let src_time = dataset.time_axis_of_int(self.src.axis);
        let shared = src_time == dataset.time_axis_of(self.dst.x());
        let mut out = dataset.detach(self.dst);
        if !shared {
            out.timestamps.copy_from_slice(dataset.timestamps(src_time));
        }
        for (value, &code) in out.values[0].iter_mut().zip(dataset.ints(self.src.axis)) {
            *value = self.convert(code);
        }
        dataset.attach(self.dst, out);
    }
}

/// Pairs two independently sampled axes into one 2D series. Samples at
/// equal timestamps coalesce; the other component carries its latest value.
#[derive(Debug, Clone, PartialEq)]
pub struct Two1DsTo2D {
    pub x: StepFunction1D,
    pub y: StepFunction1D,
    pub dst: StepFunction2D,
}

impl StagePlugin for Two1DsTo2D {
    fn name(&self) -> &str {
        "Two1DsTo2D"
    }

    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        PortList::new()
            .read(&self.x)
            .read(&self.y)
            .write_resized(&self.dst, layout)
            .finish()
    }

    fn validate(&self, layout: &DatasetLayout) -> Result<(), String> {
        let dst_time = layout.time_axis_of(self.dst.x());
        if layout.time_axis_of(self.x.x()) == dst_time
            || layout.time_axis_of(self.y.x()) == dst_time
        {
            return Err("destination must have its own timestamp axis".to_string());
        }
        Ok(())
    }

    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dataset.map_n_plus_m(
            dataset.time_axis_of(self.x.x()),
            dataset.time_axis_of(self.y.x()),
            dataset.time_axis_of(self.dst.x()),
        )
    }

    fn execute(&self, dataset: &mut Dataset) {
        let mut out = dataset.detach(self.dst);
        let (tx, vx) = (dataset.timestamps_of(self.x.x()), dataset.values(self.x.x()));
        let (ty, vy) = (dataset.timestamps_of(self.y.x()), dataset.values(self.y.x()));

        let at_rest = |v: f32| if v.is_nan() { 0.0 } else { v };
        let mut x = at_rest(dataset.previous_value(self.x.x()));
        let mut y = at_rest(dataset.previous_value(self.y.x()));

        let (mut i, mut j, mut k) = (0, 0, 0);
        loop {
            let t = match (tx.get(i), ty.get(j)) {
                (Some(&a), Some(&b)) => a.min(b),
                (Some(&a), None) => a,
                (None, Some(&b)) => b,
                (None, None) => break,
            };
            while i < tx.len() && tx[i] == t {
                x = vx[i];
                i += 1;
            }
            while j < ty.len() && ty[j] == t {
                y = vy[j];
                j += 1;
            }
            out.timestamps[k] = t;
            out.values[0][k] = x;
            out.values[1][k] = y;
            k += 1;
        }

        dataset.attach(self.dst, out);
        dataset.shrink_size_to(dataset.time_axis_of(self.dst.x()), k);
    }
}

/// Length of a 2D vector, sample by sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Vec2ToMagnitude {
    pub src: StepFunction2D,
    pub dst: StepFunction1D,
}

impl StagePlugin for Vec2ToMagnitude {
    fn name(&self) -> &str {
        "Vec2ToMagnitude"
    }

    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        PortList::new()
            .read(&self.src)
            .write_mapped(&self.dst, layout.time_axis_of(self.src.x()), layout)
            .finish()
    }

    fn validate(&self, _layout: &DatasetLayout) -> Result<(), String> {
        if self.src.axes.contains(&self.dst.x()) {
            return Err("destination overlaps a source component".to_string());
        }
        Ok(())
    }

    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dataset.map_n_to_n(
            dataset.time_axis_of(self.src.x()),
            dataset.time_axis_of(self.dst.x()),
        )
    }

    fn execute(&self, dataset: &mut Dataset) {
        let src_time = dataset.time_axis_of(self.src.x());
        let shared = src_time == dataset.time_axis_of(self.dst.x());
        let mut out = dataset.detach(self.dst);
        if !shared {
            out.timestamps.copy_from_slice(dataset.timestamps(src_time));
        }
        let xs = dataset.values(self.src.axes[0]);
        let ys = dataset.values(self.src.axes[1]);
        for ((m, &x), &y) in out.values[0].iter_mut().zip(xs).zip(ys) {
            *m = x.hypot(y);
        }
        dataset.attach(self.dst, out);
    }
}

/// Running sum carried across ticks through the destination's previous value.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulate1D {
    pub src: StepFunction1D,
    pub dst: StepFunction1D,
}

impl StagePlugin for Accumulate1D {
    fn name(&self) -> &str {
        "Accumulate1D"
    }

    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        PortList::new()
            .read(&self.src)
            .write_mapped(&self.dst, layout.time_axis_of(self.src.x()), layout)
            .finish()
    }

    fn validate(&self, _layout: &DatasetLayout) -> Result<(), String> {
        if self.src == self.dst {
            return Err("accumulating in place would lose the running total".to_string());
        }
        Ok(())
    }

    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dataset.map_n_to_n(
            dataset.time_axis_of(self.src.x()),
            dataset.time_axis_of(self.dst.x()),
        )
    }

    fn execute(&self, dataset: &mut Dataset) {
        let previous = dataset.previous_value(self.dst.x());
        let mut total = if previous.is_nan() { 0.0 } else { previous };
        dataset.copy_samples(self.src.x(), self.dst.x());
        for v in dataset.values_mut(self.dst.x()) {
            total += *v;
            *v = total;
        }
    }
}
