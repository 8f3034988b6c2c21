//! Per-sample value shaping stages.
//!
//! Every optional step is blended in with a `[0, 1]` factor through
//! [`lerp`] instead of a branch, so the same arithmetic runs for every
//! sample whichever features are switched on.

use crate::pipeline::dataset::{Dataset, DatasetLayout, StepFunction, StepFunction1D};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::port::{AxisPort, PortList};
use crate::pipeline::stage::StagePlugin;

#[inline(always)]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Scalar shaper: abs fold, clamp or banded compare, normalize, sign
/// restore, then affine scale and offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Processor1D {
    pub src: StepFunction1D,
    pub dst: StepFunction1D,
    /// Blend towards `|v|`; the sign is restored after normalization.
    pub abs: f32,
    pub min: f32,
    pub max: f32,
    /// Blend towards `v` clamped into `[min, max]`.
    pub clamp: f32,
    /// Blend towards the banded compare result.
    pub compare: f32,
    pub compare_inside: f32,
    pub compare_outside: f32,
    /// Blend towards `(v - min) / (max - min)`.
    pub normalize: f32,
    pub scale: f32,
    pub offset: f32,
}

impl Processor1D {
    /// Identity processor writing `src` into `dst`.
    pub fn new(src: StepFunction1D, dst: StepFunction1D) -> Self {
        Self {
            src,
            dst,
            abs: 0.0,
            min: 0.0,
            max: 1.0,
            clamp: 0.0,
            compare: 0.0,
            compare_inside: 1.0,
            compare_outside: 0.0,
            normalize: 0.0,
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// Map `[min, max]` linearly onto `[lo, hi]`.
    pub fn remap(mut self, min: f32, max: f32, lo: f32, hi: f32) -> Self {
        self.min = min;
        self.max = max;
        self.normalize = 1.0;
        self.scale = hi - lo;
        self.offset = lo;
        self
    }

    /// Clamp input into `[min, max]` before normalizing.
    pub fn clamped(mut self) -> Self {
        self.clamp = 1.0;
        self
    }

    /// Symmetric axis deadzone: magnitudes below `min` read zero, above `max` read one.
    pub fn deadzone(mut self, min: f32, max: f32) -> Self {
        self.abs = 1.0;
        self.min = min;
        self.max = max;
        self.clamp = 1.0;
        self.normalize = 1.0;
        self
    }

    /// Replace each sample with `inside` or `outside` depending on `[min, max]`.
    pub fn band(mut self, min: f32, max: f32, inside: f32, outside: f32) -> Self {
        self.min = min;
        self.max = max;
        self.compare = 1.0;
        self.compare_inside = inside;
        self.compare_outside = outside;
        self
    }

    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        let folded = lerp(value, value.abs(), self.abs);

        let clamped = folded.max(self.min).min(self.max);
        let inside = (folded >= self.min && folded <= self.max) as u8 as f32;
        let banded = lerp(self.compare_outside, self.compare_inside, inside);
        let ranged = lerp(lerp(folded, clamped, self.clamp), banded, self.compare);

        let range = self.max - self.min;
        let normalized = if range != 0.0 {
            (ranged - self.min) / range
        } else {
            0.0
        };
        let shaped = lerp(ranged, normalized, self.normalize);
        let signed = lerp(shaped, shaped * sign, self.abs);

        signed * self.scale + self.offset
    }
}

impl StagePlugin for Processor1D {
    fn name(&self) -> &str {
        "Processor1D"
    }

    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        PortList::new()
            .read(&self.src)
            .write_mapped(&self.dst, layout.time_axis_of(self.src.x()), layout)
            .finish()
    }

    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dataset.map_n_to_n(
            dataset.time_axis_of(self.src.x()),
            dataset.time_axis_of(self.dst.x()),
        )
    }

    fn execute(&self, dataset: &mut Dataset) {
        dataset.copy_samples(self.src.x(), self.dst.x());
        for v in dataset.values_mut(self.dst.x()) {
            *v = self.apply(*v);
        }
    }
}

/// Vector shaper: clamp the magnitude, optionally renormalize it, rescale
/// the direction, then apply per-axis scale and offset.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorProcessor<const N: usize> {
    pub src: StepFunction<N>,
    pub dst: StepFunction<N>,
    pub min_magnitude: f32,
    pub max_magnitude: f32,
    pub clamp: f32,
    pub normalize: f32,
    pub scale: [f32; N],
    pub offset: [f32; N],
}

pub type Processor2D = VectorProcessor<2>;
pub type Processor3D = VectorProcessor<3>;

impl<const N: usize> VectorProcessor<N> {
    pub fn new(src: StepFunction<N>, dst: StepFunction<N>) -> Self {
        Self {
            src,
            dst,
            min_magnitude: 0.0,
            max_magnitude: 1.0,
            clamp: 0.0,
            normalize: 0.0,
            scale: [1.0; N],
            offset: [0.0; N],
        }
    }

    /// Radial deadzone: magnitudes are clamped to `[min, max]` and remapped
    /// onto `[0, 1]`.
    pub fn deadzone(mut self, min: f32, max: f32) -> Self {
        self.min_magnitude = min;
        self.max_magnitude = max;
        self.clamp = 1.0;
        self.normalize = 1.0;
        self
    }

    pub fn scaled(mut self, scale: [f32; N], offset: [f32; N]) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    #[inline]
    pub fn apply(&self, v: [f32; N]) -> [f32; N] {
        let magnitude = v.iter().map(|c| c * c).sum::<f32>().sqrt();
        let clamped = magnitude.max(self.min_magnitude).min(self.max_magnitude);
        let limited = lerp(magnitude, clamped, self.clamp);

        let range = self.max_magnitude - self.min_magnitude;
        // A collapsed range yields a zero-length vector, never NaN.
        let normalized = if range > 0.0 {
            ((limited - self.min_magnitude) / range).max(0.0)
        } else {
            0.0
        };
        let target = lerp(limited, normalized, self.normalize);
        let ratio = if magnitude > 0.0 { target / magnitude } else { 0.0 };

        std::array::from_fn(|i| v[i] * ratio * self.scale[i] + self.offset[i])
    }
}

impl<const N: usize> StagePlugin for VectorProcessor<N> {
    fn name(&self) -> &str {
        match N {
            2 => "Processor2D",
            3 => "Processor3D",
            _ => "VectorProcessor",
        }
    }

    fn ports(&self, layout: &DatasetLayout) -> Vec<AxisPort> {
        PortList::new()
            .read(&self.src)
            .write_mapped(&self.dst, layout.time_axis_of(self.src.x()), layout)
            .finish()
    }

    fn map(&self, dataset: &mut Dataset) -> PipelineResult<usize> {
        dataset.map_n_to_n(
            dataset.time_axis_of(self.src.x()),
            dataset.time_axis_of(self.dst.x()),
        )
    }

    fn execute(&self, dataset: &mut Dataset) {
        for (&src, &dst) in self.src.axes.iter().zip(&self.dst.axes) {
            dataset.copy_samples(src, dst);
        }
        let mut columns = dataset.detach(self.dst);
        let len = columns.values[0].len();
        for k in 0..len {
            let shaped = self.apply(std::array::from_fn(|i| columns.values[i][k]));
            for (axis, value) in columns.values.iter_mut().zip(shaped) {
                axis[k] = value;
            }
        }
        dataset.attach(self.dst, columns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn unbound() -> Processor1D {
        let axis = StepFunction1D::new([Default::default()]);
        Processor1D::new(axis, axis)
    }

    fn scalar_fixture(values: &[f32]) -> (Dataset, StepFunction1D, StepFunction1D) {
        let mut layout = DatasetLayout::new();
        let src = layout.add_step_function::<1>();
        let dst = layout.add_step_function_on::<1>(layout.time_axis_of(src.x()));
        let mut dataset = Dataset::from_layout(&layout, values.len()).unwrap();
        for (t, &v) in values.iter().enumerate() {
            dataset.push_value(src.x(), t as u64, v).unwrap();
        }
        (dataset, src, dst)
    }

    #[test]
    fn test_remap_unsigned_byte() {
        let p = unbound().remap(0.0, 255.0, 0.0, 1.0);
        assert!(approx(p.apply(0.0), 0.0));
        assert!(approx(p.apply(255.0), 1.0));
        assert!(approx(p.apply(51.0), 0.2));
    }

    #[test]
    fn test_remap_signed_short_to_unit_range() {
        let p = unbound().remap(-32767.0, 32767.0, -1.0, 1.0).clamped();
        assert!(approx(p.apply(-32768.0), -1.0));
        assert!(approx(p.apply(32767.0), 1.0));
        assert_eq!(p.apply(0.0), 0.0);
    }

    #[test]
    fn test_clamped_remap_centers_excess_k_byte() {
        let p = unbound().remap(-127.0, 127.0, -1.0, 1.0).clamped();
        assert_eq!(p.apply(0.0), 0.0);
        assert!(approx(p.apply(127.0), 1.0));
        assert!(approx(p.apply(-128.0), -1.0));

        // Flipped axis keeps the center too.
        let flipped = unbound().remap(-127.0, 127.0, 1.0, -1.0).clamped();
        assert_eq!(flipped.apply(0.0), 0.0);
        assert!(approx(flipped.apply(-128.0), 1.0));
    }

    #[test]
    fn test_deadzone_restores_sign() {
        let p = unbound().deadzone(0.2, 0.8);
        assert!(approx(p.apply(0.1), 0.0));
        assert!(approx(p.apply(-0.1), 0.0));
        assert!(approx(p.apply(-0.5), -0.5));
        assert!(approx(p.apply(0.9), 1.0));
        assert!(approx(p.apply(-0.9), -1.0));
    }

    #[test]
    fn test_band_sentinels() {
        let p = unbound().band(0.4, 0.6, 1.0, -1.0);
        assert!(approx(p.apply(0.5), 1.0));
        assert!(approx(p.apply(0.7), -1.0));
    }

    #[test]
    fn test_execute_writes_beside_source() {
        let (mut ds, src, dst) = scalar_fixture(&[0.0, 127.5, 255.0]);
        let stage = Processor1D::new(src, dst).remap(0.0, 255.0, 0.0, 1.0);
        assert_eq!(stage.map(&mut ds).unwrap(), 3);
        stage.execute(&mut ds);
        assert_eq!(ds.values(src.x()), &[0.0, 127.5, 255.0]);
        assert_eq!(ds.values(dst.x()), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_vector_deadzone() {
        let mut layout = DatasetLayout::new();
        let s = layout.add_step_function::<2>();
        let p = Processor2D::new(s, s).deadzone(0.125, 0.925);

        assert_eq!(p.apply([0.05, 0.05]), [0.0, 0.0]);
        let full = p.apply([1.0, 0.0]);
        assert!(approx(full[0], 1.0) && approx(full[1], 0.0));
        let mid = p.apply([0.0, -0.525]);
        assert!(approx(mid[1], -0.5));
    }

    #[test]
    fn test_vector_degenerate_range_is_zero() {
        let mut layout = DatasetLayout::new();
        let s = layout.add_step_function::<3>();
        let p = Processor3D::new(s, s).deadzone(0.5, 0.5);
        let out = p.apply([0.3, 0.4, 0.0]);
        assert_eq!(out, [0.0, 0.0, 0.0]);
        assert!(out.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_vector_zero_input_is_zero() {
        let mut layout = DatasetLayout::new();
        let s = layout.add_step_function::<2>();
        let p = Processor2D::new(s, s).scaled([2.0, 2.0], [0.0, 0.0]);
        assert_eq!(p.apply([0.0, 0.0]), [0.0, 0.0]);
    }

    #[test]
    fn test_vector_execute_in_place() {
        let mut layout = DatasetLayout::new();
        let s = layout.add_step_function::<2>();
        let mut ds = Dataset::from_layout(&layout, 2).unwrap();
        ds.push_value(s.axes[0], 1, 3.0).unwrap();
        ds.values_mut(s.axes[1])[0] = 4.0;

        let p = Processor2D::new(s, s).deadzone(0.0, 1.0);
        p.map(&mut ds).unwrap();
        p.execute(&mut ds);
        assert!(approx(ds.values(s.axes[0])[0], 0.6));
        assert!(approx(ds.values(s.axes[1])[0], 0.8));
        assert_eq!(ds.timestamps_of(s.x()), &[1]);
    }

    proptest! {
        #[test]
        fn prop_processor_1d_identity(values in prop::collection::vec(-1.0e6f32..1.0e6, 0..32)) {
            let (mut ds, src, dst) = scalar_fixture(&values);
            let stage = Processor1D::new(src, dst);
            stage.map(&mut ds).unwrap();
            stage.execute(&mut ds);
            prop_assert_eq!(ds.values(dst.x()), values.as_slice());
        }

        #[test]
        fn prop_vector_output_is_finite(
            x in -10.0f32..10.0,
            y in -10.0f32..10.0,
            min in 0.0f32..1.0,
            width in 0.0f32..1.0,
        ) {
            let mut layout = DatasetLayout::new();
            let s = layout.add_step_function::<2>();
            let p = Processor2D::new(s, s).deadzone(min, min + width);
            let out = p.apply([x, y]);
            prop_assert!(out.iter().all(|c| c.is_finite()));
        }
    }
}
