//! Port descriptors: which dataset axes a stage reads and writes.
//!
//! The compiler orders stages and rejects conflicting writers from these
//! declarations alone; it never inspects stage internals.

use super::dataset::{DatasetLayout, StepFunction, StepFunctionInt};
use super::id::{IntAxisId, TimeAxisId, ValueAxisId};
use std::fmt;

/// Direction of a port relative to the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Read,
    Write,
}

/// A single dataset axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AxisRef {
    /// Writing a timestamp axis means changing its length.
    Time(TimeAxisId),
    Value(ValueAxisId),
    Int(IntAxisId),
}

impl fmt::Display for AxisRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisRef::Time(id) => write!(f, "{id}"),
            AxisRef::Value(id) => write!(f, "{id}"),
            AxisRef::Int(id) => write!(f, "{id}"),
        }
    }
}

/// One declared access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisPort {
    pub axis: AxisRef,
    pub direction: PortDirection,
}

/// Collects the ports of a stage.
#[derive(Debug, Default)]
pub struct PortList {
    ports: Vec<AxisPort>,
}

impl PortList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<const N: usize>(&mut self, step: &StepFunction<N>) -> &mut Self {
        for &axis in &step.axes {
            self.push(AxisRef::Value(axis), PortDirection::Read);
        }
        self
    }

    pub fn read_int(&mut self, step: &StepFunctionInt) -> &mut Self {
        self.push(AxisRef::Int(step.axis), PortDirection::Read);
        self
    }

    /// Write the values of `step` without changing its length.
    pub fn write<const N: usize>(&mut self, step: &StepFunction<N>) -> &mut Self {
        for &axis in &step.axes {
            self.push(AxisRef::Value(axis), PortDirection::Write);
        }
        self
    }

    /// Write `step` and resize its timestamp axis.
    pub fn write_resized<const N: usize>(
        &mut self,
        step: &StepFunction<N>,
        layout: &DatasetLayout,
    ) -> &mut Self {
        self.push(AxisRef::Time(layout.time_axis_of(step.x())), PortDirection::Write);
        self.write(step)
    }

    /// Write `dst` as a sample-per-sample map of a source on `src_time`.
    pub fn write_mapped<const N: usize>(
        &mut self,
        step: &StepFunction<N>,
        src_time: TimeAxisId,
        layout: &DatasetLayout,
    ) -> &mut Self {
        if layout.time_axis_of(step.x()) == src_time {
            self.write(step)
        } else {
            self.write_resized(step, layout)
        }
    }

    fn push(&mut self, axis: AxisRef, direction: PortDirection) {
        self.ports.push(AxisPort { axis, direction });
    }

    pub fn finish(&mut self) -> Vec<AxisPort> {
        std::mem::take(&mut self.ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_mapped_same_axis_has_no_time_port() {
        let mut layout = DatasetLayout::new();
        let src = layout.add_step_function::<1>();
        let time = layout.time_axis_of(src.x());
        let beside = layout.add_step_function_on::<1>(time);

        let ports = PortList::new()
            .read(&src)
            .write_mapped(&beside, time, &layout)
            .finish();
        assert_eq!(ports.len(), 2);
        assert!(!ports.iter().any(|p| matches!(p.axis, AxisRef::Time(_))));
    }

    #[test]
    fn test_write_resized_declares_time_axis() {
        let mut layout = DatasetLayout::new();
        let dst = layout.add_step_function::<2>();
        let ports = PortList::new().write_resized(&dst, &layout).finish();
        assert_eq!(ports.len(), 3);
        assert_eq!(
            ports[0],
            AxisPort {
                axis: AxisRef::Time(TimeAxisId(0)),
                direction: PortDirection::Write
            }
        );
    }
}
