//! Demultiplexer: raw state words to per-control step functions.
//!
//! Unlike the other stages the demultiplexer reads state memory rather than
//! a dataset. It runs once per applied state event and appends one sample
//! for every field whose bits changed.

use crate::pipeline::dataset::Dataset;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{IntAxisId, ValueAxisId};
use crate::state::{Field, FieldMask};
use crate::types::{DestinationType, SourceType, Timestamp};

/// One field of a state block wired to a dataset axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemuxField {
    pub mask: FieldMask,
    pub source_type: SourceType,
    pub destination_type: DestinationType,
    /// Value axis index for float/bool destinations, int axis index for uint.
    pub dst_value_step_function_index: usize,
}

impl DemuxField {
    pub fn new(
        field: &Field,
        word_count: usize,
        source_type: SourceType,
        destination_type: DestinationType,
        dst_value_step_function_index: usize,
    ) -> PipelineResult<Self> {
        if !source_type.accepts_length(field.bit_length) {
            return Err(PipelineError::InvalidField {
                field: *field,
                reason: format!("{} cannot be {} bits wide", source_type, field.bit_length),
            });
        }
        Ok(Self {
            mask: field.mask(word_count)?,
            source_type,
            destination_type,
            dst_value_step_function_index,
        })
    }

    /// Convert raw field bits into a float sample.
    #[inline]
    pub fn to_float(&self, raw: u64) -> f32 {
        match self.destination_type {
            DestinationType::Float => self.source_type.decode(raw, self.mask.bit_length),
            DestinationType::Bool => (raw != 0) as u8 as f32,
            DestinationType::UInt => raw as f32,
        }
    }
}

/// Field table for one state format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Demuxer {
    fields: Vec<DemuxField>,
}

impl Demuxer {
    pub fn new(fields: Vec<DemuxField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[DemuxField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a sample at `timestamp` for every field whose bits are set in
    /// `changed` (old XOR new), or for every field when `all_changed`.
    /// Returns the number of samples written.
    pub fn execute(
        &self,
        state: &[u8],
        changed: &[u64],
        all_changed: bool,
        timestamp: Timestamp,
        dataset: &mut Dataset,
    ) -> PipelineResult<usize> {
        let mut written = 0;
        for field in &self.fields {
            if !all_changed && !field.mask.changed(changed) {
                continue;
            }
            let raw = field.mask.extract(state);
            match field.destination_type {
                DestinationType::UInt => dataset.push_int(
                    IntAxisId::from_index(field.dst_value_step_function_index),
                    timestamp,
                    raw as u32,
                )?,
                DestinationType::Float | DestinationType::Bool => dataset.push_value(
                    ValueAxisId::from_index(field.dst_value_step_function_index),
                    timestamp,
                    field.to_float(raw),
                )?,
            }
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dataset::DatasetLayout;

    /// XInput-shaped report: buttons u16 @0, triggers u8 @2/@3, sticks i16 @4..12.
    fn report(buttons: u16, left_trigger: u8, left_x: i16) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..2].copy_from_slice(&buttons.to_le_bytes());
        bytes[2] = left_trigger;
        bytes[4..6].copy_from_slice(&left_x.to_le_bytes());
        bytes
    }

    fn setup() -> (Demuxer, Dataset, [ValueAxisId; 3]) {
        let mut layout = DatasetLayout::new();
        let a = layout.add_step_function::<1>().x();
        let lt = layout.add_step_function::<1>().x();
        let lx = layout.add_step_function::<1>().x();
        let words = 2;
        let field = |f: Field, src: SourceType, dst: DestinationType, index: usize| {
            DemuxField::new(&f, words, src, dst, index).unwrap()
        };
        let demuxer = Demuxer::new(vec![
            field(Field::bit(1, 4), SourceType::UnsignedBits, DestinationType::Bool, a.index()),
            field(Field::bytes(2, 1), SourceType::UnsignedBits, DestinationType::Float, lt.index()),
            field(
                Field::bytes(4, 2),
                SourceType::TwosComplementSignedBits,
                DestinationType::Float,
                lx.index(),
            ),
        ]);
        (demuxer, Dataset::from_layout(&layout, 4).unwrap(), [a, lt, lx])
    }

    fn xor(a: &[u8; 16], b: &[u8; 16]) -> Vec<u64> {
        (0..2)
            .map(|i| crate::state::read_word(a, i) ^ crate::state::read_word(b, i))
            .collect()
    }

    #[test]
    fn test_first_state_emits_every_field() {
        let (demuxer, mut ds, [a, lt, lx]) = setup();
        let state = report(0x1000, 255, -32768);
        let n = demuxer.execute(&state, &[0, 0], true, 10, &mut ds).unwrap();
        assert_eq!(n, 3);
        assert_eq!(ds.values(a), &[1.0]);
        assert_eq!(ds.values(lt), &[255.0]);
        assert_eq!(ds.values(lx), &[-32768.0]);
    }

    #[test]
    fn test_only_changed_fields_emit() {
        let (demuxer, mut ds, [a, lt, lx]) = setup();
        let old = report(0x1000, 0, 100);
        let new = report(0x1000, 128, 100);
        let n = demuxer
            .execute(&new, &xor(&old, &new), false, 20, &mut ds)
            .unwrap();
        assert_eq!(n, 1);
        assert!(ds.values(a).is_empty());
        assert_eq!(ds.values(lt), &[128.0]);
        assert!(ds.values(lx).is_empty());
    }

    #[test]
    fn test_float32_requires_32_bits() {
        let err = DemuxField::new(
            &Field::bytes(0, 2),
            1,
            SourceType::Float32,
            DestinationType::Float,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidField { .. }));
    }

    #[test]
    fn test_uint_destination_writes_int_axis() {
        let mut layout = DatasetLayout::new();
        let codes = layout.add_int_step_function();
        let mut ds = Dataset::from_layout(&layout, 1).unwrap();
        let demuxer = Demuxer::new(vec![DemuxField::new(
            &Field::new(0, 4, 4),
            1,
            SourceType::UnsignedBits,
            DestinationType::UInt,
            codes.axis.index(),
        )
        .unwrap()]);
        demuxer.execute(&[0xA0], &[0], true, 1, &mut ds).unwrap();
        assert_eq!(ds.ints(codes.axis), &[0xA]);
    }
}
