//! Staging side of a synchronized write.
//!
//! A [`SyncWrite`] is bound to one register when it is created. Entries are
//! checked one by one as they are staged; a rejected entry is reported with
//! its id and leaves the rest of the batch untouched. The batch is drained by
//! [`Bus::commit`](crate::bus::Bus::commit), so whatever was staged can only
//! go out once.

use crate::codec::{self, Payload, Value};
use crate::error::{StagingError, StagingFailure};
use crate::register::{
    ActuatorId, MAX_ACTUATOR_ID, Register, RegisterDescriptor, RegisterMap, Width,
};
use crate::report;
use crate::transport::SyncEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWrite {
    address: u16,
    width: Width,
    entries: Vec<SyncEntry>,
}

impl SyncWrite {
    pub fn new(register: RegisterDescriptor) -> Self {
        Self {
            address: register.address,
            width: register.width,
            entries: Vec::new(),
        }
    }

    pub fn for_register(map: &RegisterMap, register: Register) -> Self {
        Self::new(map.resolve(register))
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ActuatorId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    pub fn entries(&self) -> &[SyncEntry] {
        &self.entries
    }

    /// Stages `payload` for actuator `id`.
    ///
    /// `address` and `width` must be the ones the batch was created for and
    /// `payload` must be exactly `width` bytes long. On failure nothing is
    /// staged for `id`.
    pub fn stage(
        &mut self,
        id: ActuatorId,
        address: u16,
        width: Width,
        payload: &[u8],
    ) -> Result<(), StagingError> {
        let result = self.check(id, address, width, payload);
        if let Err(err) = &result {
            report::log_staging(err);
            return result;
        }
        self.entries.push(SyncEntry {
            id,
            data: payload.iter().copied().collect::<Payload>(),
        });
        result
    }

    /// Encodes `value` for the batch register and stages it.
    pub fn stage_value(
        &mut self,
        id: ActuatorId,
        value: impl Into<Value>,
    ) -> Result<(), StagingError> {
        let payload = codec::encode(value.into().raw(), self.width).map_err(|e| {
            let err = StagingError::new(id, e.into());
            report::log_staging(&err);
            err
        })?;
        self.stage(id, self.address, self.width, &payload)
    }

    /// Stages every `(id, value)` pair and returns the ones that were
    /// rejected. A rejection does not stop the remaining pairs.
    pub fn stage_all<V: Into<Value>>(
        &mut self,
        values: impl IntoIterator<Item = (ActuatorId, V)>,
    ) -> Vec<StagingError> {
        values
            .into_iter()
            .filter_map(|(id, value)| self.stage_value(id, value).err())
            .collect()
    }

    /// Removes every staged entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Hands the staged entries out, leaving the batch empty.
    pub(crate) fn drain(&mut self) -> Vec<SyncEntry> {
        std::mem::take(&mut self.entries)
    }

    fn check(
        &self,
        id: ActuatorId,
        address: u16,
        width: Width,
        payload: &[u8],
    ) -> Result<(), StagingError> {
        let fail = |reason| Err(StagingError::new(id, reason));
        if id > MAX_ACTUATOR_ID {
            return fail(StagingFailure::InvalidId);
        }
        if address != self.address {
            return fail(StagingFailure::AddressMismatch {
                expected: self.address,
                found: address,
            });
        }
        if width != self.width {
            return fail(StagingFailure::WidthMismatch {
                expected: self.width,
                found: width,
            });
        }
        if payload.len() != width.len() {
            return fail(StagingFailure::LengthMismatch {
                width,
                len: payload.len(),
            });
        }
        if self.entries.iter().any(|e| e.id == id) {
            return fail(StagingFailure::Duplicate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    fn velocity_batch() -> SyncWrite {
        SyncWrite::for_register(&RegisterMap::DYNAMIXEL_XL, Register::GoalVelocity)
    }

    #[test]
    fn stages_matching_entries() {
        let mut batch = velocity_batch();
        let payload = encode(265, Width::DoubleWord).unwrap();
        assert!(batch.stage(1, 104, Width::DoubleWord, &payload).is_ok());
        assert!(batch.stage_value(2, 0u32).is_ok());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(batch.entries()[0].data.as_slice(), &[0x09, 0x01, 0, 0]);
    }

    #[test]
    fn mismatched_width_is_rejected_at_stage_time() {
        let mut batch = velocity_batch();
        batch.stage_value(1, 10u32).unwrap();
        let err = batch.stage(2, 104, Width::Word, &[0, 0]).unwrap_err();
        assert_eq!(err.id, 2);
        assert_eq!(
            err.reason,
            StagingFailure::WidthMismatch {
                expected: Width::DoubleWord,
                found: Width::Word
            }
        );
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn other_rejections_name_their_id() {
        let mut batch = velocity_batch();
        batch.stage_value(1, 10u32).unwrap();

        let dup = batch.stage_value(1, 11u32).unwrap_err();
        assert_eq!(dup, StagingError::new(1, StagingFailure::Duplicate));

        let address = batch.stage(2, 116, Width::DoubleWord, &[0; 4]).unwrap_err();
        assert_eq!(
            address.reason,
            StagingFailure::AddressMismatch {
                expected: 104,
                found: 116
            }
        );

        let short = batch.stage(3, 104, Width::DoubleWord, &[0; 2]).unwrap_err();
        assert_eq!(
            short.reason,
            StagingFailure::LengthMismatch {
                width: Width::DoubleWord,
                len: 2
            }
        );

        let broadcast = batch.stage_value(254, 1u32).unwrap_err();
        assert_eq!(broadcast.reason, StagingFailure::InvalidId);

        assert_eq!(batch.ids().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn out_of_range_values_are_staging_failures() {
        let mut batch = SyncWrite::for_register(&RegisterMap::DYNAMIXEL, Register::GoalPwm);
        let err = batch.stage_value(4, 70_000u32).unwrap_err();
        assert_eq!(err.id, 4);
        assert!(matches!(err.reason, StagingFailure::Range(_)));
        assert!(batch.is_empty());
    }

    #[test]
    fn stage_all_keeps_going_after_a_rejection() {
        let mut batch = SyncWrite::for_register(&RegisterMap::DYNAMIXEL, Register::Led);
        let rejected = batch.stage_all([(1, 1u32), (2, 300), (3, 0), (1, 1)]);
        assert_eq!(rejected.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(batch.ids().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn drain_and_clear_empty_the_batch() {
        let mut batch = velocity_batch();
        batch.stage_value(1, 1u32).unwrap();
        assert_eq!(batch.drain().len(), 1);
        assert!(batch.is_empty());
        batch.stage_value(1, 2u32).unwrap();
        batch.clear();
        assert!(batch.is_empty());
    }
}
