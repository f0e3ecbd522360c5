//! Device-Wide Service Record Registry
//!
//! One registry instance lives inside the session host and owns every
//! advertised record. Handle allocation and record insertion happen in a
//! single call under the host lock, so a partially registered record is
//! never observable and concurrent server start-ups cannot collide on a
//! handle.

use super::{SdpError, ServiceRecordHandle, ServiceUuid, record::ServiceRecordBuilder};
use crate::constants::{
    MAX_SERVICE_RECORDS, SERVICE_RECORD_HANDLE_RANGE_END, SERVICE_RECORD_HANDLE_RANGE_START,
};
use crate::sdp::ServiceRecord;
use heapless::FnvIndexMap;

/// Device-wide service record registry
///
/// Records are keyed by their handle. A handle present in the map is never
/// handed out again until the record is deregistered.
#[derive(Debug, Default)]
pub struct ServiceRecordRegistry {
    records: FnvIndexMap<ServiceRecordHandle, ServiceRecord, MAX_SERVICE_RECORDS>,
}

impl ServiceRecordRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: FnvIndexMap::new(),
        }
    }

    /// Find the first unused handle at or above `start`
    ///
    /// Scans monotonically upward from `start` and returns the first value
    /// that is not currently a key in the registry. Allocation has no side
    /// effect; pair it with [`register`](Self::register) for the atomic
    /// allocate-and-insert step.
    ///
    /// # Errors
    /// - `SdpError::InvalidHandle` if `start` lies in the reserved range
    /// - `SdpError::HandleExhausted` if every handle from `start` to the
    ///   end of the range is occupied
    pub fn find_free_handle(
        &self,
        start: ServiceRecordHandle,
    ) -> Result<ServiceRecordHandle, SdpError> {
        if start < SERVICE_RECORD_HANDLE_RANGE_START {
            return Err(SdpError::InvalidHandle);
        }
        let mut candidate = start;
        loop {
            if !self.records.contains_key(&candidate) {
                return Ok(candidate);
            }
            if candidate == SERVICE_RECORD_HANDLE_RANGE_END {
                return Err(SdpError::HandleExhausted);
            }
            candidate += 1;
        }
    }

    /// Allocate a handle, build the record for it, and insert it
    ///
    /// This is the single atomic "register or fail" step: every failure
    /// leaves the registry untouched.
    ///
    /// # Errors
    /// Returns `SdpError::TooManyRecords` when the registry is full,
    /// `SdpError::HandleExhausted` when no free handle exists, or a build
    /// error from the record builder.
    pub fn register(
        &mut self,
        builder: ServiceRecordBuilder,
    ) -> Result<ServiceRecordHandle, SdpError> {
        self.register_from(builder, SERVICE_RECORD_HANDLE_RANGE_START)
    }

    /// Like [`register`](Self::register), allocating at or above `start`
    ///
    /// # Errors
    /// As for [`register`](Self::register), plus `SdpError::InvalidHandle`
    /// when `start` lies in the reserved range.
    pub fn register_from(
        &mut self,
        builder: ServiceRecordBuilder,
        start: ServiceRecordHandle,
    ) -> Result<ServiceRecordHandle, SdpError> {
        if self.records.len() == MAX_SERVICE_RECORDS {
            return Err(SdpError::TooManyRecords);
        }
        let handle = self.find_free_handle(start)?;
        let record = builder.build(handle)?;
        self.records
            .insert(handle, record)
            .map_err(|_| SdpError::TooManyRecords)?;
        Ok(handle)
    }

    /// Remove a record, returning it if it was present
    pub fn deregister(&mut self, handle: ServiceRecordHandle) -> Option<ServiceRecord> {
        self.records.remove(&handle)
    }

    /// Get a record by handle
    #[must_use]
    pub fn get(&self, handle: ServiceRecordHandle) -> Option<&ServiceRecord> {
        self.records.get(&handle)
    }

    /// Check whether a handle is registered
    #[must_use]
    pub fn contains(&self, handle: ServiceRecordHandle) -> bool {
        self.records.contains_key(&handle)
    }

    /// Find the first record advertising the given service class UUID
    #[must_use]
    pub fn find_by_service_class(&self, uuid: ServiceUuid) -> Option<&ServiceRecord> {
        self.records
            .values()
            .find(|record| record.matches_service_class(uuid))
    }

    /// Get number of registered records
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}
