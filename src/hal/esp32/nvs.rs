//! Config Store on the default NVS partition.
//!
//! The record is one raw blob encoded by [`encode_record`]. A save that
//! would write identical bytes is skipped, so repeated shutdowns without a
//! change cost no flash wear.

use crate::store::{decode_record, encode_record, ConfigStore, PersistedConfig, StoreError, RECORD_CAPACITY};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use esp_idf_hal::sys::EspError;

const NAMESPACE: &str = "haptic";
const RECORD_KEY: &str = "config";

/// NVS-backed [`ConfigStore`].
pub struct Esp32NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl Esp32NvsStore {
    /// Opens the namespace read-write.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        Ok(Self { nvs })
    }

    fn read_bytes<'b>(&self, buf: &'b mut [u8]) -> Option<&'b [u8]> {
        match self.nvs.get_raw(RECORD_KEY, buf) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("NVS read failed: {}", e);
                None
            }
        }
    }
}

impl ConfigStore for Esp32NvsStore {
    fn load(&mut self, signature: u32) -> Option<PersistedConfig> {
        let mut buf = [0u8; RECORD_CAPACITY];
        let bytes = self.read_bytes(&mut buf)?;
        decode_record(bytes, signature)
    }

    fn save(&mut self, config: &PersistedConfig, signature: u32) -> Result<(), StoreError> {
        let mut encoded = [0u8; RECORD_CAPACITY];
        let len = encode_record(config, signature, &mut encoded)?;

        let mut current = [0u8; RECORD_CAPACITY];
        if self.read_bytes(&mut current) == Some(&encoded[..len]) {
            log::debug!("NVS record unchanged, skipping write");
            return Ok(());
        }

        self.nvs
            .set_raw(RECORD_KEY, &encoded[..len])
            .map_err(|e| StoreError::Backend(e.code()))?;
        log::info!("NVS record written ({} bytes)", len);
        Ok(())
    }
}
