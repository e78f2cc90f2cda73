//! Device facade for the tap timer
//!
//! [`TimerDevice`] resolves attribute names against the descriptor table,
//! turns them into characteristic addresses and runs the codec around the raw
//! transport I/O. It never retries; that is left to whoever drives it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::attributes::{AttributeDescriptor, AttributeTable};
use crate::codec::{self, LiteralPolicy};
use crate::errors::{DeviceError, TransportFault};
use crate::transport::{CharacteristicRef, DeviceTransport};
use crate::types::{AttributeValue, Snapshot};

/// Default bound on a single characteristic read or write
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

// ----------------------------------------------------------------------------
// Device Facade
// ----------------------------------------------------------------------------

/// Attribute-level access to a connected tap timer
pub struct TimerDevice {
    transport: Arc<dyn DeviceTransport>,
    table: AttributeTable,
    literal_policy: LiteralPolicy,
    io_timeout: Duration,
}

impl TimerDevice {
    /// Wrap a connected transport using the standard attribute table
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self {
            transport,
            table: AttributeTable::standard(),
            literal_policy: LiteralPolicy::default(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    pub fn with_table(mut self, table: AttributeTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_literal_policy(mut self, policy: LiteralPolicy) -> Self {
        self.literal_policy = policy;
        self
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    /// Read an attribute, applying its derivation
    pub async fn read(&self, name: &str) -> Result<AttributeValue, DeviceError> {
        let descriptor = self.resolve(name)?;
        let raw = self.read_descriptor(descriptor).await?;
        Ok(codec::derive(descriptor, raw))
    }

    /// Read an attribute without applying its derivation
    pub async fn read_raw(&self, name: &str) -> Result<AttributeValue, DeviceError> {
        let descriptor = self.resolve(name)?;
        self.read_descriptor(descriptor).await
    }

    /// Write an attribute
    ///
    /// Non-writable attributes and values of the wrong arity are rejected
    /// before the transport is touched.
    pub async fn write(&self, name: &str, value: AttributeValue) -> Result<(), DeviceError> {
        let descriptor = self.resolve(name)?;
        if !descriptor.writable {
            return Err(DeviceError::NotWritable(name.to_string()));
        }

        let frame = codec::encode(descriptor, value)?;
        debug!("Writing {} frame {}", name, hex::encode(&frame));

        self.guarded(
            descriptor,
            self.transport
                .write(CharacteristicRef::from(descriptor), &frame),
        )
        .await
    }

    /// Read every readable attribute
    ///
    /// Fails on the first attribute that cannot be read, so a returned
    /// snapshot is always complete.
    pub async fn snapshot_all(&self) -> Result<Snapshot, DeviceError> {
        let mut snapshot = Snapshot::new();
        for descriptor in self.table.readable() {
            let raw = self.read_descriptor(descriptor).await?;
            snapshot.insert(descriptor.name.to_string(), codec::derive(descriptor, raw));
        }
        Ok(snapshot)
    }

    fn resolve(&self, name: &str) -> Result<&'static AttributeDescriptor, DeviceError> {
        self.table
            .lookup(name)
            .ok_or_else(|| DeviceError::AttributeNotFound(name.to_string()))
    }

    async fn read_descriptor(
        &self,
        descriptor: &'static AttributeDescriptor,
    ) -> Result<AttributeValue, DeviceError> {
        if !descriptor.readable {
            return Err(DeviceError::NotReadable(descriptor.name.to_string()));
        }

        let frame = self
            .guarded(
                descriptor,
                self.transport.read(CharacteristicRef::from(descriptor)),
            )
            .await?;
        debug!("Read {} frame {}", descriptor.name, hex::encode(&frame));

        Ok(codec::decode(descriptor, &frame, self.literal_policy)?)
    }

    async fn guarded<T>(
        &self,
        descriptor: &AttributeDescriptor,
        operation: impl Future<Output = Result<T, TransportFault>>,
    ) -> Result<T, DeviceError> {
        let cause = match timeout(self.io_timeout, operation).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(fault)) => fault,
            Err(_) => TransportFault::timeout(self.io_timeout),
        };
        Err(DeviceError::Transport {
            attribute: descriptor.name.to_string(),
            cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CodecError;
    use crate::testing::{DeviceCall, MockTimer};

    fn device(mock: &Arc<MockTimer>) -> TimerDevice {
        TimerDevice::new(mock.clone()).with_io_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_read_applies_derivation() {
        let mock = MockTimer::connected();
        mock.set_frame("on", vec![0x52, 0x01, 0x01]);
        mock.set_frame("manual_time_left", vec![0x69, 0x03, 0x00, 0x00, 0x05]);
        let device = device(&mock);

        assert_eq!(device.read("on").await.unwrap(), AttributeValue::Flag(true));
        assert_eq!(
            device.read("manual_time_left").await.unwrap(),
            AttributeValue::Scalar(0)
        );
        assert_eq!(
            device.read_raw("manual_time_left").await.unwrap(),
            AttributeValue::List(vec![0, 5])
        );
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let mock = MockTimer::connected();
        let device = device(&mock);

        device
            .write("cycle1_start", AttributeValue::List(vec![6, 45]))
            .await
            .unwrap();
        assert_eq!(
            mock.frame("cycle1_start"),
            Some(vec![0x64, 0x02, 0x06, 0x2d])
        );
        assert_eq!(
            device.read("cycle1_start").await.unwrap(),
            AttributeValue::List(vec![6, 45])
        );
    }

    #[tokio::test]
    async fn test_write_not_writable_skips_transport() {
        let mock = MockTimer::connected();
        let device = device(&mock);

        let err = device
            .write("battery", AttributeValue::Scalar(100))
            .await
            .unwrap_err();
        assert_eq!(err, DeviceError::NotWritable("battery".into()));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_write_arity_mismatch_skips_transport() {
        let mock = MockTimer::connected();
        let device = device(&mock);

        let err = device
            .write("time", AttributeValue::Scalar(12))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Codec(CodecError::ArityMismatch { expected: 3, actual: 1, .. })
        ));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_attribute() {
        let mock = MockTimer::connected();
        let device = device(&mock);

        assert_eq!(
            device.read("sprinkler").await.unwrap_err(),
            DeviceError::AttributeNotFound("sprinkler".into())
        );
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transport_fault_carries_attribute() {
        let mock = MockTimer::connected();
        mock.fail_reads("status", TransportFault::Gatt("insufficient authentication".into()));
        let device = device(&mock);

        let err = device.read("status").await.unwrap_err();
        assert_eq!(
            err,
            DeviceError::Transport {
                attribute: "status".into(),
                cause: TransportFault::Gatt("insufficient authentication".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_io_timeout() {
        let mock = MockTimer::connected();
        mock.set_write_delay(Duration::from_millis(500));
        let device = device(&mock);

        let err = device
            .write("status", AttributeValue::Scalar(1))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeviceError::Transport {
                attribute: "status".into(),
                cause: TransportFault::Timeout { duration_ms: 200 },
            }
        );
    }

    #[tokio::test]
    async fn test_snapshot_covers_readable() {
        let mock = MockTimer::connected();
        let device = device(&mock);

        let snapshot = device.snapshot_all().await.unwrap();
        let expected: Vec<_> = AttributeTable::standard()
            .readable()
            .map(|d| d.name.to_string())
            .collect();
        let mut keys: Vec<_> = snapshot.keys().cloned().collect();
        let mut expected_sorted = expected.clone();
        keys.sort();
        expected_sorted.sort();
        assert_eq!(keys, expected_sorted);
        assert_eq!(snapshot["on"], AttributeValue::Flag(true));
        assert_eq!(snapshot["cycle_duration"], AttributeValue::Scalar(29));
    }

    #[tokio::test]
    async fn test_snapshot_fails_as_whole() {
        let mock = MockTimer::connected();
        mock.set_frame("rain_delay_time", vec![0x66, 0x01]);
        let device = device(&mock);

        let err = device.snapshot_all().await.unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Codec(CodecError::FrameTooShort { .. })
        ));
    }

    #[tokio::test]
    async fn test_lenient_policy_tolerates_shifted_literals() {
        let mock = MockTimer::connected();
        mock.set_frame("status", vec![0x00, 0x01, 0x02]);

        let strict = device(&mock);
        assert!(matches!(
            strict.read("status").await.unwrap_err(),
            DeviceError::Codec(CodecError::ProtocolMismatch { position: 0, .. })
        ));

        let lenient = device(&mock).with_literal_policy(LiteralPolicy::Lenient);
        assert_eq!(lenient.read("status").await.unwrap(), AttributeValue::Scalar(2));
        assert!(mock
            .calls()
            .iter()
            .all(|call| matches!(call, DeviceCall::Read { .. })));
    }
}
