use crate::gfx::{self, Event, Fence};
use crate::{setup_err, Error, Result};

fn sync_err(err: Error) -> Error {
    match err {
        Error::Sync(msg) => Error::Sync(msg),
        other => Error::Sync(other.to_string()),
    }
}

/// Owns the gpu fence and the cpu event used to block on it. The target value can only be
/// advanced by `request_signal`, which keeps it strictly increasing.
pub struct FenceSync<D: gfx::Device> {
    event: D::Event,
    fence: D::Fence,
    target: u64,
}

impl<D: gfx::Device> FenceSync<D> {
    pub fn create(device: &D) -> Result<Self> {
        let fence = device.create_fence(0).map_err(setup_err("create fence"))?;
        let event = device.create_event().map_err(setup_err("create fence event"))?;
        Ok(FenceSync {
            event,
            fence,
            target: 0,
        })
    }

    /// The last value requested with `request_signal`.
    pub fn target_value(&self) -> u64 {
        self.target
    }

    /// The last value the gpu has reached.
    pub fn completed_value(&self) -> u64 {
        self.fence.get_completed_value()
    }

    /// Enqueue a signal of the next target value behind all previously submitted work.
    pub fn request_signal(&mut self, device: &D) -> Result<u64> {
        let value = self.target + 1;
        device.signal(&self.fence, value)?;
        self.target = value;
        tracing::trace!("fence signal requested: {}", value);
        Ok(value)
    }

    /// Block with no timeout until the gpu has completed `value`.
    pub fn wait_until(&self, value: u64) -> Result<()> {
        if value > self.target {
            return Err(Error::Sync(format!(
                "wait for fence value {} which was never signalled (target {})",
                value, self.target
            )));
        }
        if self.fence.get_completed_value() >= value {
            return Ok(());
        }
        self.fence.set_event_on_completion(value, &self.event).map_err(sync_err)?;
        self.event.wait().map_err(sync_err)?;

        let completed = self.fence.get_completed_value();
        if completed < value {
            return Err(Error::Sync(format!(
                "fence event fired at {} before reaching {}",
                completed, value
            )));
        }
        Ok(())
    }

    /// Flush the queue: signal the next value and wait for the gpu to reach it.
    pub fn signal_and_wait(&mut self, device: &D) -> Result<u64> {
        let value = self.request_signal(device)?;
        if let Err(err) = self.wait_until(value) {
            tracing::error!("fence wait for {} failed: {}", value, err);
            return Err(err);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::null;
    use crate::gfx::{Device, DeviceInfo};

    #[test]
    fn target_advances_by_one_per_flush() {
        let device = null::Device::create(&DeviceInfo::default()).unwrap();
        let mut sync = FenceSync::create(&device).unwrap();
        assert_eq!(sync.target_value(), 0);
        assert_eq!(sync.signal_and_wait(&device).unwrap(), 1);
        assert_eq!(sync.signal_and_wait(&device).unwrap(), 2);
        assert_eq!(sync.completed_value(), 2);
    }

    #[test]
    fn waiting_for_an_unrequested_value_is_an_error() {
        let device = null::Device::create(&DeviceInfo::default()).unwrap();
        let sync = FenceSync::create(&device).unwrap();
        assert!(matches!(sync.wait_until(1), Err(Error::Sync(_))));
    }
}
