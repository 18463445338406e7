//! Polling thread lifecycle for a single probe
//!
//! Each probe runs its own dedicated thread. Stopping is cooperative: the
//! running flag is cleared and the thread exits after its current blocking
//! read returns. The join is bounded.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::acquisition::buffer::SharedRingBuffer;
use crate::acquisition::monitor::{AcquisitionMonitor, AcquisitionStats};
use crate::acquisition::poller::{PacketSource, Poller};
use crate::error::AcquisitionError;
use crate::hardware::ProbeAddress;

/// Engine lifecycle: Idle → Armed → Running → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Armed,
    Running,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Armed => "armed",
            EngineState::Running => "running",
        };
        f.write_str(name)
    }
}

/// Acquisition engine for one probe
pub struct AcquisitionEngine {
    address: ProbeAddress,

    state: EngineState,

    /// Stop flag of the current run; every run gets its own
    running: Arc<AtomicBool>,

    /// Counters shared with the polling thread
    monitor: Arc<AcquisitionMonitor>,

    /// Polling thread of the current run and its exit signal
    thread: Option<PollingThread>,

    /// Thread of a run whose join timed out
    lingering: Option<PollingThread>,
}

struct PollingThread {
    handle: JoinHandle<()>,
    /// Disconnects when the thread exits
    done_rx: Receiver<()>,
}

impl AcquisitionEngine {
    pub fn new(address: ProbeAddress) -> Self {
        Self {
            address,
            state: EngineState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            monitor: Arc::new(AcquisitionMonitor::new()),
            thread: None,
            lingering: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Idle/Armed → Armed
    pub fn arm(&mut self) -> Result<(), AcquisitionError> {
        match self.state {
            EngineState::Idle | EngineState::Armed => {
                self.state = EngineState::Armed;
                Ok(())
            }
            EngineState::Running => Err(self.invalid(EngineState::Armed)),
        }
    }

    /// Armed → Running: reset counters and spawn the polling thread
    ///
    /// The destination buffer is cleared before the thread starts, so the
    /// first frame of the run is the first frame in the buffer. Refused while
    /// a thread from a timed-out stop is still alive.
    pub fn start<S: PacketSource + 'static>(
        &mut self,
        source: S,
        buffer: SharedRingBuffer,
        packets_per_read: usize,
    ) -> Result<(), AcquisitionError> {
        if self.state != EngineState::Armed {
            return Err(self.invalid(EngineState::Running));
        }
        self.reap_lingering()?;

        buffer.clear();
        self.monitor.reset();

        let (done_tx, done_rx) = bounded::<()>(1);
        let poller = Poller::new(source, buffer, self.monitor.clone(), packets_per_read);
        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();

        let handle = thread::Builder::new()
            .name(format!(
                "poll-s{}-p{}-d{}",
                self.address.slot, self.address.port, self.address.dock
            ))
            .spawn(move || {
                // Dropped on exit, including unwinding
                let _done = done_tx;
                poller.run(running);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                AcquisitionError::ThreadSpawn(e.to_string())
            })?;

        self.thread = Some(PollingThread { handle, done_rx });
        self.state = EngineState::Running;
        debug!("Polling thread started for {}", self.address);
        Ok(())
    }

    /// Running → Idle: signal the loop and join it within `timeout`
    ///
    /// Stopping an engine that is not running only drops it back to Idle.
    pub fn stop(&mut self, timeout: Duration) -> Result<(), AcquisitionError> {
        self.running.store(false, Ordering::Release);
        self.state = EngineState::Idle;

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        let finished = match thread.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };

        if !finished {
            error!(
                "Polling thread for {} did not stop within {} ms",
                self.address,
                timeout.as_millis()
            );
            // Exits once its read returns; its flag is never set again
            self.lingering = Some(thread);
            return Err(AcquisitionError::JoinTimeout {
                address: self.address,
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        if thread.handle.join().is_err() {
            error!("Polling thread for {} panicked", self.address);
            return Err(AcquisitionError::ThreadPanicked(self.address));
        }

        let stats = self.monitor.snapshot();
        info!(
            "Stopped {}: {} packets, {} frames, {} read failures",
            self.address, stats.packets_read, stats.frames_written, stats.read_failures
        );
        Ok(())
    }

    /// Join the thread of a timed-out stop if it has exited
    fn reap_lingering(&mut self) -> Result<(), AcquisitionError> {
        let Some(thread) = self.lingering.take() else {
            return Ok(());
        };

        match thread.done_rx.try_recv() {
            Err(TryRecvError::Empty) => {
                warn!("Polling thread for {} is still running", self.address);
                self.lingering = Some(thread);
                Err(AcquisitionError::PreviousRunActive(self.address))
            }
            Ok(()) | Err(TryRecvError::Disconnected) => {
                if thread.handle.join().is_err() {
                    warn!("Previous polling thread for {} panicked", self.address);
                }
                Ok(())
            }
        }
    }

    /// Check if the polling loop is running
    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running && self.running.load(Ordering::Acquire)
    }

    pub fn monitor(&self) -> &Arc<AcquisitionMonitor> {
        &self.monitor
    }

    pub fn fill_fraction(&self) -> f32 {
        self.monitor.fill_fraction()
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.monitor.snapshot()
    }

    fn invalid(&self, to: EngineState) -> AcquisitionError {
        AcquisitionError::InvalidTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}

impl Drop for AcquisitionEngine {
    fn drop(&mut self) {
        let _ = self.stop(Duration::from_millis(crate::constants::STOP_TIMEOUT_MS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::buffer::{create_shared_buffer, SampleFrame};
    use crate::acquisition::poller::tests::FakeSource;
    use crate::hardware::{FifoStatus, NpResult, PacketInfo};
    use std::time::Instant;

    fn address() -> ProbeAddress {
        ProbeAddress::new(2, 1, 1)
    }

    /// Endless source with increasing timestamps
    struct CountingSource {
        next: u32,
        delay: Duration,
    }

    impl PacketSource for CountingSource {
        fn read_packets(&mut self, info: &mut [PacketInfo], data: &mut [i16]) -> NpResult<usize> {
            thread::sleep(self.delay);
            for header in info.iter_mut() {
                *header = PacketInfo { timestamp: self.next, status: 0, payload_length: 384 };
                self.next += 1;
            }
            data.fill(8);
            Ok(info.len())
        }

        fn fifo_status(&mut self) -> NpResult<FifoStatus> {
            Ok(FifoStatus { packets_available: 10, headroom: 90 })
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_start_requires_armed() {
        let mut engine = AcquisitionEngine::new(address());
        let buffer = create_shared_buffer(16);

        let err = engine.start(FakeSource::new(), buffer.clone(), 64).unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidTransition { .. }));

        engine.arm().unwrap();
        engine.start(FakeSource::new(), buffer, 64).unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        assert!(engine.arm().is_err());

        engine.stop(Duration::from_secs(1)).unwrap();
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_start_clears_buffer() {
        let mut engine = AcquisitionEngine::new(address());
        let buffer = create_shared_buffer(16);
        buffer.push(SampleFrame::new(vec![], 384, vec![999], 0, 999, 999));

        engine.arm().unwrap();
        let source = CountingSource { next: 0, delay: Duration::from_millis(1) };
        engine.start(source, buffer.clone(), 4).unwrap();
        wait_for(|| !buffer.is_empty());
        engine.stop(Duration::from_secs(1)).unwrap();

        let first = buffer.try_pop().unwrap();
        assert_eq!(first.sample_number, 0);
        assert_eq!(first.timestamps[0], 0);
    }

    #[test]
    fn test_no_appends_after_stop() {
        let mut engine = AcquisitionEngine::new(address());
        let buffer = create_shared_buffer(10_000);

        engine.arm().unwrap();
        let source = CountingSource { next: 0, delay: Duration::from_micros(200) };
        engine.start(source, buffer.clone(), 8).unwrap();
        wait_for(|| buffer.len() >= 5);
        engine.stop(Duration::from_secs(1)).unwrap();

        let after_join = buffer.len();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(buffer.len(), after_join);
        assert_eq!(engine.stats().frames_written as usize, after_join);

        // Timestamps strictly increase within one run
        let frames = buffer.drain();
        let timestamps: Vec<u32> = frames.iter().flat_map(|f| f.timestamps.clone()).collect();
        assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_join_timeout_is_reported() {
        let mut engine = AcquisitionEngine::new(address());
        engine.arm().unwrap();
        let source = CountingSource { next: 0, delay: Duration::from_millis(300) };
        engine.start(source, create_shared_buffer(4), 1).unwrap();

        let err = engine.stop(Duration::from_millis(10)).unwrap_err();
        assert_eq!(
            err,
            AcquisitionError::JoinTimeout { address: address(), timeout_ms: 10 }
        );
        assert!(!engine.is_running());
    }

    #[test]
    fn test_restart_after_join_timeout() {
        let mut engine = AcquisitionEngine::new(address());
        let buffer = create_shared_buffer(64);

        engine.arm().unwrap();
        let slow = CountingSource { next: 1_000_000, delay: Duration::from_millis(300) };
        engine.start(slow, buffer.clone(), 1).unwrap();
        assert!(engine.stop(Duration::from_millis(10)).is_err());

        // The timed-out thread is still inside its read
        engine.arm().unwrap();
        let err = engine.start(FakeSource::new(), buffer.clone(), 1).unwrap_err();
        assert_eq!(err, AcquisitionError::PreviousRunActive(address()));
        assert_eq!(engine.state(), EngineState::Armed);

        thread::sleep(Duration::from_millis(400));
        engine.start(FakeSource::new(), buffer.clone(), 1).unwrap();
        thread::sleep(Duration::from_millis(50));
        engine.stop(Duration::from_secs(1)).unwrap();

        let stale: Vec<u32> = buffer
            .drain()
            .iter()
            .flat_map(|f| f.timestamps.clone())
            .filter(|&t| t >= 1_000_000)
            .collect();
        assert!(stale.is_empty(), "frames from the previous run: {:?}", stale);
        assert_eq!(engine.stats().frames_written, 0);
    }

    #[test]
    fn test_fill_fraction_reported() {
        let mut engine = AcquisitionEngine::new(address());
        engine.arm().unwrap();
        let source = CountingSource { next: 0, delay: Duration::from_millis(1) };
        engine.start(source, create_shared_buffer(64), 4).unwrap();
        wait_for(|| engine.fill_fraction() > 0.0);
        engine.stop(Duration::from_secs(1)).unwrap();

        assert_eq!(engine.fill_fraction(), 0.1);
    }
}
