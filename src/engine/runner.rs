// Session runner - drives a DetectionLoop on a dedicated worker thread
//
// The worker ticks the loop every `tick_poll_interval` and publishes each
// emitted snapshot two ways:
// - latest-value slot for polling consumers (`poll_snapshot`)
// - tokio broadcast channel for push consumers (`subscribe`)
//
// Stopping is synchronous: the running flag is cleared and the worker is
// joined, so an in-flight tick always completes before state is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tokio::sync::broadcast;

use super::clock::{SystemTimeSource, TimeSource};
use super::session::{DetectionLoop, TickOutcome};
use super::snapshot::DetectionSnapshot;
use crate::audio::AudioSource;
use crate::config::AppConfig;
use crate::error::{log_detection_error, DetectionError};

/// Snapshots buffered per subscriber before the slowest one starts lagging
const BROADCAST_CAPACITY: usize = 64;

struct SessionShared {
    running: AtomicBool,
    latest: Mutex<Option<DetectionSnapshot>>,
}

/// Handle to a running detection session
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    snapshot_tx: broadcast::Sender<DetectionSnapshot>,
    worker: Option<JoinHandle<Result<(), DetectionError>>>,
}

/// Start a session on the system clock
pub fn start_session<S>(source: S, config: AppConfig) -> Result<SessionHandle, DetectionError>
where
    S: AudioSource + 'static,
{
    start_session_with_clock(source, config, Arc::new(SystemTimeSource::default()))
}

/// Start a session on a caller-provided clock
pub fn start_session_with_clock<S>(
    source: S,
    config: AppConfig,
    clock: Arc<dyn TimeSource>,
) -> Result<SessionHandle, DetectionError>
where
    S: AudioSource + 'static,
{
    let mut detection = DetectionLoop::new(&config)?;
    detection.start(source)?;

    let shared = Arc::new(SessionShared {
        running: AtomicBool::new(true),
        latest: Mutex::new(None),
    });
    let (snapshot_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

    let worker_shared = Arc::clone(&shared);
    let worker_tx = snapshot_tx.clone();
    let poll_interval = config.session.tick_poll_interval();

    let worker = thread::Builder::new()
        .name("voice-hud-detection".to_string())
        .spawn(move || {
            tracing::info!("[DetectionWorker] Thread started");
            let result = run_worker(&mut detection, &worker_shared, &worker_tx, clock, poll_interval);
            worker_shared.running.store(false, Ordering::SeqCst);
            if detection.stop().is_ok() {
                tracing::info!("[DetectionWorker] Session state cleared");
            }
            if let Err(err) = &result {
                log_detection_error(err, "detection worker");
            }
            tracing::info!("[DetectionWorker] Thread exiting");
            result
        })
        .map_err(|err| {
            tracing::error!("[DetectionWorker] Failed to spawn: {}", err);
            DetectionError::WorkerPanicked
        })?;

    Ok(SessionHandle {
        shared,
        snapshot_tx,
        worker: Some(worker),
    })
}

fn run_worker<S: AudioSource>(
    detection: &mut DetectionLoop<S>,
    shared: &SessionShared,
    snapshot_tx: &broadcast::Sender<DetectionSnapshot>,
    clock: Arc<dyn TimeSource>,
    poll_interval: std::time::Duration,
) -> Result<(), DetectionError> {
    let mut emitted: u64 = 0;

    while shared.running.load(Ordering::SeqCst) {
        match detection.tick(clock.now())? {
            TickOutcome::Emitted(snapshot) => {
                emitted += 1;
                {
                    let mut latest =
                        shared
                            .latest
                            .lock()
                            .map_err(|_| DetectionError::LockPoisoned {
                                component: "latest snapshot".to_string(),
                            })?;
                    *latest = Some(snapshot.clone());
                }
                // No subscribers is fine
                let _ = snapshot_tx.send(snapshot);
            }
            TickOutcome::SourceInactive => {
                tracing::info!(
                    "[DetectionWorker] Source inactive after {} snapshots, exiting",
                    emitted
                );
                break;
            }
            TickOutcome::Throttled | TickOutcome::Pending => {}
        }
        thread::sleep(poll_interval);
    }

    tracing::debug!("[DetectionWorker] Emitted {} snapshots", emitted);
    Ok(())
}

impl SessionHandle {
    /// Latest snapshot, if any tick has been emitted yet
    pub fn poll_snapshot(&self) -> Result<Option<DetectionSnapshot>, DetectionError> {
        let latest = self
            .shared
            .latest
            .lock()
            .map_err(|_| DetectionError::LockPoisoned {
                component: "latest snapshot".to_string(),
            })?;
        Ok(latest.clone())
    }

    /// Receive every snapshot emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DetectionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// False once the worker has exited, whether stopped or finished
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Stop the worker and wait for the in-flight tick to finish
    pub fn stop(mut self) -> Result<(), DetectionError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), DetectionError> {
        self.shared.running.store(false, Ordering::SeqCst);
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| DetectionError::WorkerPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log_detection_error(&err, "session drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BufferSource;
    use crate::engine::ManualClock;
    use std::f64::consts::PI;
    use std::time::{Duration, Instant};

    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.session.update_interval_ms = 0;
        config.session.tick_poll_interval_ms = 1;
        config
    }

    fn tone_source(config: &AppConfig, seconds: f64) -> BufferSource {
        let sample_rate = config.spectrum.sample_rate;
        let len = (sample_rate as f64 * seconds) as usize;
        let samples: Vec<f32> = (0..len)
            .map(|i| (0.4 * (2.0 * PI * 200.0 * i as f64 / sample_rate as f64).sin()) as f32)
            .collect();
        BufferSource::new(samples, sample_rate, &config.spectrum, 1024)
    }

    fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_session_publishes_snapshots() {
        let config = fast_config();
        let source = tone_source(&config, 1.0);
        let handle = start_session(source, config).unwrap();
        let mut rx = handle.subscribe();

        assert!(wait_until(|| matches!(handle.poll_snapshot(), Ok(Some(_)))));
        let snapshot = handle.poll_snapshot().unwrap().unwrap();
        assert!(snapshot.voiced);

        handle.stop().unwrap();
        // Anything received must be a well-formed snapshot
        while let Ok(snapshot) = rx.try_recv() {
            assert!(snapshot.pitch_history.len() <= 200);
        }
    }

    #[test]
    fn test_worker_exits_when_source_ends() {
        let config = fast_config();
        let source = tone_source(&config, 0.2);
        let handle = start_session(source, config).unwrap();

        assert!(wait_until(|| !handle.is_running()));
        assert!(handle.poll_snapshot().unwrap().is_some());
        handle.stop().unwrap();
    }

    #[test]
    fn test_frozen_clock_throttles_after_first_snapshot() {
        let mut config = fast_config();
        config.session.update_interval_ms = 80;
        let source = tone_source(&config, 2.0);
        let clock = Arc::new(ManualClock::new());
        let handle = start_session_with_clock(source, config, clock.clone()).unwrap();
        let mut rx = handle.subscribe();

        assert!(wait_until(|| matches!(handle.poll_snapshot(), Ok(Some(_)))));
        thread::sleep(Duration::from_millis(30));
        let first = handle.poll_snapshot().unwrap().unwrap();
        assert_eq!(first.pitch_history.len(), 1);

        clock.advance(Duration::from_millis(80));
        let second = loop {
            match rx.try_recv() {
                Ok(snapshot) if snapshot.pitch_history.len() == 2 => break Some(snapshot),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => {
                    if !wait_until(|| !rx.is_empty()) {
                        break None;
                    }
                }
                Err(_) => break None,
            }
        };
        let second = second.expect("second snapshot after the clock advanced");
        assert_eq!(second.timestamp_ms, 80);

        handle.stop().unwrap();
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = fast_config();
        config.pitch.yin_threshold = 0.0;
        let source = tone_source(&AppConfig::default(), 0.1);
        assert!(matches!(
            start_session(source, config),
            Err(DetectionError::InvalidConfig { .. })
        ));
    }
}
