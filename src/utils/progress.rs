use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait ProgressSink: Send + Sync {
    fn start_indeterminate(&self, message: Option<&str>);
    fn set(&self, progress_0_1: f32, message: Option<&str>);
    fn finish(&self, message: Option<&str>);
}

/// Reports progress through the `log` facade, throttled so that large batches
/// do not flood the output
pub struct LogProgress {
    last_update: Mutex<Instant>,
    min_interval: Duration,
}

impl LogProgress {
    pub fn new(min_interval: Duration) -> Self {
        Self { last_update: Mutex::new(Instant::now() - min_interval), min_interval }
    }

    fn should_emit(&self, force: bool) -> bool {
        let Ok(mut last) = self.last_update.lock() else { return force };
        let now = Instant::now();
        if force || now.duration_since(*last) >= self.min_interval {
            *last = now;
            true
        } else {
            false
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl ProgressSink for LogProgress {
    fn start_indeterminate(&self, message: Option<&str>) {
        self.should_emit(true);
        if let Some(m) = message {
            log::info!("[progress] {}", m);
        }
    }

    fn set(&self, progress_0_1: f32, message: Option<&str>) {
        let clamped = progress_0_1.clamp(0.0, 1.0);
        // Komunikaty i skrajne wartości zawsze, reszta z throttlingiem
        let force = message.is_some() || clamped >= 0.99 || clamped <= 0.01;
        if self.should_emit(force) {
            match message {
                Some(m) => log::info!("[progress] {:5.1}% {}", clamped * 100.0, m),
                None => log::info!("[progress] {:5.1}%", clamped * 100.0),
            }
        }
    }

    fn finish(&self, message: Option<&str>) {
        self.should_emit(true);
        log::info!("[progress] 100.0% {}", message.unwrap_or("done"));
    }
}

pub struct NoopProgress;
impl ProgressSink for NoopProgress {
    fn start_indeterminate(&self, _message: Option<&str>) {}
    fn set(&self, _progress_0_1: f32, _message: Option<&str>) {}
    fn finish(&self, _message: Option<&str>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttling() {
        let progress = LogProgress::new(Duration::from_secs(3600));
        assert!(progress.should_emit(true));
        assert!(!progress.should_emit(false));
        assert!(progress.should_emit(true));
    }

    #[derive(Default)]
    struct CountingSink {
        calls: Mutex<Vec<&'static str>>,
    }

    impl ProgressSink for CountingSink {
        fn start_indeterminate(&self, _message: Option<&str>) {
            self.calls.lock().unwrap().push("start");
        }
        fn set(&self, _progress_0_1: f32, _message: Option<&str>) {
            self.calls.lock().unwrap().push("set");
        }
        fn finish(&self, _message: Option<&str>) {
            self.calls.lock().unwrap().push("finish");
        }
    }

    #[test]
    fn test_sink_lifecycle() {
        let sink = CountingSink::default();
        let dyn_sink: &dyn ProgressSink = &sink;
        dyn_sink.start_indeterminate(Some("go"));
        dyn_sink.set(0.5, None);
        dyn_sink.finish(None);
        assert_eq!(*sink.calls.lock().unwrap(), vec!["start", "set", "finish"]);
    }

    #[test]
    fn test_first_update_not_throttled() {
        let progress = LogProgress::new(Duration::from_millis(50));
        assert!(progress.should_emit(false));
    }
}
