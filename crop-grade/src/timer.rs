use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

/// Wall-clock timer for one stage of a grading request.
pub struct Timer {
    stage: String,
    started: Option<DateTime<Utc>>,
    elapsed: Option<Duration>,
}

impl Timer {
    pub fn new(stage: &str) -> Self {
        Timer {
            stage: stage.to_owned(),
            started: None,
            elapsed: None,
        }
    }

    /// Create a timer that is already running
    pub fn started(stage: &str) -> Self {
        let mut t = Timer::new(stage);
        t.start();
        t
    }

    pub fn start(&mut self) {
        debug!("{}: starting", self.stage);

        self.started = Some(Utc::now());
        self.elapsed = None;
    }

    /// Stop the timer and return the elapsed milliseconds.
    ///
    /// Stopping a timer that is not running keeps the previous measurement.
    pub fn stop(&mut self) -> i64 {
        match self.started.take() {
            None => debug!("{}: not running", self.stage),
            Some(started) => {
                let d = Utc::now() - started;

                self.elapsed = Some(d);
                info!("{}: {} msec", self.stage, d.num_milliseconds());
            }
        }

        self.elapsed_ms()
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed.map_or(0, |d| d.num_milliseconds())
    }
}
