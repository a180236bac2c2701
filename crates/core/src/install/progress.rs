use tokio::sync::mpsc;

use super::{InstallProgress, InstallStage};

/// Sends install progress without ever blocking the install.
///
/// Values are clamped to `[0, 1]` and never go backwards.
pub struct ProgressReporter {
    title_id: String,
    tx: Option<mpsc::Sender<InstallProgress>>,
    last: f32,
}

impl ProgressReporter {
    pub fn new(title_id: impl Into<String>, tx: Option<mpsc::Sender<InstallProgress>>) -> Self {
        Self {
            title_id: title_id.into(),
            tx,
            last: 0.0,
        }
    }

    pub fn report(&mut self, fraction: f32, stage: InstallStage) {
        let fraction = if fraction.is_nan() {
            self.last
        } else {
            fraction.clamp(0.0, 1.0).max(self.last)
        };
        self.last = fraction;

        if let Some(tx) = &self.tx {
            let _ = tx.try_send(InstallProgress {
                title_id: self.title_id.clone(),
                fraction,
                stage,
            });
        }
    }

    /// Report `done / total` mapped onto `[from, to]`.
    pub fn report_span(&mut self, from: f32, to: f32, done: u64, total: u64, stage: InstallStage) {
        let ratio = if total == 0 {
            1.0
        } else {
            (done as f64 / total as f64) as f32
        };
        self.report(from + (to - from) * ratio, stage);
    }

    pub fn last(&self) -> f32 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clamps_and_never_decreases() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut reporter = ProgressReporter::new("t", Some(tx));

        reporter.report(0.5, InstallStage::Reading);
        reporter.report(0.3, InstallStage::Reading);
        reporter.report(1.7, InstallStage::Writing);
        reporter.report(-1.0, InstallStage::Writing);
        drop(reporter);

        let mut values = Vec::new();
        while let Some(p) = rx.recv().await {
            values.push(p.fraction);
        }
        assert_eq!(values, vec![0.5, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_report_span() {
        let mut reporter = ProgressReporter::new("t", None);
        reporter.report_span(0.5, 0.95, 1, 2, InstallStage::Writing);
        assert!((reporter.last() - 0.725).abs() < 1e-6);

        reporter.report_span(0.0, 0.4, 0, 0, InstallStage::Reading);
        assert!((reporter.last() - 0.725).abs() < 1e-6);
    }

    #[test]
    fn test_full_channel_does_not_block() {
        let (tx, _rx) = mpsc::channel(1);
        let mut reporter = ProgressReporter::new("t", Some(tx));
        for i in 0..10 {
            reporter.report(i as f32 / 10.0, InstallStage::Writing);
        }
        assert!((reporter.last() - 0.9).abs() < 1e-6);
    }
}
