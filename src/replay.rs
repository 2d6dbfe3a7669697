//! Paced replay of snapshot histograms through a [`Renderer`].
use crate::buckets::BucketRange;
use crate::error::{Error, Result};
use crate::snapshot::BookSnapshot;
use std::time::Duration;
use tracing::{debug, warn};

/// Book side of a rendered series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Drawing surface the replay pushes each step to.
pub trait Renderer {
    /// Replace the series for `side` with `range`.
    fn present(&mut self, side: Side, range: &BucketRange) -> Result<()>;

    /// Draw everything presented since the previous flush.
    fn flush(&mut self) -> Result<()>;
}

impl<T: Renderer + ?Sized> Renderer for &mut T {
    fn present(&mut self, side: Side, range: &BucketRange) -> Result<()> {
        (**self).present(side, range)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Which snapshots are replayed and how fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayConfig {
    /// First snapshot index shown; earlier snapshots are session warm-up.
    pub start_offset: usize,
    /// Show every `stride`-th snapshot from `start_offset` on.
    pub stride: usize,
    /// Pause before each step.
    pub delay: Duration,
}

impl ReplayConfig {
    pub const DEFAULT_START_OFFSET: usize = 620;
    pub const DEFAULT_STRIDE: usize = 10;
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::InvalidConfig("replay stride must be at least 1".into()));
        }
        Ok(())
    }

    /// Snapshot indices visited for a sequence of `len` snapshots.
    pub fn indices(self, len: usize) -> impl Iterator<Item = usize> {
        (self.start_offset..len).step_by(self.stride.max(1))
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            start_offset: Self::DEFAULT_START_OFFSET,
            stride: Self::DEFAULT_STRIDE,
            delay: Self::DEFAULT_DELAY,
        }
    }
}

/// Outcome of a finished replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    pub steps: usize,
    pub last_index: Option<usize>,
}

/// Drives a renderer through a snapshot sequence on the calling thread.
pub struct StepPlayer<R> {
    config: ReplayConfig,
    renderer: R,
}

impl<R: Renderer> StepPlayer<R> {
    pub fn new(config: ReplayConfig, renderer: R) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, renderer })
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Render a single snapshot immediately.
    pub fn show(&mut self, snapshot: &BookSnapshot) -> Result<()> {
        let buy = BucketRange::from_buckets(&snapshot.buy_buckets);
        let sell = BucketRange::from_buckets(&snapshot.sell_buckets);
        self.renderer.present(Side::Buy, &buy)?;
        self.renderer.present(Side::Sell, &sell)?;
        self.renderer.flush()
    }

    /// Replay the configured window of `snapshots`. The first error aborts.
    pub fn run(&mut self, snapshots: &[BookSnapshot]) -> Result<ReplaySummary> {
        if self.config.start_offset >= snapshots.len() {
            warn!(
                start_offset = self.config.start_offset,
                snapshots = snapshots.len(),
                "start offset is past the last snapshot, nothing to replay"
            );
        }
        let mut summary = ReplaySummary::default();
        for i in self.config.indices(snapshots.len()) {
            if !self.config.delay.is_zero() {
                std::thread::sleep(self.config.delay);
            }
            debug!(index = i, "replay step");
            self.show(&snapshots[i])?;
            summary.steps += 1;
            summary.last_index = Some(i);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::BucketMap;

    #[derive(Default)]
    struct Recorder {
        presented: Vec<(Side, BucketRange)>,
        flushes: usize,
        fail_on_flush: Option<usize>,
    }

    impl Renderer for Recorder {
        fn present(&mut self, side: Side, range: &BucketRange) -> Result<()> {
            self.presented.push((side, range.clone()));
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.flushes += 1;
            if Some(self.flushes) == self.fail_on_flush {
                return Err(Error::Io(std::io::Error::other("display gone")));
            }
            Ok(())
        }
    }

    fn snapshots(n: usize) -> Vec<BookSnapshot> {
        (0..n)
            .map(|i| BookSnapshot {
                buy_buckets: BucketMap::from([(i as i64, 1)]),
                sell_buckets: BucketMap::new(),
            })
            .collect()
    }

    fn fast(start_offset: usize, stride: usize) -> ReplayConfig {
        ReplayConfig { start_offset, stride, delay: Duration::ZERO }
    }

    #[test]
    fn defaults() {
        let c = ReplayConfig::default();
        assert_eq!(c.start_offset, 620);
        assert_eq!(c.stride, 10);
        assert_eq!(c.delay, Duration::from_millis(100));
    }

    #[test]
    fn visits_window_with_stride() {
        let mut player = StepPlayer::new(fast(2, 3), Recorder::default()).unwrap();
        let summary = player.run(&snapshots(10)).unwrap();
        assert_eq!(summary, ReplaySummary { steps: 3, last_index: Some(8) });

        let rec = player.into_renderer();
        assert_eq!(rec.flushes, 3);
        let buys: Vec<i64> = rec
            .presented
            .iter()
            .filter(|(s, _)| *s == Side::Buy)
            .map(|(_, r)| r.edges[0])
            .collect();
        assert_eq!(buys, vec![2, 5, 8]);
        assert!(rec.presented.iter().filter(|(s, _)| *s == Side::Sell).all(|(_, r)| *r == BucketRange::empty()));
    }

    #[test]
    fn offset_past_end_renders_nothing() {
        let mut player = StepPlayer::new(fast(620, 10), Recorder::default()).unwrap();
        let summary = player.run(&snapshots(5)).unwrap();
        assert_eq!(summary.steps, 0);
        assert_eq!(player.into_renderer().flushes, 0);
    }

    #[test]
    fn zero_stride_rejected() {
        assert!(matches!(StepPlayer::new(fast(0, 0), Recorder::default()), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn render_failure_aborts_replay() {
        let rec = Recorder { fail_on_flush: Some(2), ..Recorder::default() };
        let mut player = StepPlayer::new(fast(0, 1), rec).unwrap();
        assert!(player.run(&snapshots(5)).is_err());
        assert_eq!(player.into_renderer().flushes, 2);
    }

    #[test]
    fn delay_paces_steps() {
        let config = ReplayConfig { start_offset: 0, stride: 1, delay: Duration::from_millis(5) };
        let mut player = StepPlayer::new(config, Recorder::default()).unwrap();
        let started = std::time::Instant::now();
        player.run(&snapshots(3)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(15));
    }
}
