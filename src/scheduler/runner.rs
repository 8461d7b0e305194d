use super::{PairError, SchedulerSettings, SweepReport};
use crate::alert::{AlertSink, ChartRenderer};
use crate::correlator::CandleSource;
use crate::indicators::IndicatorEngine;
use crate::market::PairKey;
use crate::shutdown;
use crate::signal::{Direction, Signal, SignalDetector};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Periodic sweep over all configured pairs
///
/// Pairs are processed one at a time; a failure on one pair is logged and
/// never stops the sweep.
pub struct Scheduler {
    settings: SchedulerSettings,
    source: Arc<dyn CandleSource>,
    engine: Arc<dyn IndicatorEngine>,
    detector: SignalDetector,
    alerts: Arc<dyn AlertSink>,
    charts: Option<Arc<dyn ChartRenderer>>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        source: Arc<dyn CandleSource>,
        engine: Arc<dyn IndicatorEngine>,
        detector: SignalDetector,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            settings,
            source,
            engine,
            detector,
            alerts,
            charts: None,
        }
    }

    /// Attach a chart renderer; alerts are sent without images otherwise
    pub fn with_chart_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.charts = Some(renderer);
        self
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Sweep repeatedly until shutdown
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(
            pairs = self.settings.pair_count(),
            sweep_interval_secs = self.settings.sweep_interval.as_secs(),
            "Scheduler started"
        );

        let mut sweep_no: u64 = 0;
        while !shutdown::is_triggered(&shutdown_rx) {
            sweep_no += 1;
            let report = self.sweep(&mut shutdown_rx).await;
            if report.interrupted {
                break;
            }

            tracing::debug!(
                sweep = sweep_no,
                sleep_secs = self.settings.sweep_interval.as_secs(),
                "Waiting for next sweep"
            );
            if !pause(self.settings.sweep_interval, &mut shutdown_rx).await {
                break;
            }
        }

        tracing::info!(sweeps = sweep_no, "Scheduler stopped");
    }

    /// One pass over every pair, in configuration order
    pub async fn sweep(&self, shutdown_rx: &mut watch::Receiver<bool>) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::default();
        let total = self.settings.pair_count();

        for (i, key) in self.settings.pairs().enumerate() {
            if shutdown::is_triggered(shutdown_rx) {
                report.interrupted = true;
                break;
            }

            report.processed += 1;
            match self.process_pair(&key).await {
                Ok(Some(_)) => report.signals += 1,
                Ok(None) => {}
                Err(e) => {
                    report.failures += 1;
                    log_pair_error(&key, &e);
                }
            }

            if i + 1 < total && !pause(self.settings.pair_delay, shutdown_rx).await {
                report.interrupted = true;
                break;
            }
        }

        let elapsed = started.elapsed();
        telemetry::record_latency(LatencyMetric::Sweep, elapsed);
        tracing::info!(
            processed = report.processed,
            signals = report.signals,
            failures = report.failures,
            interrupted = report.interrupted,
            elapsed_ms = elapsed.as_millis() as u64,
            "Sweep complete"
        );
        report
    }

    /// Fetch, compute, detect and alert for a single pair
    pub async fn process_pair(&self, key: &PairKey) -> Result<Option<Signal>, PairError> {
        let series = self
            .source
            .fetch_candles(&key.instrument, key.timeframe.as_str(), self.settings.candle_count)
            .await?;
        let snapshot = self.engine.compute(&series, &self.settings.periods)?;

        let Some(signal) = self.detector.detect(&series, &snapshot) else {
            tracing::trace!(key = %key, bars = series.len(), "No crossover");
            return Ok(None);
        };

        telemetry::increment(match signal.direction {
            Direction::Long => CounterMetric::SignalLong,
            Direction::Short => CounterMetric::SignalShort,
        });
        tracing::info!(
            key = %key,
            direction = %signal.direction,
            entry = %signal.entry_price,
            stop_loss = %signal.stop_loss,
            take_profit = %signal.take_profit,
            "Signal detected"
        );

        let chart = self.charts.as_ref().and_then(|renderer| {
            renderer
                .render(&signal)
                .map_err(|e| tracing::warn!(key = %key, error = %e, "Chart rendering failed"))
                .ok()
        });

        if let Err(e) = self.alerts.send_signal(&signal, chart.as_deref()).await {
            telemetry::increment(CounterMetric::AlertFailed);
            return Err(e.into());
        }

        Ok(Some(signal))
    }
}

fn log_pair_error(key: &PairKey, error: &PairError) {
    match error {
        PairError::Fetch(e) if e.is_configuration() => {
            tracing::error!(key = %key, error = %e, "Pair misconfigured")
        }
        PairError::Fetch(e) => tracing::warn!(key = %key, error = %e, "Skipping pair"),
        PairError::Indicator(e) => {
            tracing::warn!(key = %key, error = %e, "Indicator computation failed")
        }
        PairError::Alert(e) => tracing::error!(key = %key, error = %e, "Alert delivery failed"),
    }
}

/// Sleep unless shutdown arrives first; `false` means stop
async fn pause(duration: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    if duration.is_zero() {
        return !shutdown::is_triggered(shutdown_rx);
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = shutdown::wait(shutdown_rx) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertError;
    use crate::correlator::FetchError;
    use crate::indicators::{IndicatorPeriods, IndicatorSnapshot, TaEngine};
    use crate::market::{Bar, BarSeries, Timeframe};
    use crate::signal::DetectorThresholds;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves fixed series and records the order of requests
    #[derive(Default)]
    struct StaticSource {
        series: HashMap<String, BarSeries>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CandleSource for StaticSource {
        async fn fetch_candles(
            &self,
            instrument: &str,
            timeframe: &str,
            _count: usize,
        ) -> Result<BarSeries, FetchError> {
            let key = format!("{instrument}/{timeframe}");
            self.calls.lock().unwrap().push(key.clone());
            self.series.get(&key).cloned().ok_or_else(|| FetchError::Timeout {
                key: PairKey::new(instrument, timeframe.parse().unwrap()),
                after: Duration::from_millis(1),
            })
        }
    }

    /// Snapshot that always yields the fixed tail used below
    struct FixedEngine(IndicatorSnapshot);

    impl IndicatorEngine for FixedEngine {
        fn compute(
            &self,
            series: &BarSeries,
            _periods: &IndicatorPeriods,
        ) -> Result<IndicatorSnapshot, crate::indicators::IndicatorError> {
            let mut snapshot = self.0.clone();
            for col in [
                &mut snapshot.ema_short,
                &mut snapshot.ema_long,
                &mut snapshot.ema_trend,
                &mut snapshot.adx,
                &mut snapshot.atr,
            ] {
                col.truncate(series.len());
            }
            Ok(snapshot)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        signals: Mutex<Vec<(Signal, Option<Vec<u8>>)>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send_signal(
            &self,
            signal: &Signal,
            chart: Option<&[u8]>,
        ) -> Result<(), AlertError> {
            self.signals
                .lock()
                .unwrap()
                .push((signal.clone(), chart.map(<[u8]>::to_vec)));
            if self.fail {
                return Err(AlertError::Api {
                    status: 500,
                    body: "down".to_string(),
                });
            }
            Ok(())
        }

        async fn send_notice(&self, _text: &str) -> Result<(), AlertError> {
            Ok(())
        }
    }

    struct StubChart;

    impl ChartRenderer for StubChart {
        fn render(&self, signal: &Signal) -> Result<Vec<u8>, AlertError> {
            Ok(signal.instrument.as_bytes().to_vec())
        }
    }

    fn flat_series(instrument: &str, timeframe: Timeframe, len: usize, last_close: Decimal) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let bars = (0..len)
            .map(|i| {
                let close = if i + 1 == len { last_close } else { dec!(1.1000) };
                Bar::new(
                    start + ChronoDuration::hours(i as i64),
                    dec!(1.1000),
                    close.max(dec!(1.1000)) + dec!(0.0005),
                    close.min(dec!(1.1000)) - dec!(0.0005),
                    close,
                    1,
                )
            })
            .collect();
        BarSeries::new(PairKey::new(instrument, timeframe), bars).unwrap()
    }

    /// Snapshot with a bullish crossover on bar 59 of 60
    fn bullish_snapshot() -> IndicatorSnapshot {
        let len = 60;
        let column = |prev: Decimal, last: Decimal| {
            let mut col = vec![None; len];
            col[len - 2] = Some(prev);
            col[len - 1] = Some(last);
            col
        };
        IndicatorSnapshot {
            ema_short: column(dec!(1.1000), dec!(1.1005)),
            ema_long: column(dec!(1.1002), dec!(1.1002)),
            ema_trend: column(dec!(1.0990), dec!(1.0990)),
            adx: column(dec!(25), dec!(25)),
            atr: column(dec!(0.0015), dec!(0.0015)),
        }
    }

    fn settings(instruments: &[&str], timeframes: &[Timeframe]) -> SchedulerSettings {
        SchedulerSettings {
            instruments: instruments.iter().map(|s| s.to_string()).collect(),
            timeframes: timeframes.to_vec(),
            candle_count: 100,
            periods: IndicatorPeriods::default(),
            pair_delay: Duration::ZERO,
            sweep_interval: Duration::from_millis(10),
        }
    }

    fn scheduler(
        settings: SchedulerSettings,
        source: Arc<StaticSource>,
        engine: Arc<dyn IndicatorEngine>,
        sink: Arc<RecordingSink>,
    ) -> Scheduler {
        Scheduler::new(
            settings,
            source,
            engine,
            SignalDetector::new(DetectorThresholds::default()),
            sink,
        )
    }

    #[tokio::test]
    async fn test_sweep_visits_pairs_in_order() {
        let source = Arc::new(StaticSource::default());
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(
            settings(&["frxEURUSD", "frxUSDJPY"], &[Timeframe::H1, Timeframe::M15]),
            source.clone(),
            Arc::new(TaEngine::new()),
            sink,
        );
        let (_trigger, mut rx) = shutdown::channel();

        let report = sched.sweep(&mut rx).await;

        assert_eq!(
            *source.calls.lock().unwrap(),
            vec!["frxEURUSD/H1", "frxEURUSD/M15", "frxUSDJPY/H1", "frxUSDJPY/M15"]
        );
        assert_eq!(report.processed, 4);
        assert_eq!(report.failures, 4);
        assert!(!report.interrupted);
    }

    #[tokio::test]
    async fn test_signal_delivered_with_chart() {
        let mut source = StaticSource::default();
        source.series.insert(
            "EURUSD/H1".to_string(),
            flat_series("EURUSD", Timeframe::H1, 60, dec!(1.1010)),
        );
        let source = Arc::new(source);
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(
            settings(&["EURUSD"], &[Timeframe::H1]),
            source,
            Arc::new(FixedEngine(bullish_snapshot())),
            sink.clone(),
        )
        .with_chart_renderer(Arc::new(StubChart));
        let (_trigger, mut rx) = shutdown::channel();

        let report = sched.sweep(&mut rx).await;
        assert_eq!(report.signals, 1);

        let delivered = sink.signals.lock().unwrap();
        let (signal, chart) = &delivered[0];
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.stop_loss, dec!(1.0995));
        assert_eq!(signal.take_profit, dec!(1.1040));
        assert_eq!(chart.as_deref(), Some(b"EURUSD".as_slice()));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut source = StaticSource::default();
        source.series.insert(
            "EURUSD/H1".to_string(),
            flat_series("EURUSD", Timeframe::H1, 60, dec!(1.1010)),
        );
        let source = Arc::new(source);
        let sink = Arc::new(RecordingSink::default());
        // First pair times out, second one signals
        let sched = scheduler(
            settings(&["GBPUSD", "EURUSD"], &[Timeframe::H1]),
            source,
            Arc::new(FixedEngine(bullish_snapshot())),
            sink.clone(),
        );
        let (_trigger, mut rx) = shutdown::channel();

        let report = sched.sweep(&mut rx).await;
        assert_eq!(report.failures, 1);
        assert_eq!(report.signals, 1);
        assert_eq!(sink.signals.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_alert_failure_counts_as_pair_failure() {
        let mut source = StaticSource::default();
        source.series.insert(
            "EURUSD/H1".to_string(),
            flat_series("EURUSD", Timeframe::H1, 60, dec!(1.1010)),
        );
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let sched = scheduler(
            settings(&["EURUSD"], &[Timeframe::H1]),
            Arc::new(source),
            Arc::new(FixedEngine(bullish_snapshot())),
            sink,
        );

        let key = PairKey::new("EURUSD", Timeframe::H1);
        assert!(matches!(
            sched.process_pair(&key).await,
            Err(PairError::Alert(_))
        ));
    }

    #[tokio::test]
    async fn test_short_series_is_not_an_error() {
        let mut source = StaticSource::default();
        source.series.insert(
            "EURUSD/H1".to_string(),
            flat_series("EURUSD", Timeframe::H1, 30, dec!(1.1010)),
        );
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(
            settings(&["EURUSD"], &[Timeframe::H1]),
            Arc::new(source),
            Arc::new(TaEngine::new()),
            sink.clone(),
        );

        let key = PairKey::new("EURUSD", Timeframe::H1);
        assert!(sched.process_pair(&key).await.unwrap().is_none());
        assert!(sink.signals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_sweeps_are_identical() {
        let mut source = StaticSource::default();
        source.series.insert(
            "EURUSD/H1".to_string(),
            flat_series("EURUSD", Timeframe::H1, 60, dec!(1.1010)),
        );
        let sink = Arc::new(RecordingSink::default());
        let sched = scheduler(
            settings(&["EURUSD"], &[Timeframe::H1]),
            Arc::new(source),
            Arc::new(FixedEngine(bullish_snapshot())),
            sink.clone(),
        );
        let (_trigger, mut rx) = shutdown::channel();

        let first = sched.sweep(&mut rx).await;
        let second = sched.sweep(&mut rx).await;
        assert_eq!(first, second);

        let delivered = sink.signals.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].0, delivered[1].0);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_pair_delay() {
        let source = Arc::new(StaticSource::default());
        let mut s = settings(&["A1", "B2", "C3"], &[Timeframe::H1]);
        s.pair_delay = Duration::from_secs(30);
        let sched = scheduler(
            s,
            source.clone(),
            Arc::new(TaEngine::new()),
            Arc::new(RecordingSink::default()),
        );
        let (trigger, mut rx) = shutdown::channel();

        let handle = tokio::spawn(async move {
            let report = sched.sweep(&mut rx).await;
            (report, source)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger();

        let (report, source) = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep should stop promptly")
            .unwrap();
        assert!(report.interrupted);
        assert_eq!(report.processed, 1);
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let source = Arc::new(StaticSource::default());
        let sched = scheduler(
            settings(&["EURUSD"], &[Timeframe::H1]),
            source.clone(),
            Arc::new(TaEngine::new()),
            Arc::new(RecordingSink::default()),
        );
        let (trigger, rx) = shutdown::channel();

        let handle = tokio::spawn(async move { sched.run(rx).await });
        tokio::time::sleep(Duration::from_millis(60)).await;
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("run should stop promptly")
            .unwrap();
        assert!(source.calls.lock().unwrap().len() >= 2);
    }
}
