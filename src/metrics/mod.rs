//! Prometheus metrics for the ingestion pipeline and the status server

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::core::session::SessionState;
use crate::models::BreakoutDirection;

pub struct Metrics {
    registry: Registry,

    pub candles_ingested_total: IntCounter,
    pub decode_errors_total: IntCounter,
    pub dropped_candles_total: IntCounter,
    pub breakouts_total: IntCounterVec,

    pub sessions_running: IntGauge,
    pub sessions_closed_total: IntCounter,
    pub sessions_failed_total: IntCounter,

    pub dispatch_enqueued_total: IntCounter,
    pub dispatch_queue_full_total: IntCounter,
    pub dispatch_timeouts_total: IntCounter,
    pub dispatch_dropped_total: IntCounter,
    pub dispatch_degraded: IntGauge,
    pub sink_errors_total: IntCounterVec,

    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let candles_ingested_total = IntCounter::new(
            "candles_ingested_total",
            "Live candles appended to a rolling series",
        )?;
        let decode_errors_total = IntCounter::new(
            "decode_errors_total",
            "Feed messages dropped because they could not be decoded",
        )?;
        let dropped_candles_total = IntCounter::new(
            "dropped_candles_total",
            "Decoded candles rejected by the series (out of order)",
        )?;
        let breakouts_total = IntCounterVec::new(
            Opts::new("breakouts_total", "Breakout evaluations that fired"),
            &["direction"],
        )?;
        let sessions_running = IntGauge::new(
            "sessions_running",
            "Stream sessions not yet in a terminal state",
        )?;
        let sessions_closed_total =
            IntCounter::new("sessions_closed_total", "Stream sessions that closed")?;
        let sessions_failed_total =
            IntCounter::new("sessions_failed_total", "Stream sessions that failed")?;
        let dispatch_enqueued_total = IntCounter::new(
            "dispatch_enqueued_total",
            "Items accepted by the sink dispatcher queue",
        )?;
        let dispatch_queue_full_total = IntCounter::new(
            "dispatch_queue_full_total",
            "Enqueue attempts that found the dispatcher queue full",
        )?;
        let dispatch_timeouts_total = IntCounter::new(
            "dispatch_timeouts_total",
            "Items lost because the dispatcher queue stayed full",
        )?;
        let dispatch_dropped_total = IntCounter::new(
            "dispatch_dropped_total",
            "Queued items abandoned when the shutdown grace expired",
        )?;
        let dispatch_degraded = IntGauge::new(
            "dispatch_degraded",
            "1 while the dispatcher queue is persistently full",
        )?;
        let sink_errors_total = IntCounterVec::new(
            Opts::new("sink_errors_total", "Persistence and alert delivery failures"),
            &["sink"],
        )?;
        let http_requests_total =
            IntCounter::new("http_requests_total", "Total HTTP requests served")?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently in flight")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;

        registry.register(Box::new(candles_ingested_total.clone()))?;
        registry.register(Box::new(decode_errors_total.clone()))?;
        registry.register(Box::new(dropped_candles_total.clone()))?;
        registry.register(Box::new(breakouts_total.clone()))?;
        registry.register(Box::new(sessions_running.clone()))?;
        registry.register(Box::new(sessions_closed_total.clone()))?;
        registry.register(Box::new(sessions_failed_total.clone()))?;
        registry.register(Box::new(dispatch_enqueued_total.clone()))?;
        registry.register(Box::new(dispatch_queue_full_total.clone()))?;
        registry.register(Box::new(dispatch_timeouts_total.clone()))?;
        registry.register(Box::new(dispatch_dropped_total.clone()))?;
        registry.register(Box::new(dispatch_degraded.clone()))?;
        registry.register(Box::new(sink_errors_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            candles_ingested_total,
            decode_errors_total,
            dropped_candles_total,
            breakouts_total,
            sessions_running,
            sessions_closed_total,
            sessions_failed_total,
            dispatch_enqueued_total,
            dispatch_queue_full_total,
            dispatch_timeouts_total,
            dispatch_dropped_total,
            dispatch_degraded,
            sink_errors_total,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    pub fn record_breakout(&self, direction: BreakoutDirection) {
        if direction.is_breakout() {
            self.breakouts_total
                .with_label_values(&[direction.as_str()])
                .inc();
        }
    }

    /// Track a session entering `state` for the first time
    pub fn record_session_state(&self, state: &SessionState) {
        match state {
            SessionState::Created => self.sessions_running.inc(),
            SessionState::Closed => {
                self.sessions_running.dec();
                self.sessions_closed_total.inc();
            }
            SessionState::Failed(_) => {
                self.sessions_running.dec();
                self.sessions_failed_total.inc();
            }
            _ => {}
        }
    }

    /// Render every registered metric in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
