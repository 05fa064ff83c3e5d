//! Prometheus registry for `/metrics`.
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    runs: IntCounterVec,
    renders: IntCounterVec,
    failures: IntCounterVec,
    run_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let runs = IntCounterVec::new(
            Opts::new("designbridge_runs_total", "Completed workflow runs by routing decision"),
            &["decision"],
        )?;
        let renders = IntCounterVec::new(
            Opts::new("designbridge_renders_total", "Rendered images by backend"),
            &["backend"],
        )?;
        let failures = IntCounterVec::new(
            Opts::new("designbridge_run_failures_total", "Runs that did not complete"),
            &["kind"],
        )?;
        let run_seconds = Histogram::with_opts(HistogramOpts::new(
            "designbridge_run_seconds",
            "Wall time of one workflow run",
        ))?;

        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(renders.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(run_seconds.clone()))?;

        Ok(Self {
            registry,
            runs,
            renders,
            failures,
            run_seconds,
        })
    }

    pub fn observe_run(&self, decision: Option<&str>, backend: Option<&str>, seconds: f64) {
        self.runs.with_label_values(&[decision.unwrap_or("none")]).inc();
        if let Some(backend) = backend {
            self.renders.with_label_values(&[backend]).inc();
        }
        self.run_seconds.observe(seconds);
    }

    pub fn observe_failure(&self, kind: &str) {
        self.failures.with_label_values(&[kind]).inc();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
