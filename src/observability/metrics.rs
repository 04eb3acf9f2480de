use prometheus::{Counter, Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub intake_messages_total: IntCounterVec,
    pub job_transitions_total: IntCounterVec,
    pub outbound_sends_total: IntCounterVec,
    pub earnings_paid_total: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let intake_messages_total = IntCounterVec::new(
            Opts::new("intake_messages_total", "Inbound chat messages by outcome"),
            &["outcome"],
        )
        .expect("valid intake_messages_total metric");

        let job_transitions_total = IntCounterVec::new(
            Opts::new("job_transitions_total", "Job lifecycle transitions by event"),
            &["event"],
        )
        .expect("valid job_transitions_total metric");

        let outbound_sends_total = IntCounterVec::new(
            Opts::new("outbound_sends_total", "Outbound messenger sends by outcome"),
            &["outcome"],
        )
        .expect("valid outbound_sends_total metric");

        let earnings_paid_total = Counter::new(
            "earnings_paid_total",
            "Sum of driver earnings accrued on completed orders",
        )
        .expect("valid earnings_paid_total metric");

        registry
            .register(Box::new(intake_messages_total.clone()))
            .expect("register intake_messages_total");
        registry
            .register(Box::new(job_transitions_total.clone()))
            .expect("register job_transitions_total");
        registry
            .register(Box::new(outbound_sends_total.clone()))
            .expect("register outbound_sends_total");
        registry
            .register(Box::new(earnings_paid_total.clone()))
            .expect("register earnings_paid_total");

        Self {
            registry,
            intake_messages_total,
            job_transitions_total,
            outbound_sends_total,
            earnings_paid_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
