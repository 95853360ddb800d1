//! Latency histograms recorded around dial, command and pipeline execution

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use kvmetrics_core::{Command, DialHook, DialTarget, Hook, ProcessHook, ProcessPipelineHook};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Histogram, Meter};
use tokio::time::Instant;

use crate::error::Result;
use crate::semconv;


/// Client hook timing every dial, command and pipeline of one node
///
/// Outcomes pass through untouched; the hook only adds a `status` attribute
/// (`ok` or `error`) to the recorded duration.
pub struct MetricsHook {
    create_time: Histogram<f64>,
    use_time: Histogram<f64>,
    attributes: Arc<[KeyValue]>,
}

impl MetricsHook {
    /// Create the latency histograms for a node with the given attributes
    pub fn new(meter: &Meter, attributes: Vec<KeyValue>) -> Result<Self> {
        let create_time = meter
            .f64_histogram(semconv::CONNECTIONS_CREATE_TIME)
            .with_description("The time it took to create a new connection.")
            .with_unit(semconv::UNIT_MILLISECONDS)
            .try_init()?;
        let use_time = meter
            .f64_histogram(semconv::CONNECTIONS_USE_TIME)
            .with_description("The time between borrowing a connection and returning it to the pool.")
            .with_unit(semconv::UNIT_MILLISECONDS)
            .try_init()?;

        Ok(Self {
            create_time,
            use_time,
            attributes: attributes.into(),
        })
    }

    fn use_time_recorder(&self, kind: &'static str) -> Recorder {
        Recorder {
            histogram: self.use_time.clone(),
            attributes: self.attributes.clone(),
            kind: Some(kind),
        }
    }
}

impl Hook for MetricsHook {
    fn dial_hook(&self, next: DialHook) -> DialHook {
        let recorder = Recorder {
            histogram: self.create_time.clone(),
            attributes: self.attributes.clone(),
            kind: None,
        };

        Arc::new(move |target: DialTarget| {
            let next = next.clone();
            let recorder = recorder.clone();
            async move {
                let start = Instant::now();
                let result = next(target).await;
                recorder.record(start.elapsed(), result.is_err());
                result
            }
            .boxed()
        })
    }

    fn process_hook(&self, next: ProcessHook) -> ProcessHook {
        let recorder = self.use_time_recorder(semconv::TYPE_COMMAND);

        Arc::new(move |cmd: Command| {
            let next = next.clone();
            let recorder = recorder.clone();
            async move {
                let start = Instant::now();
                let result = next(cmd).await;
                recorder.record(start.elapsed(), result.is_err());
                result
            }
            .boxed()
        })
    }

    fn process_pipeline_hook(&self, next: ProcessPipelineHook) -> ProcessPipelineHook {
        let recorder = self.use_time_recorder(semconv::TYPE_PIPELINE);

        Arc::new(move |cmds: Vec<Command>| {
            let next = next.clone();
            let recorder = recorder.clone();
            async move {
                let start = Instant::now();
                let result = next(cmds).await;
                recorder.record(start.elapsed(), result.is_err());
                result
            }
            .boxed()
        })
    }
}

#[derive(Clone)]
struct Recorder {
    histogram: Histogram<f64>,
    attributes: Arc<[KeyValue]>,
    kind: Option<&'static str>,
}

impl Recorder {
    fn record(&self, elapsed: Duration, failed: bool) {
        let mut attributes = Vec::with_capacity(self.attributes.len() + 2);
        attributes.extend_from_slice(&self.attributes);
        if let Some(kind) = self.kind {
            attributes.push(KeyValue::new(semconv::TYPE, kind));
        }
        attributes.push(status_attribute(failed));

        self.histogram.record(milliseconds(elapsed), &attributes);
    }
}

fn milliseconds(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}

fn status_attribute(failed: bool) -> KeyValue {
    if failed {
        KeyValue::new(semconv::STATUS, semconv::STATUS_ERROR)
    } else {
        KeyValue::new(semconv::STATUS, semconv::STATUS_OK)
    }
}
