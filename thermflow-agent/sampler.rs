// Periodic sampling loop: one label line up front, then one value line per
// tick, space-separated, on standard output.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::msr::MsrRegistry;
use crate::error::Result;
use crate::sensors::{RaplSensor, ThermalSensor};

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Tick period of the sampling loop.
    pub interval: Duration,

    /// Dump every thermal register field instead of just core temperatures.
    pub verbose_dump: bool,

    /// Append per-socket package/DRAM power columns.
    pub rapl: bool,

    /// Stop after this many samples; `None` runs until cancelled.
    pub samples: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            verbose_dump: false,
            rapl: false,
            samples: None,
        }
    }
}

pub struct Sampler {
    config: SamplerConfig,
    thermal: ThermalSensor,
    rapl: Option<RaplSensor>,
}

impl Sampler {
    pub fn new(config: SamplerConfig, registry: Arc<MsrRegistry>) -> Result<Self> {
        let thermal = ThermalSensor::new(Arc::clone(&registry))?;
        let rapl = if config.rapl {
            Some(RaplSensor::new(registry)?)
        } else {
            None
        };

        Ok(Self {
            config,
            thermal,
            rapl,
        })
    }

    /// Start the sampling loop on the runtime; it ends after the configured
    /// sample count or when `cancel` fires.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tracing::info!(
            "Starting sampler: interval {:?}, {} dump{}",
            self.config.interval,
            if self.config.verbose_dump {
                "verbose"
            } else {
                "terse"
            },
            if self.rapl.is_some() { ", RAPL" } else { "" }
        );

        tokio::spawn(async move {
            self.sample_loop(cancel).await;
        })
    }

    async fn sample_loop(mut self, cancel: CancellationToken) {
        println!("{}", self.label());

        let mut interval = tokio::time::interval(self.config.interval);
        let mut taken = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Sampler cancelled after {taken} sample(s)");
                    break;
                }
                _ = interval.tick() => {}
            }

            match self.sample_once() {
                Ok(line) => println!("{line}"),
                // Keep sampling: a failed read poisons one line, not the run.
                Err(e) => tracing::error!("sample failed: {e}"),
            }

            taken += 1;
            if self.config.samples.is_some_and(|n| taken >= n) {
                tracing::info!("Sampler finished after {taken} sample(s)");
                break;
            }
        }
    }

    fn label(&self) -> String {
        let mut label = if self.config.verbose_dump {
            self.thermal.verbose_label()
        } else {
            self.thermal.terse_label()
        };
        if let Some(rapl) = &self.rapl {
            label.push(' ');
            label.push_str(&rapl.label());
        }
        label
    }

    fn sample_once(&mut self) -> Result<String> {
        let mut line = if self.config.verbose_dump {
            self.thermal.verbose_values()?
        } else {
            self.thermal.terse_values()?
        };
        if let Some(rapl) = &mut self.rapl {
            line.push(' ');
            line.push_str(&rapl.values(self.config.interval)?);
        }
        Ok(line)
    }
}
