//! Service container.
//!
//! Starts the requested services from one configuration and stops them in a
//! fixed order: scheduler first, then the stage watchers, then the stage
//! worker pools.

use std::sync::Arc;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::Result;
use crate::capture::{ProcessSupervisor, SupervisorConfig};
use crate::config::AppConfig;
use crate::pipeline::{
    ExecuteCommandProcessor, PipelineStage, PublishProcessor, StageConfig, StageReport,
};
use crate::publish::YouTubeClient;
use crate::scheduler::{SchedulerConfig, ShutdownReport, TriggerScheduler};
use crate::utils::fs::ensure_dir_all_with_op;

/// A service the binary can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Record,
    Postprocess,
    Upload,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Record, Service::Postprocess, Service::Upload];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Postprocess => "postprocess",
            Self::Upload => "upload",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct RunningScheduler {
    cancellation_token: CancellationToken,
    handle: JoinHandle<ShutdownReport>,
}

/// Summary of a completed shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Captures still recording when the scheduler stopped.
    pub captures_in_flight: usize,
    pub stages: Vec<(&'static str, StageReport)>,
}

/// Holds every running service.
#[derive(Default)]
pub struct ServiceContainer {
    scheduler: Option<RunningScheduler>,
    stages: Vec<PipelineStage>,
}

impl ServiceContainer {
    /// Start `services` in the order given.
    ///
    /// If one fails to start, those already started are shut down before the
    /// error is returned.
    pub async fn start(config: &AppConfig, services: &[Service]) -> Result<Self> {
        let mut container = Self::default();
        for service in services {
            if let Err(e) = container.start_service(config, *service).await {
                error!(service = %service, error = %e, "Failed to start service");
                container.shutdown().await;
                return Err(e);
            }
        }
        Ok(container)
    }

    async fn start_service(&mut self, config: &AppConfig, service: Service) -> Result<()> {
        match service {
            Service::Record => self.start_scheduler(config).await,
            Service::Postprocess => {
                let processor = ExecuteCommandProcessor::from_config(&config.postprocess);
                let stage = PipelineStage::start(
                    StageConfig::postprocess(&config.postprocess),
                    Arc::new(processor),
                )
                .await?;
                self.stages.push(stage);
                Ok(())
            }
            Service::Upload => {
                let client = YouTubeClient::from_config(&config.upload)?;
                let processor = PublishProcessor::from_config(client, &config.upload);
                let stage =
                    PipelineStage::start(StageConfig::upload(&config.upload), Arc::new(processor))
                        .await?;
                self.stages.push(stage);
                Ok(())
            }
        }
    }

    async fn start_scheduler(&mut self, config: &AppConfig) -> Result<()> {
        if self.scheduler.is_some() {
            return Ok(());
        }
        if config.schedules.is_empty() {
            warn!("No schedules configured; the recorder will stay idle");
        }
        ensure_dir_all_with_op("creating capture output directory", &config.capture.output_dir)
            .await?;

        let supervisor = ProcessSupervisor::new(SupervisorConfig::from(&config.capture));
        let scheduler = TriggerScheduler::new(
            &config.schedules,
            Arc::new(supervisor),
            SchedulerConfig {
                max_concurrent_captures: config.capture.max_concurrent,
                ..SchedulerConfig::default()
            },
            Local::now().naive_local(),
        );

        let cancellation_token = scheduler.cancellation_token();
        let handle = tokio::spawn(scheduler.run());
        self.scheduler = Some(RunningScheduler {
            cancellation_token,
            handle,
        });
        Ok(())
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn is_recording(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Stop everything that was started.
    ///
    /// Items already taken by a worker finish. Captures already recording
    /// run to their scheduled end and are renamed before this returns.
    pub async fn shutdown(&mut self) -> ShutdownSummary {
        info!("Shutting down services");
        let mut summary = ShutdownSummary::default();

        if let Some(scheduler) = self.scheduler.take() {
            scheduler.cancellation_token.cancel();
            match scheduler.handle.await {
                Ok(report) => summary.captures_in_flight = report.captures_in_flight,
                Err(e) => error!(error = %e, "Scheduler task failed"),
            }
        }

        for stage in &mut self.stages {
            stage.stop_watching();
        }
        for stage in self.stages.drain(..) {
            let name = stage.name();
            summary.stages.push((name, stage.shutdown().await));
        }

        info!("Services shut down");
        summary
    }
}
