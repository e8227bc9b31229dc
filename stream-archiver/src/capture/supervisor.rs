//! Lifecycle of one external capture process.
//!
//! The supervisor launches the recorder against a working file, lets it run
//! for the scheduled duration, interrupts it, waits for it to exit and only
//! then renames the working file to its final name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::naming::CapturePaths;
use crate::config::{CaptureConfig, ScheduleEntry};
use crate::utils::command::{
    OUTPUT_DRAIN_GRACE, forward_output, join_output, piped_command, substitute_args,
};
use crate::utils::fs;
use crate::{Error, Result};

/// What to record and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub url: String,
    pub name: String,
    pub duration: Duration,
}

impl CaptureRequest {
    pub fn new(url: impl Into<String>, name: impl Into<String>, duration: Duration) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            duration,
        }
    }

    pub fn from_entry(entry: &ScheduleEntry) -> Self {
        Self::new(entry.url(), entry.name(), entry.duration())
    }
}

/// Settings shared by every capture the supervisor runs.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub output_dir: PathBuf,
    pub extension: String,
    pub program: String,
    pub args: Vec<String>,
    /// Kill the process if it is still alive this long after the interrupt.
    pub stop_timeout: Option<Duration>,
}

impl From<&CaptureConfig> for SupervisorConfig {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            extension: config.extension.clone(),
            program: config.program.clone(),
            args: config.args.clone(),
            stop_timeout: config.stop_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// One running recording.
///
/// The process handle never leaves this struct; it is consumed by
/// [`CaptureJob::finish`].
pub struct CaptureJob {
    name: String,
    started_at: NaiveDateTime,
    paths: CapturePaths,
    child: Child,
    output_tasks: Vec<JoinHandle<()>>,
}

impl CaptureJob {
    /// Start the capture process writing to the working path.
    fn launch(
        config: &SupervisorConfig,
        request: &CaptureRequest,
        started_at: NaiveDateTime,
    ) -> Result<Self> {
        let paths = CapturePaths::new(
            &config.output_dir,
            &request.name,
            started_at,
            &config.extension,
        );

        let vars = HashMap::from([
            ("url", request.url.clone()),
            ("output", paths.working.to_string_lossy().into_owned()),
            ("name", request.name.clone()),
        ]);
        let args = substitute_args(&config.args, &vars);

        let mut child = piped_command(&config.program, &args)
            .spawn()
            .map_err(|e| {
                Error::capture(format!("failed to launch {}: {}", config.program, e))
            })?;
        let output_tasks = forward_output(&mut child, &request.name);

        info!(
            job = %request.name,
            pid = ?child.id(),
            output = %paths.working.display(),
            "Recording started"
        );

        Ok(Self {
            name: request.name.clone(),
            started_at,
            paths,
            child,
            output_tasks,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn started_at(&self) -> NaiveDateTime {
        self.started_at
    }

    pub fn working_path(&self) -> &Path {
        &self.paths.working
    }

    /// Let the recorder run for `duration`.
    ///
    /// Returns the exit status if the process ended on its own first.
    async fn record_for(&mut self, duration: Duration) -> Option<ExitStatus> {
        tokio::select! {
            status = self.child.wait() => match status {
                Ok(status) => Some(status),
                Err(e) => {
                    error!(job = %self.name, error = %e, "Error waiting for capture process");
                    None
                }
            },
            _ = tokio::time::sleep(duration) => None,
        }
    }

    /// Interrupt the recorder and wait for it to exit.
    async fn stop(&mut self, stop_timeout: Option<Duration>) -> Result<ExitStatus> {
        match process_utils::interrupt(&mut self.child) {
            Ok(true) => debug!(job = %self.name, "Sent interrupt to capture process"),
            Ok(false) => debug!(job = %self.name, "Capture process already exited"),
            Err(e) => warn!(job = %self.name, error = %e, "Failed to interrupt capture process"),
        }

        let Some(stop_timeout) = stop_timeout else {
            return self.child.wait().await.map_err(Error::from);
        };

        match tokio::time::timeout(stop_timeout, self.child.wait()).await {
            Ok(status) => status.map_err(Error::from),
            Err(_) => {
                warn!(
                    job = %self.name,
                    timeout_secs = stop_timeout.as_secs(),
                    "Capture process ignored interrupt, killing it"
                );
                self.child.kill().await?;
                self.child.wait().await.map_err(Error::from)
            }
        }
    }

    /// Rename the working file to its final name.
    ///
    /// Called after the process has exited. Descendants that still hold the
    /// output pipes do not delay the rename beyond [`OUTPUT_DRAIN_GRACE`].
    async fn finish(self) -> Result<PathBuf> {
        join_output(self.output_tasks, &self.name, OUTPUT_DRAIN_GRACE).await;

        if tokio::fs::metadata(&self.paths.working).await.is_err() {
            return Err(Error::capture(format!(
                "capture for '{}' produced no output at {}",
                self.name,
                self.paths.working.display()
            )));
        }

        fs::rename_with_op("finalizing recording", &self.paths.working, &self.paths.finished)
            .await?;
        Ok(self.paths.finished)
    }
}

/// Runs capture jobs.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    config: SupervisorConfig,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Record `request` starting now. See [`ProcessSupervisor::run_at`].
    pub async fn run(&self, request: &CaptureRequest) -> Result<PathBuf> {
        self.run_at(request, Local::now().naive_local()).await
    }

    /// Record `request`, tagging the output with `started_at`.
    ///
    /// Blocks for the whole recording. The final file only appears once the
    /// process has exited. Returns the final path.
    pub async fn run_at(
        &self,
        request: &CaptureRequest,
        started_at: NaiveDateTime,
    ) -> Result<PathBuf> {
        let mut job = CaptureJob::launch(&self.config, request, started_at)?;

        match job.record_for(request.duration).await {
            Some(status) => {
                warn!(
                    job = %job.name(),
                    status = %status,
                    "Capture process exited before the scheduled end"
                );
            }
            None => {
                let status = job.stop(self.config.stop_timeout).await?;
                debug!(job = %job.name(), status = %status, "Capture process exited");
            }
        }

        let finished = job.finish().await?;
        info!(job = %request.name, output = %finished.display(), "Job finished");
        Ok(finished)
    }
}
