//! Post-processing by an external command.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{error, info};

use super::traits::{Processor, ProcessorOutput};
use crate::config::PostprocessConfig;
use crate::pipeline::work_queue::WorkItem;
use crate::utils::command::{
    OUTPUT_DRAIN_GRACE, forward_output, join_output, piped_command, substitute_args,
};
use crate::{Error, Result};

/// Runs a command against each file; exit code 0 means success.
pub struct ExecuteCommandProcessor {
    program: String,
    args: Vec<String>,
}

impl ExecuteCommandProcessor {
    /// Create a processor. `{input}` in `args` is replaced by the file path.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &PostprocessConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    fn build_args(&self, item: &WorkItem) -> Vec<String> {
        let vars = HashMap::from([("input", item.path().to_string_lossy().into_owned())]);
        substitute_args(&self.args, &vars)
    }
}

#[async_trait]
impl Processor for ExecuteCommandProcessor {
    fn name(&self) -> &'static str {
        "ExecuteCommandProcessor"
    }

    async fn process(&self, item: &WorkItem) -> Result<ProcessorOutput> {
        let start = std::time::Instant::now();
        let args = self.build_args(item);

        info!(program = %self.program, args = ?args, "Executing command");

        let mut child = piped_command(&self.program, &args)
            .spawn()
            .map_err(|e| Error::Other(format!("Failed to spawn {}: {}", self.program, e)))?;

        let label = item
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone());
        let output_tasks = forward_output(&mut child, &label);

        let status = child
            .wait()
            .await
            .map_err(|e| Error::Other(format!("Failed to wait for {}: {}", self.program, e)))?;

        join_output(output_tasks, &label, OUTPUT_DRAIN_GRACE).await;

        if !status.success() {
            error!(program = %self.program, status = %status, "Command failed");
            return Err(Error::CommandFailed {
                program: self.program.clone(),
                code: status.code().unwrap_or(-1),
            });
        }

        let duration_secs = start.elapsed().as_secs_f64();
        info!("Command completed in {:.2}s", duration_secs);

        Ok(ProcessorOutput {
            duration_secs,
            ..Default::default()
        })
    }
}
