//! Helpers for building and observing external commands.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::output_reader::RecordReader;

/// How long output forwarders may keep running after the child has exited.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Substitute `{key}` placeholders in every argument.
///
/// Unknown placeholders are left untouched.
pub fn substitute_args(args: &[String], vars: &HashMap<&str, String>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            })
        })
        .collect()
}

/// Build a command with piped stdout/stderr so output can be forwarded to logs.
pub fn piped_command(program: &str, args: &[String]) -> Command {
    let mut cmd = process_utils::tokio_command(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Forward a child's stdout and stderr to `tracing`, one record per line
/// or progress redraw.
///
/// The returned handles finish once the pipes reach EOF, which can be later
/// than the child's exit when a descendant inherited them.
/// See [`join_output`].
pub fn forward_output(child: &mut Child, label: &str) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(2);

    if let Some(stdout) = child.stdout.take() {
        handles.push(tokio::spawn(forward_stream(stdout, label.to_string(), "stdout")));
    }
    if let Some(stderr) = child.stderr.take() {
        handles.push(tokio::spawn(forward_stream(stderr, label.to_string(), "stderr")));
    }

    handles
}

async fn forward_stream<R>(stream: R, label: String, source: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut reader = RecordReader::new(stream);
    loop {
        match reader.next_record().await {
            Ok(Some(record)) => {
                if source == "stderr" && record.to_lowercase().contains("error") {
                    warn!(target: "stream_archiver::process", "[{}] {}: {}", label, source, record);
                } else {
                    debug!(target: "stream_archiver::process", "[{}] {}: {}", label, source, record);
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(target: "stream_archiver::process", "[{}] {} read failed: {}", label, source, e);
                break;
            }
        }
    }
}

/// Wait for output forwarders, aborting any still open after `grace`.
pub async fn join_output(handles: Vec<JoinHandle<()>>, label: &str, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    for mut handle in handles {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_panic() => {
                warn!(job = %label, error = %e, "Output forwarder panicked");
            }
            Ok(Err(_)) => {}
            Err(_) => {
                debug!(job = %label, "Output pipe still open after exit, aborting reader");
                handle.abort();
            }
        }
    }
}
