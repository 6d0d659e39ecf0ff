// SPDX-License-Identifier: MIT

//! Docker-backed container runtime.
//!
//! Shells out to `docker exec` for every primitive. Commands run under a
//! login-like wrapper that sources the container's profile so PATH and
//! toolchain environment match an interactive shell.

use crate::{ContainerRuntime, ExecOutput, RuntimeError, Signal, StreamEvent};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const STREAM_BUF: usize = 4096;
const CHANNEL_CAPACITY: usize = 64;

/// Runtime primitives for a named docker container.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    container: String,
}

impl DockerRuntime {
    pub fn new(container: impl Into<String>) -> Self {
        Self { container: container.into() }
    }

    /// Wrap a command so it runs with the container's profile environment.
    fn wrap(command: &str, workdir: Option<&str>) -> String {
        let body = match workdir {
            Some(dir) => format!("cd {dir} && {command}"),
            None => command.to_string(),
        };
        format!(
            "source /etc/profile 2>/dev/null || true; \
             source ~/.bashrc 2>/dev/null || true; {body}"
        )
    }

    fn exec_command(&self, command: &str, workdir: Option<&str>) -> Command {
        let mut cmd = Command::new("docker");
        cmd.arg("exec")
            .arg(&self.container)
            .arg("bash")
            .arg("-c")
            .arg(Self::wrap(command, workdir));
        // A caller dropping the exec future (timeout) must reap the
        // host-side docker client instead of orphaning it
        cmd.kill_on_drop(true);
        cmd
    }

    async fn read_file(&self, path: &str) -> Result<String, RuntimeError> {
        let out = Command::new("docker")
            .args(["exec", &self.container, "cat", path])
            .output()
            .await
            .map_err(RuntimeError::Spawn)?;
        if !out.status.success() {
            return Err(RuntimeError::CpuCounter(format!("cannot read {path}")));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn exec(&self, command: &str, workdir: Option<&str>) -> Result<ExecOutput, RuntimeError> {
        let out = self
            .exec_command(command, workdir)
            .output()
            .await
            .map_err(RuntimeError::Spawn)?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(ExecOutput { exit_code: out.status.code(), output })
    }

    async fn exec_streamed(
        &self,
        command: &str,
        workdir: Option<&str>,
    ) -> Result<mpsc::Receiver<StreamEvent>, RuntimeError> {
        let mut cmd = self.exec_command(command, workdir);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(RuntimeError::Spawn)?;
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut out_buf = [0u8; STREAM_BUF];
            let mut err_buf = [0u8; STREAM_BUF];
            let mut out_pending = Vec::new();
            let mut err_pending = Vec::new();

            // Drain both pipes to EOF, then reap the exit status. Interleaving
            // follows arrival order, which is all callers rely on.
            while stdout.is_some() || stderr.is_some() {
                tokio::select! {
                    got = read_bytes(&mut stdout, &mut out_buf, &mut out_pending), if stdout.is_some() => {
                        if !got {
                            stdout = None;
                        }
                        if let Some(chunk) = drain_utf8(&mut out_pending, stdout.is_none()) {
                            if tx.send(StreamEvent::Chunk(chunk)).await.is_err() {
                                return;
                            }
                        }
                    }
                    got = read_bytes(&mut stderr, &mut err_buf, &mut err_pending), if stderr.is_some() => {
                        if !got {
                            stderr = None;
                        }
                        if let Some(chunk) = drain_utf8(&mut err_pending, stderr.is_none()) {
                            if tx.send(StreamEvent::Chunk(chunk)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }

            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(error = %err, "failed to reap streamed child");
                    None
                }
            };
            let _ = tx.send(StreamEvent::Exited(code)).await;
        });

        Ok(rx)
    }

    async fn cpu_usage_ns(&self) -> Result<u64, RuntimeError> {
        // cgroup v2 first, v1 fallback
        if let Ok(stat) = self.read_file("/sys/fs/cgroup/cpu.stat").await {
            for line in stat.lines() {
                if let Some(usec) = line.strip_prefix("usage_usec ") {
                    if let Ok(v) = usec.trim().parse::<u64>() {
                        return Ok(v * 1_000);
                    }
                }
            }
        }
        let raw = self.read_file("/sys/fs/cgroup/cpuacct/cpuacct.usage").await?;
        raw.trim()
            .parse()
            .map_err(|_| RuntimeError::CpuCounter(format!("unparseable counter: {raw}")))
    }

    async fn signal(&self, process_names: &[String], signal: Signal) -> Result<(), RuntimeError> {
        for name in process_names {
            let result = Command::new("docker")
                .args(["exec", &self.container, "pkill", &format!("-{}", signal.as_str()), "-f", name])
                .output()
                .await;
            match result {
                // pkill exits 1 when nothing matched; that is fine here
                Ok(out) => {
                    debug!(process = %name, signal = signal.as_str(), code = ?out.status.code(), "sent signal")
                }
                Err(err) => {
                    warn!(process = %name, signal = signal.as_str(), error = %err, "signal delivery failed")
                }
            }
        }
        Ok(())
    }
}

/// Read once from an optional pipe into `pending`; `false` means EOF or read
/// failure. Only polled while the pipe is present (select! guards above).
async fn read_bytes<R>(pipe: &mut Option<R>, buf: &mut [u8], pending: &mut Vec<u8>) -> bool
where
    R: tokio::io::AsyncRead + Unpin,
{
    match pipe {
        Some(reader) => match reader.read(buf).await {
            Ok(0) | Err(_) => false,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                true
            }
        },
        None => false,
    }
}

/// Decode the bytes accumulated so far, holding back a trailing incomplete
/// multibyte sequence until the reads that finish it arrive. At EOF the
/// holdback is flushed lossily.
fn drain_utf8(pending: &mut Vec<u8>, eof: bool) -> Option<String> {
    let keep = if eof { 0 } else { incomplete_suffix_len(pending) };
    let take = pending.len() - keep;
    if take == 0 {
        return None;
    }
    let chunk: Vec<u8> = pending.drain(..take).collect();
    Some(String::from_utf8_lossy(&chunk).into_owned())
}

/// Length of a trailing UTF-8 sequence still missing continuation bytes;
/// 0 when the buffer ends on a complete (or outright invalid) boundary.
fn incomplete_suffix_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let b = bytes[bytes.len() - back];
        if b & 0b1100_0000 == 0b1100_0000 {
            // Leading byte: its high bits give the sequence length
            let need = if b >= 0xF0 {
                4
            } else if b >= 0xE0 {
                3
            } else {
                2
            };
            return if need > back { back } else { 0 };
        }
        if b & 0b1100_0000 != 0b1000_0000 {
            return 0;
        }
    }
    0
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
