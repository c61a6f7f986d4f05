// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Exec bridge: runs the command a client requested on a session channel
//! and wires the subprocess's stdio to that channel.
//!
//! ```text
//! channel data ──mpsc──▶ stdin task ──▶ child stdin
//! child stdout ──▶ channel data
//! child stderr ──▶ channel extended data (1)
//! child exit   ──▶ eof, exit-status, close
//! ```

use russh::server::Handle;
use russh::{ChannelId, CryptoVec};
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

/// Process exited with status 0
pub const EXIT_SUCCESS: u32 = 0;
/// Process exited with a non-zero status
pub const EXIT_FAILURE: u32 = 1;
/// Process was killed by a signal, could not be started or could not be waited on
pub const EXIT_ABNORMAL: u32 = 2;

/// SSH_EXTENDED_DATA_STDERR
const STDERR_STREAM: u32 = 1;

const COPY_BUFFER: usize = 32 * 1024;

/// Where and how exec commands run
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub shell: PathBuf,
    pub working_dir: PathBuf,
}

/// Collapse a process result into the status reported to the client
pub fn exit_status_code(status: &io::Result<ExitStatus>) -> u32 {
    match status {
        Ok(status) if status.success() => EXIT_SUCCESS,
        Ok(status) if status.code().is_some() => EXIT_FAILURE,
        Ok(_) => EXIT_ABNORMAL,
        Err(_) => EXIT_ABNORMAL,
    }
}

pub(crate) async fn run_exec(
    context: Arc<ExecContext>,
    command: String,
    channel: ChannelId,
    handle: Handle,
    stdin: mpsc::Receiver<Vec<u8>>,
) {
    trace!(?channel, "Command: '{}'", command);
    let spawned = Command::new(&context.shell)
        .arg("-c")
        .arg(&command)
        .current_dir(&context.working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let code = match spawned {
        Err(e) => {
            error!(?channel, "Failed to run command - {}", e);
            EXIT_ABNORMAL
        }
        Ok(mut child) => {
            trace!(?channel, pid = child.id(), "Command started");
            let stdin_task = tokio::spawn(forward_stdin(stdin, child.stdin.take()));
            let stdout = copy_to_channel(child.stdout.take(), &handle, channel, None);
            let stderr = copy_to_channel(child.stderr.take(), &handle, channel, Some(STDERR_STREAM));

            let (status, (), ()) = tokio::join!(child.wait(), stdout, stderr);
            // the client may never send eof; stop feeding a finished process
            stdin_task.abort();

            if let Err(e) = &status {
                error!(?channel, "Failed to wait - {}", e);
            }
            exit_status_code(&status)
        }
    };

    debug!(?channel, exit_status = code, "Command finished");
    if handle.eof(channel).await.is_err() {
        trace!(?channel, "Session gone before eof");
    }
    if handle.exit_status_request(channel, code).await.is_err() {
        warn!(?channel, "Failed to return exit-status");
    }
    let _ = handle.close(channel).await;
}

async fn forward_stdin(mut input: mpsc::Receiver<Vec<u8>>, stdin: Option<ChildStdin>) {
    let Some(mut stdin) = stdin else {
        return;
    };
    while let Some(chunk) = input.recv().await {
        if stdin.write_all(&chunk).await.is_err() {
            break;
        }
    }
    // dropping stdin delivers eof to the process
}

/// Copy a child output stream onto the channel until it closes
///
/// Output is still drained after the session goes away so the process never
/// blocks on a full pipe.
async fn copy_to_channel<R>(stream: Option<R>, handle: &Handle, channel: ChannelId, ext: Option<u32>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return;
    };
    let mut buf = vec![0u8; COPY_BUFFER];
    let mut connected = true;
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(?channel, "Failed to read command output - {}", e);
                break;
            }
        };
        if !connected {
            continue;
        }
        let data = CryptoVec::from_slice(&buf[..n]);
        let sent = match ext {
            Some(code) => handle.extended_data(channel, code, data).await,
            None => handle.data(channel, data).await,
        };
        if sent.is_err() {
            debug!(?channel, "Channel closed, discarding remaining output");
            connected = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_exit_status_translation() {
        assert_eq!(exit_status_code(&Ok(ExitStatus::from_raw(0))), EXIT_SUCCESS);
        // exit(3)
        assert_eq!(exit_status_code(&Ok(ExitStatus::from_raw(3 << 8))), EXIT_FAILURE);
        // SIGKILL
        assert_eq!(exit_status_code(&Ok(ExitStatus::from_raw(9))), EXIT_ABNORMAL);
        assert_eq!(
            exit_status_code(&Err(io::Error::other("wait failed"))),
            EXIT_ABNORMAL
        );
    }
}
