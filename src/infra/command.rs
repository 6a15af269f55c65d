//! 命令执行器
//!
//! 提供两种执行方式：
//! - `run_captured`：缓冲输出，带超时和输出上限
//! - `run_streaming`：逐行转发 stdout/stderr，支持取消
//!
//! 所有子进程都以 `kill_on_drop(true)` 启动，任何失败路径都会杀死并回收子进程

use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::domain::exec::{CapturedOutput, ExecOptions, ExitInfo};
use crate::error::ExecError;

/// 输出来源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// 一行输出（已去掉行尾的 `\n` / `\r\n`）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub content: String,
}

/// 缓冲执行的结果
#[derive(Debug)]
pub struct Completed {
    pub output: CapturedOutput,
    pub exit: ExitInfo,
}

/// 流式执行的结束方式
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Exited(ExitInfo),
    Cancelled,
}

/// 启动子进程：stdin 关闭，stdout/stderr 管道，drop 时杀死
///
/// unix 下子进程自成一个进程组，`reap` 会连同它派生的进程一起杀死
pub fn spawn_piped(cmd: &mut Command) -> Result<Child, ExecError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    #[cfg(unix)]
    cmd.process_group(0);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| {
            error!(program = %program, error = %source, "Failed to spawn command");
            ExecError::SpawnFailed { program, source }
        })
}

/// 把 ExitStatus 转换为退出码 / 信号名
pub fn exit_info(status: ExitStatus) -> ExitInfo {
    if let Some(code) = status.code() {
        return ExitInfo::exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitInfo::signaled(signal_name(signal));
        }
    }

    ExitInfo::default()
}

#[cfg(unix)]
fn signal_name(signal: i32) -> String {
    nix::sys::signal::Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("SIG{}", signal))
}

enum Capture {
    Overflow,
    Io(std::io::Error),
}

/// 读到 EOF，超过 limit 字节时返回 Overflow（缓冲区保留前 limit 字节）
async fn read_capped<R>(reader: Option<R>, buf: &mut Vec<u8>, limit: usize) -> Result<(), Capture>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(());
    };

    let cap = (limit as u64).saturating_add(1);
    reader.take(cap).read_to_end(buf).await.map_err(Capture::Io)?;

    if buf.len() > limit {
        buf.truncate(limit);
        return Err(Capture::Overflow);
    }
    Ok(())
}

/// 向整个进程组发送 SIGKILL（组已不存在时忽略）
#[cfg(unix)]
fn kill_group(pgid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pgid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: Option<u32>) {}

/// 杀死进程组并等待子进程退出
async fn reap(child: &mut Child, pgid: Option<u32>) {
    kill_group(pgid);
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill child process");
    }
}

/// 执行命令并缓冲输出
///
/// 超时或任一输出流超过上限时，子进程被杀死并回收，返回已捕获的部分输出
pub async fn run_captured(mut cmd: Command, options: &ExecOptions) -> Result<Completed, ExecError> {
    let mut child = spawn_piped(&mut cmd)?;
    let pgid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let limit = options.max_output_bytes;

    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();

    let outcome = tokio::time::timeout(options.timeout, async {
        tokio::try_join!(
            read_capped(stdout, &mut out_buf, limit),
            read_capped(stderr, &mut err_buf, limit)
        )?;
        let status = child.wait().await.map_err(Capture::Io)?;
        Ok::<ExitStatus, Capture>(status)
    })
    .await;

    match outcome {
        Ok(Ok(status)) => Ok(Completed {
            output: CapturedOutput::from_bytes(&out_buf, &err_buf),
            exit: exit_info(status),
        }),
        Ok(Err(Capture::Overflow)) => {
            warn!(limit, "Command output exceeded limit, killing process");
            reap(&mut child, pgid).await;
            Err(ExecError::OutputTooLarge {
                limit,
                output: CapturedOutput::from_bytes(&out_buf, &err_buf),
            })
        }
        Ok(Err(Capture::Io(e))) => {
            reap(&mut child, pgid).await;
            Err(ExecError::WaitFailed(e))
        }
        Err(_) => {
            warn!(timeout = ?options.timeout, "Command timed out, killing process");
            reap(&mut child, pgid).await;
            Err(ExecError::Timeout {
                after: options.timeout,
                output: CapturedOutput::from_bytes(&out_buf, &err_buf),
            })
        }
    }
}

/// 行内的 `\r`（进度条刷新）也视为分行，由此产生的空片段被丢弃
fn split_carriage_returns(line: &str) -> Vec<&str> {
    if !line.contains('\r') {
        return vec![line];
    }
    line.split('\r').filter(|piece| !piece.is_empty()).collect()
}

/// 逐行读取并转发，接收端关闭后停止
async fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                let content = String::from_utf8_lossy(&buf);
                let mut closed = false;
                for piece in split_carriage_returns(&content) {
                    let line = OutputLine {
                        stream,
                        content: piece.to_string(),
                    };
                    if tx.send(line).await.is_err() {
                        closed = true;
                        break;
                    }
                }
                if closed {
                    break;
                }
            }
            Err(e) => {
                debug!(stream = stream.as_str(), error = %e, "Output reader stopped");
                break;
            }
        }
    }
}

/// 执行命令并逐行转发输出
///
/// 返回前所有输出行都已发送到 `line_tx`；取消时子进程被杀死并回收
pub async fn run_streaming(
    mut cmd: Command,
    line_tx: mpsc::Sender<OutputLine>,
    cancel: CancellationToken,
) -> Result<StreamOutcome, ExecError> {
    let mut child = spawn_piped(&mut cmd)?;
    let pgid = child.id();

    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(
            stdout,
            OutputStream::Stdout,
            line_tx.clone(),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(
            stderr,
            OutputStream::Stderr,
            line_tx.clone(),
        )));
    }
    drop(line_tx);

    let aborts: Vec<_> = readers.iter().map(|h| h.abort_handle()).collect();
    let abort_readers = || aborts.iter().for_each(|a| a.abort());

    // 等待命令完成，支持取消
    let status = tokio::select! {
        _ = cancel.cancelled() => {
            warn!("Streaming command cancelled, killing process");
            reap(&mut child, pgid).await;
            abort_readers();
            return Ok(StreamOutcome::Cancelled);
        }
        status = child.wait() => status.map_err(ExecError::WaitFailed)?,
    };

    // 等待输出读取完成
    let drained = tokio::select! {
        _ = cancel.cancelled() => false,
        _ = futures::future::join_all(readers) => true,
    };
    if !drained {
        // 主进程已退出，但派生进程仍占用输出管道
        kill_group(pgid);
        abort_readers();
        return Ok(StreamOutcome::Cancelled);
    }

    Ok(StreamOutcome::Exited(exit_info(status)))
}
