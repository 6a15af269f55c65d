//! 流式命令执行
//!
//! 输出逐行作为 data 事件推送到 sink，最后恰好推送一个终止事件（done / error）。
//! sink 的接收端被丢弃即视为客户端断开，子进程随即被杀死

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::env::constants::STREAM_CHANNEL_CAPACITY;
use crate::domain::stream::StreamEvent;
use crate::infra::command::{run_streaming, StreamOutcome};
use crate::infra::{resolve_target, HostRegistry, Transport};

/// 流式执行器
pub struct StreamingExecutor {
    registry: Arc<dyn HostRegistry>,
    transport: Transport,
}

impl StreamingExecutor {
    pub fn new(registry: Arc<dyn HostRegistry>, transport: Transport) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// 执行并推送事件，流到达终止状态后返回
    pub async fn stream(&self, target: &str, command: &str, sink: mpsc::Sender<StreamEvent>) {
        self.stream_with_cancel(target, command, sink, CancellationToken::new())
            .await
    }

    /// 同 `stream`，额外响应外部取消
    pub async fn stream_with_cancel(
        &self,
        target: &str,
        command: &str,
        sink: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) {
        let target = match resolve_target(self.registry.as_ref(), target).await {
            Ok(target) => target,
            Err(e) => {
                let _ = sink.send(StreamEvent::error(e.to_string())).await;
                return;
            }
        };

        info!(target_host = %target, "Streaming command");
        let cmd = self.transport.shell_command(&target, command);

        let (line_tx, mut line_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let run_cancel = cancel.child_token();
        // 本 future 被丢弃时同样终止子进程
        let _guard = run_cancel.clone().drop_guard();
        let run = tokio::spawn(run_streaming(cmd, line_tx, run_cancel.clone()));

        loop {
            tokio::select! {
                _ = sink.closed() => {
                    warn!(target_host = %target, "Stream consumer disconnected, cancelling");
                    run_cancel.cancel();
                    break;
                }
                line = line_rx.recv() => match line {
                    Some(line) if line.content.is_empty() => {}
                    Some(line) => {
                        if sink.send(StreamEvent::Data(line.content)).await.is_err() {
                            run_cancel.cancel();
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        let terminal = match run.await {
            Ok(Ok(StreamOutcome::Exited(exit))) => {
                info!(target_host = %target, exit = %exit.describe(), "Streaming command finished");
                StreamEvent::Done(exit)
            }
            Ok(Ok(StreamOutcome::Cancelled)) => {
                if sink.is_closed() {
                    return;
                }
                StreamEvent::error("Command cancelled")
            }
            Ok(Err(e)) => StreamEvent::error(e.to_string()),
            Err(e) => StreamEvent::error(format!("Streaming task failed: {}", e)),
        };

        let _ = sink.send(terminal).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exec::ExitInfo;
    use crate::services::executor::testing::{executor, registry, transport};
    use std::time::Duration;

    fn streamer(hosts: &[&str]) -> StreamingExecutor {
        StreamingExecutor::new(registry(hosts), transport())
    }

    async fn collect(streamer: &StreamingExecutor, target: &str, command: &str) -> Vec<StreamEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        streamer.stream(target, command, tx).await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_stream_lines_then_done() {
        let events = collect(&streamer(&[]), "localhost", "echo one; echo; echo two").await;
        assert_eq!(
            events,
            vec![
                StreamEvent::data("one"),
                StreamEvent::data("two"),
                StreamEvent::Done(ExitInfo::exited(0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_non_zero_exit_is_done() {
        let events = collect(&streamer(&[]), "localhost", "echo bye; exit 9").await;
        assert_eq!(events.last(), Some(&StreamEvent::Done(ExitInfo::exited(9))));
        assert_eq!(events.last().map(|e| e.payload()), Some("exit 9".to_string()));
    }

    #[tokio::test]
    async fn test_stream_unknown_target_single_error() {
        let events = collect(&streamer(&["game-01"]), "game-02", "echo hi").await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error(m) if m.contains("game-02")));
    }

    #[tokio::test]
    async fn test_stream_spawn_failure_is_error() {
        let events = collect(&streamer(&["game-01"]), "game-01", "echo hi").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "error");
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let events = collect(&streamer(&[]), "localhost", "for i in 1 2 3; do echo $i; echo e$i >&2; done").await;
        let terminals = events.iter().filter(|e| e.is_terminal()).count();
        assert_eq!(terminals, 1);
        assert!(events.last().unwrap().is_terminal());
        assert_eq!(events.iter().filter(|e| e.kind() == "data").count(), 6);
    }

    #[tokio::test]
    async fn test_stream_matches_unary_stdout() {
        let command = "printf 'alpha\\nbeta\\ngamma\\n'";
        let unary = executor(&[]).run("localhost", command).await.unwrap();
        let events = collect(&streamer(&[]), "localhost", command).await;
        let streamed: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Data(line) => Some(line.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(unary.stdout.lines().collect::<Vec<_>>(), streamed);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_disconnect_kills_process_group() {
        use crate::infra::command::testing::{read_pid_file, wait_gone};

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let pid_file = dir.path().join("sleep.pid");
        let command = format!(
            "sleep 30 & echo $! > '{}'; echo ready; wait; touch '{}'",
            pid_file.display(),
            marker.display()
        );

        let (tx, mut rx) = mpsc::channel(8);
        let streamer = Arc::new(streamer(&[]));
        let task = {
            let streamer = streamer.clone();
            tokio::spawn(async move { streamer.stream("localhost", &command, tx).await })
        };

        assert_eq!(rx.recv().await, Some(StreamEvent::data("ready")));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("stream did not stop after disconnect")
            .unwrap();

        let pid = read_pid_file(&pid_file).await;
        assert!(wait_gone(pid).await, "background sleep {} survived", pid);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_external_cancel_ends_with_error() {
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let streamer = streamer(&[]);

        let run = streamer.stream_with_cancel("localhost", "echo ready; sleep 30", tx, cancel);
        let watcher = async {
            assert_eq!(rx.recv().await, Some(StreamEvent::data("ready")));
            trigger.cancel();
        };
        tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, watcher) })
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(StreamEvent::error("Command cancelled")));
        assert_eq!(rx.recv().await, None);
    }
}
