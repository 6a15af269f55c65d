//! 文件传输
//!
//! push：复制后把目标文件属主修复为父目录属主（owner:owner）
//! pull：只复制

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::exec::{CapturedOutput, ExecOptions};
use crate::domain::target::Target;
use crate::domain::transfer::{TransferDirection, TransferOutput, TransferRequest};
use crate::error::ExecError;
use crate::infra::command::run_captured;
use crate::infra::shell::single_quote;
use crate::infra::{resolve_target, HostRegistry, Transport};

/// 属主修复命令：读取父目录属主并 chown 目标文件
pub fn ownership_repair_command(remote_path: &str) -> String {
    let quoted = single_quote(remote_path);
    format!(
        "owner=$(stat -c%U \"$(dirname {path})\") && chown \"$owner:$owner\" {path}",
        path = quoted
    )
}

/// 文件传输执行器
pub struct FileTransferRunner {
    registry: Arc<dyn HostRegistry>,
    transport: Transport,
    options: ExecOptions,
}

impl FileTransferRunner {
    pub fn new(registry: Arc<dyn HostRegistry>, transport: Transport, options: ExecOptions) -> Self {
        Self {
            registry,
            transport,
            options,
        }
    }

    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutput, ExecError> {
        let target = resolve_target(self.registry.as_ref(), &request.target).await?;
        info!(
            target_host = %target,
            direction = request.direction.as_str(),
            local_path = %request.local_path,
            remote_path = %request.remote_path,
            "Starting file transfer"
        );

        let copy_cmd = self.transport.copy_command(
            &target,
            &request.local_path,
            &request.remote_path,
            request.direction,
        );
        let copied = run_captured(copy_cmd, &self.options).await?;
        if !copied.exit.success() {
            warn!(target_host = %target, exit = %copied.exit.describe(), "File copy failed");
            return Err(ExecError::execution_failed(copied.exit, copied.output));
        }

        let output = match request.direction {
            TransferDirection::Push => {
                self.repair_ownership(&target, &request.remote_path, copied.output)
                    .await?
            }
            TransferDirection::Pull => copied.output,
        };

        info!(target_host = %target, direction = request.direction.as_str(), "File transfer completed");
        Ok(TransferOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            extra_fields: request.extra_fields.clone(),
        })
    }

    async fn repair_ownership(
        &self,
        target: &Target,
        remote_path: &str,
        copy_output: CapturedOutput,
    ) -> Result<CapturedOutput, ExecError> {
        let cmd = self
            .transport
            .shell_command(target, &ownership_repair_command(remote_path));

        let (message, step_output) = match run_captured(cmd, &self.options).await {
            Ok(done) if done.exit.success() => return Ok(copy_output.append(&done.output)),
            Ok(done) => {
                let message = ExecError::execution_failed(done.exit, done.output.clone()).to_string();
                (message, done.output)
            }
            Err(e) => (e.to_string(), e.captured()),
        };

        warn!(target_host = %target, remote_path = %remote_path, error = %message, "Ownership repair failed");
        Err(ExecError::TransferFollowupFailed {
            message,
            output: copy_output.append(&step_output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exec::ExecResponse;
    use crate::services::executor::testing::{registry, transport};
    use std::path::Path;
    use std::time::Duration;

    /// 记录 follow-up 命令的本机 shell：`sh <script> -c <command>`
    fn recording_transport(dir: &Path, exit_code: i32) -> (Transport, std::path::PathBuf) {
        let log = dir.join("followups.log");
        let script = dir.join("record.sh");
        std::fs::write(
            &script,
            format!(
                "printf '%s\\n' \"$2\" >> '{}'\necho 'chown: not permitted' >&2\nexit {}\n",
                log.display(),
                exit_code
            ),
        )
        .unwrap();
        let transport = transport().with_local_shell("sh", [script.to_string_lossy().to_string(), "-c".to_string()]);
        (transport, log)
    }

    fn runner(transport: Transport, hosts: &[&str]) -> FileTransferRunner {
        FileTransferRunner::new(
            registry(hosts),
            transport,
            ExecOptions::new(Duration::from_secs(10), 1024 * 1024),
        )
    }

    fn followups(log: &Path) -> Vec<String> {
        std::fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_ownership_repair_command() {
        assert_eq!(
            ownership_repair_command("/srv/app/it's.conf"),
            "owner=$(stat -c%U \"$(dirname '/srv/app/it'\\''s.conf')\") && chown \"$owner:$owner\" '/srv/app/it'\\''s.conf'"
        );
    }

    #[tokio::test]
    async fn test_push_runs_one_followup() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, log) = recording_transport(dir.path(), 0);
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        std::fs::write(&src, "payload").unwrap();

        let request = TransferRequest::new(
            "localhost",
            src.to_string_lossy(),
            dst.to_string_lossy(),
            TransferDirection::Push,
        )
        .with_extra_fields(serde_json::json!({"job": 7}));
        let output = runner(transport, &[]).transfer(&request).await.unwrap();

        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "payload");
        assert_eq!(output.extra_fields["job"], 7);
        let recorded = followups(&log);
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].contains("chown"));
        assert!(recorded[0].contains(&dst.to_string_lossy().to_string()));
    }

    #[tokio::test]
    async fn test_push_followup_failure_fails_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, log) = recording_transport(dir.path(), 1);
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        std::fs::write(&src, "payload").unwrap();

        let request = TransferRequest::new(
            "localhost",
            src.to_string_lossy(),
            dst.to_string_lossy(),
            TransferDirection::Push,
        );
        let err = runner(transport, &[]).transfer(&request).await.unwrap_err();

        assert!(dst.exists());
        assert_eq!(followups(&log).len(), 1);
        assert_eq!(err.kind(), "transfer_followup_failed");
        assert!(err.to_string().contains("chown: not permitted"));
        assert!(err.captured().stderr.contains("chown: not permitted"));

        let response = ExecResponse::from(Err(err));
        assert!(!response.success);
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn test_pull_has_no_followup() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, log) = recording_transport(dir.path(), 0);
        let remote = dir.path().join("remote.txt");
        let local = dir.path().join("local.txt");
        std::fs::write(&remote, "from remote").unwrap();

        let request = TransferRequest::new(
            "127.0.0.1",
            local.to_string_lossy(),
            remote.to_string_lossy(),
            TransferDirection::Pull,
        );
        runner(transport, &[]).transfer(&request).await.unwrap();

        assert_eq!(std::fs::read_to_string(&local).unwrap(), "from remote");
        assert!(followups(&log).is_empty());
    }

    #[tokio::test]
    async fn test_copy_failure_skips_followup() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, log) = recording_transport(dir.path(), 0);
        let request = TransferRequest::new(
            "localhost",
            dir.path().join("missing.txt").to_string_lossy(),
            dir.path().join("dst.txt").to_string_lossy(),
            TransferDirection::Push,
        );
        let err = runner(transport, &[]).transfer(&request).await.unwrap_err();
        assert_eq!(err.kind(), "execution_failed");
        assert!(followups(&log).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, log) = recording_transport(dir.path(), 0);
        let request = TransferRequest::new("game-09", "/tmp/a", "/tmp/b", TransferDirection::Push);
        let err = runner(transport, &["game-01"]).transfer(&request).await.unwrap_err();
        assert!(matches!(err, ExecError::TargetNotFound { .. }));
        assert!(followups(&log).is_empty());
    }

    #[tokio::test]
    async fn test_remote_copy_uses_scp_program() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, _) = recording_transport(dir.path(), 0);
        let request = TransferRequest::new("game-01", "/tmp/a", "/tmp/b", TransferDirection::Pull);
        let err = runner(transport, &["game-01"]).transfer(&request).await.unwrap_err();
        assert_eq!(err.kind(), "spawn_failed");
    }
}
