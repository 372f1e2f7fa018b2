use super::{forward_lines, PgDump, PgRestore};
use crate::config::Side;
use crate::error::{PgTransferError, Result};
use std::process::{ExitStatus, Stdio};
use tokio::process::Child;
use tokio::task::JoinSet;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info};

const PRODUCER: &str = "pg_dump";
const CONSUMER: &str = "pg_restore";

type Forwarders = JoinSet<(&'static str, usize)>;

/// Streams a pg_dump archive straight into pg_restore.
///
/// The archive bytes travel through a single OS pipe from the producer's
/// stdout to the consumer's stdin; nothing in this process buffers them.
/// The transfer is not transactional: a failed run can leave the target
/// partially restored.
pub struct DumpRestorePipeline {
    dump: PgDump,
    restore: PgRestore,
}

impl DumpRestorePipeline {
    pub fn new(dump: PgDump, restore: PgRestore) -> Self {
        Self { dump, restore }
    }

    pub async fn run(self) -> Result<()> {
        let mut forwarders = Forwarders::new();

        // The consumer goes first so the pipe has a reader before any archive bytes exist
        let mut consumer = self.spawn_consumer(&mut forwarders)?;

        let archive = match take_archive_pipe(&mut consumer) {
            Ok(archive) => archive,
            Err(err) => {
                abort(consumer, &mut forwarders).await;
                return Err(err);
            }
        };

        let mut producer = match self.spawn_producer(archive, &mut forwarders) {
            Ok(producer) => producer,
            Err(err) => {
                abort(consumer, &mut forwarders).await;
                return Err(err);
            }
        };

        let (dump_status, restore_status) = tokio::join!(producer.wait(), consumer.wait());
        drain(&mut forwarders).await;

        check_exit(PRODUCER, Side::Source, dump_status)?;
        check_exit(CONSUMER, Side::Target, restore_status)?;

        info!("Database successfully transferred");
        Ok(())
    }

    fn spawn_consumer(&self, forwarders: &mut Forwarders) -> Result<Child> {
        let target = self.restore.endpoint();
        info!(
            "Starting pg_restore into target database: {} on host: {}",
            target.dbname, target.host
        );
        debug!("Running: {}", self.restore.command_line());

        let mut child =
            self.restore
                .command()
                .spawn()
                .map_err(|source| PgTransferError::ProcessStart {
                    tool: CONSUMER,
                    side: Side::Target,
                    source,
                })?;

        if let Some(stderr) = child.stderr.take() {
            forwarders.spawn(forward_lines(stderr, CONSUMER).with_current_subscriber());
        }
        Ok(child)
    }

    /// The command, and with it the parent's copy of the pipe's write end,
    /// is dropped on return so the consumer sees end-of-stream when pg_dump exits.
    fn spawn_producer(&self, archive: Stdio, forwarders: &mut Forwarders) -> Result<Child> {
        let source = self.dump.endpoint();
        info!(
            "Starting pg_dump from source database: {} on host: {}",
            source.dbname, source.host
        );
        debug!("Running: {}", self.dump.command_line());

        let mut cmd = self.dump.command();
        cmd.stdout(archive);

        let mut child = cmd.spawn().map_err(|source| PgTransferError::ProcessStart {
            tool: PRODUCER,
            side: Side::Source,
            source,
        })?;

        if let Some(stderr) = child.stderr.take() {
            forwarders.spawn(forward_lines(stderr, PRODUCER).with_current_subscriber());
        }
        Ok(child)
    }
}

/// Detach the consumer's stdin so it can become the producer's stdout
fn take_archive_pipe(consumer: &mut Child) -> Result<Stdio> {
    let stdin = consumer
        .stdin
        .take()
        .ok_or_else(|| PgTransferError::PipelineSetup("pg_restore stdin was not captured".into()))?;

    stdin.try_into().map_err(|err: std::io::Error| {
        PgTransferError::PipelineSetup(format!("error creating pipe: {}", err))
    })
}

async fn abort(mut consumer: Child, forwarders: &mut Forwarders) {
    if let Err(err) = consumer.kill().await {
        debug!("Failed to stop pg_restore: {}", err);
    }
    drain(forwarders).await;
}

/// Wait for every forwarder so all diagnostics are logged before the outcome
async fn drain(forwarders: &mut Forwarders) {
    while let Some(joined) = forwarders.join_next().await {
        if let Ok((tool, lines)) = joined {
            debug!("Forwarded {} diagnostic lines from {}", lines, tool);
        }
    }
}

fn check_exit(tool: &'static str, side: Side, status: std::io::Result<ExitStatus>) -> Result<()> {
    let status = status.map_err(|err| {
        PgTransferError::PipelineSetup(format!("error waiting for {}: {}", tool, err))
    })?;

    if !status.success() {
        return Err(PgTransferError::ProcessExecution { tool, side, status });
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, RestoreOptions, Secret, TransferMode};
    use crate::test_support::{capture_logs, fake_tool};
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    fn endpoint(host: &str, password: &str) -> EndpointConfig {
        EndpointConfig {
            host: host.to_string(),
            port: "5432".to_string(),
            user: "postgres".to_string(),
            password: Secret::new(password),
            dbname: "inventory".to_string(),
        }
    }

    fn pipeline(dir: &Path, dump_body: &str, restore_body: &str) -> DumpRestorePipeline {
        let pg_dump = fake_tool(dir, "pg_dump", dump_body);
        let pg_restore = fake_tool(dir, "pg_restore", restore_body);
        DumpRestorePipeline::new(
            PgDump::new(pg_dump, endpoint("source-host", "source-pw")),
            PgRestore::new(pg_restore, endpoint("target-host", "target-pw")),
        )
    }

    #[tokio::test]
    async fn test_archive_streams_from_dump_to_restore() {
        let (_guard, logs) = capture_logs();
        let dir = tempfile::tempdir().unwrap();
        let received = dir.path().join("received");

        let pipeline = pipeline(
            dir.path(),
            "echo 'reading schemas' >&2\nprintf 'PGDMP-archive-bytes'",
            &format!(
                "cat > '{}'\necho 'processing data for table \"public.items\"' >&2",
                received.display()
            ),
        );

        pipeline.run().await.unwrap();

        assert_eq!(fs::read_to_string(&received).unwrap(), "PGDMP-archive-bytes");
        let output = logs.contents();
        assert!(output.contains("pg_dump: reading schemas"));
        assert!(output.contains("pg_restore: processing data for table"));
        assert!(output.contains("Database successfully transferred"));
    }

    #[tokio::test]
    async fn test_consumer_starts_before_producer() {
        let (_guard, logs) = capture_logs();
        let dir = tempfile::tempdir().unwrap();

        pipeline(dir.path(), "printf data", "cat > /dev/null")
            .run()
            .await
            .unwrap();

        let output = logs.contents();
        let consumer = output.find("Starting pg_restore").unwrap();
        let producer = output.find("Starting pg_dump").unwrap();
        assert!(consumer < producer);
    }

    #[tokio::test]
    async fn test_producer_failure_is_reported() {
        let (_guard, logs) = capture_logs();
        let dir = tempfile::tempdir().unwrap();

        let err = pipeline(
            dir.path(),
            "echo 'pg_dump: error: connection to server failed' >&2\nexit 1",
            "cat > /dev/null",
        )
        .run()
        .await
        .unwrap_err();

        match err {
            PgTransferError::ProcessExecution { tool, side, status } => {
                assert_eq!(tool, "pg_dump");
                assert_eq!(side, Side::Source);
                assert_eq!(status.code(), Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let output = logs.contents();
        assert!(output.contains("connection to server failed"));
        assert!(!output.contains("Database successfully transferred"));
    }

    #[tokio::test]
    async fn test_consumer_failure_is_reported_even_if_producer_succeeds() {
        let (_guard, logs) = capture_logs();
        let dir = tempfile::tempdir().unwrap();

        let err = pipeline(
            dir.path(),
            "printf 'PGDMP'",
            "cat > /dev/null\necho 'pg_restore: error: relation already exists' >&2\nexit 1",
        )
        .run()
        .await
        .unwrap_err();

        match err {
            PgTransferError::ProcessExecution { tool, side, .. } => {
                assert_eq!(tool, "pg_restore");
                assert_eq!(side, Side::Target);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!logs.contents().contains("Database successfully transferred"));
    }

    #[tokio::test]
    async fn test_passwords_scoped_to_each_process() {
        let dir = tempfile::tempdir().unwrap();
        let dump_seen = dir.path().join("dump_seen");
        let restore_seen = dir.path().join("restore_seen");

        pipeline(
            dir.path(),
            &format!(
                "echo \"$PGPASSWORD $*\" > '{}'\nprintf x",
                dump_seen.display()
            ),
            &format!(
                "cat > /dev/null\necho \"$PGPASSWORD $*\" > '{}'",
                restore_seen.display()
            ),
        )
        .run()
        .await
        .unwrap();

        let dump_seen = fs::read_to_string(&dump_seen).unwrap();
        let (password, args) = dump_seen.trim().split_once(' ').unwrap();
        assert_eq!(password, "source-pw");
        assert!(!args.contains("pw"));
        assert!(args.contains("-F c"));

        let restore_seen = fs::read_to_string(&restore_seen).unwrap();
        let (password, args) = restore_seen.trim().split_once(' ').unwrap();
        assert_eq!(password, "target-pw");
        assert!(!args.contains("pw"));
        assert!(args.contains("-d inventory"));
    }

    #[tokio::test]
    async fn test_mode_and_options_reach_the_tools() {
        let dir = tempfile::tempdir().unwrap();
        let dump_args = dir.path().join("dump_args");
        let restore_args = dir.path().join("restore_args");
        let pg_dump = fake_tool(
            dir.path(),
            "pg_dump",
            &format!("echo \"$@\" > '{}'", dump_args.display()),
        );
        let pg_restore = fake_tool(
            dir.path(),
            "pg_restore",
            &format!("cat > /dev/null\necho \"$@\" > '{}'", restore_args.display()),
        );

        DumpRestorePipeline::new(
            PgDump::new(pg_dump, endpoint("a", "x")).mode(TransferMode::SchemaOnly),
            PgRestore::new(pg_restore, endpoint("b", "y")).options(RestoreOptions {
                clean: true,
                no_owner: false,
            }),
        )
        .run()
        .await
        .unwrap();

        assert!(fs::read_to_string(&dump_args)
            .unwrap()
            .contains("--schema-only -- inventory"));
        assert!(fs::read_to_string(&restore_args)
            .unwrap()
            .contains("--clean --if-exists"));
    }

    /// Zombies count as exited: they are gone once tokio reaps them.
    async fn is_running(pid: &str) -> bool {
        let stat = tokio::process::Command::new("ps")
            .args(["-o", "stat=", "-p", pid])
            .output()
            .await
            .unwrap();
        let stat = String::from_utf8_lossy(&stat.stdout);
        let stat = stat.trim();
        !stat.is_empty() && !stat.starts_with('Z')
    }

    #[tokio::test]
    async fn test_dropping_transfer_kills_both_tools() {
        let dir = tempfile::tempdir().unwrap();
        let dump_pid = dir.path().join("dump_pid");
        let restore_pid = dir.path().join("restore_pid");

        let pipeline = pipeline(
            dir.path(),
            &format!("echo $$ > '{}'\nexec sleep 30", dump_pid.display()),
            &format!("echo $$ > '{}'\nexec sleep 30", restore_pid.display()),
        );

        let outcome = tokio::time::timeout(Duration::from_millis(500), pipeline.run()).await;
        assert!(outcome.is_err(), "transfer finished before the timeout");

        for pid_file in [&dump_pid, &restore_pid] {
            let pid = fs::read_to_string(pid_file).unwrap();
            let pid = pid.trim();

            let mut running = true;
            for _ in 0..50 {
                if !is_running(pid).await {
                    running = false;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            assert!(!running, "process {pid} survived the dropped transfer");
        }
    }

    #[tokio::test]
    async fn test_missing_producer_stops_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let pg_restore = fake_tool(dir.path(), "pg_restore", "cat > /dev/null");

        let err = DumpRestorePipeline::new(
            PgDump::new(dir.path().join("missing-pg_dump"), endpoint("a", "x")),
            PgRestore::new(pg_restore, endpoint("b", "y")),
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PgTransferError::ProcessStart { tool: "pg_dump", .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_consumer_starts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("dump_ran");
        let pg_dump = fake_tool(
            dir.path(),
            "pg_dump",
            &format!("touch '{}'", marker.display()),
        );

        let err = DumpRestorePipeline::new(
            PgDump::new(pg_dump, endpoint("a", "x")),
            PgRestore::new(dir.path().join("missing-pg_restore"), endpoint("b", "y")),
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PgTransferError::ProcessStart { tool: "pg_restore", side: Side::Target, .. }
        ));
        assert!(!marker.exists());
    }
}
