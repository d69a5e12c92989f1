//! 스크래퍼 프로세스 감독자.
//!
//! 실행 형식: `<program> <args...> <심볼 JSON 배열> <endpoint>`.
//! 작업 ID는 `SCRAPE_JOB_ID` 환경 변수로 전달됩니다.
//!
//! 마감 시간이 지나면 종료 신호(SIGTERM)를 보내고, 유예 시간 안에 끝나지
//! 않으면 강제 종료합니다. 이미 받은 출력과 무관하게 결과는 `Timeout`입니다.
//!
//! unix에서는 스크래퍼를 별도 프로세스 그룹으로 실행하고 신호를 그룹 전체에
//! 보내므로, 출력 파이프를 물려받은 손자 프로세스도 함께 정리됩니다.

use async_trait::async_trait;
use quote_core::{
    EndpointClass, FetchError, FetchResult, JobStatus, ScrapeJob, ScraperConfig,
    MAX_SCRAPER_TIMEOUT_SECS,
};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::validation::validate_payload;
use super::JobRunner;

/// 진단용으로 보관하는 stderr 최대 크기.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// 출력 수집 결과.
#[derive(Default)]
struct CapturedOutput {
    bytes: Vec<u8>,
    overflowed: bool,
}

/// 스크래퍼 프로세스 감독자.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    config: ScraperConfig,
}

impl ProcessSupervisor {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    fn command(&self, job: &ScrapeJob) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(job.symbols_json())
            .arg(job.endpoint.as_str())
            .env("SCRAPE_JOB_ID", job.id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// 작업 하나를 마감 시간 안에 실행하고 stdout을 JSON으로 파싱한 뒤
    /// 엔드포인트 규칙으로 검증합니다.
    ///
    /// 작업 상태는 이 함수가 끝날 때 항상 최종 상태이며, 검증까지 통과해야
    /// `Succeeded`가 됩니다.
    #[instrument(skip(self, job), fields(job_id = %job.id, endpoint = %job.endpoint))]
    pub async fn run_job(&self, job: &mut ScrapeJob) -> FetchResult<Value> {
        let timeout = self
            .config
            .timeout()
            .min(Duration::from_secs(MAX_SCRAPER_TIMEOUT_SECS));
        let started = Instant::now();
        let deadline = started + timeout;

        let mut child = match self.command(job).spawn() {
            Ok(child) => child,
            Err(e) => {
                mark(job, JobStatus::Failed);
                warn!(program = %self.config.program, error = %e, "Failed to launch scraper");
                return Err(FetchError::LaunchError(format!(
                    "{}: {}",
                    self.config.program, e
                )));
            }
        };
        mark(job, JobStatus::Running);
        // 그룹 리더의 pid가 곧 프로세스 그룹 id
        let pgid = child.id();
        debug!(pid = ?pgid, symbols = ?job.symbols, "Scraper spawned");

        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(read_capped(out, self.config.max_output_bytes)));
        let stderr_task = child.stderr.take().map(|err| tokio::spawn(read_stderr(err)));

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                abort_readers(&stdout_task, &stderr_task);
                mark(job, JobStatus::Failed);
                return Err(FetchError::Internal(format!("failed to wait for scraper: {}", e)));
            }
            Err(_) => {
                terminate(&mut child, pgid, self.config.kill_grace()).await;
                abort_readers(&stdout_task, &stderr_task);
                mark(job, JobStatus::TimedOut);
                warn!(timeout_ms = timeout.as_millis() as u64, "Scraper timed out and was terminated");
                return Err(timeout_error(timeout));
            }
        };

        // 자식이 출력 파이프를 넘겨준 손자 프로세스가 남아 있을 수 있으므로
        // 출력 수집도 같은 마감 시간을 따름
        let stdout = match join_reader(stdout_task, deadline).await {
            Some(output) => output,
            None => {
                kill_group(pgid);
                if let Some(task) = &stderr_task {
                    task.abort();
                }
                mark(job, JobStatus::TimedOut);
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Scraper exited but its output stayed open past the deadline"
                );
                return Err(timeout_error(timeout));
            }
        };
        let stderr = join_reader(stderr_task, deadline).await.unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr.bytes).trim().to_string();

        let elapsed_ms = started.elapsed().as_millis() as u64;

        if !status.success() {
            mark(job, JobStatus::Failed);
            warn!(code = ?status.code(), elapsed_ms, "Scraper exited with failure");
            return Err(FetchError::ProcessError {
                code: status.code(),
                stderr,
            });
        }

        if stdout.overflowed {
            mark(job, JobStatus::Failed);
            return Err(FetchError::MalformedOutput(format!(
                "scraper output exceeded {} bytes",
                self.config.max_output_bytes
            )));
        }

        let validated = serde_json::from_slice::<Value>(&stdout.bytes)
            .map_err(FetchError::from)
            .and_then(|value| validate_payload(job.endpoint, value));

        match validated {
            Ok(value) => {
                mark(job, JobStatus::Succeeded);
                info!(
                    elapsed_ms,
                    output_bytes = stdout.bytes.len(),
                    "Scraper job completed"
                );
                Ok(value)
            }
            Err(e) => {
                mark(job, JobStatus::Failed);
                debug!(error = %e, elapsed_ms, "Scraper output rejected");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl JobRunner for ProcessSupervisor {
    async fn run(&self, endpoint: EndpointClass, symbols: &[String]) -> FetchResult<Value> {
        let mut job = ScrapeJob::new(endpoint, symbols.to_vec(), self.config.timeout());
        self.run_job(&mut job).await
    }
}

fn mark(job: &mut ScrapeJob, next: JobStatus) {
    if let Err(e) = job.transition(next) {
        warn!(job_id = %job.id, error = %e, "Ignored job state transition");
    }
}

fn timeout_error(timeout: Duration) -> FetchError {
    FetchError::Timeout {
        after_ms: timeout.as_millis() as u64,
    }
}

/// 프로세스 그룹 전체에 신호를 보냅니다.
#[cfg(unix)]
fn signal_group(pgid: u32, signal: libc::c_int) -> bool {
    // SAFETY: 음수 pid는 해당 프로세스 그룹 전체를 가리킴
    unsafe { libc::kill(-(pgid as libc::pid_t), signal) == 0 }
}

/// 그룹에 남은 프로세스(손자 포함)를 강제 종료합니다.
fn kill_group(pgid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pgid {
            if signal_group(pgid, libc::SIGKILL) {
                debug!(pgid, "Killed leftover scraper process group");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;
}

/// 종료 신호를 보내고, 유예 시간이 지나면 강제 종료합니다.
async fn terminate(child: &mut Child, pgid: Option<u32>, grace: Duration) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pgid {
            if signal_group(pgid, libc::SIGTERM)
                && tokio::time::timeout(grace, child.wait()).await.is_ok()
            {
                debug!(pgid, "Scraper exited after SIGTERM");
                kill_group(Some(pgid));
                return;
            }
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill scraper process");
    }
    kill_group(pgid);
}

fn abort_readers(
    stdout: &Option<JoinHandle<CapturedOutput>>,
    stderr: &Option<JoinHandle<CapturedOutput>>,
) {
    for task in [stdout, stderr].into_iter().flatten() {
        task.abort();
    }
}

/// 읽기 태스크를 마감 시간까지 기다립니다. 시간 초과 시 `None`.
async fn join_reader(
    task: Option<JoinHandle<CapturedOutput>>,
    deadline: Instant,
) -> Option<CapturedOutput> {
    let Some(mut task) = task else {
        return Some(CapturedOutput::default());
    };
    match tokio::time::timeout_at(deadline, &mut task).await {
        Ok(Ok(output)) => Some(output),
        Ok(Err(_)) => Some(CapturedOutput::default()),
        Err(_) => {
            task.abort();
            None
        }
    }
}

/// stdout을 `limit` 바이트까지 모읍니다. 초과분은 읽어서 버립니다.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> CapturedOutput {
    let mut output = CapturedOutput::default();
    let mut buf = [0u8; 8192];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if output.overflowed {
                    continue;
                }
                if output.bytes.len() + n > limit {
                    output.overflowed = true;
                    output.bytes.clear();
                } else {
                    output.bytes.extend_from_slice(&buf[..n]);
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read scraper stdout");
                break;
            }
        }
    }
    output
}

/// stderr를 줄 단위로 로깅하면서 진단용으로 일부를 보관합니다.
async fn read_stderr<R: AsyncRead + Unpin>(reader: R) -> CapturedOutput {
    let mut output = CapturedOutput::default();
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(line = %line, "scraper stderr");
                if output.bytes.len() + line.len() < MAX_STDERR_BYTES {
                    output.bytes.extend_from_slice(line.as_bytes());
                    output.bytes.push(b'\n');
                } else {
                    output.overflowed = true;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read scraper stderr");
                break;
            }
        }
    }
    output
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str, timeout_secs: u64) -> ProcessSupervisor {
        ProcessSupervisor::new(ScraperConfig {
            program: "sh".to_string(),
            // sh -c <script> <$0> <$1=symbols> <$2=endpoint>
            args: vec!["-c".to_string(), script.to_string(), "scraper".to_string()],
            timeout_secs,
            kill_grace_ms: 200,
            max_output_bytes: 1024,
            working_dir: None,
        })
    }

    fn job() -> ScrapeJob {
        ScrapeJob::new(
            EndpointClass::Quote,
            vec!["AAPL".to_string()],
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_success_parses_json() {
        let supervisor = shell(r#"printf '{"symbol":"AAPL","price":1.5}'"#, 5);
        let mut job = job();
        let value = supervisor.run_job(&mut job).await.unwrap();
        assert_eq!(value["price"], serde_json::json!(1.5));
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_receives_positional_arguments_and_job_id() {
        let supervisor = shell(
            r#"printf '{"symbol":"AAPL","price":1,"symbols":%s,"endpoint":"%s","job":"%s"}' "$1" "$2" "$SCRAPE_JOB_ID""#,
            5,
        );
        let mut job = job();
        let value = supervisor.run_job(&mut job).await.unwrap();
        assert_eq!(value["symbols"], serde_json::json!(["AAPL"]));
        assert_eq!(value["endpoint"], serde_json::json!("quote"));
        assert_eq!(value["job"], serde_json::json!(job.id.to_string()));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_process_error() {
        let supervisor = shell("echo 'boom' >&2; exit 3", 5);
        let mut job = job();
        let err = supervisor.run_job(&mut job).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::ProcessError {
                code: Some(3),
                stderr: "boom".to_string()
            }
        );
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_exit_zero_with_garbage_is_malformed() {
        let supervisor = shell("echo 'not json'", 5);
        let err = supervisor.run_job(&mut job()).await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_output_over_limit_is_malformed() {
        let supervisor = shell("head -c 4096 /dev/zero", 5);
        let err = supervisor.run_job(&mut job()).await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedOutput(msg) if msg.contains("exceeded")));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let supervisor = ProcessSupervisor::new(ScraperConfig {
            program: "/nonexistent/scraper-binary".to_string(),
            args: Vec::new(),
            ..Default::default()
        });
        let mut job = job();
        let err = supervisor.run_job(&mut job).await.unwrap_err();
        assert!(matches!(err, FetchError::LaunchError(_)));
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_deadline_kills_hung_process() {
        let supervisor = shell(r#"printf '{"partial":true}'; exec sleep 30"#, 1);
        let mut job = job();
        let started = std::time::Instant::now();

        let err = supervisor.run_job(&mut job).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout { after_ms: 1000 });
        assert_eq!(job.status, JobStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_runner_validates_output() {
        let supervisor = shell(r#"printf '{"symbol":"AAPL","price":0,"error":"blocked"}'"#, 5);
        let mut job = job();
        let err = supervisor.run_job(&mut job).await.unwrap_err();
        assert!(matches!(err, FetchError::NoValidData(_)));
        assert_eq!(job.status, JobStatus::Failed);

        let err = supervisor
            .run(EndpointClass::Quote, &["AAPL".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoValidData(_)));
    }

    #[tokio::test]
    async fn test_batch_with_only_invalid_rows_fails_job() {
        let supervisor = shell(r#"printf '{"results":[{"symbol":"A","price":-1}]}'"#, 5);
        let mut job = ScrapeJob::new(
            EndpointClass::Batch,
            vec!["A".to_string()],
            Duration::from_secs(5),
        );
        let err = supervisor.run_job(&mut job).await.unwrap_err();
        assert!(matches!(err, FetchError::NoValidData(_)));
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_background_child_holding_stdout_is_killed_at_deadline() {
        let mut job = job();
        let marker = std::env::temp_dir().join(format!("scraper-orphan-{}", job.id));
        let script = format!(
            r#"(sleep 2; touch '{}') & printf '{{"symbol":"AAPL","price":1}}'; exit 0"#,
            marker.display()
        );
        let supervisor = shell(&script, 1);
        let started = std::time::Instant::now();

        let err = supervisor.run_job(&mut job).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout { after_ms: 1000 });
        assert_eq!(job.status, JobStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));

        // 그룹이 정리되었다면 손자 프로세스는 표식 파일을 만들지 못함
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!marker.exists());
    }
}
