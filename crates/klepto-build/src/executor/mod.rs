use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Instant;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum ExecEvent {
    Note {
        line: String,
    },
    ProductStarted {
        name: String,
        dest: PathBuf,
    },
    ProductLog {
        name: String,
        line: String,
    },
    ProductFinished {
        name: String,
        ok: bool,
        error: Option<String>,
        elapsed_ms: u128,
    },
    Done {
        ok: bool,
        error: Option<String>,
    },
}

pub trait ExecSink: Send + Sync {
    fn emit(&self, ev: ExecEvent);
}

/// Prints progress the way an operator watching a long toolchain build wants it:
/// `>>>` lines for orchestration steps and the raw output of external tools.
#[derive(Default)]
pub struct StdoutSink {
    error_logs_root: Option<PathBuf>,
    state: Mutex<StdoutSinkState>,
}

#[derive(Default)]
struct StdoutSinkState {
    started_at: Option<Instant>,
    products_ok: Vec<String>,
    products_failed: Vec<String>,
    product_logs: BTreeMap<String, VecDeque<String>>,
    error_logs_dir: Option<PathBuf>,
}

impl StdoutSink {
    pub fn with_error_logs_root(root: impl Into<PathBuf>) -> Self {
        Self {
            error_logs_root: Some(root.into()),
            state: Mutex::default(),
        }
    }

    fn write_error_log(
        &self,
        state: &mut StdoutSinkState,
        name: &str,
        error: Option<&str>,
        elapsed_ms: u128,
    ) -> Result<PathBuf> {
        let dir = match state.error_logs_dir.clone() {
            Some(dir) => dir,
            None => {
                let root = self.error_logs_root.clone().unwrap_or_else(|| {
                    std::env::current_dir()
                        .unwrap_or_else(|_| PathBuf::from("."))
                        .join("build")
                        .join("error-logs")
                });
                let dir = root.join(chrono::Local::now().format("%Y%m%d-%H%M%S").to_string());
                fs::create_dir_all(&dir).map_err(|e| {
                    Error::io(format!(
                        "failed to create error logs dir {}: {e}",
                        dir.display()
                    ))
                })?;
                state.error_logs_dir = Some(dir.clone());
                dir
            }
        };

        let path = dir.join(format!("{name}.log"));
        let mut body = format!("product: {name}\nstatus: failed\nelapsed_ms: {elapsed_ms}\n");
        if let Some(e) = error.filter(|e| !e.trim().is_empty()) {
            body.push_str(&format!("error: {e}\n"));
        }
        body.push_str("\nlogs:\n");
        for line in state.product_logs.get(name).into_iter().flatten() {
            body.push_str(line);
            body.push('\n');
        }
        fs::write(&path, body).map_err(|e| {
            Error::io(format!(
                "failed to write error log {}: {e}",
                path.display()
            ))
        })?;
        Ok(path)
    }
}

impl ExecSink for StdoutSink {
    fn emit(&self, ev: ExecEvent) {
        match ev {
            ExecEvent::Note { line } => println!(">>> {line}"),
            ExecEvent::ProductStarted { name, dest } => {
                if let Ok(mut s) = self.state.lock() {
                    s.started_at.get_or_insert_with(Instant::now);
                }
                println!(
                    ">>> Building and installing {name} in {}",
                    dest.display()
                );
            }
            ExecEvent::ProductLog { name, line } => {
                if let Ok(mut s) = self.state.lock() {
                    append_product_log_line(&mut s.product_logs, &name, &line);
                }
                println!("{line}");
            }
            ExecEvent::ProductFinished {
                name,
                ok,
                error,
                elapsed_ms,
            } => {
                let secs = (elapsed_ms / 1000) as u64;
                if ok {
                    if let Ok(mut s) = self.state.lock() {
                        s.products_ok.push(name.clone());
                        s.product_logs.remove(&name);
                    }
                    println!(">>> Finished {name} ({})", format_elapsed_hms(secs));
                    return;
                }
                println!(">>> Failed {name} ({})", format_elapsed_hms(secs));
                if let Ok(mut s) = self.state.lock() {
                    s.products_failed.push(name.clone());
                    match self.write_error_log(&mut s, &name, error.as_deref(), elapsed_ms) {
                        Ok(path) => println!(">>> Output of {name} saved to {}", path.display()),
                        Err(e) => tracing::warn!("failed to save output of {name}: {e}"),
                    }
                }
            }
            ExecEvent::Done { ok, error } => {
                let Ok(mut s) = self.state.lock() else {
                    return;
                };
                let wall = s.started_at.map(|t| t.elapsed()).unwrap_or_default();
                println!(">>> Summary: {}", if ok { "ok" } else { "failed" });
                if !s.products_ok.is_empty() {
                    println!(">>>   built: {}", s.products_ok.join(", "));
                }
                if !s.products_failed.is_empty() {
                    println!(">>>   failed: {}", s.products_failed.join(", "));
                }
                println!(">>>   elapsed: {}", format_elapsed_hms(wall.as_secs()));
                if let Some(e) = error {
                    tracing::debug!("build finished with error: {e}");
                }
                *s = StdoutSinkState::default();
            }
        }
    }
}

/// Output of a captured command. Stdout and stderr are merged, stdout first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub success: bool,
    pub code: Option<i32>,
    pub text: String,
}

/// The subprocess boundary. Every external tool goes through one of these two calls.
pub trait Runner: Send + Sync {
    /// Run to completion, streaming each output line to `log`. Fails on non-zero exit.
    fn run(&self, cmd: Command, log: &mut dyn FnMut(&str)) -> Result<()>;

    /// Run with stdin closed and all output captured for parsing.
    fn capture(&self, cmd: Command) -> Result<Captured>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, mut cmd: Command, log: &mut dyn FnMut(&str)) -> Result<()> {
        let program = program_name(&cmd);
        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&program, e))?;

        let (tx, rx) = mpsc::channel::<String>();
        if let Some(out) = child.stdout.take() {
            let tx = tx.clone();
            std::thread::spawn(move || read_output_stream(out, tx));
        }
        if let Some(err) = child.stderr.take() {
            let tx = tx.clone();
            std::thread::spawn(move || read_output_stream(err, tx));
        }
        drop(tx);

        for line in rx {
            log(&line);
        }

        let status = child
            .wait()
            .map_err(|e| Error::process(format!("waiting for {program} failed: {e}")))?;
        tracing::debug!(%program, %status, "command exited");
        if !status.success() {
            return Err(Error::process(format!("{program} failed: {status}")));
        }
        Ok(())
    }

    fn capture(&self, mut cmd: Command) -> Result<Captured> {
        let program = program_name(&cmd);
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&program, e))?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        tracing::debug!(%program, status = %output.status, bytes = text.len(), "captured command");
        Ok(Captured {
            success: output.status.success(),
            code: output.status.code(),
            text,
        })
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::tool_missing(format!("could not find {program}"))
    } else {
        Error::process(format!("failed to spawn {program}: {e}"))
    }
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Render a command the way it would be typed in a shell (without quoting).
pub fn describe_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone)]
pub struct ExecCtx {
    pub dry_run: bool,
    pub sink: Arc<dyn ExecSink>,
    pub runner: Arc<dyn Runner>,
    pub current_product: Option<String>,
}

impl ExecCtx {
    pub fn new(dry_run: bool, sink: Arc<dyn ExecSink>, runner: Arc<dyn Runner>) -> Self {
        Self {
            dry_run,
            sink,
            runner,
            current_product: None,
        }
    }

    pub fn set_product(&mut self, name: impl Into<String>) {
        self.current_product = Some(name.into());
    }

    pub fn note(&self, line: impl Into<String>) {
        self.sink.emit(ExecEvent::Note { line: line.into() });
    }

    pub fn log(&self, line: &str) {
        let name = self
            .current_product
            .clone()
            .unwrap_or_else(|| "<none>".into());
        self.sink.emit(ExecEvent::ProductLog {
            name,
            line: line.to_string(),
        });
    }

    pub fn run_cmd(&self, cmd: Command) -> Result<()> {
        let mut line = format!(">>> Running '{}'", describe_command(&cmd));
        if let Some(dir) = cmd.get_current_dir() {
            line.push_str(&format!(" in {}", dir.display()));
        }
        self.log(&line);
        if self.dry_run {
            self.log(&format!("DRY-RUN: {}", describe_command(&cmd)));
            return Ok(());
        }
        self.runner.run(cmd, &mut |l| self.log(l))
    }

    pub fn capture(&self, cmd: Command) -> Result<Captured> {
        tracing::debug!(command = %describe_command(&cmd), "capturing");
        self.runner.capture(cmd)
    }
}

pub fn command_in(program: impl AsRef<std::ffi::OsStr>, cwd: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.current_dir(cwd);
    cmd
}

fn read_output_stream<R: Read>(reader: R, tx: mpsc::Sender<String>) {
    let mut r = BufReader::new(reader);
    let mut buf = Vec::with_capacity(1024);
    loop {
        buf.clear();
        match r.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if tx.send(line.to_string()).is_err() {
                    break;
                }
            }
        }
    }
}

fn append_product_log_line(
    logs: &mut BTreeMap<String, VecDeque<String>>,
    name: &str,
    line: &str,
) {
    const MAX_LINES: usize = 4000;
    let q = logs.entry(name.to_string()).or_default();
    while q.len() >= MAX_LINES {
        q.pop_front();
    }
    q.push_back(line.to_string());
}

fn format_elapsed_hms(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_command_joins_program_and_args() {
        let mut cmd = Command::new("ninja");
        cmd.arg("-v").arg("-C").arg("build");
        assert_eq!(describe_command(&cmd), "ninja -v -C build");
    }

    #[test]
    fn product_log_keeps_tail() {
        let mut logs = BTreeMap::new();
        for i in 0..4005 {
            append_product_log_line(&mut logs, "toolchain", &format!("line {i}"));
        }
        let q = &logs["toolchain"];
        assert_eq!(q.len(), 4000);
        assert_eq!(q.front().map(String::as_str), Some("line 5"));
    }

    #[test]
    fn elapsed_is_formatted_as_hms() {
        assert_eq!(format_elapsed_hms(3725), "01:02:05");
    }

    #[test]
    fn failed_product_output_is_saved() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let sink = StdoutSink::with_error_logs_root(tmp.path());
        sink.emit(ExecEvent::ProductLog {
            name: "swiftpm".into(),
            line: "error: no such module".into(),
        });
        sink.emit(ExecEvent::ProductFinished {
            name: "swiftpm".into(),
            ok: false,
            error: Some("Could not build swiftpm".into()),
            elapsed_ms: 10,
        });

        let stamp_dir = fs::read_dir(tmp.path())
            .expect("read error-logs root")
            .next()
            .expect("one stamp dir")
            .expect("dir entry")
            .path();
        let body = fs::read_to_string(stamp_dir.join("swiftpm.log")).expect("read log");
        assert!(body.contains("error: Could not build swiftpm"));
        assert!(body.contains("error: no such module"));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_missing_tool() {
        let err = SystemRunner
            .capture(Command::new("klepto-build-definitely-not-installed"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ToolMissing);
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_streams_lines_and_checks_status() {
        let mut lines = Vec::new();
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo one; echo two 1>&2; exit 3");
        let err = SystemRunner
            .run(cmd, &mut |l| lines.push(l.to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Process);
        lines.sort();
        assert_eq!(lines, vec!["one", "two"]);
    }
}
