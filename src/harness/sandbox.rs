//! Out-of-process execution of untrusted candidate source.
//!
//! Each attempt gets a throwaway directory under the OS temp dir holding
//! the candidate and a small driver program. Every compile check and
//! every test call is its own interpreter subprocess with a wall-clock
//! timeout and captured output, so a crashing or looping test cannot
//! poison the harness or the tests after it.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::harness::binder::CallPlan;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Driver protocol: one JSON request on stdin, one JSON reply on stdout.
/// The candidate's own stdout/stderr are swallowed into a buffer inside
/// the driver so they can never corrupt the reply channel.
const DRIVER_SOURCE: &str = r#"
import io
import json
import sys


def run(request, source):
    try:
        code = compile(source, "candidate.py", "exec")
    except SyntaxError as exc:
        return {"ok": False, "stage": "syntax", "error": str(exc)}

    scope = {}
    try:
        exec(code, scope)
    except BaseException as exc:
        return {"ok": False, "stage": "exec", "error": "%s: %s" % (type(exc).__name__, exc)}

    if request["mode"] == "check":
        return {"ok": True}

    entry = scope.get(request["entry"])
    if not callable(entry):
        return {"ok": False, "stage": "entry", "error": "entry function %r is not defined" % request["entry"]}

    plan = request["plan"]
    args = plan["args"]
    try:
        if plan["kind"] == "single":
            result = entry(args[0])
        elif plan["kind"] == "unpack":
            result = entry(*args)
        else:
            try:
                result = entry(*args)
            except TypeError:
                result = entry(args)
    except BaseException as exc:
        return {"ok": False, "stage": "call", "error": "%s: %s" % (type(exc).__name__, exc)}

    try:
        result = json.loads(json.dumps(result))
    except (TypeError, ValueError):
        result = repr(result)
    return {"ok": True, "result": result}


def main():
    request = json.loads(sys.stdin.read())
    with open(sys.argv[1], "r") as handle:
        source = handle.read()

    quiet = io.StringIO()
    real_stdout, real_stderr = sys.stdout, sys.stderr
    sys.stdout = sys.stderr = quiet
    try:
        reply = run(request, source)
    finally:
        sys.stdout, sys.stderr = real_stdout, real_stderr

    sys.stdout.write(json.dumps(reply, default=repr))
    sys.stdout.flush()


main()
"#;

#[derive(Debug, Deserialize)]
pub struct DriverReply {
    pub ok: bool,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

pub struct Sandbox {
    dir: PathBuf,
    python: String,
    timeout: Duration,
}

impl Sandbox {
    pub fn create(source: &str, timeout: Duration) -> Result<Self, String> {
        let python =
            resolve_interpreter().ok_or_else(|| "no python interpreter on PATH".to_string())?;

        let dir = std::env::temp_dir().join(format!("proofloop-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
        fs::write(dir.join("candidate.py"), source).map_err(|e| e.to_string())?;
        fs::write(dir.join("_driver.py"), DRIVER_SOURCE).map_err(|e| e.to_string())?;

        Ok(Self {
            dir,
            python,
            timeout,
        })
    }

    /// Compile and load the candidate without calling anything.
    pub fn check(&self) -> Result<DriverReply, String> {
        self.run_driver(json!({ "mode": "check" }))
    }

    /// Invoke the entry function once under the given call plan.
    pub fn call(&self, entry: &str, plan: &CallPlan) -> Result<DriverReply, String> {
        self.run_driver(json!({
            "mode": "call",
            "entry": entry,
            "plan": { "kind": plan.kind(), "args": plan.args() },
        }))
    }

    fn run_driver(&self, request: Value) -> Result<DriverReply, String> {
        let mut child = Command::new(&self.python)
            .arg("_driver.py")
            .arg("candidate.py")
            .current_dir(&self.dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| e.to_string())?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(request.to_string().as_bytes())
                .map_err(|e| e.to_string())?;
        }
        drop(child.stdin.take());

        let output = wait_with_timeout(child, self.timeout)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reply_line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("");

        serde_json::from_str::<DriverReply>(reply_line.trim()).map_err(|_| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            format!(
                "candidate process died without a reply: {}",
                first_line(stderr.trim())
            )
        })
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<std::process::Output, String> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait().map_err(|e| e.to_string())? {
            Some(_) => return child.wait_with_output().map_err(|e| e.to_string()),
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(format!("timed out after {}s", timeout.as_secs()));
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    }
}

pub fn resolve_interpreter() -> Option<String> {
    ["python3", "python"]
        .iter()
        .find(|cmd| {
            Command::new(cmd)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
        .map(|cmd| cmd.to_string())
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
