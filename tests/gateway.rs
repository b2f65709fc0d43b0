// Gateway integration tests
//
// Drives the public operations end to end: once against a recording runner
// to check the exact argument vectors, and once against the real process
// runner on commands every Linux host has.

use async_trait::async_trait;
use cipherbot_gateway::gateway::{Gateway, GatewaySettings};
use cipherbot_gateway::tools::{
    AllowList, ExecutionOutcome, ExecutorConfig, Invocation, ProcessRunner, ToolExecutor,
};
use std::os::unix::fs::PermissionsExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Invocation>>,
}

impl Recorder {
    fn argvs(&self) -> Vec<Vec<String>> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|inv| inv.spec.argv().to_vec())
            .collect()
    }

    fn timeouts(&self) -> Vec<Duration> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|inv| inv.timeout.duration())
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for Recorder {
    async fn run(&self, invocation: Invocation) -> ExecutionOutcome {
        self.seen.lock().unwrap().push(invocation);
        ExecutionOutcome::Completed {
            exit_code: 0,
            stdout: "done".to_string(),
            stderr: String::new(),
        }
    }
}

fn recorded_gateway(root: &TempDir) -> (Gateway, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let settings = GatewaySettings {
        fs_root: root.path().to_path_buf(),
        ..GatewaySettings::default()
    };
    let gateway = Gateway::new(settings, Arc::new(AllowList::default()), recorder.clone());
    (gateway, recorder)
}

fn real_gateway(root: &TempDir, tools: &[&str]) -> Gateway {
    let settings = GatewaySettings {
        fs_root: root.path().to_path_buf(),
        ..GatewaySettings::default()
    };
    let no_elevation: [&str; 0] = [];
    Gateway::new(
        settings,
        Arc::new(AllowList::new(tools, no_elevation)),
        Arc::new(ToolExecutor::with_config(
            ExecutorConfig::default().with_elevation(None),
        )),
    )
}

#[tokio::test]
async fn test_run_tool_builds_elevated_argv() {
    let root = TempDir::new().unwrap();
    let (gateway, recorder) = recorded_gateway(&root);

    let response = gateway.run_tool("NMAP", "-sV  10.0.0.1;reboot").await;

    assert!(!response.is_error, "{}", response.text);
    let argv = &recorder.argvs()[0];
    assert_eq!(argv, &["nmap", "-sV", "10.0.0.1reboot"]);
    assert!(recorder.seen.lock().unwrap()[0].elevate);
    assert!(response.text.contains("Sudo: true"));
    assert!(response.text.ends_with("done"));
}

#[tokio::test]
async fn test_rejected_tool_never_reaches_runner() {
    let root = TempDir::new().unwrap();
    let (gateway, recorder) = recorded_gateway(&root);

    let response = gateway.run_tool("bash", "-c id").await;

    assert!(response.is_error);
    assert!(response.text.starts_with("Error: Tool 'bash' is not in the approved list."));
    assert!(recorder.argvs().is_empty());
}

#[tokio::test]
async fn test_scan_timeouts_follow_presets() {
    let root = TempDir::new().unwrap();
    let (gateway, recorder) = recorded_gateway(&root);

    gateway.nmap_scan("example.com", "quick", "").await;
    gateway.search_tool("nmap").await;
    gateway.list_installed_tools().await;

    assert_eq!(
        recorder.timeouts(),
        vec![
            Duration::from_secs(900),
            Duration::from_secs(120),
            Duration::from_secs(60),
        ]
    );
    assert_eq!(recorder.argvs()[0], ["nmap", "-F", "example.com"]);
}

#[tokio::test]
async fn test_install_then_run_new_tool() {
    let root = TempDir::new().unwrap();
    let (gateway, recorder) = recorded_gateway(&root);
    assert!(!gateway.allow_list().is_permitted("sslscan"));

    let installed = gateway.install_tool("sslscan").await;
    assert!(!installed.is_error, "{}", installed.text);
    assert!(gateway.allow_list().is_permitted("sslscan"));

    let ran = gateway.run_tool("sslscan", "--help").await;
    assert!(!ran.is_error);
    assert_eq!(recorder.argvs().last().unwrap(), &["sslscan", "--help"]);
}

#[tokio::test]
async fn test_filesystem_stays_under_root() {
    let root = TempDir::new().unwrap();
    let (gateway, _) = recorded_gateway(&root);

    let written = gateway.fs_write("../../escape/notes.txt", "hello").await;
    assert!(!written.is_error, "{}", written.text);
    assert!(root.path().join("escape/notes.txt").exists());

    let read = gateway.fs_read("/escape/notes.txt").await;
    assert_eq!(read.text, "File: /escape/notes.txt\n\nContent:\nhello");

    let listing = gateway.fs_list("escape").await;
    assert!(listing.text.contains("[FILE] notes.txt"));
}

#[tokio::test]
async fn test_real_runner_reports_exit_code() {
    let root = TempDir::new().unwrap();
    let gateway = real_gateway(&root, &["sh", "echo"]);

    let ok = gateway.run_tool("echo", "hello world").await;
    assert!(!ok.is_error);
    assert!(ok.text.contains("Sudo: false"));
    assert!(ok.text.ends_with("hello world\n"));

    let failed = gateway.run_tool("sh", "-c false").await;
    assert!(failed.is_error);
    assert!(failed.text.contains("Error (code 1):"));
}

#[tokio::test]
async fn test_fs_execute_runs_script_under_root() {
    let root = TempDir::new().unwrap();
    let script = root.path().join("probe.sh");
    std::fs::write(&script, "#!/bin/sh\necho \"args: $1 $2\"\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    let gateway = real_gateway(&root, &[]);

    let response = gateway.fs_execute("probe.sh", "alpha beta").await;

    assert!(!response.is_error, "{}", response.text);
    assert_eq!(response.text, "Executed: probe.sh\n\nOutput:\nargs: alpha beta\n");
}

#[tokio::test]
async fn test_fs_execute_rejects_plain_file() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("data.txt"), "x").unwrap();
    let gateway = real_gateway(&root, &[]);

    let response = gateway.fs_execute("data.txt", "").await;

    assert!(response.is_error);
    assert!(response.text.contains("not executable"));
}
