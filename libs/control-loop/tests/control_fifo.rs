use std::io::Write;
use std::path::Path;
use std::process::Command;

use control_loop::{AgentError, ControlChannel, FAIL_OVER_CODE};

fn mkfifo(path: &Path) {
    let status = Command::new("mkfifo").arg(path).status().unwrap();
    assert!(status.success(), "mkfifo failed");
}

#[tokio::test]
async fn fifo_without_writer_never_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ctl");
    mkfifo(&path);

    let mut channel = ControlChannel::open(&path).unwrap();
    for _ in 0..3 {
        assert_eq!(channel.poll_code().unwrap(), None);
    }
}

#[tokio::test]
async fn fifo_delivers_one_code_per_check() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ctl");
    mkfifo(&path);
    let mut channel = ControlChannel::open(&path).unwrap();

    {
        let mut writer = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        writer.write_all(b"999\n250").unwrap();
    }

    assert_eq!(channel.poll_code().unwrap(), Some(FAIL_OVER_CODE));
    assert_eq!(channel.poll_code().unwrap(), Some(250));
    // The writer went away; the read-write open keeps this from reading as EOF.
    assert_eq!(channel.poll_code().unwrap(), None);

    let mut writer = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    writer.write_all(b" oops\n").unwrap();
    assert!(matches!(channel.poll_code(), Err(AgentError::MalformedCommand(_))));
}
