// ── Helper process plumbing ──
//
// Shared by the sensor readers, the health probe and the power commands.
// Children are spawned with `kill_on_drop` so a caller-side timeout that
// drops the future also reaps the process.

use std::process::Stdio;

use tokio::process::Command;

use crate::error::Error;

/// Run `program args…`, returning its stdout.
///
/// Spawn failure maps to [`Error::Launch`], a non-zero exit to
/// [`Error::ExitStatus`], and blank stdout to [`Error::NoData`].
pub(crate) async fn run_captured(program: &str, args: &[String]) -> Result<String, Error> {
    tracing::trace!(program, ?args, "spawning helper");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| Error::Launch {
            program: program.to_owned(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::ExitStatus {
            program: program.to_owned(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.trim().is_empty() {
        return Err(Error::NoData {
            program: program.to_owned(),
        });
    }

    Ok(stdout)
}

/// Run a command line given as `[program, args…]`, caring only about the exit status.
pub(crate) async fn run_status(argv: &[String]) -> Result<(), Error> {
    let Some((program, args)) = argv.split_first() else {
        return Err(Error::Launch {
            program: String::new(),
            reason: "empty command line".into(),
        });
    };

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|e| Error::Launch {
            program: program.clone(),
            reason: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::ExitStatus {
            program: program.clone(),
            status: status.to_string(),
            stderr: String::new(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = run_captured("sh", &args(&["-c", "echo 187"])).await.unwrap();
        assert_eq!(out.trim(), "187");
    }

    #[tokio::test]
    async fn nonzero_exit_is_exit_status() {
        let err = run_captured("sh", &args(&["-c", "echo boom >&2; exit 3"]))
            .await
            .unwrap_err();
        match err {
            Error::ExitStatus { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("expected ExitStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_stdout_is_no_data() {
        let err = run_captured("sh", &args(&["-c", "echo '   '"])).await.unwrap_err();
        assert!(matches!(err, Error::NoData { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_program_is_launch_error() {
        let err = run_captured("/nonexistent/homewatch-helper", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Launch { .. }), "got {err:?}");
        assert!(err.is_launch_failure());
    }

    #[tokio::test]
    async fn run_status_rejects_empty_argv() {
        assert!(run_status(&[]).await.is_err());
        assert!(run_status(&args(&["true"])).await.is_ok());
        assert!(run_status(&args(&["false"])).await.is_err());
    }
}
