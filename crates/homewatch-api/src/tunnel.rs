//! Public tunnel client.
//!
//! A tunnel exposes a local port under a public URL whose first host label
//! is the requested subdomain. The provider may hand out a different
//! subdomain than the one asked for; callers compare with [`subdomain_of`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use url::Url;

use crate::error::Error;

/// Opens tunnels.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// Open a tunnel for `port`, asking for `subdomain`.
    ///
    /// Returns once the public URL is known.
    async fn open(&self, port: u16, subdomain: &str) -> Result<Box<dyn TunnelSession>, Error>;
}

/// One live tunnel.
#[async_trait]
pub trait TunnelSession: Send {
    fn url(&self) -> &Url;

    /// Resolve when the tunnel goes away on its own, with a reason.
    async fn closed(&mut self) -> String;

    /// Tear the tunnel down.
    async fn close(&mut self);
}

/// First label of the URL's host, e.g. `mybox` for `https://mybox.loca.lt`.
pub fn subdomain_of(url: &Url) -> Option<&str> {
    url.host_str()?.split('.').next().filter(|label| !label.is_empty())
}

// ── Process-backed tunnel ────────────────────────────────────────────

/// Runs a tunnel client program that prints its public URL on stdout.
///
/// `{port}` and `{subdomain}` in the arguments are substituted on open.
#[derive(Debug, Clone)]
pub struct ProcessTunnel {
    program: String,
    args: Vec<String>,
    startup_timeout: Duration,
}

impl ProcessTunnel {
    pub fn new(program: impl Into<String>, args: Vec<String>, startup_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            startup_timeout,
        }
    }

    /// The `lt` client from localtunnel.
    pub fn localtunnel() -> Self {
        Self::new(
            "lt",
            ["--port", "{port}", "--subdomain", "{subdomain}"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            Duration::from_secs(30),
        )
    }

    fn expand_args(&self, port: u16, subdomain: &str) -> Vec<String> {
        let port = port.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{port}", &port).replace("{subdomain}", subdomain))
            .collect()
    }
}

#[async_trait]
impl TunnelProvider for ProcessTunnel {
    async fn open(&self, port: u16, subdomain: &str) -> Result<Box<dyn TunnelSession>, Error> {
        let args = self.expand_args(port, subdomain);
        tracing::debug!(program = %self.program, ?args, "starting tunnel client");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Launch {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Tunnel("tunnel client stdout unavailable".into()))?;
        let mut lines = BufReader::new(stdout).lines();

        let url = tokio::time::timeout(self.startup_timeout, announced_url(&mut lines))
            .await
            .map_err(|_| {
                Error::Tunnel(format!(
                    "no tunnel URL within {}s",
                    self.startup_timeout.as_secs_f64()
                ))
            })??;

        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(%line, "tunnel client output");
            }
        });

        Ok(Box::new(ProcessSession { url, child }))
    }
}

async fn announced_url(lines: &mut Lines<BufReader<ChildStdout>>) -> Result<Url, Error> {
    while let Some(line) = lines.next_line().await? {
        if let Some(url) = find_url(&line) {
            return Ok(url);
        }
    }
    Err(Error::Tunnel(
        "tunnel client exited before announcing a URL".into(),
    ))
}

fn find_url(line: &str) -> Option<Url> {
    line.split_whitespace()
        .filter(|word| word.starts_with("https://") || word.starts_with("http://"))
        .find_map(|word| Url::parse(word).ok())
}

struct ProcessSession {
    url: Url,
    child: Child,
}

#[async_trait]
impl TunnelSession for ProcessSession {
    fn url(&self) -> &Url {
        &self.url
    }

    async fn closed(&mut self) -> String {
        match self.child.wait().await {
            Ok(status) => format!("tunnel client exited with {status}"),
            Err(e) => format!("lost track of tunnel client: {e}"),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!(error = %e, "tunnel client already gone");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shell(script: &str, timeout: Duration) -> ProcessTunnel {
        ProcessTunnel::new("sh", vec!["-c".into(), script.into()], timeout)
    }

    #[test]
    fn subdomain_is_first_host_label() {
        let url = Url::parse("https://mybox.loca.lt").unwrap();
        assert_eq!(subdomain_of(&url), Some("mybox"));
    }

    #[test]
    fn finds_url_inside_banner() {
        let url = find_url("your url is: https://abc.loca.lt").unwrap();
        assert_eq!(url.host_str(), Some("abc.loca.lt"));
        assert!(find_url("connecting...").is_none());
    }

    #[tokio::test]
    async fn substitutes_placeholders_and_reads_url() {
        let provider = shell(
            "echo your url is: https://{subdomain}.example.test:{port}; sleep 5",
            Duration::from_secs(5),
        );
        let mut session = provider.open(8080, "mybox").await.unwrap();
        assert_eq!(subdomain_of(session.url()), Some("mybox"));
        assert_eq!(session.url().port(), Some(8080));
        session.close().await;
    }

    #[tokio::test]
    async fn reports_when_client_exits() {
        let provider = shell("echo https://{subdomain}.example.test", Duration::from_secs(5));
        let mut session = provider.open(80, "gone").await.unwrap();
        let reason = session.closed().await;
        assert!(reason.contains("exited"), "{reason}");
    }

    #[tokio::test]
    async fn silent_client_is_an_error() {
        let provider = shell("echo connecting", Duration::from_secs(5));
        let err = provider.open(80, "x").await.err().unwrap();
        assert!(matches!(err, Error::Tunnel(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn slow_client_times_out() {
        let provider = shell("sleep 5", Duration::from_millis(100));
        let err = provider.open(80, "x").await.err().unwrap();
        assert!(matches!(err, Error::Tunnel(ref m) if m.contains("no tunnel URL")));
    }
}
