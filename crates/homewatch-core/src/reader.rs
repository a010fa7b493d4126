//! Typed readings on top of the raw helper output.

use std::sync::Arc;
use std::time::Duration;

use homewatch_api::SensorReader;

use crate::model::{ReadError, ReadErrorKind, SourceName};

/// Runs a source's helper under a timeout and parses its output.
///
/// No retries: a failed read is reported and the next tick tries again.
#[derive(Clone)]
pub struct ReaderAdapter {
    reader: Arc<dyn SensorReader>,
    timeout: Duration,
}

impl ReaderAdapter {
    pub fn new(reader: Arc<dyn SensorReader>, timeout: Duration) -> Self {
        Self { reader, timeout }
    }

    pub async fn read(&self, source: &SourceName) -> Result<f64, ReadError> {
        match tokio::time::timeout(self.timeout, self.reader.read_raw(source.as_str())).await {
            Err(_) => Err(ReadError::new(
                ReadErrorKind::Timeout,
                format!(
                    "{source} produced no reading within {}s",
                    self.timeout.as_secs_f64()
                ),
            )),
            Ok(Err(e)) => Err(ReadError::from(e)),
            Ok(Ok(raw)) => parse_reading(&raw),
        }
    }
}

/// Parse helper output as a single finite number.
pub fn parse_reading(raw: &str) -> Result<f64, ReadError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ReadError::new(ReadErrorKind::NoData, "empty output"));
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ReadError::new(
            ReadErrorKind::Parse,
            format!("not a number: {text:?}"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct Scripted;

    #[async_trait]
    impl SensorReader for Scripted {
        async fn read_raw(&self, source: &str) -> Result<String, homewatch_api::Error> {
            match source {
                "photoresistor" => Ok("150\n".into()),
                "garbled" => Ok("NaN-ish".into()),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok("1".into())
                }
                other => Err(homewatch_api::Error::Launch {
                    program: other.into(),
                    reason: "not found".into(),
                }),
            }
        }
    }

    fn adapter() -> ReaderAdapter {
        ReaderAdapter::new(Arc::new(Scripted), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn parses_numeric_output() {
        let value = adapter().read(&"photoresistor".into()).await.unwrap();
        assert!((value - 150.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let err = adapter().read(&"garbled".into()).await.unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::Parse);
    }

    #[tokio::test]
    async fn launch_failure_is_reported() {
        let err = adapter().read(&"thermistor".into()).await.unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::Launch);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_helper_times_out() {
        let err = adapter().read(&"slow".into()).await.unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::Timeout);
    }

    #[test]
    fn parse_rejects_blank_and_non_finite() {
        assert_eq!(parse_reading("  \n").unwrap_err().kind, ReadErrorKind::NoData);
        assert_eq!(parse_reading("inf").unwrap_err().kind, ReadErrorKind::Parse);
        assert!((parse_reading(" 21.5 ").unwrap() - 21.5).abs() < f64::EPSILON);
    }
}
