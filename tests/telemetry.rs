use tagcache::config::{LogFormat, LoggingSettings};
use tagcache::telemetry::{self, TelemetryError};
use tracing::level_filters::LevelFilter;

#[test]
fn subscriber_installs_once() {
    let logging = LoggingSettings {
        level: LevelFilter::DEBUG,
        format: LogFormat::Json,
    };

    telemetry::init(&logging).expect("first install succeeds");
    let err = telemetry::init(&logging).unwrap_err();
    assert!(matches!(err, TelemetryError::Install(_)));
    assert!(err.to_string().contains("tracing subscriber"));
}
