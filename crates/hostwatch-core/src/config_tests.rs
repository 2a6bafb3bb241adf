use std::time::Duration;

use crate::config::{ConfigError, MonitorConfig, ServiceRequest};

#[test]
fn request_without_optionals_takes_defaults() {
    // Arrange
    let req: ServiceRequest =
        serde_json::from_str(r#"{"serviceId":"svc-1","hostname":"10.0.0.1"}"#).expect("parse");

    // Act
    let config = MonitorConfig::try_from(req).expect("valid");

    // Assert
    assert_eq!(config.initial_interval, Duration::from_millis(1000));
    assert_eq!(config.target_interval, Duration::from_millis(5000));
    assert_eq!(config.window_size, 10);
    assert_eq!(config.error_tolerance, 5);
}

#[test]
fn request_overrides_are_applied() {
    // Arrange
    let req: ServiceRequest = serde_json::from_str(
        r#"{"serviceId":"svc-1","hostname":"h","initialPingInterval":250,"targetPingInterval":60000,"rollingAverage":4,"errorTolerance":2}"#,
    )
    .expect("parse");

    // Act
    let config = MonitorConfig::try_from(req).expect("valid");

    // Assert
    assert_eq!(config.initial_interval, Duration::from_millis(250));
    assert_eq!(config.target_interval, Duration::from_secs(60));
    assert_eq!(config.window_size, 4);
    assert_eq!(config.error_tolerance, 2);
}

#[test]
fn degenerate_requests_are_rejected() {
    let mut zero_window = ServiceRequest::new("svc-1", "h");
    zero_window.rolling_average = Some(0);
    assert_eq!(
        MonitorConfig::try_from(zero_window),
        Err(ConfigError::Zero("rollingAverage"))
    );

    assert_eq!(
        MonitorConfig::try_from(ServiceRequest::new(" ", "h")),
        Err(ConfigError::EmptyServiceId)
    );
    assert_eq!(
        MonitorConfig::try_from(ServiceRequest::new("svc-1", "")),
        Err(ConfigError::EmptyHostname)
    );
}
