use super::{FixedTemperature, PayloadError, Reading, TelemetrySource, encode};

#[test]
fn test_fixed_temperature_payload() {
    let mut source = FixedTemperature(42.0);
    let payload = encode(&source.sample(), 64).unwrap();
    assert_eq!(payload, br#"{"temp":42.0}"#);
}

#[test]
fn test_closure_source() {
    let mut next = 20.0;
    let mut source = move || {
        next += 0.5;
        Reading { temp: next }
    };
    assert_eq!(source.sample().temp, 20.5);
    assert_eq!(source.sample().temp, 21.0);
}

#[test]
fn test_payload_limit() {
    let reading = Reading { temp: -12.25 };
    assert_eq!(encode(&reading, 15).unwrap(), br#"{"temp":-12.25}"#);

    let err = encode(&reading, 14).unwrap_err();
    assert!(matches!(err, PayloadError::TooLarge { len: 15, max: 14 }));
}

#[test]
fn test_non_finite_reading_rejected() {
    assert!(matches!(
        encode(&Reading { temp: f64::NAN }, 64),
        Err(PayloadError::NotFinite(_))
    ));
    assert!(encode(&Reading { temp: f64::INFINITY }, 64).is_err());
}
