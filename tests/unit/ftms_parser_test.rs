//! Unit tests for the FTMS codec.

use ghostride::sensors::ftms::{
    decode_simulation_params, encode_request_control, encode_simulation_params,
    parse_control_point_response, parse_heart_rate_measurement, parse_indoor_bike_data,
    parse_telemetry, ControlResult,
};
use ghostride::sensors::types::ProtocolError;

#[test]
fn test_parse_indoor_bike_data_minimal() {
    // Flags: 0x0000 (only instantaneous speed present)
    // Speed: 0 km/h
    let data = [0x00, 0x00, 0x00, 0x00];
    let result = parse_indoor_bike_data(&data).unwrap();

    assert_eq!(result.speed_kmh, Some(0.0));
    assert!(result.power_watts.is_none());
    assert!(result.cadence_rpm.is_none());
}

#[test]
fn test_parse_power_only_frame() {
    // Flags: 0x0041 (more data, instantaneous power)
    // Power: 250W
    let data = [0x41, 0x00, 0xFA, 0x00];
    let frame = parse_telemetry(&data).unwrap();

    assert_eq!(frame.power_w, Some(250));
    assert!(frame.speed_kmh.is_none());
    assert!(frame.cadence_rpm.is_none());
    assert!(frame.timestamp_ms > 0);
}

#[test]
fn test_parse_indoor_bike_data_full() {
    // Flags: 0x0044 (cadence + power)
    // Speed: 3500 = 35.00 km/h
    // Cadence: 190 = 95 RPM
    // Power: 300W
    let data = [0x44, 0x00, 0xAC, 0x0D, 0xBE, 0x00, 0x2C, 0x01];
    let result = parse_indoor_bike_data(&data).unwrap();

    assert!((result.speed_kmh.unwrap() - 35.0).abs() < 0.01);
    assert_eq!(result.cadence_rpm, Some(95.0));
    assert_eq!(result.power_watts, Some(300));
}

#[test]
fn test_skipped_fields_advance_cursor() {
    // Flags: 0x00FF (more data, then every field from avg speed to avg power)
    let data = [
        0xFF, 0x00, // flags
        0x11, 0x11, // avg speed
        0xB4, 0x00, // cadence 180 = 90 RPM
        0x22, 0x22, // avg cadence
        0x33, 0x33, 0x33, // total distance
        0x44, 0x44, // resistance level
        0xC8, 0x00, // power 200W
        0x55, 0x55, // avg power
    ];
    let result = parse_indoor_bike_data(&data).unwrap();

    assert!(result.speed_kmh.is_none());
    assert_eq!(result.cadence_rpm, Some(90.0));
    assert_eq!(result.power_watts, Some(200));
}

#[test]
fn test_negative_power_is_signed() {
    // Flags: 0x0041, power -20W
    let data = [0x41, 0x00, 0xEC, 0xFF];
    assert_eq!(parse_indoor_bike_data(&data).unwrap().power_watts, Some(-20));
}

#[test]
fn test_truncated_frame_is_rejected() {
    // Flags announce power but the payload stops after speed
    let data = [0x40, 0x00, 0xB8, 0x0B, 0xFA];
    let err = parse_indoor_bike_data(&data).unwrap_err();
    assert!(matches!(err, ProtocolError::Truncated { .. }));

    assert!(parse_indoor_bike_data(&[]).is_err());
    assert!(parse_indoor_bike_data(&[0x00]).is_err());
}

#[test]
fn test_simulation_params_layout() {
    // 5% grade, crr 0.004, cw 0.51 kg/m
    let bytes = encode_simulation_params(0.05, 0.004, 0.51);
    assert_eq!(bytes, [0x11, 0x00, 0x00, 0xF4, 0x01, 40, 51]);
}

#[test]
fn test_simulation_params_negative_grade() {
    // -2.5% grade = -250 = 0xFF06
    let bytes = encode_simulation_params(-0.025, 0.004, 0.2);
    assert_eq!(&bytes[3..5], &[0x06, 0xFF]);
}

#[test]
fn test_simulation_params_half_steps_round_away_from_zero() {
    // grade 1492.5, crr 12.5, cw 12.5 in wire units
    let bytes = encode_simulation_params(-0.14925, 0.00125, 0.125);
    assert_eq!(i16::from_le_bytes([bytes[3], bytes[4]]), -1493);
    assert_eq!(bytes[5], 13);
    assert_eq!(bytes[6], 13);
}

#[test]
fn test_simulation_params_round_trip_within_quantization() {
    for &(grade, crr, cwa) in &[(0.0537, 0.0041, 0.196), (-0.081, 0.012, 0.33), (0.0, 0.0, 0.0)] {
        let decoded = decode_simulation_params(&encode_simulation_params(grade, crr, cwa)).unwrap();

        assert_eq!(decoded.wind_speed_ms, 0.0);
        assert!((decoded.grade - grade).abs() <= 0.00005 + 1e-12);
        assert!((decoded.crr - crr).abs() <= 0.00005 + 1e-12);
        assert!((decoded.cwa - cwa).abs() <= 0.005 + 1e-12);
    }
}

#[test]
fn test_simulation_params_saturate() {
    let bytes = encode_simulation_params(10.0, 1.0, 100.0);
    assert_eq!(i16::from_le_bytes([bytes[3], bytes[4]]), i16::MAX);
    assert_eq!(bytes[5], u8::MAX);
    assert_eq!(bytes[6], u8::MAX);

    let bytes = encode_simulation_params(0.01, -0.5, f64::NAN);
    assert_eq!(bytes[5], 0);
    assert_eq!(bytes[6], 0);
}

#[test]
fn test_request_control_and_grant() {
    assert_eq!(encode_request_control(), [0x00]);

    let granted = parse_control_point_response(&[0x80, 0x00, 0x01]).unwrap();
    assert!(granted.is_control_granted());

    let refused = parse_control_point_response(&[0x80, 0x00, 0x05]).unwrap();
    assert_eq!(refused.result, ControlResult::ControlNotPermitted);
    assert!(!refused.is_control_granted());

    // Success for a different op code is not a grant
    let other = parse_control_point_response(&[0x80, 0x11, 0x01]).unwrap();
    assert!(!other.is_control_granted());
}

#[test]
fn test_control_point_response_errors() {
    assert_eq!(
        parse_control_point_response(&[0x11, 0x00, 0x01]),
        Err(ProtocolError::UnexpectedOpCode(0x11))
    );
    assert!(parse_control_point_response(&[0x80, 0x00]).is_err());
}

#[test]
fn test_parse_heart_rate_measurement() {
    // Flags 0x00: u8 BPM
    assert_eq!(parse_heart_rate_measurement(&[0x00, 145]).unwrap(), 145);
    // Flags 0x01: u16 BPM
    assert_eq!(parse_heart_rate_measurement(&[0x01, 0x2C, 0x01]).unwrap(), 300);
    assert!(parse_heart_rate_measurement(&[0x01, 0x2C]).is_err());
}
