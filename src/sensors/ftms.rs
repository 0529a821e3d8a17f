//! FTMS (Fitness Machine Service) protocol codec.
//!
//! Decodes Indoor Bike Data notifications and Control Point responses, and
//! encodes the Control Point requests used for simulation mode. Nothing here
//! touches a transport; every function works on byte slices.

use uuid::Uuid;

use crate::sensors::types::{now_millis, ProtocolError, TelemetryFrame};

/// FTMS Service UUID (0x1826)
pub const FTMS_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1826_0000_1000_8000_0080_5f9b_34fb);

/// Indoor Bike Data Characteristic UUID (0x2AD2)
pub const INDOOR_BIKE_DATA_UUID: Uuid = Uuid::from_u128(0x0000_2ad2_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Control Point UUID (0x2AD9)
pub const FTMS_CONTROL_POINT_UUID: Uuid =
    Uuid::from_u128(0x0000_2ad9_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Service UUID (0x180D)
pub const HEART_RATE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_180d_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Measurement UUID (0x2A37)
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a37_0000_1000_8000_0080_5f9b_34fb);

/// Length of an encoded Set Indoor Bike Simulation Parameters request.
pub const SIMULATION_PARAMS_LEN: usize = 7;

/// FTMS Control Point opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FtmsControlOpcode {
    /// Request control of the fitness machine
    RequestControl = 0x00,
    /// Reset the fitness machine
    Reset = 0x01,
    /// Set indoor bike simulation parameters
    SetIndoorBikeSimulation = 0x11,
    /// Marker byte leading every control point response
    ResponseCode = 0x80,
}

/// FTMS Control Point result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResult {
    Success,
    OpCodeNotSupported,
    InvalidParameter,
    OperationFailed,
    ControlNotPermitted,
    Unknown(u8),
}

impl From<u8> for ControlResult {
    fn from(code: u8) -> Self {
        match code {
            0x01 => ControlResult::Success,
            0x02 => ControlResult::OpCodeNotSupported,
            0x03 => ControlResult::InvalidParameter,
            0x04 => ControlResult::OperationFailed,
            0x05 => ControlResult::ControlNotPermitted,
            other => ControlResult::Unknown(other),
        }
    }
}

/// Parsed Control Point response: `[0x80, request_op, result]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPointResponse {
    pub request_op: u8,
    pub result: ControlResult,
}

impl ControlPointResponse {
    /// The only response that grants write authority.
    pub fn is_control_granted(&self) -> bool {
        self.request_op == FtmsControlOpcode::RequestControl as u8
            && self.result == ControlResult::Success
    }
}

/// Fields of an Indoor Bike Data notification that the simulation uses.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndoorBikeData {
    /// Instantaneous speed in km/h (if present)
    pub speed_kmh: Option<f64>,
    /// Instantaneous cadence in RPM (if present)
    pub cadence_rpm: Option<f64>,
    /// Instantaneous power in watts (if present)
    pub power_watts: Option<i16>,
}

impl IndoorBikeData {
    /// Stamp the decoded fields into a telemetry frame.
    pub fn into_frame(self, timestamp_ms: u64) -> TelemetryFrame {
        TelemetryFrame {
            power_w: self.power_watts,
            speed_kmh: self.speed_kmh,
            cadence_rpm: self.cadence_rpm,
            timestamp_ms,
        }
    }
}

/// Simulation parameters as carried by op code 0x11.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Wind speed in m/s
    pub wind_speed_ms: f64,
    /// Grade as rise/run
    pub grade: f64,
    /// Rolling resistance coefficient
    pub crr: f64,
    /// Wind resistance coefficient (½·ρ·CdA) in kg/m
    pub cwa: f64,
}

/// Bounds-checked little-endian reader over a notification payload.
struct FrameReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FrameReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let end = self.offset + N;
        let bytes = self
            .data
            .get(self.offset..end)
            .ok_or(ProtocolError::Truncated {
                needed: end,
                available: self.data.len(),
            })?;
        self.offset = end;

        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        let end = self.offset + len;
        if end > self.data.len() {
            return Err(ProtocolError::Truncated {
                needed: end,
                available: self.data.len(),
            });
        }
        self.offset = end;
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.take::<2>()?))
    }

    fn i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(i16::from_le_bytes(self.take::<2>()?))
    }
}

// Indoor Bike Data flag bits
const FLAG_MORE_DATA: u16 = 0x0001;
const FLAG_AVG_SPEED: u16 = 0x0002;
const FLAG_INST_CADENCE: u16 = 0x0004;
const FLAG_AVG_CADENCE: u16 = 0x0008;
const FLAG_TOTAL_DISTANCE: u16 = 0x0010;
const FLAG_RESISTANCE_LEVEL: u16 = 0x0020;
const FLAG_INST_POWER: u16 = 0x0040;
const FLAG_AVG_POWER: u16 = 0x0080;

/// Parse an Indoor Bike Data (0x2AD2) notification.
///
/// The data format is:
/// - Bytes 0-1: Flags (indicates which fields are present)
/// - Remaining bytes: Data fields in order based on flags
///
/// Note: If "More Data" flag (bit 0) is NOT set, instantaneous speed is
/// present. Skipped fields still advance the cursor by their width. Fields
/// after average power are never read.
pub fn parse_indoor_bike_data(data: &[u8]) -> Result<IndoorBikeData, ProtocolError> {
    let mut reader = FrameReader::new(data);
    let flags = reader.u16()?;
    let mut result = IndoorBikeData::default();

    if flags & FLAG_MORE_DATA == 0 {
        // 0.01 km/h units
        result.speed_kmh = Some(reader.u16()? as f64 / 100.0);
    }

    if flags & FLAG_AVG_SPEED != 0 {
        reader.skip(2)?;
    }

    if flags & FLAG_INST_CADENCE != 0 {
        // 0.5 RPM units
        result.cadence_rpm = Some(reader.u16()? as f64 / 2.0);
    }

    if flags & FLAG_AVG_CADENCE != 0 {
        reader.skip(2)?;
    }

    if flags & FLAG_TOTAL_DISTANCE != 0 {
        reader.skip(3)?;
    }

    if flags & FLAG_RESISTANCE_LEVEL != 0 {
        reader.skip(2)?;
    }

    if flags & FLAG_INST_POWER != 0 {
        result.power_watts = Some(reader.i16()?);
    }

    if flags & FLAG_AVG_POWER != 0 {
        reader.skip(2)?;
    }

    Ok(result)
}

/// Decode an Indoor Bike Data notification stamped with the current time.
pub fn parse_telemetry(data: &[u8]) -> Result<TelemetryFrame, ProtocolError> {
    Ok(parse_indoor_bike_data(data)?.into_frame(now_millis()))
}

/// Build a control point command to request control.
pub fn encode_request_control() -> [u8; 1] {
    [FtmsControlOpcode::RequestControl as u8]
}

/// Build a control point command to reset the machine.
pub fn encode_reset() -> [u8; 1] {
    [FtmsControlOpcode::Reset as u8]
}

/// Scale to wire units and round once, half away from zero.
fn quantize_i16(value: f64, scale: f64) -> i16 {
    // `as` saturates and maps NaN to 0
    (value * scale).round() as i16
}

fn quantize_u8(value: f64, scale: f64) -> u8 {
    (value * scale).round() as u8
}

/// Build a Set Indoor Bike Simulation Parameters command.
///
/// `grade` - rise/run, sent as sint16 with 0.01% resolution
/// `crr` - rolling resistance coefficient, uint8 with 0.0001 resolution
/// `cwa` - wind resistance coefficient in kg/m, uint8 with 0.01 resolution
///
/// Wind speed is always sent as 0; wind is modeled through drafting instead.
/// Out-of-range values saturate to the field limits.
pub fn encode_simulation_params(grade: f64, crr: f64, cwa: f64) -> [u8; SIMULATION_PARAMS_LEN] {
    let wind = 0i16.to_le_bytes();
    let grade = quantize_i16(grade, 10_000.0).to_le_bytes();

    [
        FtmsControlOpcode::SetIndoorBikeSimulation as u8,
        wind[0],
        wind[1],
        grade[0],
        grade[1],
        quantize_u8(crr, 10_000.0),
        quantize_u8(cwa, 100.0),
    ]
}

/// Decode a Set Indoor Bike Simulation Parameters command.
pub fn decode_simulation_params(data: &[u8]) -> Result<SimulationParams, ProtocolError> {
    let mut reader = FrameReader::new(data);

    let op = reader.u8()?;
    if op != FtmsControlOpcode::SetIndoorBikeSimulation as u8 {
        return Err(ProtocolError::UnexpectedOpCode(op));
    }

    let wind = reader.i16()?;
    let grade = reader.i16()?;
    let crr = reader.u8()?;
    let cw = reader.u8()?;

    Ok(SimulationParams {
        wind_speed_ms: wind as f64 * 0.001,
        grade: grade as f64 / 10_000.0,
        crr: crr as f64 * 0.0001,
        cwa: cw as f64 * 0.01,
    })
}

/// Parse a Control Point indication.
pub fn parse_control_point_response(data: &[u8]) -> Result<ControlPointResponse, ProtocolError> {
    let mut reader = FrameReader::new(data);

    let marker = reader.u8()?;
    if marker != FtmsControlOpcode::ResponseCode as u8 {
        return Err(ProtocolError::UnexpectedOpCode(marker));
    }

    let request_op = reader.u8()?;
    let result = ControlResult::from(reader.u8()?);

    Ok(ControlPointResponse { request_op, result })
}

/// Parse a Heart Rate Measurement notification into BPM.
///
/// Bit 0 of the flags byte selects a u16 (set) or u8 (clear) value.
pub fn parse_heart_rate_measurement(data: &[u8]) -> Result<u16, ProtocolError> {
    let mut reader = FrameReader::new(data);
    let flags = reader.u8()?;

    if flags & 0x01 != 0 {
        reader.u16()
    } else {
        Ok(reader.u8()? as u16)
    }
}

/// Hex rendering used by debug logs.
pub fn to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
