// Payload normalization - alias-laden vehicle payloads into the canonical schema
use serde_json::Value;

use crate::domain::status::StatusPatch;

// Alias precedence is first-match-wins; the order of these tables is
// behavior, not style.
const ALTITUDE_ALIASES: &[&str] = &["altitude", "alt"];
const SPEED_ALIASES: &[&str] = &["speed", "velocity"];
const BATTERY_PERCENT_ALIASES: &[&str] = &["battery_percent", "battery", "percent"];
const BATTERY_VOLTAGE_ALIASES: &[&str] = &["battery_voltage", "voltage"];
const LATITUDE_ALIASES: &[&str] = &["lat", "latitude"];
const LONGITUDE_ALIASES: &[&str] = &["lon", "longitude"];

// Envelope fields probed for a nested JSON-encoded object (raw transports
// wrap the real payload in a string).
const ENVELOPE_KEYS: &[&str] = &["payload", "data"];

/// Map an untrusted decoded payload into a partial status update. Pure and
/// synchronous; any input shape is possible and a non-object simply yields
/// an empty patch (the raw value stays eligible for logging upstream).
pub fn normalize(topic: &str, payload: &Value) -> StatusPatch {
    let unwrapped = unwrap_envelope(payload);
    let effective = unwrapped.as_ref().unwrap_or(payload);

    let Some(map) = effective.as_object() else {
        return StatusPatch::default();
    };

    let mut patch = StatusPatch {
        altitude: first_numeric(map, ALTITUDE_ALIASES),
        speed: first_numeric(map, SPEED_ALIASES),
        battery_percent: first_numeric(map, BATTERY_PERCENT_ALIASES),
        battery_voltage: first_numeric(map, BATTERY_VOLTAGE_ALIASES),
        gps_relative: first_lexical(map, &["gps_relative"]),
        mission_time: first_lexical(map, &["mission_time"]),
        flight_mode: first_lexical(map, &["flight_mode", "mode"]),
        gps_global: None,
    };

    if let (Some(lat), Some(lon)) = (
        first_lexical(map, LATITUDE_ALIASES),
        first_lexical(map, LONGITUDE_ALIASES),
    ) {
        // String concatenation on purpose: the source precision survives.
        patch.gps_global = Some(format!("{lat},{lon}"));
    }

    // On the battery topic a bare percent/voltage key always wins over
    // whatever the alias tables resolved. Deliberately scoped to topics
    // ending in "battery"; the source never applied it elsewhere.
    if topic.ends_with("battery") {
        if let Some(v) = numeric(non_null(map.get("percent"))) {
            patch.battery_percent = Some(v);
        }
        if let Some(v) = numeric(non_null(map.get("voltage"))) {
            patch.battery_voltage = Some(v);
        }
    }

    patch
}

/// If the payload is an envelope object whose `payload`/`data` field is a
/// JSON-encoded string that decodes to an object, return that object.
fn unwrap_envelope(payload: &Value) -> Option<Value> {
    let map = payload.as_object()?;
    for key in ENVELOPE_KEYS {
        if let Some(Value::String(raw)) = map.get(*key) {
            if let Ok(inner @ Value::Object(_)) = serde_json::from_str::<Value>(raw) {
                return Some(inner);
            }
        }
    }
    None
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn first_present<'a>(
    map: &'a serde_json::Map<String, Value>,
    aliases: &[&str],
) -> Option<&'a Value> {
    aliases.iter().find_map(|key| non_null(map.get(*key)))
}

/// First present alias coerced to f64. JSON numbers and numeric strings
/// both count; other shapes are skipped entirely.
fn first_numeric(map: &serde_json::Map<String, Value>, aliases: &[&str]) -> Option<f64> {
    numeric(first_present(map, aliases))
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First present alias rendered as text, preserving how numbers were
/// written on the wire.
fn first_lexical(map: &serde_json::Map<String, Value>, aliases: &[&str]) -> Option<String> {
    match first_present(map, aliases)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
