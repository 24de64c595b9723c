//! Topic derivation: `event_type` prefix maps to a small closed set of
//! topics, with a default. Spec §4.4 "Topic selection" — total function,
//! never errors.

/// `topic_for("sensor.X") == "sensor-events"`, `topic_for("user.X") ==
/// "user-actions"`, everything else (including empty or prefix-less
/// event types) maps to `"system-events"`.
pub fn topic_for(event_type: &str) -> &'static str {
    match event_type.split_once('.') {
        Some(("sensor", _)) => "sensor-events",
        Some(("user", _)) => "user-actions",
        _ => "system-events",
    }
}

/// The default topic set a consumer subscribes to when none is
/// configured explicitly (spec §6).
pub const DEFAULT_TOPICS: &[&str] = &["sensor-events", "user-actions", "system-events"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_prefix_maps_to_sensor_events() {
        assert_eq!(topic_for("sensor.reading"), "sensor-events");
    }

    #[test]
    fn user_prefix_maps_to_user_actions() {
        assert_eq!(topic_for("user.login"), "user-actions");
    }

    #[test]
    fn unknown_prefix_maps_to_system_events() {
        assert_eq!(topic_for("billing.charge"), "system-events");
    }

    #[test]
    fn empty_event_type_maps_to_system_events() {
        assert_eq!(topic_for(""), "system-events");
    }

    #[test]
    fn prefix_less_event_type_maps_to_system_events() {
        assert_eq!(topic_for("heartbeat"), "system-events");
    }

    #[test]
    fn is_a_total_function() {
        for input in ["sensor.", "user.", ".", "SENSOR.reading", "sensor"] {
            let _ = topic_for(input);
        }
    }
}
