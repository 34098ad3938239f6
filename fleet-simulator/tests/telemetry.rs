//! Randomized checks of generated telemetry against the metric schemas

use chrono::{Duration, NaiveDate, Utc};
use fleet_devkit::{device, SchemaBook};
use fleet_simulator::{generate, DeviceType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_generated_metrics_fit_schema_at_any_hour() {
    let book = SchemaBook::standard();
    let mut rng = StdRng::seed_from_u64(2024);
    let midnight = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();

    let mut kinds = DeviceType::KNOWN.to_vec();
    kinds.push(DeviceType::Unknown("GEIGER_COUNTER".to_string()));

    for kind in kinds {
        let probe = device("probe-1", kind.clone(), 1000);
        for _ in 0..1_000 {
            let now = midnight + Duration::seconds(rng.gen_range(0..86_400));
            let msg = generate(&probe, &now, &mut rng);
            book.validate(&kind, &msg)
                .unwrap_or_else(|e| panic!("{} at {}: {}", kind, now, e));
            assert_eq!(msg.device_id, "probe-1");
            assert_eq!(msg.timestamp, now);
        }
    }
}

#[test]
fn test_payload_bytes_round_trip_identity() {
    let book = SchemaBook::standard();
    let mut rng = StdRng::seed_from_u64(11);

    for kind in DeviceType::KNOWN {
        let probe = device("wire-1", kind, 1000);
        let now = Utc::now();
        let msg = generate(&probe, &now, &mut rng);
        let bytes = serde_json::to_vec(&msg).unwrap();

        let decoded = book.validate_payload(&probe, &bytes).unwrap();
        assert_eq!(decoded.device_id, probe.id);
        assert_eq!(decoded.metrics, msg.metrics);
    }
}
