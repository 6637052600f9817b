//! Unit tests for zone classification.

use spinzone::metrics::zones::{
    max_heart_rate, HeartZone, HeartZones, PowerZone, PowerZones, Zone, ZoneError, ZoneTable,
    HR_ZONE_COLORS, POWER_ZONE_COLORS,
};

#[test]
fn test_power_zones_from_ftp_200() {
    let zones = PowerZones::from_ftp(200).unwrap();

    let expected = [
        (PowerZone::ActiveRecovery, 110.0),
        (PowerZone::Endurance, 150.0),
        (PowerZone::Tempo, 180.0),
        (PowerZone::LactateThreshold, 210.0),
        (PowerZone::Vo2Max, 240.0),
        (PowerZone::AnaerobicCapacity, 300.0),
    ];
    for (zone, upper) in expected {
        let (_, max_watts) = zones.value_bounds(zone).unwrap();
        assert!((max_watts - upper).abs() < 1e-9, "{}: {}", zone, max_watts);
    }

    let (min_watts, max_watts) = zones.value_bounds(PowerZone::NeuromuscularPower).unwrap();
    assert!((min_watts - 300.0).abs() < 1e-9);
    assert_eq!(max_watts, f64::INFINITY);
}

#[test]
fn test_power_zone_lookup() {
    let zones = PowerZones::from_ftp(200).unwrap();

    assert_eq!(zones.classify_value(0.0), PowerZone::ActiveRecovery);
    assert_eq!(zones.classify_value(110.0), PowerZone::ActiveRecovery);
    assert_eq!(zones.classify_value(111.0), PowerZone::Endurance);
    assert_eq!(zones.classify_value(175.0), PowerZone::Tempo);
    assert_eq!(zones.classify_value(200.0), PowerZone::LactateThreshold);
    assert_eq!(zones.classify_value(230.0), PowerZone::Vo2Max);
    assert_eq!(zones.classify_value(290.0), PowerZone::AnaerobicCapacity);
    assert_eq!(zones.classify_value(1200.0), PowerZone::NeuromuscularPower);
}

#[test]
fn test_heart_zones_from_age() {
    let zones = HeartZones::from_age(27).unwrap();

    assert!((zones.max_heart_rate() - 188.1).abs() < 1e-9);
    assert!((max_heart_rate(40) - 179.0).abs() < 1e-9);

    assert_eq!(zones.classify_value(100.0), HeartZone::WarmUp);
    assert_eq!(zones.classify_value(135.0), HeartZone::Endurance);
    assert_eq!(zones.classify_value(150.0), HeartZone::Power);
    assert_eq!(zones.classify_value(170.0), HeartZone::Threshold);
    assert_eq!(zones.classify_value(185.0), HeartZone::MaxCapacity);
}

#[test]
fn test_every_ratio_lands_in_exactly_one_zone() {
    let zones = PowerZones::from_ftp(250).unwrap();

    for i in -200..=600 {
        let ratio = i as f64 * 0.005;
        let zone = zones.classify(ratio);
        let containing: Vec<PowerZone> = zones
            .zones()
            .map(|(z, _)| z)
            .filter(|z| {
                let (lower, upper) = zones.bounds(*z).unwrap();
                lower < ratio && ratio <= upper
            })
            .collect();

        assert_eq!(containing, vec![zone], "ratio {}", ratio);
    }
}

#[test]
fn test_invalid_tables_are_rejected() {
    assert!(matches!(
        PowerZones::from_ftp(0),
        Err(ZoneError::InvalidBaseline(_))
    ));
    assert_eq!(HeartZones::from_age(0), Err(ZoneError::InvalidAge(0)));

    let unordered = ZoneTable::new(
        200.0,
        vec![
            (PowerZone::ActiveRecovery, 0.75),
            (PowerZone::Endurance, 0.55),
            (PowerZone::Tempo, f64::INFINITY),
        ],
    );
    assert_eq!(
        unordered,
        Err(ZoneError::NotIncreasing {
            index: 1,
            value: 0.55
        })
    );

    let bounded = ZoneTable::new(200.0, vec![(PowerZone::ActiveRecovery, 1.0)]);
    assert_eq!(bounded, Err(ZoneError::BoundedTop(1.0)));
}

#[test]
fn test_zone_values_and_colors() {
    assert_eq!(PowerZone::NoZone.value(), 0);
    assert_eq!(PowerZone::NeuromuscularPower.value(), 7);
    assert_eq!(HeartZone::MaxCapacity.value(), 5);

    assert_eq!(HR_ZONE_COLORS.len(), 6);
    assert_eq!(POWER_ZONE_COLORS.len(), 8);
    assert_eq!(HeartZone::NoZone.color().hex(), "#85AAD5");
    assert_eq!(PowerZone::NeuromuscularPower.color().hex(), "#BF211E");
    assert_eq!(PowerZone::Vo2Max.to_string(), "VO2 Max");
}
