use glam::Vec3;
use softbody_core::config::{ContactConfig, FractureConfig};
use softbody_core::{MassDistribution, MaterialPreset, SoftBodyConfig, SoftBodyError, VolumeMode};

#[test]
fn test_config_default_values() {
    let config = SoftBodyConfig::default();

    assert_eq!(config.gravity, Vec3::new(0.0, -9.81, 0.0));
    assert_eq!(config.iterations, 8);
    assert_eq!(config.substeps, 4);
    assert_eq!(config.volume_mode, VolumeMode::CenterTetrahedra);
    assert_eq!(config.mass_distribution, MassDistribution::Uniform);
    assert!(!config.fracture.enabled);
    assert_eq!(config.fracture.threshold, 3.0);
    assert_eq!(config.contact.energy_compensation, 1.0);
    assert!(config.contact.body_coupling);
    assert!(!config.adaptive_quality);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_fills_defaults() {
    let json = r#"{
        "iterations": 12,
        "gravity": [0.0, -1.62, 0.0],
        "volume_mode": "Radial",
        "fracture": { "enabled": true }
    }"#;
    let config: SoftBodyConfig = serde_json::from_str(json).expect("valid config json");

    assert_eq!(config.iterations, 12);
    assert_eq!(config.gravity, Vec3::new(0.0, -1.62, 0.0));
    assert_eq!(config.volume_mode, VolumeMode::Radial);
    assert!(config.fracture.enabled);
    assert_eq!(config.fracture.threshold, FractureConfig::default().threshold);
    assert_eq!(config.substeps, 4);
    assert_eq!(config.contact, ContactConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_json_is_default() {
    let config: SoftBodyConfig = serde_json::from_str("{}").expect("empty object");
    assert_eq!(config, SoftBodyConfig::default());
}

#[test]
fn test_json_round_trip() {
    let config = SoftBodyConfig::default()
        .with_fracture(true)
        .with_fracture_threshold(1.5)
        .with_volume_mode(VolumeMode::None);
    let json = serde_json::to_string(&config).expect("serializable");
    let back: SoftBodyConfig = serde_json::from_str(&json).expect("deserializable");
    assert_eq!(back, config);
}

#[test]
fn test_builder_methods() {
    let config = SoftBodyConfig::default()
        .with_iterations(3)
        .with_substeps(2)
        .with_gravity(Vec3::ZERO)
        .with_damping(0.5)
        .with_shape_memory(0.1)
        .with_fracture(true)
        .with_fracture_threshold(4.5);

    assert_eq!(config.iterations, 3);
    assert_eq!(config.substeps, 2);
    assert_eq!(config.gravity, Vec3::ZERO);
    assert_eq!(config.global_damping, 0.5);
    assert_eq!(config.shape_memory_stiffness, 0.1);
    assert!(config.fracture.enabled);
    assert_eq!(config.fracture.threshold, 4.5);
}

#[test]
fn test_validate_rejects_out_of_range() {
    let cases: Vec<(&str, SoftBodyConfig)> = vec![
        ("iterations", SoftBodyConfig::default().with_iterations(0)),
        ("substeps", SoftBodyConfig::default().with_substeps(0)),
        ("gravity", SoftBodyConfig::default().with_gravity(Vec3::new(0.0, f32::NAN, 0.0))),
        ("damping", SoftBodyConfig::default().with_damping(-0.1)),
        ("shape memory", SoftBodyConfig::default().with_shape_memory(1.5)),
        ("threshold", SoftBodyConfig::default().with_fracture_threshold(0.0)),
        ("stiffness", SoftBodyConfig {
            stiffness: 0.0,
            ..SoftBodyConfig::default()
        }),
        ("dt range", SoftBodyConfig {
            min_dt: 0.1,
            max_dt: 0.01,
            ..SoftBodyConfig::default()
        }),
        ("compliance", SoftBodyConfig {
            shear_compliance: -1.0,
            ..SoftBodyConfig::default()
        }),
    ];

    for (name, config) in cases {
        assert!(
            matches!(config.validate(), Err(SoftBodyError::InvalidConfig(_))),
            "{} should be rejected",
            name
        );
    }

    let mut config = SoftBodyConfig::default();
    config.fracture.stress_decay_rate = 1.0;
    assert!(config.validate().is_err(), "stress must actually decay");

    let mut config = SoftBodyConfig::default();
    config.contact.energy_compensation = 0.0;
    assert!(config.validate().is_err());

    let mut config = SoftBodyConfig::default();
    config.health_check_interval = 0;
    assert!(config.validate().is_err(), "the health check cannot be switched off");

    let mut config = SoftBodyConfig::default();
    config.max_acceleration = 0.0;
    assert!(config.validate().is_err());

    for onset in [0.0, -0.5, 1.5] {
        let mut config = SoftBodyConfig::default();
        config.fracture.stress_onset = onset;
        assert!(config.validate().is_err(), "stress_onset {} should be rejected", onset);
    }
}

#[test]
fn test_material_preset_overrides_only_its_fields() {
    let mut config = SoftBodyConfig::default().with_iterations(5);
    MaterialPreset::GLASS.apply_to(&mut config);

    assert_eq!(config.iterations, 5);
    assert!(config.fracture.enabled);
    assert_eq!(config.fracture.threshold, MaterialPreset::GLASS.fracture_threshold);
    assert!(config.validate().is_ok());
}
