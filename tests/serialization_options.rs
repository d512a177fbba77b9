//! JSON round-trips of build settings and feature descriptors.

use tin::prelude::*;

#[test]
fn options_survive_json() {
    let options = TinOptionsBuilder::default()
        .pp_tol(1e-3)
        .edge_option(EdgeOption::MaxSide)
        .max_side(5.0)
        .processors(2_usize)
        .rollback(true)
        .precision_sliver_removal(false)
        .build()
        .unwrap();
    let json = serde_json::to_string_pretty(&options).unwrap();
    let back: TinOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(back, options);
    assert!(json.contains("\"MaxSide\""));
}

#[test]
fn empty_object_deserializes_to_defaults() {
    let options: TinOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(options, TinOptions::default());
}

#[test]
fn feature_specs_survive_json() {
    let specs = vec![
        FeatureSpec::offsets(FeatureKind::Breakline, vec![0, 5, 9]).with_user_tag(12),
        FeatureSpec::coordinates(
            FeatureKind::Hull,
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(0.5, 1.0 / 3.0, 1.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
        )
        .with_id(FeatureId(40))
        .draped(),
    ];
    let json = serde_json::to_string(&specs).unwrap();
    let back: Vec<FeatureSpec> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, specs);
}

#[test]
fn deserialized_options_drive_a_build() {
    let options: TinOptions =
        serde_json::from_str(r#"{"edge_option": "Sliver", "sliver_ratio": 0.05, "processors": 1}"#).unwrap();
    let build = TinBuilder::new(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(4.0, 0.0, 0.0),
        Point3::new(4.0, 4.0, 0.0),
        Point3::new(0.0, 4.0, 0.0),
        Point3::new(2.0, 0.05, 0.0),
    ])
    .options(options)
    .build()
    .unwrap();
    assert_eq!(build.report.edge_option, EdgeOption::Sliver);
    assert!(build.report.removed_edges >= 1);
    assert_eq!(build.tin.validate(), Ok(()));
}
