//! Integration tests for loading run metadata from synthetic runs.

use std::path::Path;

use r2d2_reader::{
    Dataset, Dimensionality, EosQuantity, Geometry, ReaderConfig, ReaderError, RunMetadata,
};
use test_utils::{assert_approx_eq, background_value, eos_log_value, SyntheticRun};

/// 8x8x3 Cartesian run split over a 2x2 worker grid.
fn scenario() -> SyntheticRun {
    SyntheticRun::cartesian(2, 2, 1, 4, 4, 3)
}

fn load(datadir: &Path) -> RunMetadata {
    RunMetadata::load(datadir, &ReaderConfig::default()).expect("Failed to load metadata")
}

// =============================================================================
// Grid and parameters
// =============================================================================

#[test]
fn test_grid_counts_and_coordinates() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    let metadata = load(&datadir);
    let grid = metadata.grid();

    assert_eq!(grid.geometry, Geometry::Cartesian);
    assert_eq!(grid.dimensionality, Dimensionality::ThreeD);
    assert_eq!((grid.ix, grid.jx, grid.kx), (8, 8, 3));
    assert_eq!((grid.ixg, grid.jxg, grid.kxg), (10, 10, 5));
    assert_eq!(grid.ghost, [1, 1, 1]);

    assert_eq!(grid.x.len(), 8);
    assert_approx_eq!(grid.x[0], 0.5, 1e-12);
    assert_approx_eq!(grid.x[7], 7.5, 1e-12);
    assert_approx_eq!(grid.xg[0], -0.5, 1e-12);
    assert_approx_eq!(grid.z[2], 2.5, 1e-12);

    assert_eq!(grid.x_flux.len(), 9);
    assert_approx_eq!(grid.x_flux[0], 0.0, 1e-12);
    assert_approx_eq!(grid.x_flux[8], 8.0, 1e-12);

    // no rstar in the parameter table: solar radius
    assert_approx_eq!(metadata.rstar(), 6.957e10, 1.0);
    assert_approx_eq!(grid.xr[1], 1.5 / 6.957e10, 1e-20);
}

#[test]
fn test_background_profiles() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    let metadata = load(&datadir);
    let background = metadata.background();

    let pr0 = background.profile("pr0").unwrap();
    assert_eq!(pr0.len(), 8);
    assert_eq!(pr0[0], background_value(0, 1));

    let xi = background.profile_with_ghosts("xi").unwrap();
    assert_eq!(xi.len(), 10);
    assert_eq!(xi[9], background_value(19, 9));
    assert_eq!(background.names().count(), 20);
    assert!(background.profile("unknown").is_none());
}

#[test]
fn test_steps_and_params() {
    let tmp = tempfile::tempdir().unwrap();
    let run = scenario().with_steps(12, 2);
    let datadir = run.write(tmp.path()).unwrap();
    for step in 0..=6 {
        run.write_time(&datadir, "tau", step).unwrap();
    }

    let metadata = load(&datadir);
    assert_eq!(metadata.steps().nd, 12);
    // seven tau time stamps raise the counter to 6
    assert_eq!(metadata.steps().nd_tau, 6);
    assert_eq!(metadata.params().int("mtype").unwrap(), 8);
    assert_eq!(metadata.catalogue().mtype(), 8);
}

#[test]
fn test_worker_positions() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    let metadata = load(&datadir);

    let positions = metadata.worker_positions();
    assert_eq!(positions.len(), 4);
    assert_eq!(positions[1], [1, 0, 0]);
    assert_eq!(positions[2], [0, 1, 0]);
}

#[test]
fn test_decomposition_lookups() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    let metadata = load(&datadir);
    let decomposition = metadata.decomposition().unwrap();

    assert_eq!(decomposition.worker_count(), 4);
    assert_eq!(decomposition.grid_shape(), (2, 2));
    assert_eq!(decomposition.owner_of(5, 1), Some(1));
    assert_eq!(decomposition.owner_of(2, 6), Some(2));
    assert_eq!(decomposition.row_of(4), Some(1));
    assert_eq!(decomposition.col_of(3), Some(0));
    assert_eq!(decomposition.row_range(1).unwrap(), 4..8);
    assert_eq!(decomposition.worker_at(1, 1).unwrap().rank, 3);
    assert!(decomposition.validate_tiling(8, 8).is_ok());
}

#[test]
fn test_idle_workers_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    // 8 ranks, only 4 of them on the remap worker grid
    let run = SyntheticRun::cartesian(2, 2, 2, 4, 4, 2);
    let datadir = run.write(tmp.path()).unwrap();
    let metadata = load(&datadir);
    let decomposition = metadata.decomposition().unwrap();

    assert_eq!(decomposition.worker_count(), 8);
    assert_eq!(decomposition.active_workers().count(), 4);
    assert!(decomposition.workers()[6].is_idle());
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_missing_step_counters() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    std::fs::remove_file(datadir.join("param/nd.dac")).unwrap();

    match RunMetadata::load(&datadir, &ReaderConfig::default()) {
        Err(ReaderError::MissingFile(path)) => assert!(path.ends_with("param/nd.dac")),
        other => panic!("expected missing file, got {:?}", other),
    }
}

#[test]
fn test_missing_parameter() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    let path = datadir.join("param/params.dac");
    let text = std::fs::read_to_string(&path).unwrap();
    let kept: Vec<&str> = text.lines().filter(|l| !l.contains(" mtype ")).collect();
    std::fs::write(&path, kept.join("\n")).unwrap();

    match RunMetadata::load(&datadir, &ReaderConfig::default()) {
        Err(ReaderError::MissingParameter(key)) => assert_eq!(key, "mtype"),
        other => panic!("expected missing parameter, got {:?}", other),
    }
}

#[test]
fn test_truncated_decomposition_table() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    let path = datadir.join("remap/remap_info.dac");
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

    let err = RunMetadata::load(&datadir, &ReaderConfig::default()).unwrap_err();
    assert!(matches!(err, ReaderError::Truncated { .. }));
}

#[test]
fn test_overlapping_workers_fail_tiling() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    let path = datadir.join("remap/remap_info.dac");
    let mut bytes = std::fs::read(&path).unwrap();
    // rank 3 (fourth little-endian i32 of iss) now starts at the first cell
    bytes[12..16].copy_from_slice(&1i32.to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    let err = RunMetadata::load(&datadir, &ReaderConfig::default()).unwrap_err();
    assert!(matches!(err, ReaderError::DecompositionMismatch(_)));

    let config = ReaderConfig {
        validate_tiling: false,
        ..Default::default()
    };
    let metadata = RunMetadata::load(&datadir, &config).unwrap();
    assert!(metadata.decomposition().unwrap().validate_tiling(8, 8).is_err());
}

// =============================================================================
// Optional products
// =============================================================================

#[test]
fn test_optional_products_absent() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    let metadata = load(&datadir);

    assert!(matches!(metadata.eos(), Err(ReaderError::CapabilityUnavailable(_))));
    assert!(matches!(metadata.slices(), Err(ReaderError::CapabilityUnavailable(_))));
    assert!(matches!(metadata.on_the_fly(), Err(ReaderError::CapabilityUnavailable(_))));
    assert!(matches!(metadata.overset(), Err(ReaderError::CapabilityUnavailable(_))));
    assert!(metadata.origin().is_none());
}

#[test]
fn test_unreadable_optional_products_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = scenario().write(tmp.path()).unwrap();
    std::fs::create_dir_all(datadir.join("remap/vl")).unwrap();
    std::fs::write(datadir.join("remap/vl/c.dac"), "not a catalogue\n").unwrap();
    let input_data = datadir.parent().unwrap().join("input_data");
    std::fs::create_dir_all(&input_data).unwrap();
    std::fs::write(input_data.join("eos_table_sero.npz"), b"junk").unwrap();

    let metadata = load(&datadir);
    assert!(matches!(metadata.on_the_fly(), Err(ReaderError::CapabilityUnavailable(_))));
    assert!(matches!(metadata.eos(), Err(ReaderError::CapabilityUnavailable(_))));

    // an explicitly configured archive must be readable
    let config = ReaderConfig {
        eos_archive: Some(input_data.join("eos_table_sero.npz")),
        ..ReaderConfig::default()
    };
    assert!(RunMetadata::load(&datadir, &config).is_err());
}

#[test]
fn test_origin_from_cont_log() {
    let tmp = tempfile::tempdir().unwrap();
    let run = scenario();
    let datadir = run.write(tmp.path()).unwrap();
    run.write_cont_log(&datadir, "d042").unwrap();

    let metadata = load(&datadir);
    assert_eq!(metadata.origin(), Some("d042"));
}

#[test]
fn test_eos_loaded_from_run_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let run = scenario();
    let datadir = run.write(tmp.path()).unwrap();
    run.write_eos(&datadir).unwrap();

    let metadata = load(&datadir);
    let eos = metadata.eos().unwrap();
    assert!(eos.log_dprdro().is_some());

    // table node: exact
    let v = eos.eval((-10.0f64).exp(), 2.0, EosQuantity::Pressure).unwrap();
    let expected = eos_log_value(0, -10.0, 2.0).exp();
    assert_approx_eq!(v / expected, 1.0, 1e-10);

    // between nodes: log-linear tables interpolate exactly
    let v = eos.eval((-7.3f64).exp(), 1.15, EosQuantity::Opacity).unwrap();
    let expected = eos_log_value(3, -7.3, 1.15).exp();
    assert_approx_eq!(v / expected, 1.0, 1e-10);

    match eos.eval(1.0e3, 1.0, EosQuantity::Temperature) {
        Err(ReaderError::EosOutOfRange { axis, .. }) => assert_eq!(axis, "ro"),
        other => panic!("expected out of range, got {:?}", other),
    }
    assert!(eos.eval(1.0e-5, 4.5, EosQuantity::Energy).is_err());
}

#[test]
fn test_eos_disabled_and_explicit_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let run = scenario();
    let datadir = run.write(tmp.path()).unwrap();
    run.write_eos(&datadir).unwrap();

    let config = ReaderConfig {
        load_eos: false,
        ..Default::default()
    };
    let metadata = RunMetadata::load(&datadir, &config).unwrap();
    assert!(metadata.eos().is_err());

    let config = ReaderConfig {
        eos_archive: Some(tmp.path().join("elsewhere.npz")),
        ..Default::default()
    };
    let err = RunMetadata::load(&datadir, &config).unwrap_err();
    assert!(matches!(err, ReaderError::MissingFile(_)));
}

#[test]
fn test_summary_serialises() {
    let tmp = tempfile::tempdir().unwrap();
    let run = scenario().big_endian();
    let datadir = run.write(tmp.path()).unwrap();
    let metadata = load(&datadir);

    let summary = metadata.summary();
    assert_eq!(summary.grid, [8, 8, 3]);
    assert_eq!(summary.workers, 4);
    assert!(!summary.has_eos);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["geometry"], "Cartesian");
    assert_eq!(json["byte_order"], "big");
    assert_eq!(json["nd"], 5);

    let text = summary.to_json().unwrap();
    assert!(text.contains("\"workers\": 4"));
}

// =============================================================================
// Yin-Yang
// =============================================================================

#[test]
fn test_yin_yang_merged_grid() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = SyntheticRun::yin_yang(1, 1, 1, 4, 4, 6).write(tmp.path()).unwrap();
    let metadata = load(&datadir);
    let grid = metadata.grid();

    assert_eq!(grid.geometry, Geometry::YinYang);
    assert_eq!((grid.ix, grid.jx, grid.kx), (4, 8, 16));
    assert_approx_eq!(grid.y[0], std::f64::consts::PI / 16.0, 1e-12);

    let patch = grid.yin_yang.as_ref().unwrap();
    assert_eq!((patch.jx, patch.kx, patch.jxg, patch.kxg), (4, 6, 6, 8));
    assert_approx_eq!(metadata.rstar(), 6.957e10, 1.0);
}

#[test]
fn test_overset_geometry_is_memoised() {
    let tmp = tempfile::tempdir().unwrap();
    let datadir = SyntheticRun::yin_yang(1, 1, 1, 4, 4, 6).write(tmp.path()).unwrap();
    let dataset = Dataset::open(&datadir).unwrap();
    let metadata = dataset.metadata();

    assert!(!metadata.overset_ready());
    let first = metadata.overset().unwrap();
    let second = metadata.overset().unwrap();
    assert!(std::ptr::eq(first, second));
    assert!(metadata.overset_ready());

    assert_eq!(first.colat.dim(), (4, 6));
    assert_eq!(first.colat_ghost.dim(), (6, 8));

    // mapping the mapped mesh returns the original mesh
    for ((&c, &l), (&co, &lo)) in first
        .colat_other
        .iter()
        .zip(first.lon_other.iter())
        .zip(first.colat.iter().zip(first.lon.iter()))
    {
        // longitude is undefined at the poles of the other patch
        if c.sin() < 1e-6 {
            continue;
        }
        let (c2, l2) = r2d2_reader::yang_to_yin(c, l);
        assert_approx_eq!(c2, co, 1e-10);
        assert_approx_eq!(l2, lo, 1e-10);
    }
}
