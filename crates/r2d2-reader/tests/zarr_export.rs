//! Integration tests for exporting reconstructed arrays to a zarr store.

use ndarray::{Array1, Ix3};
use r2d2_reader::{Dataset, ReaderError, ZarrOptions, ZarrStore};
use test_utils::{assert_all_approx_eq, field_value, SyntheticRun};

const STEP: u32 = 5;

fn options() -> ZarrOptions {
    // chunks smaller than the 8x8x3 grid so the store holds several per array
    ZarrOptions {
        chunks: [3, 5, 2],
        profile_chunk: 4,
        compression_level: 3,
    }
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_full_volume_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let run = SyntheticRun::cartesian(2, 2, 1, 4, 4, 3);
    let datadir = run.write(tmp.path()).unwrap();
    run.write_step(&datadir, STEP).unwrap();

    let mut dataset = Dataset::open(&datadir).unwrap();
    dataset.full.read(STEP, ["ro", "vx", "se"]).unwrap();

    let store = ZarrStore::create(tmp.path().join("export.zarr")).unwrap();
    let written = store.save_buffers(dataset.full.buffers(), &options()).unwrap();
    assert_eq!(written, 3);

    let x = Array1::from_iter(dataset.metadata().grid().x.iter().map(|&v| v as f32));
    store.save("x", x.view().into_dyn(), &options()).unwrap();

    let store = ZarrStore::open(store.path()).unwrap();
    assert_eq!(store.variables().unwrap(), vec!["ro", "se", "vx", "x"]);

    for name in ["ro", "vx", "se"] {
        let loaded = store.load(name).unwrap().into_dimensionality::<Ix3>().unwrap();
        let held = dataset.full.get(name).unwrap();
        assert_eq!(loaded.dim(), (8, 8, 3));
        assert_all_approx_eq!(loaded.iter(), held.iter(), 0.0);
    }

    // ro is slot 0, vx slot 1
    let vx = store.load("vx").unwrap();
    assert_eq!(vx[[6, 2, 1]], field_value(1, 6, 2, 1, STEP));
    assert_eq!(vx[[3, 7, 0]], field_value(1, 3, 7, 0, STEP));

    let loaded_x = store.load("x").unwrap();
    assert_all_approx_eq!(loaded_x.iter(), x.iter(), 0.0);
}

#[test]
fn test_export_of_later_read_replaces_arrays() {
    let tmp = tempfile::tempdir().unwrap();
    let run = SyntheticRun::cartesian(2, 2, 1, 4, 4, 3);
    let datadir = run.write(tmp.path()).unwrap();
    run.write_step(&datadir, STEP).unwrap();
    run.write_step(&datadir, STEP + 1).unwrap();

    let mut dataset = Dataset::open(&datadir).unwrap();
    let store = ZarrStore::create(tmp.path().join("export.zarr")).unwrap();

    dataset.full.read(STEP, ["ro", "vx"]).unwrap();
    store.save_buffers(dataset.full.buffers(), &options()).unwrap();
    dataset.full.read(STEP + 1, ["vx"]).unwrap();
    store.save_buffers(dataset.full.buffers(), &options()).unwrap();

    // ro from the first export stays, vx holds the later step
    assert_eq!(store.variables().unwrap(), vec!["ro", "vx"]);
    let vx = store.load("vx").unwrap();
    assert_eq!(vx[[1, 1, 1]], field_value(1, 1, 1, 1, STEP + 1));
    let ro = store.load("ro").unwrap();
    assert_eq!(ro[[1, 1, 1]], field_value(0, 1, 1, 1, STEP));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_load_missing_variable_lists_stored_ones() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ZarrStore::create(tmp.path().join("export.zarr")).unwrap();
    let profile = Array1::<f32>::zeros(5);
    store.save("z", profile.view().into_dyn(), &options()).unwrap();

    let err = store.load("ro").unwrap_err();
    assert!(err.is_request_error());
    match err {
        ReaderError::UnknownVariable { expected, .. } => assert_eq!(expected, vec!["z"]),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_invalid_options_write_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let store = ZarrStore::create(tmp.path().join("export.zarr")).unwrap();
    let bad = ZarrOptions {
        compression_level: 10,
        ..options()
    };

    let profile = Array1::<f32>::ones(4);
    let err = store.save("y", profile.view().into_dyn(), &bad).unwrap_err();
    assert!(matches!(err, ReaderError::Config(_)));
    assert!(store.variables().unwrap().is_empty());
}
