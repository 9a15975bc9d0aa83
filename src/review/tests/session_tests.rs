//! End-to-end review of a small mask: overlays, hover, decisions, ledger
//! files and a double check.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ReviewConfig;
use crate::data::LabelMask;
use crate::format::{FormatError, LedgerRow, load_rows};
use crate::model::DecisionState;
use crate::review::{Navigation, ReviewSession, SessionError};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Scratch directory unique to one test.
fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("maskreview-{}-{}", test, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Ids 1 and 2 in disjoint regions; id 3 split in two parts.
fn fixture_mask() -> LabelMask {
    LabelMask::from_rows(&[
        [1, 1, 0, 0, 0, 3],
        [1, 1, 0, 2, 0, 0],
        [0, 0, 0, 2, 0, 0],
        [3, 0, 0, 2, 2, 0],
    ])
    .unwrap()
}

fn ready_session(config: &ReviewConfig) -> ReviewSession {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = ReviewSession::new(fixture_mask(), config).unwrap();
    assert!(session.wait_for_overview(TIMEOUT).unwrap());
    session
}

#[test]
fn test_hover_then_leave_restores_overview() {
    let mut session = ready_session(&ReviewConfig::default());
    let overview = session.layers().overview.clone().unwrap();

    assert_eq!(session.hover_at(1, 3), Some(2));
    assert_ne!(session.current_overlay(), Some(&overview));
    // Hovering the same object again changes nothing.
    let highlighted = session.current_overlay().cloned();
    assert_eq!(session.hover_at(2, 3), Some(2));
    assert_eq!(session.current_overlay().cloned(), highlighted);

    assert_eq!(session.hover_at(-1, 40), None);
    let shown = session.current_overlay().unwrap();
    assert_eq!(shown.as_bytes(), overview.as_bytes());
}

#[test]
fn test_overview_colors_each_object_alone() {
    let session = ready_session(&ReviewConfig::default());
    let overview = session.layers().overview.as_ref().unwrap();
    let registry = session.registry();

    for row in 0..4 {
        for col in 0..6 {
            let px = overview.pixel(row, col).unwrap();
            match session.object_at(row as i64, col as i64) {
                None => assert_eq!(px, [0, 0, 0, 0]),
                Some(id) => {
                    let color = registry.get(id).unwrap().color;
                    assert_eq!(&px[..3], &color);
                    assert_eq!(px[3], 128);
                }
            }
        }
    }
}

#[test]
fn test_decisions_survive_save_and_load() {
    let dir = scratch_dir("ledger");
    let mask_path = dir.join("plate1.png");
    let ledger_path = dir.join("plate1.csv");

    image::GrayImage::from_fn(6, 4, |x, y| {
        image::Luma([fixture_mask().get(y as usize, x as usize).unwrap() as u8])
    })
    .save(&mask_path)
    .unwrap();

    let config = ReviewConfig::default();
    let mut session = ReviewSession::open(&mask_path, &config).unwrap();
    assert_eq!(session.suggested_ledger_name().as_deref(), Some("plate1.csv"));

    session.navigate(Navigation::Next).unwrap();
    session.mark_yes().unwrap();
    session.navigate(Navigation::JumpTo(3)).unwrap();
    session.mark_no("two separate parts, \"check\"").unwrap();
    session.note_non_object("dust\non the lens");
    assert!(session.has_unsaved_changes());

    session.save_ledger(&ledger_path).unwrap();
    assert!(!session.has_unsaved_changes());

    let rows: Vec<LedgerRow> = load_rows(&ledger_path).unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[2].state, "Current index");
    assert_eq!(rows[2].object, "label_3");

    let mut reopened = ReviewSession::open(&mask_path, &config).unwrap();
    reopened.load_ledger(&ledger_path).unwrap();
    assert_eq!(reopened.ledger(), session.ledger());
    assert_eq!(reopened.current_object(), Some(3));
    assert_eq!(reopened.ledger().marker_for(1), Some([0, 128, 0]));
    assert_eq!(reopened.progress_label(), "66.67% Checked");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_ledger_for_other_mask_is_rejected() {
    let dir = scratch_dir("pairing");
    let mask_path = dir.join("plate2.png");
    image::GrayImage::from_pixel(2, 2, image::Luma([1]))
        .save(&mask_path)
        .unwrap();

    let mut session = ReviewSession::open(&mask_path, &ReviewConfig::default()).unwrap();
    let err = session.load_ledger(&dir.join("plate9.csv")).unwrap_err();
    assert!(matches!(err, SessionError::NameMismatch { .. }));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_ledger_with_unknown_object_leaves_session_unchanged() {
    let dir = scratch_dir("consistency");
    let path = dir.join("ledger.csv");
    std::fs::write(
        &path,
        "Object Number,Object State,Note\nlabel_77,Yes,\nlabel_1,Current index,\n",
    )
    .unwrap();

    let mut session = ready_session(&ReviewConfig::default());
    session.record_decision(2, DecisionState::No, "").unwrap();
    let before = session.ledger().clone();

    match session.load_ledger(&path) {
        Err(SessionError::Ledger { source, .. }) => {
            assert!(matches!(source, FormatError::UnknownObject { id: 77 }));
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(session.ledger(), &before);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_connectivity_report_finds_split_object() {
    let mut config = ReviewConfig::default();
    config.analysis.dead_pixel_threshold = 0;
    let mut session = ready_session(&config);

    session.request_connectivity().unwrap();
    assert!(session.wait_for_connectivity(TIMEOUT).unwrap());
    let report = session.connectivity().unwrap();

    assert_eq!(report.len(), 1);
    let defect = report.get(3).unwrap();
    assert_eq!(defect.component_count, 2);
    for &(x, y) in &defect.centroids {
        assert_eq!(session.object_at(y as i64, x as i64), Some(3));
    }

    assert_eq!(session.flag_defects(), 1);
    assert_eq!(session.ledger().state_of(3), DecisionState::No);
}

#[test]
fn test_double_check_round_trip() {
    let dir = scratch_dir("double-check");
    let path = dir.join("double.csv");
    let mut config = ReviewConfig::default();
    config.double_check.seed = Some(5);

    let mut session = ready_session(&config);
    session.record_decision(1, DecisionState::Yes, "").unwrap();
    let sample = session.start_double_check().sample().to_vec();
    assert_eq!(sample.len(), 1);

    session.navigate(Navigation::Next).unwrap();
    session.mark_no("wrong").unwrap();
    session.save_double_check(&path).unwrap();

    let mut resumed = ready_session(&config);
    resumed.load_double_check(&path).unwrap();
    let dc = resumed.double_check().unwrap();
    assert_eq!(dc.sample(), sample.as_slice());
    assert_eq!(dc.current(), Some(sample[0]));
    assert_eq!(dc.ledger(), session.double_check().unwrap().ledger());
    assert!(resumed.layers().isolated.is_some());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_empty_mask_degrades_to_zero_progress() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mask = LabelMask::from_rows(&[[0, 0], [0, 0]]).unwrap();
    let mut session = ReviewSession::new(mask, &ReviewConfig::default()).unwrap();

    assert!(session.wait_for_overview(TIMEOUT).unwrap());
    assert!(session.layers().overview.as_ref().unwrap().as_bytes().iter().all(|&b| b == 0));
    assert_eq!(session.navigate(Navigation::Next).unwrap(), None);
    assert_eq!(session.ledger().checked_fraction(session.registry().len()), 0.0);
    assert_eq!(session.progress_label(), "0.00% Checked");
    assert!(session.start_double_check().sample().is_empty());
}
