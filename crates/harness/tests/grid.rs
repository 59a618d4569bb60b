use proptest::prelude::*;
use stonebystone_core::{CemeteryData, ChangeOp, Entity, GridPosition, ValidCells};
use stonebystone_engine::{EditorConfig, EngineError, GridDirection};
use stonebystone_harness::{init_tracing, TestNetwork, TestPeer};
use stonebystone_storage::Storage;

fn ten_by_ten(peer: &mut TestPeer, graves: &[(i64, i64)]) -> Result<(), EngineError> {
    peer.editor.create_cemetery("Oakwood", 10, 10)?;
    for &(row, col) in graves {
        peer.editor.create_grave(GridPosition::new(row, col))?;
    }
    Ok(())
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn adding_a_row_on_top_moves_everything_down() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut peer = TestPeer::new("carol")?;
    ten_by_ten(&mut peer, &[(0, 5), (9, 9)])?;
    let bench = peer
        .editor
        .create_landmark(GridPosition::new(4, 4), stonebystone_core::LandmarkType::Bench)?;
    let log_before = peer.editor.storage().change_log()?.len();

    let outcome = peer.editor.preview_resize(GridDirection::Top, 1)?;
    assert!(!outcome.has_conflicts());
    assert_eq!(outcome.moved.len(), 3);
    let cemetery = peer.editor.commit_resize(outcome)?;
    assert_eq!((cemetery.grid.rows, cemetery.grid.cols), (11, 10));

    let data = peer.dataset()?;
    let cells: Vec<GridPosition> = data.graves.iter().map(|g| g.grid).collect();
    assert_eq!(cells, vec![GridPosition::new(1, 5), GridPosition::new(10, 9)]);
    assert_eq!(data.landmark(bench.uuid).ok_or("landmark missing")?.grid, GridPosition::new(5, 4));

    let log = peer.editor.storage().change_log()?;
    assert_eq!(log.len(), log_before + 3);
    assert!(log[log_before..].iter().all(|e| e.op == ChangeOp::Set));
    Ok(())
}

#[test]
fn removing_the_top_row_flags_its_occupants() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut peer = TestPeer::new("carol")?;
    ten_by_ten(&mut peer, &[(0, 3), (5, 5)])?;
    let before = peer.dataset()?;

    let outcome = peer.editor.preview_resize(GridDirection::Top, -1)?;
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].uuid, before.graves[0].uuid);
    assert_eq!(outcome.conflicts[0].position, GridPosition::new(0, 3));

    // Advisory by default: the resize still goes through.
    peer.editor.commit_resize(outcome)?;
    let data = peer.dataset()?;
    assert_eq!(data.cemetery.grid.rows, 9);
    assert_eq!(data.graves[0], before.graves[0]);
    assert_eq!(data.graves[1].grid, GridPosition::new(4, 5));
    assert!(data.graves[1].last_modified() > before.graves[1].last_modified());
    Ok(())
}

#[test]
fn strict_config_refuses_conflicting_resize() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = EditorConfig::parse("[grid]\nallow_conflicting_resize = false\n")?;
    let mut peer = TestPeer::with_config("carol", config)?;
    ten_by_ten(&mut peer, &[(0, 0)])?;
    let before = peer.digest()?;

    let outcome = peer.editor.preview_resize(GridDirection::Top, -1)?;
    let err = peer.editor.commit_resize(outcome).err().ok_or("resize committed")?;
    assert!(matches!(err, EngineError::ResizeConflicts(1)));
    assert_eq!(peer.digest()?, before);

    let outcome = peer.editor.preview_resize(GridDirection::Bottom, -1)?;
    assert!(!outcome.has_conflicts());
    peer.editor.commit_resize(outcome)?;
    assert_eq!(peer.dataset()?.cemetery.grid.rows, 9);
    Ok(())
}

#[test]
fn growing_at_the_bottom_moves_nothing() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut peer = TestPeer::new("carol")?;
    ten_by_ten(&mut peer, &[(2, 2), (9, 0)])?;
    let before = peer.dataset()?;

    let outcome = peer.editor.preview_resize(GridDirection::Bottom, 2)?;
    assert!(outcome.moved.is_empty());
    peer.editor.commit_resize(outcome)?;

    let data = peer.dataset()?;
    assert_eq!(data.cemetery.grid.rows, 12);
    assert_eq!(data.graves, before.graves);
    assert_eq!(data.change_log, before.change_log);
    Ok(())
}

#[test]
fn widening_on_the_left_shifts_roads_cell_by_cell() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut peer = TestPeer::new("carol")?;
    ten_by_ten(&mut peer, &[])?;
    let road = peer.editor.create_road(vec![
        GridPosition::new(3, 0),
        GridPosition::new(3, 1),
        GridPosition::new(4, 1),
    ])?;

    let outcome = peer.editor.preview_resize(GridDirection::Left, 2)?;
    peer.editor.commit_resize(outcome)?;

    let data = peer.dataset()?;
    assert_eq!(data.cemetery.grid.cols, 12);
    assert_eq!(
        data.road(road.uuid).ok_or("road missing")?.cells,
        vec![GridPosition::new(3, 2), GridPosition::new(3, 3), GridPosition::new(4, 3)]
    );
    Ok(())
}

#[test]
fn resize_reaches_other_peers_through_merge() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut net = TestNetwork::new();
    let a = net.add_peer("alice")?;
    let b = net.add_peer("bob")?;
    ten_by_ten(net.peer_mut(a), &[(1, 1), (8, 8)])?;
    net.replace(a, b)?;

    let alice = net.peer_mut(a);
    let outcome = alice.editor.preview_resize(GridDirection::Top, 1)?;
    alice.editor.commit_resize(outcome)?;

    let pending = net.send(a, b)?;
    assert!(pending.conflicts().is_empty());
    assert_eq!(pending.result.graves.updated.len(), 2);
    net.peer_mut(b).editor.commit_merge(&pending, &[])?;

    assert_eq!(net.peer(a).digest()?, net.peer(b).digest()?);
    assert_eq!(net.peer(b).dataset()?.cemetery.grid.rows, 11);
    Ok(())
}

#[test]
fn resize_survives_coordinates_at_the_edge_of_the_range() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut peer = TestPeer::new("carol")?;
    ten_by_ten(&mut peer, &[(1, 1), (2, 2)])?;

    let mut doc: serde_json::Value = serde_json::from_str(&peer.export()?)?;
    doc["graves"][0]["grid"]["row"] = serde_json::json!(i64::MAX);
    peer.editor.import_replace(&serde_json::to_string(&doc)?)?;
    let far = peer.dataset()?.graves[0].clone();

    let outcome = peer.editor.preview_resize(GridDirection::Top, 1)?;
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(outcome.conflicts[0].uuid, far.uuid);
    peer.editor.commit_resize(outcome)?;

    let data = peer.dataset()?;
    assert_eq!(data.grave(far.uuid), Some(&far));
    assert_eq!(data.graves[1].grid, GridPosition::new(3, 2));

    let err = peer
        .editor
        .preview_resize(GridDirection::Bottom, i64::MAX)
        .err()
        .ok_or("overflowing resize accepted")?;
    assert!(matches!(err, EngineError::InvalidDimensions { .. }));
    Ok(())
}

// ============================================================================
// Shape
// ============================================================================

#[test]
fn shape_edit_flags_elements_outside_the_outline() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut peer = TestPeer::new("carol")?;
    peer.editor.create_cemetery("Oakwood", 3, 3)?;
    let inside = peer.editor.create_grave(GridPosition::new(0, 0))?;
    let outside = peer.editor.create_grave(GridPosition::new(2, 2))?;

    let mut cells = ValidCells::rectangle(3, 3);
    cells.remove(&GridPosition::new(2, 2));
    let outcome = peer.editor.preview_shape(cells)?;
    assert_eq!(outcome.invalid_elements.len(), 1);
    assert_eq!(outcome.invalid_elements[0].uuid, outside.uuid);
    peer.editor.commit_shape(outcome)?;

    let data = peer.dataset()?;
    assert!(data.cemetery.is_cell_valid(&inside.grid));
    assert!(!data.cemetery.is_cell_valid(&outside.grid));
    assert_eq!(data.grave(outside.uuid), Some(&outside));
    assert_eq!(data.cemetery.modified_by, "carol");

    // An empty outline leaves no cell for anyone, though it is stored as
    // the plain rectangle.
    let outcome = peer.editor.preview_shape(ValidCells::new())?;
    let flagged: Vec<_> = outcome.invalid_elements.iter().map(|e| e.uuid).collect();
    assert_eq!(flagged, vec![inside.uuid, outside.uuid]);
    peer.editor.commit_shape(outcome)?;
    assert_eq!(peer.dataset()?.cemetery.grid.valid_cells, None);
    Ok(())
}

#[test]
fn shape_survives_export_and_import() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let mut net = TestNetwork::new();
    let a = net.add_peer("alice")?;
    let b = net.add_peer("bob")?;
    let alice = net.peer_mut(a);
    alice.editor.create_cemetery("Oakwood", 4, 4)?;
    let outline = ValidCells::from_keys(["0,0", "0,1", "1,1", "3,3"])?;
    let outcome = alice.editor.preview_shape(outline.clone())?;
    alice.editor.commit_shape(outcome)?;

    net.replace(a, b)?;
    assert_eq!(net.peer(b).dataset()?.cemetery.grid.valid_cells, Some(outline));
    Ok(())
}

/// Builds a 6x6 cemetery, applies `outline` as its shape and returns the
/// dataset before and after together with the number of flagged elements.
fn apply_outline(
    graves: Vec<(i64, i64)>,
    outline: std::collections::BTreeSet<(i64, i64)>,
) -> Result<(CemeteryData, CemeteryData, usize), EngineError> {
    let mut peer = TestPeer::new("carol")?;
    peer.editor.create_cemetery("Oakwood", 6, 6)?;
    for (row, col) in graves {
        peer.editor.create_grave(GridPosition::new(row, col))?;
    }
    let before = peer.dataset()?;

    let mut cells = ValidCells::new();
    for (row, col) in outline {
        cells.insert(GridPosition::new(row, col));
    }
    let outcome = peer.editor.preview_shape(cells)?;
    let flagged = outcome.invalid_elements.len();
    peer.editor.commit_shape(outcome)?;
    Ok((before, peer.dataset()?, flagged))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn shape_edits_never_move_elements(
        graves in proptest::collection::vec((0i64..6, 0i64..6), 0..8),
        outline in proptest::collection::btree_set((0i64..8, 0i64..8), 0..40),
    ) {
        let kept: std::collections::BTreeSet<(i64, i64)> =
            outline.iter().copied().filter(|&(row, col)| row < 6 && col < 6).collect();
        let (before, after, flagged) =
            apply_outline(graves, outline).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(&after.graves, &before.graves);
        prop_assert_eq!(&after.change_log, &before.change_log);
        prop_assert_eq!(
            flagged,
            before.graves.iter().filter(|g| !kept.contains(&(g.grid.row, g.grid.col))).count()
        );
        if !kept.is_empty() {
            prop_assert!(before.graves.iter().all(|g| kept.contains(&(g.grid.row, g.grid.col))
                == after.cemetery.is_cell_valid(&g.grid)));
        }
    }
}
