use hkb_behavior_core::{bindings, ops, tables, Behavior, Config, Pointer, UndoManager};

fn load() -> Behavior {
    let xml = hkb_test_fixtures::behaviors::xml("c9997").expect("load c9997 fixture");
    Behavior::load(&xml, Config::default()).expect("parse c9997 fixture")
}

/// it should undo a whole combine scope at once and redo it again
#[test]
fn combined_edits_undo_and_redo_as_one() {
    let mut beh = load();
    let mut undo = UndoManager::default();
    let before = beh.save();

    {
        let mut tx = undo.combine();
        let clip = ops::create(
            &mut beh,
            &mut tx,
            "hkbClipGenerator",
            None,
            [("name", "New Clip"), ("animationName", "a000_003001")],
        )
        .unwrap();
        ops::array_add(&mut beh, &mut tx, "object9", "generators", Pointer::to(clip.as_str())).unwrap();
        ops::set(&mut beh, &mut tx, "object9", [("selectedGeneratorIndex", 3)]).unwrap();
        ops::array_pop(&mut beh, &mut tx, "object8", "transitions", Some(0)).unwrap();
        ops::delete(&mut beh, &mut tx, "object11").unwrap();
        tables::create_event(&mut beh, &mut tx, "Fall").unwrap();
        bindings::bind_variable(&mut beh, &mut tx, "object10", "playbackSpeed", 0).unwrap();
    }
    let after = beh.save();
    assert_ne!(after, before);
    assert_eq!(undo.len(), 1);

    assert!(undo.undo(&mut beh).unwrap());
    assert_eq!(beh.save(), before);
    assert!(!undo.undo(&mut beh).unwrap());

    assert!(undo.redo(&mut beh).unwrap());
    assert_eq!(beh.save(), after);
}

/// it should hand out fresh ids after undoing a creation
#[test]
fn ids_are_not_reused_after_undo() {
    let mut beh = load();
    let mut undo = UndoManager::default();
    let first = ops::create(&mut beh, &mut undo, "hkbClipGenerator", None, [("name", "A")]).unwrap();
    assert_eq!(first, "object14");
    undo.undo(&mut beh).unwrap();
    let second = ops::create(&mut beh, &mut undo, "hkbClipGenerator", None, [("name", "B")]).unwrap();
    assert_eq!(second, "object15");
}

/// it should let callers discard a half-finished multi-step edit
#[test]
fn rollback_to_marker_discards_partial_work() {
    let mut beh = load();
    let mut undo = UndoManager::default();
    let before = beh.save();
    let marker = undo.top();

    ops::set(&mut beh, &mut undo, "object9", [("name", "Half Done")]).unwrap();
    let failed = ops::set(&mut beh, &mut undo, "object9", [("selectedGeneratorIndex", "many")]);
    assert!(failed.is_err());
    assert_ne!(undo.top(), marker);

    undo.rollback(&mut beh, marker).unwrap();
    assert_eq!(beh.save(), before);
    assert!(!undo.can_redo());
}

/// it should revert a failed multi-step set however short the history is
#[test]
fn failed_set_is_reverted_at_any_history_depth() {
    for depth in [0, 1, 2] {
        let mut beh = load();
        let mut undo = UndoManager::new(depth);
        ops::set(&mut beh, &mut undo, "object9", [("name", "Earlier")]).unwrap();
        let before = beh.save();
        let frames = undo.len();

        let failed = ops::set(
            &mut beh,
            &mut undo,
            "object9",
            [("selectedGeneratorIndex", "3"), ("selectedGeneratorIndex", "abc")],
        );
        assert!(
            matches!(failed, Err(hkb_behavior_core::BehaviorError::TypeMismatch { .. })),
            "depth {depth}: {failed:?}"
        );
        assert_eq!(
            ops::get(&beh, "object9", "selectedGeneratorIndex").unwrap().as_int(),
            Some(0),
            "depth {depth}"
        );
        assert_eq!(beh.save(), before, "depth {depth}");
        assert_eq!(undo.len(), frames, "depth {depth}");
    }
}
