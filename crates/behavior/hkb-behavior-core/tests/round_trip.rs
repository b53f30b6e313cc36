use anyhow::Result;
use hkb_behavior_core::{ops, Behavior, Config, UndoManager, Value};

fn fixture_xml() -> Result<String> {
    hkb_test_fixtures::behaviors::xml("c9997")
}

fn load() -> Result<Behavior> {
    Ok(Behavior::load(&fixture_xml()?, Config::default())?)
}

// --- Load / save ---

/// it should save an unmodified behavior byte for byte
#[test]
fn unmodified_save_is_byte_identical() -> Result<()> {
    let beh = load()?;
    assert_eq!(beh.len(), 12);
    assert!(beh.decimal_comma());
    assert_eq!(beh.save(), fixture_xml()?);
    Ok(())
}

/// it should name the log target after the opened file
#[test]
fn open_reads_file_and_derives_log_target() -> Result<()> {
    let path = hkb_test_fixtures::behaviors::path("c9997")?;
    let beh = Behavior::open(&path, Config::default())?;
    assert_eq!(beh.log_target(), "hkb_behavior::c9997");
    assert_eq!(beh.save(), fixture_xml()?);
    Ok(())
}

// --- Mutate then undo ---

/// it should restore the original bytes after a scalar edit is undone
#[test]
fn scalar_edit_then_undo_is_byte_identical() -> Result<()> {
    let original = fixture_xml()?;
    let mut beh = load()?;
    let mut undo = UndoManager::default();

    ops::set(&mut beh, &mut undo, "object10", [("playbackSpeed", 2.0)])?;
    let edited = beh.save();
    assert_ne!(edited, original);
    assert!(edited.contains(r##"<real dec="2,0" hex="#4000000000000000"/>"##));

    assert!(undo.undo(&mut beh)?);
    assert_eq!(beh.save(), original);
    Ok(())
}

/// it should treat writing the stored real back as no change at all
#[test]
fn equal_real_write_changes_nothing() -> Result<()> {
    let original = fixture_xml()?;
    let mut beh = load()?;
    let mut undo = UndoManager::default();

    ops::set(&mut beh, &mut undo, "object11", [("playbackSpeed", 1.5)])?;
    assert!(undo.is_empty());
    assert_eq!(beh.save(), original);
    Ok(())
}

/// it should record a sign flip of zero and undo it to the original bytes
#[test]
fn negative_zero_is_an_edit() -> Result<()> {
    let original = fixture_xml()?;
    let mut beh = load()?;
    let mut undo = UndoManager::default();

    ops::set(&mut beh, &mut undo, "object10", [("playbackSpeed", 0.0)])?;
    ops::set(&mut beh, &mut undo, "object10", [("playbackSpeed", -0.0)])?;
    assert_eq!(undo.len(), 2);
    assert!(beh.save().contains(r##"hex="#8000000000000000""##));

    assert!(undo.undo(&mut beh)?);
    assert!(undo.undo(&mut beh)?);
    assert_eq!(beh.save(), original);
    Ok(())
}

/// it should put a deleted object back where it was
#[test]
fn delete_then_undo_is_byte_identical() -> Result<()> {
    let original = fixture_xml()?;
    let mut beh = load()?;
    let mut undo = UndoManager::default();

    let removed = ops::delete(&mut beh, &mut undo, "name='DiveJump Selector'")?;
    assert_eq!(removed.id(), Some("object9"));
    // pointers to the deleted object stay as they were
    assert_eq!(
        ops::get(&beh, "object6", "generator")?.as_pointer().and_then(|p| p.target()),
        Some("object9")
    );

    undo.undo(&mut beh)?;
    assert_eq!(beh.save(), original);
    Ok(())
}

/// it should keep the loaded real encoding of fields that were not changed
#[test]
fn untouched_reals_keep_their_text() -> Result<()> {
    let mut beh = load()?;
    let mut undo = UndoManager::default();
    ops::set(&mut beh, &mut undo, "object10", [("name", "Renamed")])?;
    let saved = beh.save();
    assert!(saved.contains(r##"<real dec="1,500000" hex="#3ff8000000000000"/>"##));
    assert_eq!(
        ops::get(&beh, "object11", "playbackSpeed")?.as_float(),
        Some(1.5)
    );
    assert_eq!(ops::get(&beh, "object10", "name")?, Value::from("Renamed"));
    Ok(())
}

/// it should force the decimal separator when configured
#[test]
fn configured_decimal_point_wins_over_detection() -> Result<()> {
    let config = Config {
        decimal_comma: Some(false),
        ..Config::default()
    };
    let mut beh = Behavior::load(&fixture_xml()?, config)?;
    let mut undo = UndoManager::default();
    ops::set(&mut beh, &mut undo, "object11", [("playbackSpeed", 0.25)])?;
    assert!(beh.save().contains(r##"<real dec="0.25" hex="#3fd0000000000000"/>"##));
    Ok(())
}
