mod common;

use common::game_module;
use ilpatch::il::model::Module;
use ilpatch::il::module_file::ModuleFile;
use ilpatch::il::*;
use std::fs;

#[test]
fn write_then_open_is_identity() {
    let (module, game) = game_module().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Assembly-CSharp.ilmd");
    module.write_to_path(&path, false).unwrap();

    let reopened = Module::open(&path).unwrap();
    assert_eq!(reopened.name, "Assembly-CSharp");
    assert_eq!(reopened.type_count(), module.type_count());
    assert_eq!(reopened.method_count(), module.method_count());
    assert_eq!(
        reopened.to_module_file().unwrap(),
        module.to_module_file().unwrap()
    );

    // Handles differ between the two, positions and operands do not
    assert_eq!(
        describe_method(&reopened, game.safe),
        describe_method(&module, game.safe)
    );
    assert_eq!(reopened.body(game.safe).unwrap().handlers.len(), 1);
}

#[test]
fn overwrite_leaves_single_file() {
    let (mut module, game) = game_module().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.ilmd");
    module.write_to_path(&path, true).unwrap();

    module.method_mut(game.countdown).flags.make_public();
    module.write_to_path(&path, true).unwrap();

    let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("out.ilmd")]);

    let reopened = Module::open(&path).unwrap();
    assert!(reopened
        .method(game.countdown)
        .flags
        .contains(MethodFlags::PUBLIC));
}

#[test]
fn truncated_and_padded_files_are_rejected() {
    let (module, _) = game_module().unwrap();
    let mut bytes = vec![];
    module.to_module_file().unwrap().serialize(&mut bytes).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let truncated = dir.path().join("truncated.ilmd");
    fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();
    assert!(Module::open(&truncated).is_err());

    let padded = dir.path().join("padded.ilmd");
    let mut longer = bytes.clone();
    longer.push(0);
    fs::write(&padded, &longer).unwrap();
    assert!(matches!(
        ModuleFile::load_from_path(&padded),
        Err(Error::Malformed(_))
    ));

    assert!(matches!(
        Module::open(dir.path().join("missing.ilmd")),
        Err(Error::IoError(_))
    ));
}

#[test]
fn missing_directory_is_not_created_unless_asked() {
    let (module, _) = game_module().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.ilmd");
    assert!(matches!(
        module.write_to_path(&path, false),
        Err(Error::IoError(_))
    ));
    assert!(!path.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}
