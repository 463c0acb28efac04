//! The same contract, checked against every backend.

use proptest::prelude::*;
use stowage_storage::{ErrorKind, OpenMode, SaveOptions, StorageError, Whence};
use stowage_testkit::prelude::*;

#[test]
fn round_trip() {
    for_each_backend(|label, storage| {
        let file = storage.save("notes/today.txt", "remember the milk").unwrap();
        assert_eq!(file.name(), Some("notes/today.txt"), "{label}");

        let mut opened = storage.open("notes/today.txt", OpenMode::Read).unwrap();
        assert_eq!(opened.read(None).unwrap(), b"remember the milk", "{label}");
        assert_eq!(opened.size().unwrap(), 17, "{label}");
    });
}

#[test]
fn streamed_round_trip() {
    for_each_backend(|label, storage| {
        let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();
        let mut reader = std::io::Cursor::new(payload.clone());
        storage
            .save("blob.bin", stowage_storage::Content::reader(&mut reader))
            .unwrap();

        let mut opened = storage.open("blob.bin", OpenMode::Read).unwrap();
        assert_eq!(opened.read(None).unwrap(), payload, "{label}");
    });
}

#[test]
fn collision_avoidance() {
    for_each_backend(|label, storage| {
        let names: Vec<String> = ["first", "second", "third"]
            .iter()
            .map(|content| {
                storage
                    .save("a.txt", *content)
                    .unwrap()
                    .name()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(names, ["a.txt", "a_1.txt", "a_2.txt"], "{label}");

        let mut original = storage.open("a.txt", OpenMode::Read).unwrap();
        assert_eq!(original.read(None).unwrap(), b"first", "{label}");
        assert_eq!(storage.get_available_name("a.txt").unwrap(), "a_3.txt", "{label}");
    });
}

#[test]
fn overwrite_replaces_content() {
    for_each_backend(|label, storage| {
        storage.save("cfg.json", "{}").unwrap();
        let file = storage
            .save_with("cfg.json", "{\"a\":1}", &SaveOptions::new().overwrite())
            .unwrap();
        assert_eq!(file.name(), Some("cfg.json"), "{label}");

        let mut opened = storage.open("cfg.json", OpenMode::Read).unwrap();
        assert_eq!(opened.read(None).unwrap(), b"{\"a\":1}", "{label}");
    });
}

#[test]
fn delete_twice_is_not_found() {
    for_each_backend(|label, storage| {
        storage.save("doomed.txt", "x").unwrap();
        storage.delete("doomed.txt").unwrap();
        assert!(!storage.exists("doomed.txt").unwrap(), "{label}");

        let err = storage.delete("doomed.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "{label}");
        assert_eq!(err.status_code(), 404, "{label}");
        assert_eq!(
            storage.delete("never-existed.txt").unwrap_err().kind(),
            ErrorKind::NotFound,
            "{label}"
        );
    });
}

#[test]
fn open_missing_in_read_mode() {
    for_each_backend(|label, storage| {
        let err = storage.open("ghost.txt", OpenMode::Read).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "{label}");
    });
}

#[test]
fn write_once_naming_and_rename() {
    for_each_backend(|label, storage| {
        let mut file = storage.new_file("");
        assert!(file.is_null(), "{label}");
        file.set_name("draft.txt").unwrap();
        file.write_all("v1").unwrap();

        let err = file.set_name("final.txt").unwrap_err();
        assert!(matches!(err, StorageError::RenameViolation { .. }), "{label}");

        file.rename("final.txt").unwrap();
        assert_eq!(file.name(), Some("final.txt"), "{label}");
        assert!(!storage.exists("draft.txt").unwrap(), "{label}");
        assert!(storage.exists("final.txt").unwrap(), "{label}");
        assert_eq!(file.read(None).unwrap(), b"v1", "{label}");
    });
}

#[test]
fn rename_keeps_the_prefix_single() {
    for_each_backend(|label, storage| {
        let mut file = storage.new_file("pics/");
        file.set_name("cat.png").unwrap();
        file.write_all("png").unwrap();

        file.rename("pics/dog.png").unwrap();
        assert_eq!(file.name(), Some("pics/dog.png"), "{label}");
        assert!(storage.exists("pics/dog.png").unwrap(), "{label}");
        assert!(!storage.exists("pics/pics/dog.png").unwrap(), "{label}");
        assert_eq!(file.read(None).unwrap(), b"png", "{label}");
    });
}

#[test]
fn read_cursor() {
    for_each_backend(|label, storage| {
        storage.save("n.txt", "123123").unwrap();
        let mut file = storage.open("n.txt", OpenMode::Read).unwrap();

        assert_eq!(file.size().unwrap(), 6, "{label}");
        assert_eq!(file.read(None).unwrap(), b"123123", "{label}");
        assert_eq!(file.tell(), 6, "{label}");
        assert!(file.read(None).unwrap().is_empty(), "{label}");

        file.seek(0, Whence::Start).unwrap();
        assert_eq!(file.read(Some(3)).unwrap(), b"123", "{label}");

        assert_eq!(
            file.seek(-1, Whence::Start).unwrap_err().kind(),
            ErrorKind::InvalidArgument,
            "{label}"
        );
        assert_eq!(file.seek(100, Whence::Current).unwrap(), 6, "{label}");
    });
}

#[test]
fn traversal_is_rejected_everywhere() {
    for_each_backend(|label, storage| {
        for name in ["../x.txt", "a/../../x.txt", "..\\..\\x.txt"] {
            assert_eq!(
                storage.exists(name).unwrap_err().kind(),
                ErrorKind::SecurityViolation,
                "{label} {name}"
            );
            assert_eq!(
                storage.url(name).unwrap_err().kind(),
                ErrorKind::SecurityViolation,
                "{label} {name}"
            );
            assert_eq!(
                storage.delete(name).unwrap_err().kind(),
                ErrorKind::SecurityViolation,
                "{label} {name}"
            );
        }
        assert!(storage.list_files().unwrap().is_empty(), "{label}");
    });
}

#[test]
fn list_files_sees_saved_names() {
    for_each_backend(|label, storage| {
        storage.save("one.txt", "1").unwrap();
        storage.save("two.txt", "2").unwrap();
        let mut files = storage.list_files().unwrap();
        files.sort();
        assert_eq!(files, ["one.txt", "two.txt"], "{label}");
    });
}

#[test]
fn dropped_storage_makes_handles_unavailable() {
    for fixture in all_backends() {
        let storage = fixture.storage.clone();
        let mut file = storage.save("x.txt", "x").unwrap();
        drop(storage);
        // The fixture still holds a clone, so the handle keeps working.
        assert_eq!(file.size().unwrap(), 1, "{}", fixture.label);

        drop(fixture);
        assert_eq!(file.size().unwrap_err().kind(), ErrorKind::Unavailable);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn round_trip_any_content(name in nested_name_strategy(), content in content_strategy()) {
        for fixture in all_backends() {
            let file = fixture.storage.save(&name, &content).unwrap();
            prop_assert_eq!(file.name(), Some(name.as_str()));

            let mut opened = fixture.storage.open(&name, OpenMode::Read).unwrap();
            prop_assert_eq!(opened.read(None).unwrap(), content.clone());
        }
    }

    #[test]
    fn saving_never_loses_names(name in file_name_strategy(), count in 1usize..5) {
        let storage = memory_storage();
        let mut seen = Vec::new();
        for _ in 0..count {
            let file = storage.save(&name, "x").unwrap();
            let saved = file.name().unwrap().to_string();
            prop_assert!(!seen.contains(&saved));
            seen.push(saved);
            for earlier in &seen {
                prop_assert!(storage.exists(earlier).unwrap());
            }
        }
    }

    #[test]
    fn traversal_names_never_store(name in traversal_name_strategy()) {
        let temp = TempStorage::new();
        let err = temp.save_with(&name, "x", &SaveOptions::new().raw_name()).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::SecurityViolation);
        prop_assert!(temp.list_files().unwrap().is_empty());
        prop_assert!(temp.list_folders().unwrap().is_empty());
    }
}
