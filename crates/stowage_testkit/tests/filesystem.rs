//! End-to-end tests for the local filesystem backend.

use std::fs;
use std::sync::Arc;
use stowage_storage::{ErrorKind, OpenMode, SaveOptions, Whence};
use stowage_testkit::prelude::*;

#[test]
fn save_url_delete_scenario() {
    init_tracing();
    let temp = TempStorage::new();

    let file = temp.save("greeting.txt", "hello").unwrap();
    assert_eq!(file.name(), Some("greeting.txt"));
    assert_eq!(fs::read(temp.root().join("greeting.txt")).unwrap(), b"hello");
    assert!(temp.exists("greeting.txt").unwrap());
    assert_eq!(temp.url("greeting.txt").unwrap(), "/uploads/greeting.txt");
    assert_eq!(file.url().unwrap(), "/uploads/greeting.txt");

    temp.delete("greeting.txt").unwrap();
    assert!(!temp.exists("greeting.txt").unwrap());
    assert!(!temp.root().join("greeting.txt").exists());
}

#[test]
fn hostile_names_are_sanitized_into_the_root() {
    let temp = TempStorage::new();

    let err = temp.save("../../etc/passwd", "x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SecurityViolation);

    let file = temp.save("My cool movie.mov", "x").unwrap();
    assert_eq!(file.name(), Some("My_cool_movie.mov"));
    assert!(temp.root().join("My_cool_movie.mov").is_file());

    let file = temp.save("docs/../report.pdf", "x").unwrap();
    assert_eq!(file.name(), Some("report.pdf"));
}

#[test]
fn accented_names_keep_their_base_letters() {
    let temp = TempStorage::new();
    let file = temp.save("Résumé final.pdf", "x").unwrap();
    assert_eq!(file.name(), Some("Resume_final.pdf"));
    assert!(temp.root().join("Resume_final.pdf").is_file());
}

#[test]
fn folder_option_nests_the_file() {
    let temp = TempStorage::new();
    let file = temp
        .save_with("avatar.png", "png", &SaveOptions::new().folder("users/42"))
        .unwrap();

    assert_eq!(file.name(), Some("users/42/avatar.png"));
    assert!(temp.root().join("users").join("42").join("avatar.png").is_file());
    assert_eq!(
        file.path().unwrap(),
        temp.root().join("users").join("42").join("avatar.png")
    );
}

#[test]
fn collisions_are_visible_on_disk() {
    let temp = TempStorage::new();
    for _ in 0..3 {
        temp.save("a.txt", "x").unwrap();
    }

    let mut entries: Vec<String> = fs::read_dir(temp.root())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries, ["a.txt", "a_1.txt", "a_2.txt"]);
}

#[test]
fn files_written_outside_are_readable() {
    let temp = TempStorage::new();
    fs::write(temp.root().join("external.txt"), "0123456789").unwrap();

    let mut file = temp.open("external.txt", OpenMode::Read).unwrap();
    assert_eq!(file.seek(-4, Whence::End).unwrap(), 6);
    assert_eq!(file.read(None).unwrap(), b"6789");
    assert!(file.last_modified().unwrap().is_some());
    assert_eq!(file.content_type().unwrap(), "text/plain");
}

#[test]
fn folders_and_listing() {
    let temp = TempStorage::new();
    temp.create_folder(Some("photos")).unwrap();
    temp.save("readme.md", "#").unwrap();

    assert_eq!(temp.list_folders().unwrap(), ["photos"]);
    assert_eq!(temp.list_files().unwrap(), ["readme.md"]);
    assert_eq!(
        temp.create_folder(Some("photos")).unwrap_err().kind(),
        ErrorKind::Conflict
    );

    temp.save_with("a.jpg", "jpg", &SaveOptions::new().folder("photos"))
        .unwrap();
    temp.delete_folder(Some("photos")).unwrap();
    assert!(!temp.root().join("photos").exists());
    assert!(temp.list_folders().unwrap().is_empty());
}

#[test]
fn file_view_reaches_the_url_builder() {
    let urls = RecordingUrlBuilder::new();
    let temp = TempStorage::with_urls(
        |config| config.with_file_view("media.download"),
        Arc::new(urls.clone()),
    );
    let file = temp.save("clips/intro.mp4", "mp4").unwrap();

    assert_eq!(temp.url("clips/intro.mp4").unwrap(), "/media.download/clips/intro.mp4");
    assert_eq!(file.url().unwrap(), "/media.download/clips/intro.mp4");
    assert_eq!(
        urls.requests(),
        [
            ("media.download".to_string(), "clips/intro.mp4".to_string()),
            ("media.download".to_string(), "clips/intro.mp4".to_string()),
        ]
    );
}

#[test]
fn default_file_view_is_uploaded_file() {
    let urls = RecordingUrlBuilder::new();
    let temp = TempStorage::with_urls(|config| config, Arc::new(urls.clone()));
    temp.url("a.txt").unwrap();
    assert_eq!(
        urls.requests(),
        [("uploads.uploaded_file".to_string(), "a.txt".to_string())]
    );
}

#[test]
fn std_io_traits_work_on_handles() {
    use std::io::{Read, Seek, SeekFrom};

    let temp = TempStorage::new();
    temp.save("data.bin", &[1u8, 2, 3, 4, 5]).unwrap();
    let mut file = temp.open("data.bin", OpenMode::Read).unwrap();

    let mut buf = [0u8; 2];
    file.read_exact(&mut buf).unwrap();
    assert_eq!(buf, [1, 2]);
    assert_eq!(Seek::seek(&mut file, SeekFrom::End(-1)).unwrap(), 4);

    let mut rest = Vec::new();
    file.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, [5]);
}
