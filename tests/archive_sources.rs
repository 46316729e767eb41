use sceneformat_builder::archive::{compress, spawn_compress, ArchiveError};
use std::fs::{self, create_dir_all, File};
use std::io::{Read, Write};
use tempfile::tempdir;
use zip::{CompressionMethod, ZipArchive};

fn cpp_suffixes() -> Vec<String> {
    vec![".cpp".to_string(), ".cc".to_string(), ".h".to_string()]
}

#[test]
fn test_compress_keeps_only_source_suffixes_and_skips_subdirectories() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("generated");
    create_dir_all(source.join("nested")).unwrap();
    create_dir_all(source.join("looks_like.h")).unwrap();

    for (name, body) in [
        ("a.cpp", "int main() {}"),
        ("b.h", "#pragma once"),
        ("c.txt", "notes"),
        ("README", "readme"),
    ] {
        let mut f = File::create(source.join(name)).unwrap();
        writeln!(f, "{body}").unwrap();
    }
    fs::write(source.join("nested/d.cpp"), "// nested").unwrap();

    let archive_path = tmp.path().join("cpp3.zip");
    let summary = compress(&source, &archive_path, &cpp_suffixes()).expect("Should succeed");

    assert_eq!(summary.entries, vec!["a.cpp".to_string(), "b.h".to_string()]);
    assert_eq!(summary.path, archive_path);
    assert_eq!(summary.size, fs::metadata(&archive_path).unwrap().len());

    let mut archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 2);
    let names: Vec<_> = archive.file_names().map(str::to_owned).collect();
    assert!(names.contains(&"a.cpp".to_string()));
    assert!(names.contains(&"b.h".to_string()));

    let mut entry = archive.by_name("a.cpp").unwrap();
    assert_eq!(entry.compression(), CompressionMethod::Deflated);
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    assert!(content.contains("int main() {}"));
}

#[test]
fn test_compress_uses_file_names_not_paths() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("cpp/sceneformat");
    create_dir_all(&source).unwrap();
    fs::write(source.join("scene.pb.cc"), "// cc").unwrap();
    fs::write(source.join("scene.pb.h"), "// h").unwrap();

    let archive_path = tmp.path().join("out.zip");
    let summary = compress(&source, &archive_path, &cpp_suffixes()).unwrap();

    assert_eq!(summary.entries, vec!["scene.pb.cc", "scene.pb.h"]);
    assert!(summary.entries.iter().all(|name| !name.contains('/')));
}

#[test]
fn test_compress_empty_directory_produces_valid_empty_archive() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("empty");
    create_dir_all(&source).unwrap();
    let archive_path = tmp.path().join("empty.zip");

    let summary = compress(&source, &archive_path, &cpp_suffixes()).unwrap();

    assert!(summary.entries.is_empty());
    let archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 0);
}

#[test]
fn test_compress_same_input_gives_identical_bytes() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("generated");
    create_dir_all(&source).unwrap();
    fs::write(source.join("scene.pb.cc"), "// generated cc\n".repeat(50)).unwrap();
    fs::write(source.join("scene.pb.h"), "// generated h\n".repeat(50)).unwrap();

    let first = tmp.path().join("first.zip");
    let second = tmp.path().join("second.zip");
    compress(&source, &first, &cpp_suffixes()).unwrap();
    compress(&source, &second, &cpp_suffixes()).unwrap();

    assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
}

#[test]
fn test_compress_missing_source_directory_fails() {
    let tmp = tempdir().unwrap();
    let archive_path = tmp.path().join("out.zip");

    let err = compress(&tmp.path().join("does-not-exist"), &archive_path, &cpp_suffixes())
        .unwrap_err();

    assert!(
        matches!(err, ArchiveError::ListSource { .. }),
        "expected ListSource, got {err:?}"
    );
}

#[test]
fn test_compress_unwritable_destination_fails() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("generated");
    create_dir_all(&source).unwrap();

    let err = compress(&source, &tmp.path().join("missing/dir/out.zip"), &cpp_suffixes())
        .unwrap_err();

    assert!(
        matches!(err, ArchiveError::CreateArchive { .. }),
        "expected CreateArchive, got {err:?}"
    );
}

#[cfg(unix)]
#[test]
fn test_compress_preserves_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = tempdir().unwrap();
    let source = tmp.path().join("generated");
    create_dir_all(&source).unwrap();
    let file = source.join("scene.pb.h");
    fs::write(&file, "// h").unwrap();
    fs::set_permissions(&file, fs::Permissions::from_mode(0o640)).unwrap();

    let archive_path = tmp.path().join("out.zip");
    compress(&source, &archive_path, &cpp_suffixes()).unwrap();

    let mut archive = ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
    let entry = archive.by_name("scene.pb.h").unwrap();
    assert_eq!(entry.unix_mode().map(|mode| mode & 0o777), Some(0o640));
}

#[tokio::test]
async fn test_spawn_compress_runs_off_the_async_runtime() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("generated");
    create_dir_all(&source).unwrap();
    fs::write(source.join("scene.pb.cc"), "// cc").unwrap();

    let summary = spawn_compress(source, tmp.path().join("out.zip"), cpp_suffixes())
        .await
        .unwrap();

    assert_eq!(summary.entries, vec!["scene.pb.cc"]);
}
