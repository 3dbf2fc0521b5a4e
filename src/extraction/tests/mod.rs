use crate::error::ExtractionError;
use crate::extraction::*;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing multiple files
fn create_zip_archive_multi(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Create a password-encrypted ZIP using the deprecated ZipCrypto method
/// (only encryption method supported for writing by zip 0.6)
fn create_encrypted_zip(archive_path: &Path, file_name: &str, content: &[u8], password: &[u8]) {
    use ::zip::unstable::write::FileOptionsExt;
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored)
        .with_deprecated_encryption(password);
    writer.start_file(file_name, options).unwrap();
    std::io::Write::write_all(&mut writer, content).unwrap();
    writer.finish().unwrap();
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[test]
fn test_sniff_archive_type_by_signature() {
    assert_eq!(sniff_archive_type(b"PK\x03\x04rest"), Some(ArchiveType::Zip));
    assert_eq!(
        sniff_archive_type(b"7z\xBC\xAF\x27\x1C\x00\x04"),
        Some(ArchiveType::SevenZip)
    );
    assert_eq!(sniff_archive_type(b"Rar!\x1A\x07\x01"), Some(ArchiveType::Rar));
    assert_eq!(sniff_archive_type(b"addappid(1)"), None);
    assert_eq!(sniff_archive_type(b""), None);
}

#[test]
fn test_detect_archive_type_by_extension() {
    assert_eq!(detect_archive_type(Path::new("a/730.ZIP")), Some(ArchiveType::Zip));
    assert_eq!(detect_archive_type(Path::new("730.7z")), Some(ArchiveType::SevenZip));
    assert_eq!(detect_archive_type(Path::new("730.rar")), Some(ArchiveType::Rar));
    assert_eq!(detect_archive_type(Path::new("730.lua")), None);
    assert_eq!(detect_archive_type(Path::new("730")), None);
}

#[test]
fn test_signature_wins_over_misleading_extension() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.lua");
    create_zip_archive_multi(&archive, &[("730.lua", b"addappid(730)\n")]);

    assert_eq!(
        detect_archive_type_of_file(&archive).unwrap(),
        Some(ArchiveType::Zip)
    );
}

// ---------------------------------------------------------------------------
// BuiltinExtractor
// ---------------------------------------------------------------------------

#[test]
fn test_builtin_extracts_zip_with_nested_dirs() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.zip");
    create_zip_archive_multi(
        &archive,
        &[
            ("730.lua", b"addappid(730)\n"),
            ("extra/readme.txt", b"hello"),
            ("extra/deeper/731.lua", b"addappid(731)\n"),
        ],
    );

    let extractor = BuiltinExtractor::with_scratch_dir(temp.path().join("scratch"));
    let extracted = extractor.extract(&archive).unwrap();

    let names: Vec<_> = extracted
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(extracted.files.len(), 3);
    assert!(names.contains(&"730.lua".to_string()));
    assert!(names.contains(&"731.lua".to_string()));
    for file in &extracted.files {
        assert!(file.starts_with(extracted.root()));
    }
}

#[test]
fn test_zip_entries_are_returned_in_path_order() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.zip");
    create_zip_archive_multi(
        &archive,
        &[
            ("b.lua", b"addappid(2)\n"),
            ("a/z.lua", b"addappid(3)\n"),
            ("a.lua", b"addappid(1)\n"),
        ],
    );

    let extractor = BuiltinExtractor::with_scratch_dir(temp.path().join("scratch"));
    let extracted = extractor.extract(&archive).unwrap();

    let relative: Vec<_> = extracted
        .files
        .iter()
        .map(|p| p.strip_prefix(extracted.root()).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        relative,
        vec![
            Path::new("a").join("z.lua"),
            Path::new("a.lua").to_path_buf(),
            Path::new("b.lua").to_path_buf(),
        ]
    );
}

#[test]
fn test_dropping_handle_removes_scratch_dir() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.zip");
    create_zip_archive_multi(&archive, &[("730.lua", b"addappid(730)\n")]);

    let extracted = BuiltinExtractor::new().extract(&archive).unwrap();
    let root = extracted.root().to_path_buf();
    assert!(root.exists());

    drop(extracted);
    assert!(!root.exists(), "scratch directory should be removed on drop");
}

#[test]
fn test_explicit_cleanup_removes_scratch_dir() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.zip");
    create_zip_archive_multi(&archive, &[("730.lua", b"addappid(730)\n")]);

    let extracted = BuiltinExtractor::new().extract(&archive).unwrap();
    let root = extracted.root().to_path_buf();
    extracted.cleanup().unwrap();
    assert!(!root.exists());
}

#[test]
fn test_rar_is_reported_as_unsupported() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.rar");
    std::fs::write(&archive, b"Rar!\x1A\x07\x00garbage").unwrap();

    match BuiltinExtractor::new().extract(&archive) {
        Err(ExtractionError::UnsupportedFormat { format, .. }) => assert_eq!(format, "rar"),
        other => panic!("expected UnsupportedFormat, got {:?}", other),
    }
    assert!(!is_supported(ArchiveType::Rar));
    assert!(is_supported(ArchiveType::Zip));
}

#[test]
fn test_unknown_file_is_reported_as_unsupported() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.bin");
    std::fs::write(&archive, b"not an archive").unwrap();

    assert!(matches!(
        BuiltinExtractor::new().extract(&archive),
        Err(ExtractionError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_corrupt_zip_fails() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.zip");
    std::fs::write(&archive, b"PK\x03\x04 truncated").unwrap();

    assert!(matches!(
        BuiltinExtractor::new().extract(&archive),
        Err(ExtractionError::Failed { .. })
    ));
}

#[test]
fn test_encrypted_zip_fails_with_password_reason() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.zip");
    create_encrypted_zip(&archive, "730.lua", b"addappid(730)\n", b"secret");

    match BuiltinExtractor::new().extract(&archive) {
        Err(ExtractionError::Failed { reason, .. }) => {
            assert!(reason.contains("password"), "got: {}", reason)
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[cfg(feature = "sevenz")]
#[test]
fn test_builtin_extracts_7z() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("730.lua"), b"addappid(730)\n").unwrap();

    let archive = temp.path().join("730.7z");
    sevenz_rust::compress_to_path(&source, &archive).unwrap();

    let extracted = BuiltinExtractor::new().extract(&archive).unwrap();
    assert!(
        extracted
            .files
            .iter()
            .any(|p| p.file_name().is_some_and(|n| n == "730.lua"))
    );
}

#[cfg(not(feature = "sevenz"))]
#[test]
fn test_7z_unsupported_without_feature() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("730.7z");
    std::fs::write(&archive, b"7z\xBC\xAF\x27\x1C\x00\x04").unwrap();

    assert!(matches!(
        BuiltinExtractor::new().extract(&archive),
        Err(ExtractionError::UnsupportedFormat { .. })
    ));
}
