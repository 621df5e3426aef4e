use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sandboxed_fs::{Host, Jail, JailError, Placement, Platform};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn posix() -> Host {
    Host::new(Platform::Posix, "/tmp", "/home/user")
}

fn windows() -> Host {
    Host::new(Platform::Windows, r"C:\Users\me\AppData\Local\Temp", r"C:\work")
}

fn posix_jail(allow_temp: bool) -> Jail {
    Jail::builder("/srv/jail")
        .host(posix())
        .allow_temp(allow_temp)
        .build()
        .unwrap()
}

fn windows_jail(allow_temp: bool) -> Jail {
    Jail::builder(r"C:\boundDir")
        .host(windows())
        .allow_temp(allow_temp)
        .build()
        .unwrap()
}

// ============================================================================
// Root validation
// ============================================================================

#[test]
fn rejects_filesystem_root() {
    // A jail at the filesystem root confines nothing
    let err = Jail::builder("/").host(posix()).build().unwrap_err();
    assert!(matches!(err, JailError::InvalidRoot { .. }));
    assert!(err.to_string().contains("filesystem root"));
}

#[test]
fn invalid_root_captures_path() {
    let err = Jail::builder("/.").host(posix()).build().unwrap_err();
    if let JailError::InvalidRoot { root, reason } = err {
        assert_eq!(root, Path::new("/"));
        assert_eq!(reason, "filesystem root");
    } else {
        panic!("Expected InvalidRoot error");
    }
}

#[test]
fn rejects_root_variations() {
    for root in ["/", "//", "/.", "/./", "/..", "/tmp/../.."] {
        assert!(Jail::builder(root).host(posix()).build().is_err(), "{root}");
    }
    for root in [r"C:\", "C:/", r"C:\..", r"\\server\share", r"\\server\share\", "//server/share"] {
        assert!(Jail::builder(root).host(windows()).build().is_err(), "{root}");
    }
}

#[test]
fn empty_root_fails() {
    let err = Jail::new("").unwrap_err();
    assert!(err.to_string().contains("empty path"));
}

#[test]
fn relative_root_is_resolved_against_cwd() {
    let jail = Jail::builder("uploads/../site").host(posix()).build().unwrap();
    assert_eq!(jail.root(), Path::new("/home/user/site"));

    let jail = Jail::builder("site").host(windows()).build().unwrap();
    assert_eq!(jail.root_str(), r"C:\work\site");
}

#[test]
fn dot_as_root() {
    // Current directory as jail, resolved without touching the filesystem
    let jail = Jail::new(".").unwrap();
    assert!(jail.root().is_absolute());
}

#[test]
fn tilde_not_expanded() {
    // `~` is a literal directory name under the working directory
    let jail = Jail::builder("~").host(posix()).build().unwrap();
    assert_eq!(jail.root(), Path::new("/home/user/~"));
}

#[test]
fn canonicalized_rejects_file_as_root() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("not_a_dir.txt");
    fs::write(&file_path, b"hello").unwrap();

    let err = Jail::canonicalized(&file_path).unwrap_err();
    assert!(matches!(err, JailError::InvalidRoot { .. }));
    assert!(err.to_string().contains("not a directory"));
}

#[test]
fn canonicalized_rejects_missing_root() {
    let dir = tempdir().unwrap();
    let err = Jail::canonicalized(dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, JailError::Io(_)));
}

#[test]
#[cfg(unix)]
fn canonicalized_root_can_be_symlink() {
    let dir = tempdir().unwrap();
    let real_dir = dir.path().join("real");
    fs::create_dir(&real_dir).unwrap();

    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&real_dir, &link).unwrap();

    // Root should be the resolved path, not the symlink
    let jail = Jail::canonicalized(&link).unwrap();
    assert_eq!(jail.root(), real_dir.canonicalize().unwrap());

    let path = jail.join("file.txt");
    assert!(path.starts_with(jail.root()));
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn clamps_traversal() {
    let jail = posix_jail(false);

    assert_eq!(jail.join("../secret").as_str(), "/srv/jail/secret");
    assert_eq!(jail.join("../../etc/passwd").as_str(), "/srv/jail/etc/passwd");
    assert_eq!(jail.join("foo/../../secret").as_str(), "/srv/jail/secret");
    assert_eq!(jail.join("../../..").as_str(), "/srv/jail");
}

#[test]
fn clamps_dot_dot_at_root() {
    let jail = posix_jail(false);
    assert_eq!(jail.join("..").as_path(), jail.root());
}

#[test]
fn reroots_absolute_input() {
    let jail = posix_jail(false);
    assert_eq!(jail.join("/etc/passwd").as_str(), "/srv/jail/etc/passwd");
    assert_eq!(jail.join("/srv/jail/x").as_str(), "/srv/jail/srv/jail/x");
}

#[test]
fn allows_internal_parent_navigation() {
    let jail = posix_jail(false);
    let path = jail.join("a/b/../c");
    assert_eq!(path.as_str(), "/srv/jail/a/c");
}

#[test]
fn allows_safe_new_files() {
    let dir = tempdir().unwrap();
    let jail = Jail::builder(dir.path()).allow_temp(false).build().unwrap();

    // Nothing needs to exist yet
    let path = jail.join("subdir/new_file.txt");
    assert!(path.starts_with(jail.root()));
    assert!(path.ends_with("new_file.txt"));
    assert!(!path.exists());
}

#[test]
#[cfg(unix)]
fn symlinks_are_not_followed() {
    let dir = tempdir().unwrap();
    let jail = Jail::builder(dir.path()).allow_temp(false).build().unwrap();

    // Confinement is lexical; the link is kept as a path component
    let link = dir.path().join("evil");
    std::os::unix::fs::symlink("/etc", &link).unwrap();

    let path = jail.join("evil/passwd");
    assert_eq!(path.as_path(), link.join("passwd"));
}

// ============================================================================
// Path input edge cases
// ============================================================================

#[test]
fn handles_empty_path() {
    // Empty path is the root, without a trailing separator
    let jail = posix_jail(false);
    assert_eq!(jail.join("").as_str(), "/srv/jail");
    assert_eq!(jail.join("/").as_str(), "/srv/jail");
}

#[test]
fn handles_dot_components() {
    let jail = posix_jail(false);
    assert_eq!(jail.join("./foo/./bar").as_str(), "/srv/jail/foo/bar");
}

#[test]
fn handles_double_slashes() {
    let jail = posix_jail(false);
    assert_eq!(jail.join("foo//bar").as_str(), "/srv/jail/foo/bar");
    assert_eq!(jail.join("//etc/passwd").as_str(), "/srv/jail/etc/passwd");
}

#[test]
fn handles_trailing_slash() {
    let jail = posix_jail(false);
    assert_eq!(jail.join("subdir/").as_str(), "/srv/jail/subdir");
}

#[test]
fn triple_dots_are_filenames() {
    let jail = posix_jail(false);

    // "..." is a valid filename
    assert_eq!(jail.join("...").as_str(), "/srv/jail/...");
    assert_eq!(jail.join(".../foo").as_str(), "/srv/jail/.../foo");
}

#[test]
fn backslash_is_a_filename_character_on_posix() {
    let jail = posix_jail(false);

    // Not a separator here, so no traversal happens
    let path = jail.join(r"..\..\etc\passwd");
    assert_eq!(path.as_str(), r"/srv/jail/..\..\etc\passwd");
}

#[test]
fn handles_hidden_files_and_spaces() {
    let jail = posix_jail(false);
    assert_eq!(jail.join(".hidden").as_str(), "/srv/jail/.hidden");
    assert_ne!(jail.join(" file.txt"), jail.join("file.txt"));
    assert_ne!(jail.join("file.txt "), jail.join("file.txt"));
}

#[test]
fn handles_unicode_names() {
    let jail = posix_jail(false);

    // Display attacks, not path attacks: passed through as names
    let rtl = "\u{202E}txt.exe";
    assert_eq!(jail.join(rtl).as_str(), format!("/srv/jail/{rtl}"));
    let bom = "\u{FEFF}file.txt";
    assert_eq!(jail.join(bom).as_str(), format!("/srv/jail/{bom}"));
}

// ============================================================================
// Temp directory
// ============================================================================

#[test]
fn temp_passes_through_when_allowed() {
    let jail = posix_jail(true);
    let path = jail.join("/tmp/upload.bin");
    assert_eq!(path.as_str(), "/tmp/upload.bin");
    assert_eq!(path.placement(), Placement::Temp);

    let path = jail.join("/tmp");
    assert_eq!(path.as_str(), "/tmp");
    assert_eq!(path.placement(), Placement::Temp);
}

#[test]
fn temp_is_confined_when_not_allowed() {
    let jail = posix_jail(false);
    let path = jail.join("/tmp/upload.bin");
    assert_eq!(path.as_str(), "/srv/jail/tmp/upload.bin");
    assert_eq!(path.placement(), Placement::Jail);
}

#[test]
fn temp_lookalikes_are_confined() {
    let jail = posix_jail(true);
    assert_eq!(jail.join("/tmpfoo/x").as_str(), "/srv/jail/tmpfoo/x");
    assert_eq!(jail.join("/tmp/../etc/passwd").as_str(), "/srv/jail/etc/passwd");
    // Relative candidates are rooted at `/`, not at the working directory
    assert_eq!(jail.join("tmp/x").as_str(), "/tmp/x");
    assert_eq!(jail.join("tmp/x").placement(), Placement::Temp);
}

#[test]
fn empty_temp_dir_does_not_open_the_jail() {
    // An empty TMPDIR while running from `/` must not make `/` the temp dir
    for reported in ["", "/", "relative/tmp"] {
        let jail = Jail::builder("/srv/jail")
            .host(Host::new(Platform::Posix, reported, "/"))
            .build()
            .unwrap();
        assert!(jail.allows_temp());

        let path = jail.join("/etc/passwd");
        assert_eq!(path.as_str(), "/srv/jail/etc/passwd", "{reported:?}");
        assert_eq!(path.placement(), Placement::Jail);
        assert_eq!(jail.join("../../etc/shadow").as_str(), "/srv/jail/etc/shadow");
        assert_eq!(jail.join("/tmp/x").placement(), Placement::Temp);
    }
}

#[test]
fn windows_drive_root_temp_dir_does_not_open_the_jail() {
    let jail = Jail::builder(r"C:\boundDir")
        .host(Host::new(Platform::Windows, r"C:\", r"C:\"))
        .build()
        .unwrap();
    assert_eq!(jail.join(r"C:\Windows\System32").as_str(), r"C:\boundDir\Windows\System32");
    assert_eq!(jail.join(r"C:\Windows\Temp\x").placement(), Placement::Temp);
}

// ============================================================================
// contains()
// ============================================================================

#[test]
fn contains_verifies_paths() {
    let jail = posix_jail(false);

    assert!(jail.contains("/srv/jail"));
    assert!(jail.contains("/srv/jail/test.txt"));
    assert!(jail.contains("/srv/jail/sub/../test.txt"));
    assert!(!jail.contains("/srv/jail/../secret"));
    assert!(!jail.contains("/srv/jailbreak"));
    assert!(!jail.contains("/etc/passwd"));

    // Relative paths are taken from the working directory
    assert!(!jail.contains("relative/path"));
}

#[test]
fn contains_is_case_insensitive_on_windows() {
    let jail = windows_jail(false);
    assert!(jail.contains(r"c:\BOUNDDIR\file.ext"));
    assert!(!jail.contains(r"C:\boundDir2\file.ext"));
}

// ============================================================================
// Windows rules, simulated on any host
// ============================================================================

#[test]
fn windows_drive_roots_are_stripped() {
    let jail = windows_jail(true);

    assert_eq!(jail.join("anotherDir").as_str(), r"C:\boundDir\anotherDir");
    assert_eq!(jail.join(r"C:\anotherDir").as_str(), r"C:\boundDir\anotherDir");
    assert_eq!(jail.join(r"D:\anotherDir").as_str(), r"C:\boundDir\anotherDir");
    assert_eq!(jail.join(r"C:..\..\..").as_str(), r"C:\boundDir");
    assert_eq!(jail.join("C:file.ext").as_str(), r"C:\boundDir\file.ext");
}

#[test]
fn windows_mixed_separators() {
    let jail = windows_jail(false);
    assert_eq!(jail.join(r"a/b\..\..\../c").as_str(), r"C:\boundDir\c");
    assert_eq!(jail.join(r"..\../Windows/System32").as_str(), r"C:\boundDir\Windows\System32");
}

#[test]
fn windows_unc_roots_are_stripped() {
    let jail = windows_jail(false);

    assert_eq!(jail.join(r"\\hostname\sharedDir\").as_str(), r"C:\boundDir");
    assert_eq!(
        jail.join(r"\\hostname\sharedDir\anotherDir").as_str(),
        r"C:\boundDir\anotherDir"
    );
    assert_eq!(jail.join(r"\\?\C:\anotherDir").as_str(), r"C:\boundDir\anotherDir");
    assert_eq!(jail.join("//server/share/../../x").as_str(), r"C:\boundDir\x");
}

#[test]
fn windows_temp_is_case_insensitive() {
    let jail = windows_jail(true);

    let path = jail.join(r"c:\users\ME\appdata\local\temp\x");
    assert_eq!(path.placement(), Placement::Temp);

    let path = jail.join(r"C:\Users\me\AppData\Local\Temp2\x");
    assert_eq!(path.as_str(), r"C:\boundDir\Users\me\AppData\Local\Temp2\x");
}

// ============================================================================
// Containment properties
// ============================================================================

fn segment() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(".."),
        Just("."),
        Just(""),
        Just("a"),
        Just("tmp"),
        Just("etc"),
        Just("C:"),
        Just("C:.."),
        Just("\\"),
        Just("\\\\server"),
    ]
}

proptest! {
    #[test]
    fn posix_join_never_escapes(segments in prop::collection::vec(segment(), 0..16), leading in any::<bool>()) {
        let jail = posix_jail(false);
        let mut candidate = segments.join("/");
        if leading {
            candidate.insert(0, '/');
        }
        let path = jail.join(&candidate);
        prop_assert!(jail.contains(path.as_str()), "{candidate:?} -> {path}");
    }

    #[test]
    fn windows_join_never_escapes(segments in prop::collection::vec(segment(), 0..16), slash in any::<bool>()) {
        let jail = windows_jail(false);
        let candidate = segments.join(if slash { "/" } else { "\\" });
        let path = jail.join(&candidate);
        prop_assert!(jail.contains(path.as_str()), "{candidate:?} -> {path}");
    }

    #[test]
    fn arbitrary_text_never_escapes(candidate in any::<String>()) {
        let jail = posix_jail(false);
        let path = jail.join(&candidate);
        prop_assert!(jail.contains(path.as_str()), "{candidate:?} -> {path}");
    }

    #[test]
    fn temp_results_lie_under_temp(segments in prop::collection::vec(segment(), 0..16)) {
        let jail = posix_jail(true);
        let path = jail.join(segments.join("/"));
        match path.placement() {
            Placement::Temp => prop_assert!(path.starts_with("/tmp")),
            Placement::Jail => prop_assert!(jail.contains(path.as_str())),
        }
    }
}
