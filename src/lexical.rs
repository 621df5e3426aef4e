//! Textual path algebra for both platform families.
//!
//! Nothing here touches the filesystem or follows symlinks. Paths are plain
//! strings interpreted with the rules of a [`Platform`], so Windows paths can
//! be handled on a POSIX host and the reverse.

use crate::platform::Platform;

/// Root prefix of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Root {
    /// `C:`, `\\server\share`, or empty.
    pub device: String,
    pub absolute: bool,
    /// Byte offset where the segments after the root begin.
    pub rest: usize,
    pub unc: bool,
}

impl Root {
    fn relative(rest: usize) -> Self {
        Self {
            device: String::new(),
            absolute: false,
            rest,
            unc: false,
        }
    }
}

pub(crate) fn parse_root(platform: Platform, path: &str) -> Root {
    match platform {
        Platform::Posix => Root {
            device: String::new(),
            absolute: path.starts_with('/'),
            rest: 0,
            unc: false,
        },
        Platform::Windows => parse_windows_root(path),
    }
}

fn parse_windows_root(path: &str) -> Root {
    let bytes = path.as_bytes();
    let is_sep = |b: u8| b == b'/' || b == b'\\';
    let len = bytes.len();

    if len == 0 {
        return Root::relative(0);
    }

    if is_sep(bytes[0]) {
        let mut i = 0;
        while i < len && is_sep(bytes[i]) {
            i += 1;
        }
        if i >= 2 {
            // \\server\share
            let mut j = i;
            while j < len && !is_sep(bytes[j]) {
                j += 1;
            }
            let mut k = j;
            while k < len && is_sep(bytes[k]) {
                k += 1;
            }
            let mut m = k;
            while m < len && !is_sep(bytes[m]) {
                m += 1;
            }
            if j > i && k > j && m > k {
                return Root {
                    device: format!(r"\\{}\{}", &path[i..j], &path[k..m]),
                    absolute: true,
                    rest: m,
                    unc: true,
                };
            }
        }
        return Root {
            device: String::new(),
            absolute: true,
            rest: 1,
            unc: false,
        };
    }

    if len >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let absolute = len > 2 && is_sep(bytes[2]);
        return Root {
            device: path[..2].to_string(),
            absolute,
            rest: if absolute { 3 } else { 2 },
            unc: false,
        };
    }

    Root::relative(0)
}

/// True when resolved `path` names a filesystem root (`/`, `C:\`, `\\server\share`).
pub(crate) fn is_root(platform: Platform, path: &str) -> bool {
    path[strip_len(platform, path)..]
        .chars()
        .all(|c| platform.is_separator(c))
}

/// Resolve `paths` right to left until an absolute path (with a device, on
/// Windows) is formed, falling back to `cwd`. `..` never climbs above the root.
pub(crate) fn resolve(platform: Platform, cwd: &str, paths: &[&str]) -> String {
    let mut device = String::new();
    let mut absolute = false;
    let mut tails: Vec<&str> = Vec::new();

    for path in paths.iter().rev().copied().chain(std::iter::once(cwd)) {
        if path.is_empty() {
            continue;
        }
        let root = parse_root(platform, path);

        if !root.device.is_empty() {
            if device.is_empty() {
                device = root.device.clone();
            } else if !device.eq_ignore_ascii_case(&root.device) {
                // A different drive says nothing about this one.
                continue;
            }
        }

        if absolute {
            if !device.is_empty() {
                break;
            }
            continue;
        }

        tails.push(&path[root.rest..]);
        absolute = root.absolute;
        if absolute && (platform == Platform::Posix || !device.is_empty()) {
            break;
        }
    }

    let mut segments = Vec::new();
    for tail in tails.iter().rev() {
        push_segments(platform, &mut segments, tail, absolute);
    }
    format(platform, &device, absolute, &segments)
}

/// Join `fragment` onto `base` and normalize the result. `..` in the
/// fragment is clamped at the root of an absolute base.
pub(crate) fn join(platform: Platform, base: &str, fragment: &str) -> String {
    let root = parse_root(platform, base);
    let mut segments = Vec::new();
    push_segments(platform, &mut segments, &base[root.rest..], root.absolute);
    push_segments(platform, &mut segments, fragment, root.absolute);
    format(platform, &root.device, root.absolute, &segments)
}

/// Byte length of the root prefix to strip from a resolved path before it is
/// re-rooted elsewhere. POSIX paths keep their leading `/`.
pub(crate) fn strip_len(platform: Platform, resolved: &str) -> usize {
    match platform {
        Platform::Posix => 0,
        Platform::Windows => {
            let root = parse_root(platform, resolved);
            let mut end = root.rest;
            if root.unc && resolved[end..].starts_with(|c| platform.is_separator(c)) {
                end += 1;
            }
            end
        }
    }
}

/// True when normalized `path` is `dir` or lies beneath it.
pub(crate) fn is_within(platform: Platform, path: &str, dir: &str) -> bool {
    let Some(head) = path.get(..dir.len()) else {
        return false;
    };
    let same = match platform {
        Platform::Posix => head == dir,
        Platform::Windows => head.eq_ignore_ascii_case(dir),
    };
    if !same {
        return false;
    }
    match path[dir.len()..].chars().next() {
        None => true,
        Some(c) => platform.is_separator(c) || dir.ends_with(|d| platform.is_separator(d)),
    }
}

fn push_segments<'a>(platform: Platform, segments: &mut Vec<&'a str>, path: &'a str, absolute: bool) {
    for segment in path.split(|c| platform.is_separator(c)) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            name => segments.push(name),
        }
    }
}

fn format(platform: Platform, device: &str, absolute: bool, segments: &[&str]) -> String {
    let tail = segments.join(platform.separator().to_string().as_str());
    let out = match (platform, absolute) {
        (Platform::Posix, true) => format!("/{tail}"),
        (Platform::Posix, false) => tail,
        (Platform::Windows, true) => format!(r"{device}\{tail}"),
        (Platform::Windows, false) => format!("{device}{tail}"),
    };
    if out.is_empty() {
        ".".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const P: Platform = Platform::Posix;
    const W: Platform = Platform::Windows;

    #[test]
    fn posix_resolve_clamps_at_root() {
        assert_eq!(resolve(P, "/cwd", &["/", "../../.."]), "/");
        assert_eq!(resolve(P, "/cwd", &["/", "../etc/passwd"]), "/etc/passwd");
        assert_eq!(resolve(P, "/cwd", &["/", "a//b/./c/"]), "/a/b/c");
        assert_eq!(resolve(P, "/cwd", &["/", ""]), "/");
        assert_eq!(resolve(P, "/cwd", &["rel"]), "/cwd/rel");
    }

    #[test]
    fn posix_backslash_is_a_filename_character() {
        assert_eq!(resolve(P, "/", &["/", r"..\..\etc"]), r"/..\..\etc");
    }

    #[test]
    fn windows_drive_relative_keeps_its_drive() {
        assert_eq!(resolve(W, r"D:\work", &["/", r"C:..\..\.."]), r"C:\");
        assert_eq!(resolve(W, r"D:\work", &["/", "C:file.ext"]), r"C:\file.ext");
        assert_eq!(resolve(W, r"C:\work", &["/", "anotherDir"]), r"C:\anotherDir");
        assert_eq!(resolve(W, r"C:\work", &["/", r"C:\boundDir/../anotherDir"]), r"C:\anotherDir");
    }

    #[test]
    fn windows_unc_roots() {
        assert_eq!(resolve(W, r"C:\", &["/", r"\\hostname\sharedDir\"]), r"\\hostname\sharedDir\");
        assert_eq!(resolve(W, r"C:\", &["/", r"//hostname/sharedDir/x/../y"]), r"\\hostname\sharedDir\y");
        assert_eq!(resolve(W, r"C:\", &["/", r"\\?\C:\anotherDir"]), r"\\?\C:\anotherDir");
        assert!(parse_root(W, r"\\hostname\sharedDir").unc);
        assert!(!parse_root(W, r"\\hostname").unc);
        assert!(!parse_root(W, r"C:\hostname\sharedDir").unc);
        assert!(!parse_root(P, "//hostname/sharedDir").unc);
    }

    #[test]
    fn windows_strip_len() {
        assert_eq!(strip_len(W, r"C:\"), 3);
        assert_eq!(strip_len(W, r"C:\dir"), 3);
        assert_eq!(strip_len(W, r"\\hostname\sharedDir\"), r"\\hostname\sharedDir\".len());
        assert_eq!(strip_len(W, r"\\hostname\sharedDir"), r"\\hostname\sharedDir".len());
        assert_eq!(strip_len(W, r"\\?\C:\anotherDir"), r"\\?\C:\".len());
        assert_eq!(strip_len(P, "/etc"), 0);
    }

    #[test]
    fn join_collapses_separators() {
        assert_eq!(join(P, "/boundDir", "/"), "/boundDir");
        assert_eq!(join(P, "/boundDir", "/tmp/file.ext"), "/boundDir/tmp/file.ext");
        assert_eq!(join(W, r"C:\boundDir", ""), r"C:\boundDir");
        assert_eq!(join(W, r"C:\boundDir", "anotherDir/x"), r"C:\boundDir\anotherDir\x");
        assert_eq!(join(W, r"\\srv\share\jail", "a"), r"\\srv\share\jail\a");
    }

    #[test]
    fn filesystem_roots() {
        assert!(is_root(P, "/"));
        assert!(!is_root(P, "/tmp"));
        assert!(is_root(W, r"C:\"));
        assert!(is_root(W, r"\\srv\share"));
        assert!(is_root(W, r"\\srv\share\"));
        assert!(!is_root(W, r"C:\Temp"));
    }

    #[test]
    fn within_is_component_wise() {
        assert!(is_within(P, "/tmp", "/tmp"));
        assert!(is_within(P, "/tmp/x", "/tmp"));
        assert!(!is_within(P, "/tmpfoo", "/tmp"));
        assert!(!is_within(P, "/", "/tmp"));
        assert!(is_within(P, "/anything", "/"));
        assert!(is_within(W, r"c:\users\me\temp\x", r"C:\Users\me\Temp"));
        assert!(is_within(W, r"C:\x", r"C:\"));
        assert!(!is_within(W, r"C:\Users\me\Temp2", r"C:\Users\me\Temp"));
    }
}
