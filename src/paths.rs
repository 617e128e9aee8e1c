//! Filesystem path mapping for downloaded content
//!
//! Pure functions: the resolver never touches the filesystem, so identical
//! inputs always produce identical paths. Numeric-suffix collision handling
//! needs filesystem state and therefore belongs to the pipeline, not here.

use crate::types::File;
use std::path::{Path, PathBuf};

/// Fixed sub-directory for assignment submission content
const SUBMISSIONS_DIR: &str = "submissions";

/// Make a remote-supplied name safe to use as a single path component
///
/// Platform names arrive HTML-escaped and may contain separators or
/// newlines. This decodes entities, replaces `/`, `\`, and newline
/// characters with `_`, and strips trailing dots and spaces (FAT/NTFS
/// reject those). A name that sanitizes to nothing becomes `_`.
pub fn sanitize(name: &str) -> String {
    let decoded = decode_entities(name);
    let mut out = String::with_capacity(decoded.len());
    for ch in decoded.chars() {
        match ch {
            '/' | '\\' | '\n' | '\r' => out.push('_'),
            _ => out.push(ch),
        }
    }
    let trimmed = out.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Map a file to its deterministic destination path
///
/// Layout: `storage_root/<course>/<section>[/<module>][/submissions]/<filepath...>/<filename>`
/// with every remote-supplied segment sanitized. The module level is
/// inserted only for kinds that carry their own directory (folders,
/// assignments); submission content additionally goes under the fixed
/// `submissions/` sub-path.
pub fn resolve(storage_root: &Path, course_fullname: &str, file: &File) -> PathBuf {
    let mut path = storage_root.join(sanitize(course_fullname));
    path.push(sanitize(&file.section_name));

    if file.module_kind.adds_module_dir() {
        path.push(sanitize(&file.module_name));
    }
    if file.content_type.is_submission() {
        path.push(SUBMISSIONS_DIR);
    }

    // content_filepath is a remote-relative directory like "/" or "/slides/"
    for segment in file.content_filepath.split('/') {
        if !segment.is_empty() {
            path.push(sanitize(segment));
        }
    }

    path.push(sanitize(&file.content_filename));
    path
}

/// Decode HTML entity references in a remote-supplied name
///
/// Handles the named basic set plus decimal and hex numeric references.
/// Anything unrecognized is left verbatim.
fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some(end) = rest.find(';')
            && let Some(decoded) = decode_entity(&rest[1..end])
        {
            out.push(decoded);
            rest = &rest[end + 1..];
            continue;
        }

        out.push('&');
        rest = &rest[1..];
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = if let Some(hex) = num.strip_prefix(['x', 'X']) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                num.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentType, ModuleKind};

    fn file_with(kind: ModuleKind, content_type: ContentType, filepath: &str) -> File {
        File {
            module_id: 1,
            section_name: "Week 1".into(),
            module_name: "Handouts".into(),
            module_kind: kind,
            content_filepath: filepath.into(),
            content_filename: "notes.pdf".into(),
            content_fileurl: "https://campus.example.com/pluginfile/1/notes.pdf".into(),
            content_filesize: 100,
            content_timemodified: 10,
            content_type,
            modified: false,
            deleted: false,
            notified: false,
            saved_to: None,
            time_stamp: 0,
        }
    }

    #[test]
    fn sanitize_decodes_html_entities() {
        assert_eq!(sanitize("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(sanitize("a &lt;b&gt; c"), "a <b> c");
        assert_eq!(sanitize("say &quot;hi&quot;"), "say \"hi\"");
        assert_eq!(sanitize("it&apos;s"), "it's");
        assert_eq!(sanitize("caf&#233;"), "café");
        assert_eq!(sanitize("caf&#xE9;"), "café");
    }

    #[test]
    fn sanitize_leaves_unknown_entities_verbatim() {
        assert_eq!(sanitize("a &bogus; b"), "a &bogus; b");
        assert_eq!(sanitize("AT&T"), "AT&T");
        assert_eq!(sanitize("x &#xZZ; y"), "x &#xZZ; y");
    }

    #[test]
    fn sanitize_replaces_separators_and_newlines() {
        assert_eq!(sanitize("a/b"), "a_b");
        assert_eq!(sanitize("a\\b"), "a_b");
        assert_eq!(sanitize("line\nbreak"), "line_break");
        assert_eq!(sanitize("line\rbreak"), "line_break");
    }

    #[test]
    fn sanitize_strips_trailing_dots_and_spaces() {
        assert_eq!(sanitize("Report."), "Report");
        assert_eq!(sanitize("Report. . "), "Report");
        assert_eq!(sanitize("Report .txt"), "Report .txt");
    }

    #[test]
    fn sanitize_never_returns_empty() {
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("..."), "_");
        assert_eq!(sanitize("   "), "_");
    }

    #[test]
    fn resolve_basic_layout() {
        let f = file_with(ModuleKind::Resource, ContentType::File, "/");
        let path = resolve(Path::new("/data/courses"), "Biology 101", &f);
        assert_eq!(
            path,
            PathBuf::from("/data/courses/Biology 101/Week 1/notes.pdf")
        );
    }

    #[test]
    fn resolve_inserts_module_level_for_folders() {
        let f = file_with(ModuleKind::Folder, ContentType::File, "/");
        let path = resolve(Path::new("/data/courses"), "Biology 101", &f);
        assert_eq!(
            path,
            PathBuf::from("/data/courses/Biology 101/Week 1/Handouts/notes.pdf")
        );
    }

    #[test]
    fn resolve_places_submissions_under_fixed_subpath() {
        let f = file_with(ModuleKind::Assignment, ContentType::Submission, "/");
        let path = resolve(Path::new("/data/courses"), "Biology 101", &f);
        assert_eq!(
            path,
            PathBuf::from("/data/courses/Biology 101/Week 1/Handouts/submissions/notes.pdf")
        );
    }

    #[test]
    fn resolve_expands_nested_filepath_segments() {
        let f = file_with(ModuleKind::Folder, ContentType::File, "/slides/2024/");
        let path = resolve(Path::new("/data/courses"), "Biology 101", &f);
        assert_eq!(
            path,
            PathBuf::from("/data/courses/Biology 101/Week 1/Handouts/slides/2024/notes.pdf")
        );
    }

    #[test]
    fn resolve_sanitizes_every_remote_segment() {
        let mut f = file_with(ModuleKind::Folder, ContentType::File, "/a/b c./");
        f.section_name = "Week 1: Intro &amp; Setup".into();
        f.module_name = "Slides/Recordings".into();
        f.content_filename = "deck v1..".into();
        let path = resolve(Path::new("/root"), "Bio&#47;Chem", &f);
        assert_eq!(
            path,
            PathBuf::from("/root/Bio_Chem/Week 1: Intro & Setup/Slides_Recordings/a/b c/deck v1")
        );
    }

    #[test]
    fn resolve_is_deterministic() {
        let f = file_with(ModuleKind::Resource, ContentType::File, "/");
        let a = resolve(Path::new("/data"), "Bio", &f);
        let b = resolve(Path::new("/data"), "Bio", &f);
        assert_eq!(a, b);
    }
}
