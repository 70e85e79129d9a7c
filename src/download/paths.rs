// src/download/paths.rs
// =============================================================================
// Maps a file URL onto a path under the output directory.
//
//   http://host/pub/docs/a%20b.pdf  ->  <output>/pub/docs/a b.pdf
//
// Segments are percent-decoded one at a time. Anything that could climb out
// of the output directory after decoding (".", "..", embedded separators)
// is dropped or replaced, so the result always stays under `output_dir`.
// =============================================================================

use std::path::{Path, PathBuf};
use url::Url;

/// Used when a URL has no path segments at all
const DEFAULT_FILE_NAME: &str = "index.html";

pub fn local_path(output_dir: &Path, url: &Url) -> PathBuf {
    let mut path = output_dir.to_path_buf();
    let mut pushed = false;

    for segment in url.path_segments().into_iter().flatten() {
        let decoded = urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| segment.to_string());

        if decoded.is_empty() || decoded == "." || decoded == ".." {
            continue;
        }

        path.push(sanitize(&decoded));
        pushed = true;
    }

    if !pushed {
        path.push(DEFAULT_FILE_NAME);
    }
    path
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Sibling path the body is streamed into before it is renamed into place.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
