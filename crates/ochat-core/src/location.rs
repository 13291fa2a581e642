//! Dialog ids in page URLs (`{base}/chat/{id}`).

use url::Url;

use crate::client::DialogId;

/// Dialog id from a page URL, or `None` in new-dialog mode.
///
/// Query and fragment are ignored, as is a trailing slash.
pub fn dialog_id_from_url(url: &Url) -> Option<DialogId> {
    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();
    let chat = segments.iter().rposition(|segment| *segment == "chat")?;
    segments
        .get(chat + 1..)
        .and_then(<[&str]>::last)
        .map(|id| DialogId::new(*id))
}

/// Dialog id from user input that is either a bare id or a page URL.
pub fn parse_dialog_ref(input: &str) -> Option<DialogId> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) => dialog_id_from_url(&url),
        Err(_) if !input.contains('/') => Some(DialogId::new(input)),
        Err(_) => {
            let path = input.trim_start_matches('/');
            Url::parse("http://local/")
                .and_then(|base| base.join(path))
                .ok()
                .and_then(|url| dialog_id_from_url(&url))
        }
    }
}

/// Page URL of a dialog under `base`.
pub fn dialog_url(base: &Url, id: &DialogId) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}/chat/{id}"));
    url.set_query(None);
    url.set_fragment(None);
    url
}
