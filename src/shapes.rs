//! Normalization of search-provider payloads.
//!
//! Providers disagree on layout: some return `{"data": {...}}` for a single hit,
//! some a bare list or `{"data": [...]}`, some `{"data": {"songs": [...]}}`.
//! Each layout has an adapter; [`detect_shape`] picks one by inspecting the payload.

use serde_json::{Map, Value};

use crate::types::{ResourceDescriptor, UNKNOWN, parse_media_url};

const URL_KEYS: &[&str] = &["musicurl", "url", "music_url", "playUrl", "play_url"];
const TITLE_KEYS: &[&str] = &["name", "title", "song"];
const ARTIST_KEYS: &[&str] = &["artist", "singer", "author", "artists"];
const ALBUM_KEYS: &[&str] = &["album", "albumname", "album_name"];
const DURATION_KEYS: &[&str] = &["duration", "interval", "time"];
const COVER_KEYS: &[&str] = &["cover", "pic", "picurl", "img"];

/// One provider payload layout.
pub trait ResponseShape: Sync {
    fn name(&self) -> &'static str;

    /// Extract every recognizable entry. Never fails on missing keys.
    fn normalize(&self, raw: &Value) -> Vec<ResourceDescriptor>;
}

/// A single result object, either under `data` or at the top level.
pub struct ObjectShape;

/// A list of result objects, either bare or under `data`.
pub struct ListShape;

/// A list of result objects under `data.songs`.
pub struct NestedSongsShape;

impl ResponseShape for ObjectShape {
    fn name(&self) -> &'static str {
        "object"
    }

    fn normalize(&self, raw: &Value) -> Vec<ResourceDescriptor> {
        let entry = raw
            .get("data")
            .filter(|d| d.is_object())
            .unwrap_or(raw);
        descriptor_from_entry(entry).into_iter().collect()
    }
}

impl ResponseShape for ListShape {
    fn name(&self) -> &'static str {
        "list"
    }

    fn normalize(&self, raw: &Value) -> Vec<ResourceDescriptor> {
        let items = raw
            .as_array()
            .or_else(|| raw.get("data").and_then(Value::as_array));
        normalize_items(items)
    }
}

impl ResponseShape for NestedSongsShape {
    fn name(&self) -> &'static str {
        "nested_songs"
    }

    fn normalize(&self, raw: &Value) -> Vec<ResourceDescriptor> {
        normalize_items(raw.pointer("/data/songs").and_then(Value::as_array))
    }
}

/// Pick the adapter matching the payload's structure, if any.
pub fn detect_shape(raw: &Value) -> Option<&'static dyn ResponseShape> {
    if raw.is_array() {
        return Some(&ListShape);
    }
    let obj = raw.as_object()?;
    match obj.get("data") {
        Some(Value::Object(data)) if data.get("songs").is_some_and(Value::is_array) => {
            Some(&NestedSongsShape)
        }
        Some(Value::Array(_)) => Some(&ListShape),
        Some(Value::Object(_)) => Some(&ObjectShape),
        _ if looks_like_entry(obj) => Some(&ObjectShape),
        _ => None,
    }
}

/// Normalize any observed payload layout into descriptors.
pub fn normalize(raw: &Value) -> Vec<ResourceDescriptor> {
    match detect_shape(raw) {
        Some(shape) => {
            let out = shape.normalize(raw);
            tracing::debug!(shape = shape.name(), results = out.len(), "normalized search payload");
            out
        }
        None => Vec::new(),
    }
}

fn normalize_items(items: Option<&Vec<Value>>) -> Vec<ResourceDescriptor> {
    items
        .map(|arr| arr.iter().filter_map(descriptor_from_entry).collect())
        .unwrap_or_default()
}

fn looks_like_entry(obj: &Map<String, Value>) -> bool {
    URL_KEYS
        .iter()
        .chain(TITLE_KEYS)
        .chain(["songname"].iter())
        .any(|k| obj.contains_key(*k))
}

/// Build a descriptor from one result object. Entries with neither a title nor
/// a URL carry nothing usable and are skipped.
fn descriptor_from_entry(entry: &Value) -> Option<ResourceDescriptor> {
    let obj = entry.as_object()?;

    // `songname` is the singer when `name` holds the title, otherwise it is the title.
    let (title, artist) = match first_text(obj, TITLE_KEYS) {
        Some(title) => {
            let artist = first_artist(obj).or_else(|| first_text(obj, &["songname"]));
            (Some(title), artist)
        }
        None => (first_text(obj, &["songname"]), first_artist(obj)),
    };

    let url = first_text(obj, URL_KEYS)
        .and_then(|raw| parse_media_url(&raw))
        .map(|u| u.to_string());

    if title.is_none() && url.is_none() {
        return None;
    }

    Some(ResourceDescriptor {
        title: title.unwrap_or_else(|| UNKNOWN.to_string()),
        artist: artist.unwrap_or_else(|| UNKNOWN.to_string()),
        album: first_text(obj, ALBUM_KEYS),
        url,
        duration_secs: DURATION_KEYS
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(parse_duration),
        cover_url: first_text(obj, COVER_KEYS)
            .and_then(|raw| parse_media_url(&raw))
            .map(|u| u.to_string()),
    })
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(as_text)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Artist fields may be a string, a list of strings, or a list of `{name}` objects.
fn first_artist(obj: &Map<String, Value>) -> Option<String> {
    ARTIST_KEYS.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::Array(items) => {
            let names: Vec<String> = items
                .iter()
                .filter_map(|item| as_text(item).or_else(|| item.get("name").and_then(as_text)))
                .collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        other => as_text(other),
    })
}

/// Seconds as a number, a numeric string, or `mm:ss` / `h:mm:ss`.
fn parse_duration(value: &Value) -> Option<f64> {
    let secs = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<f64>() {
                n
            } else {
                let mut total = 0.0;
                for part in s.split(':') {
                    total = total * 60.0 + part.trim().parse::<f64>().ok()?;
                }
                if !s.contains(':') {
                    return None;
                }
                total
            }
        }
        _ => return None,
    };
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> Value {
        json!({
            "musicurl": "http://x/test.mp3",
            "name": "Test Song",
            "songname": "Artist A",
            "album": "Album Z",
            "interval": "3:25"
        })
    }

    #[test]
    fn object_shape_reads_data_object() {
        let raw = json!({"code": 200, "data": entry()});
        assert_eq!(detect_shape(&raw).unwrap().name(), "object");
        let out = normalize(&raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Test Song");
        assert_eq!(out[0].artist, "Artist A");
        assert_eq!(out[0].album.as_deref(), Some("Album Z"));
        assert_eq!(out[0].url.as_deref(), Some("http://x/test.mp3"));
        assert_eq!(out[0].duration_secs, Some(205.0));
    }

    #[test]
    fn object_and_list_shapes_agree() {
        let object = normalize(&json!({"code": 200, "data": entry()}));
        let bare_list = normalize(&json!([entry()]));
        let data_list = normalize(&json!({"code": 200, "data": [entry()]}));
        let nested = normalize(&json!({"code": 200, "data": {"songs": [entry()]}}));
        assert_eq!(object, bare_list);
        assert_eq!(object, data_list);
        assert_eq!(object, nested);
    }

    #[test]
    fn missing_fields_become_unknown() {
        let out = normalize(&json!({"data": {"url": "https://cdn.example.com/a.mp3"}}));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, UNKNOWN);
        assert_eq!(out[0].artist, UNKNOWN);
        assert!(out[0].album.is_none());
        assert!(out[0].is_playable());
    }

    #[test]
    fn missing_url_is_not_playable() {
        let out = normalize(&json!({"code": 200, "data": {"name": "Test Song", "artist": "A"}}));
        assert_eq!(out.len(), 1);
        assert!(!out[0].is_playable());
    }

    #[test]
    fn invalid_url_is_dropped() {
        let out = normalize(&json!({"data": {"name": "S", "musicurl": "ftp://x/a.mp3"}}));
        assert_eq!(out[0].url, None);
    }

    #[test]
    fn empty_or_unrecognized_payloads_yield_nothing() {
        assert!(normalize(&json!({"code": 200, "data": {}})).is_empty());
        assert!(normalize(&json!({"code": 200, "msg": "ok"})).is_empty());
        assert!(normalize(&json!([])).is_empty());
        assert!(normalize(&json!("text")).is_empty());
        assert!(normalize(&Value::Null).is_empty());
    }

    #[test]
    fn audiobook_list_uses_play_url_and_title() {
        let raw = json!([
            {"title": "Chapter 1", "author": "Narrator", "playUrl": "https://audio.example.com/1.m4a"},
            {"title": "Chapter 2", "author": "Narrator"},
            42
        ]);
        let out = normalize(&raw);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url.as_deref(), Some("https://audio.example.com/1.m4a"));
        assert_eq!(out[0].artist, "Narrator");
        assert!(!out[1].is_playable());
    }

    #[test]
    fn artist_lists_are_joined() {
        let out = normalize(&json!({"data": {
            "title": "Duet",
            "artists": [{"name": "A"}, {"name": "B"}],
            "url": "http://x/d.mp3"
        }}));
        assert_eq!(out[0].artist, "A, B");
    }

    #[test]
    fn songname_alone_is_the_title() {
        let out = normalize(&json!({"data": {"songname": "Only Title", "singer": "S"}}));
        assert_eq!(out[0].title, "Only Title");
        assert_eq!(out[0].artist, "S");
    }

    #[test]
    fn duration_formats() {
        assert_eq!(parse_duration(&json!(215)), Some(215.0));
        assert_eq!(parse_duration(&json!("215")), Some(215.0));
        assert_eq!(parse_duration(&json!("1:02:03")), Some(3723.0));
        assert_eq!(parse_duration(&json!("soon")), None);
        assert_eq!(parse_duration(&json!(0)), None);
    }
}
