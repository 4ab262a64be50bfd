//! Tag-Maps: Merge-Regeln, "interessante" Tags und Flächen-Erkennung.

use indexmap::IndexMap;

/// Geordnete Tag-Map eines Entities (Einfügereihenfolge bleibt erhalten).
pub type Tags = IndexMap<String, String>;

/// Maximale Länge eines Tag-Werts in Unicode-Codepoints (Wire-Format-Limit).
pub const MAX_TAG_VALUE_CHARS: usize = 255;

/// Tags ohne inhaltliche Aussage (Quellenangaben, Editor-Kennungen).
const UNINTERESTING_KEYS: &[&str] = &["attribution", "created_by", "source", "odbl"];

/// Schlüssel, deren Vorhandensein eine geschlossene Line zur Fläche macht.
/// Die Wertelisten nennen Ausnahmen, die trotzdem linear sind.
const AREA_KEYS: &[(&str, &[&str])] = &[
    ("building", &[]),
    ("landuse", &[]),
    ("amenity", &[]),
    ("leisure", &["track", "slipway"]),
    ("natural", &["coastline", "cliff", "ridge", "arete", "tree_row"]),
    ("shop", &[]),
    ("tourism", &[]),
    ("historic", &[]),
    ("military", &[]),
    ("place", &[]),
    ("aeroway", &["taxiway", "runway"]),
    ("man_made", &["pipeline", "embankment", "breakwater", "groyne", "cutline"]),
    ("area:highway", &[]),
    ("building:part", &[]),
    ("water", &[]),
];

/// Kürzt `value` auf höchstens `max_chars` Unicode-Codepoints (nicht Bytes).
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value[..byte_idx].to_string(),
        None => value.to_string(),
    }
}

/// Führt zwei Tag-Werte zusammen.
///
/// - gleiche Werte bleiben unverändert
/// - `building=yes` unterliegt dem spezifischeren Wert der Gegenseite
/// - sonst: deduplizierte Vereinigung der `;`-Listen, gekürzt auf `max_chars`
fn merge_value(key: &str, ours: &str, theirs: &str, max_chars: usize) -> String {
    if ours == theirs {
        return ours.to_string();
    }
    if key == "building" {
        if ours == "yes" {
            return theirs.to_string();
        }
        if theirs == "yes" {
            return ours.to_string();
        }
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in ours.split(';').chain(theirs.split(';')) {
        let part = part.trim_start();
        if !parts.contains(&part) {
            parts.push(part);
        }
    }
    truncate_chars(&parts.join(";"), max_chars)
}

/// Vereinigt `incoming` in `base`. Total über beliebige Tag-Maps.
///
/// Gibt die zusammengeführte Map und ein Flag zurück, ob sich gegenüber
/// `base` etwas geändert hat.
pub fn merge_tag_maps(base: &Tags, incoming: &Tags, max_chars: usize) -> (Tags, bool) {
    let mut merged = base.clone();
    let mut changed = false;

    for (key, theirs) in incoming {
        match merged.get(key) {
            None => {
                merged.insert(key.clone(), theirs.clone());
                changed = true;
            }
            Some(ours) if ours != theirs => {
                let value = merge_value(key, ours, theirs, max_chars);
                if &value != ours {
                    merged.insert(key.clone(), value);
                    changed = true;
                }
            }
            Some(_) => {}
        }
    }

    (merged, changed)
}

/// Prüft, ob ein Schlüssel eine inhaltliche Aussage trägt.
pub fn is_interesting_key(key: &str) -> bool {
    !UNINTERESTING_KEYS.contains(&key) && !key.starts_with("tiger:")
}

/// Mindestens ein Tag mit inhaltlicher Aussage vorhanden.
pub fn has_interesting_tags(tags: &Tags) -> bool {
    tags.keys().any(|k| is_interesting_key(k))
}

/// Prüft anhand der Tags, ob eine geschlossene Line als Fläche gilt.
pub fn is_area_tags(tags: &Tags) -> bool {
    match tags.get("area").map(String::as_str) {
        Some("yes") => return true,
        Some("no") => return false,
        _ => {}
    }
    AREA_KEYS.iter().any(|(key, linear_values)| {
        tags.get(*key)
            .is_some_and(|value| value != "no" && !linear_values.contains(&value.as_str()))
    })
}

/// Entfernt Tags mit leerem Schlüssel.
pub(crate) fn sanitize(mut tags: Tags) -> Tags {
    if tags.contains_key("") {
        log::warn!("Tag mit leerem Schlüssel verworfen");
        tags.shift_remove("");
    }
    tags
}

/// Baut eine Tag-Map aus Schlüssel/Wert-Paaren.
pub fn tags_from<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Tags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
