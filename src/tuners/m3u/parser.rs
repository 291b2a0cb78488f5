//! Extended M3U playlist parsing
//!
//! Handles plain playlists (one url per line) as well as `#EXTINF` metadata
//! with `key="value"` attributes and `#EXTGRP` group hints.

use std::collections::HashMap;
use tracing::{debug, warn};

/// One playable entry of a playlist, before it is bound to a tuner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub title: String,
    pub url: String,
    pub group: Option<String>,
    pub attributes: HashMap<String, String>,
}

impl PlaylistEntry {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Values identifying the channel independently of its url, joined by `_`
    pub fn stable_discriminator(&self) -> Option<String> {
        let parts: Vec<&str> = ["channel-id", "tvg-id"]
            .iter()
            .filter_map(|key| self.attribute(key))
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("_"))
        }
    }

    /// Display name and channel number. An explicit number attribute wins;
    /// otherwise a leading numeric token of the title is split off.
    pub fn name_and_number(&self) -> (String, Option<String>) {
        let title = match self.title.trim() {
            "" => self.attribute("tvg-name").unwrap_or_default(),
            t => t,
        };

        let explicit = self
            .attribute("tvg-chno")
            .or_else(|| self.attribute("channel-number"))
            .map(str::to_string);
        if explicit.is_some() {
            return (title.to_string(), explicit);
        }

        if let Some((head, rest)) = title.split_once(char::is_whitespace) {
            let rest = rest.trim();
            if is_channel_number(head) && !rest.is_empty() {
                return (rest.to_string(), Some(head.to_string()));
            }
        }
        (title.to_string(), None)
    }

    pub fn is_radio(&self) -> bool {
        self.attribute("radio")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// Result of parsing a playlist body
#[derive(Debug, Default)]
pub struct ParsedPlaylist {
    pub entries: Vec<PlaylistEntry>,
    /// Whether the body looked like an M3U playlist at all
    pub has_m3u_markers: bool,
}

pub fn parse_playlist(content: &str) -> ParsedPlaylist {
    let mut parsed = ParsedPlaylist::default();
    let mut pending: Option<PlaylistEntry> = None;
    let mut pending_group: Option<String> = None;
    let mut dropped = 0usize;

    for (line_num, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }

        if line.starts_with("#EXTM3U") {
            parsed.has_m3u_markers = true;
        } else if let Some(extinf) = line.strip_prefix("#EXTINF:") {
            parsed.has_m3u_markers = true;
            if pending.take().is_some() {
                dropped += 1;
                debug!("Dropping #EXTINF without url before line {}", line_num + 1);
            }
            pending = Some(parse_extinf(extinf));
        } else if let Some(group) = line.strip_prefix("#EXTGRP:") {
            let group = group.trim();
            if !group.is_empty() {
                pending_group = Some(group.to_string());
            }
        } else if line.starts_with('#') {
            continue;
        } else if pending.is_none() && !looks_like_location(line) {
            debug!("Ignoring non-playlist line {}", line_num + 1);
        } else {
            let mut entry = pending.take().unwrap_or_else(|| {
                warn!(
                    "Stream url without #EXTINF metadata at line {}",
                    line_num + 1
                );
                PlaylistEntry {
                    title: title_from_url(line),
                    url: String::new(),
                    group: None,
                    attributes: HashMap::new(),
                }
            });
            entry.url = line.to_string();
            if let Some(group) = pending_group.take() {
                entry.group.get_or_insert(group);
            }
            parsed.entries.push(entry);
        }
    }

    if pending.is_some() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!("Dropped {} playlist entries without a stream url", dropped);
    }

    parsed
}

/// Parse the part after `#EXTINF:`, i.e. `duration key="value" ...,title`
fn parse_extinf(extinf: &str) -> PlaylistEntry {
    let (head, title) = match find_unquoted_comma(extinf) {
        Some(pos) => (&extinf[..pos], extinf[pos + 1..].trim()),
        None => (extinf, ""),
    };

    let attributes = parse_attributes(head);
    PlaylistEntry {
        title: title.to_string(),
        url: String::new(),
        group: attributes
            .get("group-title")
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty()),
        attributes,
    }
}

fn find_unquoted_comma(s: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, ch) in s.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Parse `key="value"` and `key=value` pairs; keys are lowercased
fn parse_attributes(attrs_part: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    let mut chars = attrs_part.chars().peekable();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut in_quotes = false;

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_value && in_quotes => {
                insert_attribute(&mut attributes, &mut key, &mut value);
                in_value = false;
                in_quotes = false;
            }
            ' ' | '\t' if !in_quotes => {
                if in_value {
                    insert_attribute(&mut attributes, &mut key, &mut value);
                    in_value = false;
                } else {
                    // the duration token or a bare flag
                    key.clear();
                }
            }
            '=' if !in_value => {
                in_value = true;
                if chars.peek() == Some(&'"') {
                    chars.next();
                    in_quotes = true;
                }
            }
            _ if in_value => value.push(ch),
            _ => key.push(ch),
        }
    }

    if in_value {
        insert_attribute(&mut attributes, &mut key, &mut value);
    }
    attributes
}

fn insert_attribute(
    attributes: &mut HashMap<String, String>,
    key: &mut String,
    value: &mut String,
) {
    let k = key.trim().to_ascii_lowercase();
    if !k.is_empty() {
        attributes.insert(k, std::mem::take(value));
    }
    key.clear();
    value.clear();
}

fn is_channel_number(token: &str) -> bool {
    let mut parts = token.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();

    !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.is_none_or(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

/// Bare lines outside an `#EXTINF` block are only taken as streams when they
/// carry a scheme or are absolute paths
fn looks_like_location(line: &str) -> bool {
    line.contains("://") || line.starts_with('/')
}

fn title_from_url(url: &str) -> String {
    let name = url
        .split('?')
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    if name.is_empty() {
        "Unnamed Channel".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_extended_playlist() {
        let content = r#"#EXTM3U
#EXTINF:-1 tvg-id="bbc1.uk" tvg-name="BBC One" tvg-logo="http://logos/bbc1.png" group-title="UK",BBC One HD
http://host/bbc1.ts
#EXTINF:-1 channel-id="7" radio="true",Radio, with comma
http://host/radio.mp3
"#;
        let parsed = parse_playlist(content);

        assert!(parsed.has_m3u_markers);
        assert_eq!(parsed.entries.len(), 2);

        let first = &parsed.entries[0];
        assert_eq!(first.title, "BBC One HD");
        assert_eq!(first.url, "http://host/bbc1.ts");
        assert_eq!(first.group.as_deref(), Some("UK"));
        assert_eq!(first.attribute("tvg-logo"), Some("http://logos/bbc1.png"));
        assert_eq!(first.stable_discriminator().as_deref(), Some("bbc1.uk"));

        let second = &parsed.entries[1];
        assert_eq!(second.title, "Radio, with comma");
        assert!(second.is_radio());
        assert_eq!(second.stable_discriminator().as_deref(), Some("7"));
    }

    #[test]
    fn test_discriminator_joins_channel_id_and_tvg_id() {
        let parsed = parse_playlist(
            "#EXTM3U\n#EXTINF:-1 tvg-id=\"news\" channel-id=\"12\",News\nhttp://host/news\n",
        );
        assert_eq!(
            parsed.entries[0].stable_discriminator().as_deref(),
            Some("12_news")
        );
    }

    #[test]
    fn test_extgrp_applies_when_group_title_missing() {
        let parsed = parse_playlist(
            "#EXTM3U\n#EXTINF:-1,Movies One\n#EXTGRP:Movies\nhttp://host/m1\n",
        );
        assert_eq!(parsed.entries[0].group.as_deref(), Some("Movies"));
    }

    #[test]
    fn test_entries_without_url_are_dropped() {
        let parsed = parse_playlist(
            "#EXTM3U\n#EXTINF:-1,Orphan\n#EXTINF:-1,Kept\nhttp://host/kept\n#EXTINF:-1,Trailing\n",
        );
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].title, "Kept");
    }

    #[test]
    fn test_plain_url_list() {
        let parsed = parse_playlist("http://host/live/one.ts?token=x\nhttp://host/live/two/\n");
        assert!(!parsed.has_m3u_markers);
        assert_eq!(parsed.entries[0].title, "one.ts");
        assert_eq!(parsed.entries[1].title, "two");
    }

    #[test]
    fn test_bare_text_is_not_a_stream() {
        let parsed = parse_playlist("<html>\n<body>Not found</body>\n</html>\n");
        assert!(parsed.entries.is_empty());
        assert!(!parsed.has_m3u_markers);
    }

    #[test]
    fn test_unquoted_attribute_values() {
        let attrs = parse_attributes("-1 tvg-chno=5 TVG-ID=\"abc\"");
        assert_eq!(attrs.get("tvg-chno").map(String::as_str), Some("5"));
        assert_eq!(attrs.get("tvg-id").map(String::as_str), Some("abc"));
        assert!(!attrs.contains_key("-1"));
    }

    #[rstest]
    #[case("101 BBC One", None, "BBC One", Some("101"))]
    #[case("2.1 Local News", None, "Local News", Some("2.1"))]
    #[case("24 Hours", Some("9"), "24 Hours", Some("9"))]
    #[case("BBC One", None, "BBC One", None)]
    #[case("123", None, "123", None)]
    #[case("4K Channel", None, "4K Channel", None)]
    fn test_name_and_number(
        #[case] title: &str,
        #[case] chno: Option<&str>,
        #[case] expected_name: &str,
        #[case] expected_number: Option<&str>,
    ) {
        let mut attributes = HashMap::new();
        if let Some(chno) = chno {
            attributes.insert("tvg-chno".to_string(), chno.to_string());
        }
        let entry = PlaylistEntry {
            title: title.to_string(),
            url: "http://host/x".to_string(),
            group: None,
            attributes,
        };

        let (name, number) = entry.name_and_number();
        assert_eq!(name, expected_name);
        assert_eq!(number.as_deref(), expected_number);
    }
}
