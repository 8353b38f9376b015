//! Parsers for `svn info --xml` and `svn list --xml` output.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::RepositoryError;
use crate::models::{DirEntry, NodeKind};
use crate::url::join_url;

/// Extract the repository root from `svn info --xml`.
pub fn parse_repository_root(url: &str, xml: &str) -> Result<String, RepositoryError> {
    debug!("parsing svn info XML ({} bytes)", xml.len());
    extract_tag_content(xml, "root")
        .filter(|root| !root.is_empty())
        .ok_or_else(|| RepositoryError::access(url, "missing <root> in svn info output"))
}

/// Parse `svn list --xml` output for the directory at `dir_path`
/// (repository-absolute).
pub fn parse_svn_list(dir_path: &str, xml: &str) -> Vec<DirEntry> {
    debug!("parsing svn list XML ({} bytes)", xml.len());
    let mut entries = Vec::new();
    for part in xml.split("<entry").skip(1) {
        let fragment = match part.find("</entry>") {
            Some(pos) => &part[..pos],
            None => part,
        };
        let header_end = fragment.find('>').unwrap_or(fragment.len());
        let kind = extract_attr_from_str(&fragment[..header_end], "kind")
            .map(|k| NodeKind::from_str_val(&k))
            .unwrap_or(NodeKind::Unknown);

        let name = match extract_tag_content(fragment, "name") {
            Some(name) if !name.is_empty() => name,
            _ => {
                warn!("skipping svn list entry without a name");
                continue;
            }
        };
        let size = extract_tag_content(fragment, "size").and_then(|s| s.parse::<u64>().ok());
        let revision =
            extract_attribute(fragment, "commit", "revision").and_then(|s| s.parse::<i64>().ok());
        let author = extract_tag_content(fragment, "author");
        let date = extract_tag_content(fragment, "date").and_then(|d| parse_date(&d));

        entries.push(DirEntry {
            path: join_url(dir_path, &name),
            name,
            kind,
            size,
            revision,
            author,
            date,
        });
    }
    debug!(count = entries.len(), "parsed svn list entries");
    entries
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

fn extract_tag_content(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut search_from = 0;
    while let Some(rel_pos) = xml[search_from..].find(&open) {
        let start_pos = search_from + rel_pos;
        let after_open = &xml[start_pos + open.len()..];
        // The next char must close the tag or start attributes; otherwise this
        // is a longer tag name sharing the prefix.
        if let Some(ch) = after_open.chars().next() {
            if ch != '>' && !ch.is_ascii_whitespace() {
                search_from = start_pos + open.len();
                continue;
            }
        }
        let content_start = after_open.find('>')? + 1;
        let content = &after_open[content_start..];
        let end_pos = content.find(&close)?;
        return Some(xml_unescape(content[..end_pos].trim()));
    }
    None
}

/// Unescape standard XML entities.
fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn extract_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let start_pos = xml.find(&open)?;
    let after_tag = &xml[start_pos + open.len()..];
    let tag_end = after_tag.find('>')?;
    extract_attr_from_str(&after_tag[..tag_end], attr)
}

fn extract_attr_from_str(s: &str, attr: &str) -> Option<String> {
    let pattern_dq = format!("{}=\"", attr);
    if let Some(pos) = s.find(&pattern_dq) {
        let after = &s[pos + pattern_dq.len()..];
        let end = after.find('"')?;
        return Some(xml_unescape(&after[..end]));
    }
    let pattern_sq = format!("{}='", attr);
    if let Some(pos) = s.find(&pattern_sq) {
        let after = &s[pos + pattern_sq.len()..];
        let end = after.find('\'')?;
        return Some(xml_unescape(&after[..end]));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<lists>
<list path="file:///srv/repo">
<entry kind="dir">
<name>trunk</name>
<commit revision="7">
<author>alice</author>
<date>2025-01-10T12:00:00.000000Z</date>
</commit>
</entry>
<entry kind="file">
<name>R&amp;D notes.txt</name>
<size>1024</size>
<commit revision="9">
<author>bob</author>
<date>2025-02-01T08:30:00.123456Z</date>
</commit>
</entry>
</list>
</lists>"#;

    #[test]
    fn test_parse_repository_root() {
        let xml = r#"<info><entry kind="dir" path="trunk" revision="12">
<url>https://svn.example.com/repo/trunk</url>
<relative-url>^/trunk</relative-url>
<repository><root>https://svn.example.com/repo</root>
<uuid>a1b2c3d4</uuid></repository>
<commit revision="12"></commit></entry></info>"#;
        assert_eq!(
            parse_repository_root("https://svn.example.com/repo/trunk", xml).unwrap(),
            "https://svn.example.com/repo"
        );
    }

    #[test]
    fn test_parse_repository_root_missing() {
        let err = parse_repository_root("svn://h/r", "<info></info>").unwrap_err();
        assert!(matches!(err, RepositoryError::Access { .. }));
    }

    #[test]
    fn test_parse_svn_list() {
        let entries = parse_svn_list("/", LIST_XML);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].name, "trunk");
        assert_eq!(entries[0].path, "/trunk");
        assert_eq!(entries[0].kind, NodeKind::Dir);
        assert_eq!(entries[0].size, None);
        assert_eq!(entries[0].revision, Some(7));
        assert_eq!(entries[0].author.as_deref(), Some("alice"));
        assert!(entries[0].date.is_some());

        assert_eq!(entries[1].name, "R&D notes.txt");
        assert_eq!(entries[1].kind, NodeKind::File);
        assert_eq!(entries[1].size, Some(1024));
        assert_eq!(entries[1].revision, Some(9));
    }

    #[test]
    fn test_parse_svn_list_nested_path() {
        let entries = parse_svn_list("/trunk/src", LIST_XML);
        assert_eq!(entries[0].path, "/trunk/src/trunk");
    }

    #[test]
    fn test_parse_svn_list_empty_dir() {
        let xml = r#"<?xml version="1.0"?><lists><list path="svn://h/r/empty"></list></lists>"#;
        assert!(parse_svn_list("/empty", xml).is_empty());
    }

    #[test]
    fn test_parse_svn_list_skips_nameless_entries() {
        let xml = r#"<lists><list path="x"><entry kind="file"><size>1</size></entry>
<entry kind="file"><name>ok</name></entry></list></lists>"#;
        let entries = parse_svn_list("/", xml);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ok");
        assert_eq!(entries[0].author, None);
    }

    #[test]
    fn test_xml_unescape_amp_last() {
        assert_eq!(xml_unescape("&amp;lt;"), "&lt;");
        assert_eq!(xml_unescape("a &lt; b"), "a < b");
    }

    #[test]
    fn test_extract_tag_content_no_prefix_match() {
        let xml = r#"<rootless>wrong</rootless><root>right</root>"#;
        assert_eq!(extract_tag_content(xml, "root"), Some("right".to_string()));
    }
}
