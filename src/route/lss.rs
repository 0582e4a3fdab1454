//! LiveSplit segment file conversion

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::{AutosplitterError, Result};

/// Extract flattened split names from the `Segment/Name` elements.
///
/// `-name` segments are subsplits held until a `{Title}name` segment closes
/// the group; each member is then emitted as `"Title name"`.
pub(super) fn segment_names(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut raw = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => path.push(e.name().as_ref().to_vec()),
            Event::End(_) => {
                path.pop();
            }
            Event::Text(t) if in_segment_name(&path) => {
                raw.push(t.unescape()?.into_owned());
            }
            Event::CData(t) if in_segment_name(&path) => {
                raw.push(String::from_utf8_lossy(&t.into_inner()).into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(AutosplitterError::SegmentFile(
            "unexpected end of document".to_string(),
        ));
    }

    Ok(flatten(raw))
}

fn in_segment_name(path: &[Vec<u8>]) -> bool {
    let n = path.len();
    n >= 2 && path[n - 1] == b"Name" && path[n - 2] == b"Segment"
}

fn flatten(raw: Vec<String>) -> Vec<String> {
    let mut splits = Vec::new();
    let mut pending = Vec::new();

    for name in raw {
        if let Some(sub) = name.strip_prefix('-') {
            pending.push(sub.to_string());
        } else if let Some(rest) = name.strip_prefix('{') {
            match rest.split_once('}') {
                Some((title, last)) => {
                    pending.push(last.to_string());
                    for sub in pending.drain(..) {
                        splits.push(format!("{} {}", title, sub));
                    }
                }
                None => splits.push(name),
            }
        } else {
            splits.push(name);
        }
    }

    splits
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPLITS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Run version="1.7.0">
  <GameName>New Super Mario Bros. Wii</GameName>
  <CategoryName>Any%</CategoryName>
  <Segments>
    <Segment><Name>-1-1</Name><Icon /></Segment>
    <Segment><Name>-1-2</Name></Segment>
    <Segment><Name>{World 1}Castle</Name></Segment>
    <Segment><Name>2-1 &amp; cannon</Name></Segment>
  </Segments>
</Run>"#;

    #[test]
    fn test_subsplit_groups_are_flattened() {
        let names = segment_names(SPLITS).unwrap();
        assert_eq!(
            names,
            vec!["World 1 1-1", "World 1 1-2", "World 1 Castle", "2-1 & cannon"]
        );
    }

    #[test]
    fn test_other_name_elements_ignored() {
        let names = segment_names("<Run><Name>x</Name><Segments/></Run>").unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_truncated_document_is_error() {
        assert!(segment_names("<Run><Segments><Segment><Name>a</Name>").is_err());
    }
}
