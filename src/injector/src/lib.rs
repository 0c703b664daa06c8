/* src/injector/src/lib.rs */

mod scan;

use preview_core::RunnerError;

/// A `<script>` element queued for injection (spec.md §4.3).
pub struct QueuedScript {
  pub content: Option<String>,
  pub attributes: Vec<(String, String)>,
  pub insert_first: bool,
}

/// Parses an HTML document just enough to find (or create) `<head>` and
/// insert configured `<script>` elements into it.
#[derive(Default)]
pub struct ScriptInjector {
  scripts: Vec<QueuedScript>,
}

impl ScriptInjector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_script(
    &mut self,
    content: Option<String>,
    attributes: Vec<(String, String)>,
    insert_first: bool,
  ) {
    self.scripts.push(QueuedScript { content, attributes, insert_first });
  }

  /// Parse `html`, locate `<head>` (creating one as `<html>`'s first child
  /// if absent), and insert all queued scripts. Fails only when neither
  /// `<head>` nor `<html>` can be found.
  pub fn inject_into(&self, html: &[u8]) -> Result<Vec<u8>, RunnerError> {
    let mut doc = String::from_utf8_lossy(html).into_owned();

    let (mut head_open_end, mut head_close_start) = match scan::find_open_tag(&doc, "head", 0) {
      Some((_, open_end)) => {
        let close_start = scan::find_close_tag(&doc, "head", open_end)
          .map(|(start, _)| start)
          .unwrap_or(doc.len());
        (open_end, close_start)
      }
      None => {
        let (_, html_open_end) = scan::find_open_tag(&doc, "html", 0)
          .ok_or_else(|| RunnerError::invalid_argument("no html tag"))?;
        doc.insert_str(html_open_end, "<head></head>");
        // "<head>" is 6 bytes; head content starts right after it.
        (html_open_end + 6, html_open_end + 6)
      }
    };

    for script in &self.scripts {
      let tag = render_script_tag(script);
      let len = tag.len();
      if script.insert_first {
        doc.insert_str(head_open_end, &tag);
        head_close_start += len;
      } else {
        doc.insert_str(head_close_start, &tag);
        head_close_start += len;
      }
    }

    Ok(doc.into_bytes())
  }
}

fn render_script_tag(script: &QueuedScript) -> String {
  let mut out = String::from("<script");
  for (name, value) in &script.attributes {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attr(value));
    out.push('"');
  }
  out.push('>');
  if let Some(content) = &script.content {
    out.push_str(content);
  }
  out.push_str("</script>");
  out
}

fn escape_attr(value: &str) -> String {
  value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn injects_into_existing_head_start() {
    let mut inj = ScriptInjector::new();
    inj.add_script(Some("console.log(1)".into()), vec![], true);
    let out = inj.inject_into(b"<html><head><title>t</title></head></html>").unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("<html><head><script>console.log(1)</script><title>"));
  }

  #[test]
  fn injects_at_head_end() {
    let mut inj = ScriptInjector::new();
    inj.add_script(Some("x".into()), vec![], false);
    let out = inj.inject_into(b"<html><head><title>t</title></head></html>").unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("<title>t</title><script>x</script></head>"));
  }

  #[test]
  fn creates_head_when_absent() {
    let mut inj = ScriptInjector::new();
    inj.add_script(Some("x".into()), vec![], true);
    let out = inj.inject_into(b"<html><body>hi</body></html>").unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("<html><head><script>x</script></head><body>"));
  }

  #[test]
  fn fails_without_html_tag() {
    let inj = ScriptInjector::new();
    let err = inj.inject_into(b"<body>hi</body>").unwrap_err();
    assert_eq!(err.message(), "no html tag");
  }

  #[test]
  fn two_head_start_scripts_are_contiguous_in_reverse_order() {
    let mut inj = ScriptInjector::new();
    inj.add_script(Some("A".into()), vec![], true);
    inj.add_script(Some("B".into()), vec![], true);
    let out = inj.inject_into(b"<html><head></head></html>").unwrap();
    let out = String::from_utf8(out).unwrap();
    // Each "insert first" lands immediately after <head>, so script order
    // is the reverse of insertion order, but contiguous.
    assert!(out.starts_with("<html><head><script>B</script><script>A</script></head>"));
  }

  #[test]
  fn attributes_rendered_and_escaped() {
    let mut inj = ScriptInjector::new();
    inj.add_script(None, vec![("src".to_string(), "/a\"b".to_string())], true);
    let out = inj.inject_into(b"<html><head></head></html>").unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains(r#"<script src="/a&quot;b"></script>"#));
  }

  #[test]
  fn case_insensitive_head_detection() {
    let mut inj = ScriptInjector::new();
    inj.add_script(Some("x".into()), vec![], true);
    let out = inj.inject_into(b"<HTML><HEAD></HEAD></HTML>").unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("<script>x</script>"));
  }

  #[test]
  fn missing_head_close_tag_still_injects() {
    let mut inj = ScriptInjector::new();
    inj.add_script(Some("x".into()), vec![], false);
    // Malformed: no closing </head> at all.
    let out = inj.inject_into(b"<html><head><body>hi</body></html>").unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.ends_with("<script>x</script>"));
  }
}
