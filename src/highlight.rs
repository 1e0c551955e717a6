use serde::{Deserialize, Serialize};

pub const DEFAULT_KEYWORDS: [&str; 3] = ["逐步分析", "治疗建议", "结论"];
pub const HIGHLIGHT_COLOR: &str = "red";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Span {
  Plain(String),
  Keyword(String),
}

/// Splits `text` into plain and keyword spans. Every occurrence of every
/// keyword is marked; at the same offset the longer keyword wins.
pub fn highlight<S: AsRef<str>>(text: &str, keywords: &[S]) -> Vec<Span> {
  let mut spans = Vec::new();
  let mut rest = text;

  loop {
    let next = keywords
      .iter()
      .map(AsRef::as_ref)
      .filter(|k| !k.is_empty())
      .filter_map(|k| rest.find(k).map(|at| (at, k)))
      .min_by(|a, b| a.0.cmp(&b.0).then(b.1.len().cmp(&a.1.len())));

    let Some((at, keyword)) = next else {
      break;
    };
    if at > 0 {
      spans.push(Span::Plain(rest[..at].to_string()));
    }
    spans.push(Span::Keyword(keyword.to_string()));
    rest = &rest[at + keyword.len()..];
  }

  if !rest.is_empty() {
    spans.push(Span::Plain(rest.to_string()));
  }
  spans
}

pub fn to_html(spans: &[Span]) -> String {
  let mut out = String::new();
  for span in spans {
    match span {
      Span::Plain(text) => out.push_str(&escape(text)),
      Span::Keyword(text) => {
        out.push_str(&format!(
          "<span style=\"color:{HIGHLIGHT_COLOR}\">{}</span>",
          escape(text)
        ));
      }
    }
  }
  out
}

fn escape(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for ch in text.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      '\n' => out.push_str("<br>"),
      _ => out.push(ch),
    }
  }
  out
}
