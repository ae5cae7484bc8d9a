//! Shell-style brace expansion: `*{.a,.b}{.yml,}` → four patterns.

/// Expand every brace group in `pattern`. Nested groups and empty
/// alternatives are supported. Unbalanced braces are kept literally.
pub fn expand(pattern: &str) -> Vec<String> {
  let Some((open, close)) = first_group(pattern) else {
    return vec![pattern.to_string()];
  };

  let prefix = &pattern[..open];
  let suffix = &pattern[close + 1..];
  let mut expanded: Vec<String> = Vec::new();
  for alternative in split_alternatives(&pattern[open + 1..close]) {
    for item in expand(&format!("{}{}{}", prefix, alternative, suffix)) {
      if !expanded.contains(&item) {
        expanded.push(item);
      }
    }
  }
  expanded
}

/// Byte offsets of the first balanced `{ ... }` group.
fn first_group(pattern: &str) -> Option<(usize, usize)> {
  let bytes = pattern.as_bytes();
  let mut start = 0;
  while let Some(offset) = pattern[start..].find('{') {
    let open = start + offset;
    let mut depth = 0usize;
    for (i, byte) in bytes.iter().enumerate().skip(open) {
      match byte {
        b'{' => depth += 1,
        b'}' => {
          depth -= 1;
          if depth == 0 {
            return Some((open, i));
          }
        }
        _ => {}
      }
    }
    start = open + 1;
  }
  None
}

/// Split on commas that are not inside a nested group.
fn split_alternatives(inner: &str) -> Vec<&str> {
  let mut parts = Vec::new();
  let mut depth = 0usize;
  let mut start = 0;
  for (i, c) in inner.char_indices() {
    match c {
      '{' => depth += 1,
      '}' => depth = depth.saturating_sub(1),
      ',' if depth == 0 => {
        parts.push(&inner[start..i]);
        start = i + 1;
      }
      _ => {}
    }
  }
  parts.push(&inner[start..]);
  parts
}
