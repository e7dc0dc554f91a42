//! Docstring parsing
//!
//! Recognizes one convention only:
//!
//! ```text
//! Short description of the function.
//! :param name: What the parameter does,
//!     possibly over several lines.
//! :return: What comes back
//! ```
//!
//! Everything before the first directive is the description. A parameter's
//! text runs from its `:param name:` marker to the next directive or the end.

use regex::Regex;

/// A parsed docstring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Docstring {
    description: String,
    params: Vec<(String, String)>,
}

impl Docstring {
    pub fn parse(raw: &str) -> Self {
        let text = dedent(raw);
        let directive =
            Regex::new(r"(?m)^[ \t]*:(param|type|returns?|rtype|raises?)\b([^:\n]*):").unwrap();

        let markers: Vec<_> = directive.captures_iter(&text).collect();

        let description = match markers.first() {
            Some(first) => text[..first.get(0).map_or(0, |m| m.start())].trim().to_string(),
            None => text.trim().to_string(),
        };

        let mut params = Vec::new();
        for (i, caps) in markers.iter().enumerate() {
            if &caps[1] != "param" {
                continue;
            }
            // `:param int count:` names the parameter last
            let Some(name) = caps[2].split_whitespace().last() else {
                continue;
            };
            let start = caps.get(0).map_or(0, |m| m.end());
            let end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |m| m.start());

            let body = text[start..end]
                .lines()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join("\n");
            params.push((name.to_string(), body.trim().to_string()));
        }

        Self {
            description,
            params,
        }
    }

    /// Everything before the first directive
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Text up to the first period, or the whole description
    pub fn first_sentence(&self) -> &str {
        match self.description.find('.') {
            Some(idx) => &self.description[..idx],
            None => &self.description,
        }
    }

    /// The documented text for a parameter, if it has a `:param` entry
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, desc)| desc.as_str())
    }
}

/// Strip indentation the way documentation tools do: the first line is
/// trimmed, the rest lose their common leading whitespace.
fn dedent(raw: &str) -> String {
    let mut lines = raw.lines();
    let first = lines.next().unwrap_or("").trim();
    let rest: Vec<&str> = lines.collect();

    // Only spaces and tabs count as indentation, so byte offsets stay on
    // char boundaries
    let leading = |l: &str| l.len() - l.trim_start_matches([' ', '\t']).len();
    let indent = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading(l))
        .min()
        .unwrap_or(0);

    let mut out = vec![first.to_string()];
    for line in rest {
        if line.trim().is_empty() {
            out.push(String::new());
        } else {
            out.push(line[indent.min(leading(line))..].trim_end().to_string());
        }
    }
    out.join("\n").trim().to_string()
}
