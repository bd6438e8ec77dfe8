use std::{str::FromStr, sync::Arc};

use anyhow::{bail, Result};
use itertools::Itertools;
use rofication::{Notifications, RenderRule};

pub const DEFAULT_FORMAT: &str = "{total}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Total,
    Apps,
    App(String),
}

/// An output format like `"mail: {app:mail} / {total}"`, parsed once and rendered on every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRule {
    template: String,
    segments: Vec<Segment>,
}

impl FormatRule {
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut last_end = 0;
        for captures in crate::regex!(r"\{([^{}]*)\}").captures_iter(template) {
            let placeholder = captures.get_match();
            let (_, [name]) = captures.extract();
            if placeholder.start() > last_end {
                segments.push(Segment::Text(template[last_end..placeholder.start()].to_string()));
            }
            segments.push(match name {
                "total" => Segment::Total,
                "apps" => Segment::Apps,
                _ => match name.strip_prefix("app:") {
                    Some(app) if !app.is_empty() => Segment::App(app.to_string()),
                    _ => bail!(
                        "Unknown placeholder '{{{}}}' in format '{}'. Possible placeholders are {{total}} {{apps}} {{app:NAME}}",
                        name,
                        template
                    ),
                },
            });
            last_end = placeholder.end();
        }
        if last_end < template.len() {
            segments.push(Segment::Text(template[last_end..].to_string()));
        }
        Ok(FormatRule { template: template.to_string(), segments })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the notifications, or nothing if there are none.
    pub fn render(&self, notifications: &Notifications) -> Option<String> {
        let total = notifications.total();
        if total == 0 {
            return None;
        }
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Total => output.push_str(&total.to_string()),
                Segment::Apps => {
                    output.push_str(&notifications.apps().iter().map(|(app, count)| format!("{}:{}", app, count)).join(" "))
                }
                Segment::App(app) => output.push_str(&notifications.count(app).to_string()),
            }
        }
        Some(output)
    }

    pub fn into_rule(self) -> RenderRule<String> {
        Arc::new(move |notifications: &Notifications| self.render(notifications))
    }
}

impl FromStr for FormatRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        FormatRule::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn notifications(counts: &[(&str, usize)]) -> Notifications {
        counts.iter().map(|(app, count)| (app.to_string(), *count)).collect::<HashMap<_, _>>().into()
    }

    #[test]
    fn test_default_format() {
        let rule = FormatRule::parse(DEFAULT_FORMAT).unwrap().into_rule();
        assert_eq!(Some("3".to_string()), rule(&notifications(&[("mail", 2), ("chat", 1)])));
        assert_eq!(None, rule(&notifications(&[])));
    }

    #[test]
    fn test_render_placeholders() {
        let rule: FormatRule = "mail {app:mail}, irc {app:irc} | {apps} ({total})".parse().unwrap();
        assert_eq!(
            Some("mail 2, irc 0 | chat:1 mail:2 (3)".to_string()),
            rule.render(&notifications(&[("mail", 2), ("chat", 1)]))
        );
    }

    #[test]
    fn test_text_without_placeholders_is_kept() {
        let rule = FormatRule::parse("new: {total").unwrap();
        assert_eq!("new: {total", rule.template());
        assert_eq!(Some("new: {total".to_string()), rule.render(&notifications(&[("mail", 1)])));
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let err = FormatRule::parse("{count}").unwrap_err();
        assert!(err.to_string().contains("{count}"), "{}", err);
        assert!(FormatRule::parse("{app:}").is_err());
    }
}
