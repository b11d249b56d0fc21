//! Placeholder templates for destinations and rename patterns.
//!
//! | placeholder  | expands to                                         |
//! |--------------|----------------------------------------------------|
//! | `{name}`     | file name without extension                        |
//! | `{ext}`      | extension without the dot                          |
//! | `{filename}` | full file name                                     |
//! | `{parent}`   | name of the containing folder                      |
//! | `{year}` `{month}` `{day}` | modification date components         |
//! | `{date}`     | modification date in the action's date format      |
//! | `{counter}`  | counter value, zero-padded to the configured width |

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};

use autosort_core::FileDescriptor;

/// Placeholders understood by [`render`].
pub const PLACEHOLDERS: &[&str] = &[
    "name", "ext", "filename", "parent", "year", "month", "day", "date", "counter",
];

/// Default format for the `{date}` placeholder.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

fn segments(template: &str) -> Result<Vec<Segment<'_>>, String> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        if open > 0 {
            out.push(Segment::Literal(&rest[..open]));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| format!("unclosed '{{' in '{template}'"))?;
        out.push(Segment::Placeholder(&after[..close]));
        rest = &after[close + 1..];
    }
    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }

    Ok(out)
}

/// Check that every placeholder in `template` is known.
pub fn validate(template: &str) -> Result<(), String> {
    for segment in segments(template)? {
        if let Segment::Placeholder(name) = segment
            && !PLACEHOLDERS.contains(&name)
        {
            return Err(format!("unknown placeholder '{{{name}}}'"));
        }
    }
    Ok(())
}

/// Check if `template` uses the `{counter}` placeholder.
pub fn uses_counter(template: &str) -> bool {
    template.contains("{counter}")
}

/// Values the placeholders expand to.
pub struct TemplateContext<'a> {
    pub file: &'a FileDescriptor,
    pub date_format: &'a str,
    pub counter: u32,
    pub counter_width: usize,
}

/// Expand the placeholders of `template` for a file.
///
/// Unknown placeholders and malformed braces are kept literally; rule
/// validation rejects them before a rule is activated.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    let Ok(segments) = segments(template) else {
        return template.to_string();
    };
    let modified: DateTime<Local> = ctx.file.timestamps.modified.into();

    let mut out = String::with_capacity(template.len() + 16);
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder("name") => out.push_str(ctx.file.stem()),
            Segment::Placeholder("ext") => {
                out.push_str(ctx.file.extension.as_deref().unwrap_or(""))
            }
            Segment::Placeholder("filename") => out.push_str(&ctx.file.name),
            Segment::Placeholder("parent") => out.push_str(ctx.file.parent_name()),
            Segment::Placeholder("year") => out.push_str(&modified.format("%Y").to_string()),
            Segment::Placeholder("month") => out.push_str(&modified.format("%m").to_string()),
            Segment::Placeholder("day") => out.push_str(&modified.format("%d").to_string()),
            Segment::Placeholder("date") => out.push_str(&format_date(&modified, ctx.date_format)),
            Segment::Placeholder("counter") => out.push_str(&format!(
                "{:0width$}",
                ctx.counter,
                width = ctx.counter_width
            )),
            Segment::Placeholder(other) => {
                out.push('{');
                out.push_str(other);
                out.push('}');
            }
        }
    }

    out
}

/// Check that `format` is a usable strftime format.
pub fn validate_date_format(format: &str) -> Result<(), String> {
    if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(format!("'{format}' is not a valid date format"));
    }
    Ok(())
}

// chrono panics when a malformed format is displayed, so fall back to the default.
fn format_date(date: &DateTime<Local>, format: &str) -> String {
    let format = if validate_date_format(format).is_ok() {
        format
    } else {
        DEFAULT_DATE_FORMAT
    };
    date.format(format).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosort_core::Timestamps;
    use chrono::TimeZone;

    fn ctx_file() -> FileDescriptor {
        let modified = Local.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        FileDescriptor::new("/home/user/Downloads/report.pdf")
            .with_timestamps(Timestamps::with_modified(modified.into()))
    }

    fn ctx(file: &FileDescriptor) -> TemplateContext<'_> {
        TemplateContext {
            file,
            date_format: DEFAULT_DATE_FORMAT,
            counter: 7,
            counter_width: 3,
        }
    }

    #[test]
    fn test_render_placeholders() {
        let file = ctx_file();
        let ctx = ctx(&file);
        assert_eq!(render("{name}.{ext}", &ctx), "report.pdf");
        assert_eq!(render("{date}_{filename}", &ctx), "2024-03-15_report.pdf");
        assert_eq!(render("/archive/{year}/{month}", &ctx), "/archive/2024/03");
        assert_eq!(render("{parent}-{counter}", &ctx), "Downloads-007");
        assert_eq!(render("summary.txt", &ctx), "summary.txt");
    }

    #[test]
    fn test_render_keeps_unknown_placeholder() {
        let file = ctx_file();
        assert_eq!(render("{nope}.txt", &ctx(&file)), "{nope}.txt");
    }

    #[test]
    fn test_validate() {
        assert!(validate("{date}_{name}.{ext}").is_ok());
        assert!(validate("{nope}").is_err());
        assert!(validate("{name").is_err());
        assert!(uses_counter("scan-{counter}.pdf"));
        assert!(!uses_counter("scan.pdf"));
        assert!(validate_date_format("%d.%m.%Y").is_ok());
        assert!(validate_date_format("%Q").is_err());
    }

    #[test]
    fn test_render_bad_date_format_falls_back() {
        let file = ctx_file();
        let ctx = TemplateContext {
            date_format: "%Q",
            ..ctx(&file)
        };
        assert_eq!(render("{date}", &ctx), "2024-03-15");
    }
}
