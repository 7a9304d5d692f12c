use crate::ledger::document::TextBlock;
use crate::ledger::record::{BookingFields, BookingRecord};
use crate::ledger::resolve::{Resolution, ResolvedMedia};

const CONTACT_SEPARATOR: &str = "<br/>";
const CONTACT_LABEL_ASCII: &str = ": ";
const CONTACT_LABEL_WIDE: &str = "：";
const SCHEDULED_MARKER: &str = "定时至：:";
const SCHEDULED_LABEL: &str = "定时至 ";
const FIELD_PRACTICE_COLLECTION: &str = "实践纪实";
const DISPLAY_MODE_CHARS: usize = 4;

fn file_link(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Local(path) => {
            let shown = path.display().to_string();
            let url = if shown.starts_with('/') {
                format!("file://{shown}")
            } else {
                format!("file:///{shown}")
            };
            format!("[{shown}](<{url}>)")
        }
        other => other.to_string(),
    }
}

fn quote_lines(text: &str) -> String {
    let lines = text.lines().collect::<Vec<_>>();
    if lines.is_empty() {
        return "  > ".to_string();
    }
    lines
        .iter()
        .map(|line| format!("  > {line}"))
        .collect::<Vec<_>>()
        .join("\n  > \n")
}

fn contact_section(fields: &BookingFields) -> String {
    let mut out = String::from("Contact:");
    for part in fields
        .contact
        .split(CONTACT_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        let part = part.replace(CONTACT_LABEL_ASCII, CONTACT_LABEL_WIDE);
        out.push_str(&format!("\n+ {part}"));
    }
    out
}

fn video_section(fields: &BookingFields, media: &ResolvedMedia) -> String {
    let timing = fields.publish_timing.replace(SCHEDULED_MARKER, SCHEDULED_LABEL);
    [
        "Video basics:".to_string(),
        format!("+ Booking date: {}, **{}**", fields.booking_date, timing),
        format!("+ Video file: **{}**", file_link(&media.video)),
        format!("+ Description:\n{}", quote_lines(&fields.description)),
        format!("+ Short title: **{}**", fields.short_title),
    ]
    .join("\n")
}

fn cover_section(fields: &BookingFields, media: &ResolvedMedia) -> String {
    let display_mode = fields
        .cover_display_mode
        .chars()
        .take(DISPLAY_MODE_CHARS)
        .collect::<String>();
    [
        "Video covers:".to_string(),
        "+ Profile card cover (3:4):".to_string(),
        format!("    + Display mode: **{display_mode}**"),
        format!("    + File: **{}**", file_link(&media.portrait_cover)),
        format!("    + Crop note: **{}**", fields.portrait_cover_crop),
        "+ Landscape share card cover (4:3):".to_string(),
        format!("    + File: **{}**", file_link(&media.landscape_cover)),
        format!("    + Crop note: **{}**", fields.landscape_cover_crop),
    ]
    .join("\n")
}

fn review_note(fields: &BookingFields) -> &'static str {
    if fields.collection.trim() != FIELD_PRACTICE_COLLECTION {
        return "";
    }
    if !fields.unit_approval.trim().is_empty() && !fields.group_approval.trim().is_empty() {
        ", approved by the practice unit and practice group"
    } else {
        ", awaiting practice unit and practice group review"
    }
}

fn publication_section(fields: &BookingFields) -> String {
    [
        "Publication:".to_string(),
        format!(
            "+ Collection: **{}**{}",
            fields.collection,
            review_note(fields)
        ),
        format!("+ Linked article: **{}**", fields.linked_article),
    ]
    .join("\n")
}

/// Render one booking into its ledger entry.
pub fn format_block(
    record: &BookingRecord,
    fields: &BookingFields,
    media: &ResolvedMedia,
) -> TextBlock {
    let body = [
        contact_section(fields),
        video_section(fields, media),
        cover_section(fields, media),
        publication_section(fields),
    ]
    .join("\n\n");
    TextBlock::compose(record.seq, &record.rid, &body)
}
