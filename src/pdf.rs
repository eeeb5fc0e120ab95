use std::collections::HashMap;

use anyhow::Context;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::models::NewsItem;
use crate::news::{self, Topic};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_X: f32 = 18.0;
const MARGIN_Y: f32 = 16.0;
/// Rough glyph budget per line for Helvetica at body size on A4.
const CHARS_PER_LINE: usize = 95;

/// Writes text top-down and opens a new page whenever the cursor runs out.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    cursor: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> anyhow::Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .context("failed to load Helvetica")?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .context("failed to load Helvetica-Bold")?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            cursor: PAGE_HEIGHT - MARGIN_Y,
            pages: 1,
        })
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor - height >= MARGIN_Y {
            return;
        }
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Layer {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = PAGE_HEIGHT - MARGIN_Y;
    }

    fn line(&mut self, text: &str, size: f32, bold: bool) {
        let height = size * 0.45;
        self.ensure_space(height);
        self.cursor -= height;
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(pdf_text(text), size, Mm(MARGIN_X), Mm(self.cursor), font);
    }

    fn paragraph(&mut self, text: &str, size: f32, bold: bool) {
        let width = ((CHARS_PER_LINE as f32) * 10.0 / size) as usize;
        for line in wrap(text, width) {
            self.line(&line, size, bold);
        }
    }

    fn gap(&mut self, height: f32) {
        self.cursor -= height;
    }

    fn finish(self) -> anyhow::Result<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .context("failed to serialize PDF")
    }
}

/// The builtin fonts only cover Latin-1 style glyphs; spell out umlauts and
/// replace typographic punctuation so nothing renders as garbage.
pub fn pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'Ä' => out.push_str("Ae"),
            'Ö' => out.push_str("Oe"),
            'Ü' => out.push_str("Ue"),
            'ß' => out.push_str("ss"),
            '–' | '—' => out.push('-'),
            '…' => out.push_str("..."),
            '·' => out.push('|'),
            '„' | '“' | '”' => out.push('"'),
            '‚' | '‘' | '’' => out.push('\''),
            c if c.is_ascii() => out.push(c),
            _ => {}
        }
    }
    out
}

pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let extra = if current.is_empty() { 0 } else { 1 };
        if !current.is_empty() && current.chars().count() + extra + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Groups items by topic in presentation order, keeping score order inside
/// each group.
pub fn group_by_topic(items: &[NewsItem]) -> Vec<(Topic, Vec<&NewsItem>)> {
    let mut buckets: HashMap<Topic, Vec<&NewsItem>> = HashMap::new();
    for item in items {
        buckets.entry(news::topic_of(item)).or_default().push(item);
    }
    Topic::ORDERED
        .into_iter()
        .filter_map(|topic| buckets.remove(&topic).map(|group| (topic, group)))
        .collect()
}

/// Topic-grouped media briefing with a running article index.
pub fn build_briefing_pdf(brand: &str, date_str: &str, items: &[NewsItem]) -> anyhow::Result<Vec<u8>> {
    let title = format!("{brand} Media & Review Briefing - Deutschland");
    let mut writer = PageWriter::new(&title)?;

    writer.paragraph(&title, 18.0, true);
    writer.gap(2.0);
    writer.line(date_str, 9.0, false);
    writer.gap(6.0);

    if items.is_empty() {
        writer.line("Keine neuen Erwähnungen in den letzten 24 Stunden.", 10.0, false);
    }

    let mut index = 1;
    for (topic, group) in group_by_topic(items) {
        writer.paragraph(topic.label(), 14.0, true);
        writer.gap(3.0);

        for item in group {
            writer.paragraph(&format!("{index}. {}", item.title), 11.0, true);

            let mut meta = Vec::new();
            if !item.source.is_empty() {
                meta.push(item.source.clone());
            }
            meta.push(item.kind.label().to_string());
            meta.push(format!("Grund: {}", item.why()));
            writer.line(&meta.join(" · "), 9.0, false);

            if !item.summary.is_empty() {
                writer.paragraph(&item.summary, 10.0, false);
            }
            if !item.url.is_empty() {
                writer.line(&news::shorten_url(&item.url, 60), 8.5, false);
            }

            writer.gap(4.0);
            index += 1;
        }
        writer.gap(6.0);
    }

    writer.finish()
}

pub fn briefing_file_name(date: chrono::NaiveDate) -> String {
    format!("DE_monitoring_{}.pdf", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn item(title: &str, summary: &str, score: u8) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            url: "https://www.example.de/artikel".to_string(),
            summary: summary.to_string(),
            source: "www.example.de".to_string(),
            kind: SourceKind::Neutral,
            score,
            published: None,
        }
    }

    #[test]
    fn transliterates_for_builtin_fonts() {
        assert_eq!(pdf_text("Rückruf – Qualität…"), "Rueckruf - Qualitaet...");
        assert_eq!(pdf_text("Straße 😀"), "Strasse ");
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap("eins zwei drei vier", 9);
        assert_eq!(lines, vec!["eins zwei", "drei vier"]);
        assert_eq!(wrap("", 10), Vec::<String>::new());
        assert_eq!(wrap("überlangeswort", 4), vec!["überlangeswort"]);
    }

    #[test]
    fn groups_follow_topic_order_and_keep_item_order() {
        let items = vec![
            item("Kaufland Preise sinken", "", 5),
            item("Kaufland Rückruf", "", 4),
            item("Kaufland Wetter", "", 3),
            item("Kaufland Rabatt", "", 2),
        ];
        let groups = group_by_topic(&items);
        let topics: Vec<Topic> = groups.iter().map(|(topic, _)| *topic).collect();
        assert_eq!(topics, vec![Topic::Recall, Topic::Prices, Topic::Other]);
        let prices: Vec<&str> = groups[1].1.iter().map(|item| item.title.as_str()).collect();
        assert_eq!(prices, vec!["Kaufland Preise sinken", "Kaufland Rabatt"]);
    }

    #[test]
    fn renders_a_pdf_document() {
        let long_summary = "Sehr lange Zusammenfassung ".repeat(40);
        let items: Vec<NewsItem> = (0..40)
            .map(|idx| item(&format!("Kaufland Meldung {idx}"), &long_summary, 3))
            .collect();
        let bytes = build_briefing_pdf("Kaufland", "Montag, 12. Oktober 2026", &items)
            .expect("pdf renders");
        assert!(bytes.starts_with(b"%PDF"));
        assert!(build_briefing_pdf("Kaufland", "heute", &[]).is_ok());
    }

    #[test]
    fn file_name_carries_the_date() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        assert_eq!(briefing_file_name(date), "DE_monitoring_2026-10-12.pdf");
    }
}
