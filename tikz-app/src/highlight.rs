//! TikZ syntax colouring for the code pane

use egui::{text::LayoutJob, Color32, FontId, TextFormat};
use regex::Regex;
use std::sync::OnceLock;

pub const BACKGROUND: Color32 = Color32::from_rgb(0x28, 0x2C, 0x34);
const PLAIN: Color32 = Color32::from_rgb(0xAB, 0xB2, 0xBF);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Comment,
    Command,
    Options,
    Number,
    Brace,
}

impl Token {
    fn color(self) -> Color32 {
        match self {
            Token::Comment => Color32::from_rgb(0x98, 0xC3, 0x79),
            Token::Command => Color32::from_rgb(0xC6, 0x78, 0xDD),
            Token::Options => Color32::from_rgb(0xE5, 0xC0, 0x7B),
            Token::Number => Color32::from_rgb(0x61, 0xAF, 0xEF),
            Token::Brace => Color32::from_rgb(0x56, 0xB6, 0xC2),
        }
    }
}

/// Rules in priority order; an earlier rule claims its bytes first.
fn rules() -> &'static [(Token, Regex)] {
    static RULES: OnceLock<Vec<(Token, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (Token::Comment, r"%[^\n]*"),
            (Token::Command, r"\\[a-zA-Z]+"),
            (Token::Options, r"\[[^\]]*\]"),
            (Token::Number, r"\b\d+\.?\d*\b"),
            (Token::Brace, r"[{}]"),
        ]
        .into_iter()
        .filter_map(|(token, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((token, re)),
            Err(e) => {
                tracing::error!("Bad highlight pattern {}: {}", pattern, e);
                None
            }
        })
        .collect()
    })
}

/// Split `code` into runs, each either plain (`None`) or a token.
///
/// Runs are contiguous and cover the whole input.
pub fn tokenize(code: &str) -> Vec<(Option<Token>, &str)> {
    let mut claimed: Vec<Option<Token>> = vec![None; code.len()];

    for (token, re) in rules() {
        for m in re.find_iter(code) {
            let span = &mut claimed[m.start()..m.end()];
            if span.iter().all(Option::is_none) {
                span.fill(Some(*token));
            }
        }
    }

    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=code.len() {
        if i == code.len() || claimed[i] != claimed[start] {
            runs.push((claimed[start], &code[start..i]));
            start = i;
        }
    }
    runs
}

pub fn layout_job(code: &str, font: FontId, wrap_width: f32) -> LayoutJob {
    let mut job = LayoutJob::default();
    for (token, text) in tokenize(code) {
        let color = token.map_or(PLAIN, Token::color);
        job.append(text, 0.0, TextFormat::simple(font.clone(), color));
    }
    job.wrap.max_width = wrap_width;
    job
}

/// Layouter for `egui::TextEdit::layouter`
pub fn layouter(ui: &egui::Ui, code: &str, wrap_width: f32) -> std::sync::Arc<egui::Galley> {
    let font = egui::TextStyle::Monospace.resolve(ui.style());
    let job = layout_job(code, font, wrap_width);
    ui.fonts(|f| f.layout_job(job))
}
