//! Printers: text, markdown (termimad) and verdicts.

use owo_colors::OwoColorize;
use termimad::MadSkin;

use crate::verdict::Verdict;

pub struct TextPrinter {
    pub color: Option<&'static str>,
}

impl TextPrinter {
    pub fn print(&self, text: &str) {
        if let Some(c) = self.color {
            match c {
                "green" => println!("{}", text.green()),
                "red" => println!("{}", text.red()),
                "cyan" => println!("{}", text.cyan()),
                "magenta" => println!("{}", text.magenta()),
                "yellow" => println!("{}", text.yellow()),
                _ => println!("{}", text),
            }
        } else {
            println!("{}", text);
        }
    }
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self { skin: MadSkin::default() }
    }
}

impl MarkdownPrinter {
    pub fn print(&self, text: &str) { self.skin.print_text(text); println!(); }
}

/// Tutor text, rendered as Markdown or printed plain.
pub fn print_reply(text: &str, markdown: bool) {
    if markdown {
        MarkdownPrinter::default().print(text);
    } else {
        TextPrinter { color: None }.print(text);
    }
}

/// Verdict message in green or red.
pub fn print_verdict(verdict: &Verdict) {
    let color = if verdict.passed { "green" } else { "red" };
    TextPrinter { color: Some(color) }.print(&verdict.message);
}
