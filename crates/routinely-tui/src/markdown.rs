//! Markdown to styled terminal lines for assistant replies.

use pulldown_cmark::{Event as MarkdownEvent, HeadingLevel, Options, Parser, Tag};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut renderer = MarkdownRenderer::default();

    for event in Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH) {
        renderer.handle(event);
    }

    renderer.finish()
}

#[derive(Default)]
struct MarkdownRenderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    // One entry per open list; `Some(n)` is the next ordered number
    lists: Vec<Option<u64>>,
    in_code_block: bool,
}

impl MarkdownRenderer {
    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, patch: Style) {
        let style = self.style().patch(patch);
        self.styles.push(style);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    fn blank(&mut self) {
        // Lists stay tight, and never two blanks in a row
        if self.lists.is_empty() && self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn handle(&mut self, event: MarkdownEvent<'_>) {
        match event {
            MarkdownEvent::Start(tag) => self.start(tag),
            MarkdownEvent::End(tag) => self.end(tag),
            MarkdownEvent::Text(text) => {
                if self.in_code_block {
                    let style = Style::default().fg(Color::Yellow);
                    for line in text.lines() {
                        self.lines.push(Line::from(Span::styled(format!("  {}", line), style)));
                    }
                } else {
                    self.current.push(Span::styled(text.into_string(), self.style()));
                }
            }
            MarkdownEvent::Code(code) => {
                self.current.push(Span::styled(
                    code.into_string(),
                    Style::default().fg(Color::Yellow),
                ));
            }
            MarkdownEvent::Html(html) => {
                self.current.push(Span::styled(html.trim_end().to_string(), self.style()));
            }
            MarkdownEvent::SoftBreak => self.current.push(Span::raw(" ")),
            MarkdownEvent::HardBreak => self.flush(),
            MarkdownEvent::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            MarkdownEvent::TaskListMarker(done) => {
                self.current.push(Span::raw(if done { "[x] " } else { "[ ] " }));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading(level, _, _) => {
                self.flush();
                let style = match level {
                    HeadingLevel::H1 => Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    _ => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                };
                self.push_style(style);
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link(..) => self.push_style(Style::default().add_modifier(Modifier::UNDERLINED)),
            Tag::BlockQuote => {
                self.flush();
                self.push_style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.in_code_block = true;
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let bullet = format!("{}. ", n);
                        *n += 1;
                        bullet
                    }
                    _ => "• ".to_string(),
                };
                self.current.push(Span::raw(format!("{}{}", "  ".repeat(depth), bullet)));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.flush();
                self.blank();
            }
            Tag::Heading(..) | Tag::BlockQuote => {
                self.flush();
                self.styles.pop();
                self.blank();
            }
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link(..) => {
                self.styles.pop();
            }
            Tag::CodeBlock(_) => {
                self.in_code_block = false;
                self.blank();
            }
            Tag::Item => self.flush(),
            Tag::List(_) => {
                self.flush();
                self.lists.pop();
                self.blank();
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_numbered_routine() {
        let lines = render_markdown("## Morning\n\n1. Cleanse\n2. **Moisturize**\n\nDone.");
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text, ["Morning", "", "1. Cleanse", "2. Moisturize", "", "Done."]);

        let bold = &lines[3].spans[1];
        assert_eq!(bold.content, "Moisturize");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_emphasis_is_italic() {
        let lines = render_markdown("*Error. Please try again.*");
        assert_eq!(lines.len(), 1);
        let span = &lines[0].spans[0];
        assert_eq!(span.content, "Error. Please try again.");
        assert!(span.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_nested_bullets_are_indented() {
        let lines = render_markdown("- Face\n  - Serum\n- Lips");
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text, ["• Face", "  • Serum", "• Lips"]);
    }

    #[test]
    fn test_code_block_lines() {
        let lines = render_markdown("```\napply twice\nrinse\n```");
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text, ["  apply twice", "  rinse"]);
    }
}
