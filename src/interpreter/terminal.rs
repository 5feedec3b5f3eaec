//! Plain terminal rendering of a conversation.
//!
//! A terminal cannot replace text it already printed, so instead of the
//! composed HTML this view prints what each buffer gained since the last
//! render. Thinking text is dimmed.

use std::io::Write;

use super::session::ChatView;
use super::state::RenderState;

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

pub struct TerminalView<W: Write> {
    out: W,
    shown_thinking: usize,
    shown_answer: usize,
    in_thinking: bool,
    color: bool,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            shown_thinking: 0,
            shown_answer: 0,
            in_thinking: false,
            color: true,
        }
    }

    pub fn without_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn enter_thinking(&mut self) {
        if !self.in_thinking {
            self.in_thinking = true;
            if self.color {
                let _ = write!(self.out, "{}", DIM);
            }
        }
    }

    fn leave_thinking(&mut self) {
        if self.in_thinking {
            self.in_thinking = false;
            if self.color {
                let _ = write!(self.out, "{}", RESET);
            }
        }
    }
}

impl<W: Write> ChatView for TerminalView<W> {
    fn show_user(&mut self, _text: &str) {
        // the user's line is already on screen from the prompt
    }

    fn set_busy(&mut self, busy: bool) {
        if !busy {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
        }
    }

    fn show_pending(&mut self) {
        let _ = write!(self.out, "🤖 ");
        let _ = self.out.flush();
    }

    fn begin_reply(&mut self) {
        self.shown_thinking = 0;
        self.shown_answer = 0;
        self.in_thinking = false;
    }

    fn render_reply(&mut self, state: &RenderState, _html: &str) {
        let thinking = state.thinking();
        if thinking.len() > self.shown_thinking {
            self.enter_thinking();
            let _ = write!(self.out, "{}", &thinking[self.shown_thinking..]);
            self.shown_thinking = thinking.len();
        }

        let answer = state.answer();
        if answer.len() > self.shown_answer {
            let fresh = &answer[self.shown_answer..];
            let fresh = if self.shown_answer == 0 { fresh.trim_start() } else { fresh };
            if self.in_thinking {
                self.leave_thinking();
                let _ = write!(self.out, "\n\n");
            }
            let _ = write!(self.out, "{}", fresh);
            self.shown_answer = answer.len();
        }

        let _ = self.out.flush();
    }

    fn end_reply(&mut self) {
        self.leave_thinking();
    }

    fn show_error(&mut self, message: &str) {
        self.leave_thinking();
        let _ = write!(self.out, "\n⚠️  {}", message);
    }
}
