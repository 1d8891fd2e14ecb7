/// Character scanner with pushback. The grammar is context-sensitive
/// (a dot may start a decimal, a comment, an operator or a key
/// variable), so the tokenizer drives this by hand.
pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    pub fn new(src: &str) -> Scanner {
        Scanner {
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    pub fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// The char after the next one.
    pub fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    /// Undo the last `next`.
    pub fn back(&mut self) {
        debug_assert!(self.pos > 0, "pushback past the start");
        self.pos = self.pos.saturating_sub(1);
    }

    /// Consume chars while `pred` holds, returning them.
    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if pred(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        out
    }
}
