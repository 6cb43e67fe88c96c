/// 32-bit string hash with the wrapping `h = 31 * h + c` recurrence over
/// UTF-16 code units.
///
/// Event ids derived from this hash are collision-prone, but they are kept
/// stable because consumers match translated units by id.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Root id for the events of one package entry: `P` plus the upper-case
/// hex of the entry name hash.
pub fn root_id(entry_name: &str) -> String {
    format!("P{:X}", string_hash(entry_name) as u32)
}

/// Sequential id source of the form `<root>-<prefix><n>`, counting from 1.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    root: String,
    prefix: &'static str,
    last: u64,
}

impl IdGenerator {
    pub fn new(root: impl Into<String>, prefix: &'static str) -> Self {
        Self {
            root: root.into(),
            prefix,
            last: 0,
        }
    }

    /// Produce the next id.
    pub fn create_id(&mut self) -> String {
        self.last += 1;
        let mut buf = itoa::Buffer::new();
        let n = buf.format(self.last);
        let mut id = String::with_capacity(self.root.len() + self.prefix.len() + n.len() + 1);
        id.push_str(&self.root);
        id.push('-');
        id.push_str(self.prefix);
        id.push_str(n);
        id
    }
}

/// Plain sequential id source for sub-document ids: "1", "2", ...
#[derive(Debug, Default, Clone)]
pub struct Counter {
    last: u64,
}

impl Counter {
    /// Produce the next id.
    pub fn next_id(&mut self) -> String {
        self.last += 1;
        itoa::Buffer::new().format(self.last).to_owned()
    }
}
