/// Ordered log of fired post-notification names.
///
/// This is the primary oracle for flush behavior: one entry per durable
/// write of a listener-bearing entity type, in dispatch order, e.g.
/// `postPersist Human`.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<String>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: &str, type_tag: &str) {
        self.entries.push(format!("{name} {type_tag}"));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
