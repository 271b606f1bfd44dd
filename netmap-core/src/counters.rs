/// Id sequences for one indexing run.
///
/// URL ids start at 1. Domain ids come from a second sequence that starts
/// after the last URL id once [`RunCounters::start_domains`] is called, so
/// both kinds share the `{job}/{id}` key space without collisions.
#[derive(Debug, Default, Clone)]
pub struct RunCounters {
    url: i64,
    domain_base: i64,
    domain: i64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets both sequences for a new run.
    pub fn init(&mut self) {
        *self = Self::default();
    }

    pub fn next_url_id(&mut self) -> i64 {
        self.url += 1;
        self.url
    }

    /// Seeds the domain sequence at the current URL count.
    pub fn start_domains(&mut self) {
        self.domain_base = self.url;
        self.domain = 0;
    }

    pub fn next_domain_id(&mut self) -> i64 {
        self.domain += 1;
        self.domain_base + self.domain
    }

    pub fn url_count(&self) -> i64 {
        self.url
    }

    pub fn domain_count(&self) -> i64 {
        self.domain
    }
}
