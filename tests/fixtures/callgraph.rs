//! Small ledger with a call chain and a trait impl.

pub trait Summary {
    fn summary(&self) -> String;
}

pub struct Ledger {
    entries: Vec<i64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn record(&mut self, amount: i64) {
        self.entries.push(amount);
        self.rebalance();
    }

    fn rebalance(&mut self) {
        self.entries.retain(|e| *e != 0);
    }
}

impl Summary for Ledger {
    fn summary(&self) -> String {
        format!("{} entries, total {}", self.entries.len(), checksum(&self.entries))
    }
}

pub fn checksum(values: &[i64]) -> i64 {
    values.iter().sum()
}

pub fn unrelated_banner() -> &'static str {
    "banner"
}
