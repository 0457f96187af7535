//! Transaction counter

use parking_lot::Mutex;

/// Next transaction number to hand out. Never decreases.
#[derive(Debug, Default)]
pub struct TransactionCounter {
    next: Mutex<u64>,
}

impl TransactionCounter {
    /// Counter seeded from the highest number already known
    pub fn after(max_transaction: Option<u64>) -> Self {
        Self {
            next: Mutex::new(max_transaction.map_or(0, |m| m + 1)),
        }
    }

    /// Value the next assignment will use
    pub fn peek(&self) -> u64 {
        *self.next.lock()
    }

    /// Raise the counter to at least `floor`
    pub fn raise_to(&self, floor: u64) -> u64 {
        let mut next = self.next.lock();
        if floor > *next {
            *next = floor;
        }
        *next
    }

    /// Take the next number and run `commit` with it under the counter lock,
    /// so numbers reach the ledger in the order they were assigned.
    ///
    /// `commit` returns `None` when the number is already taken; the counter
    /// then moves on to the following number until a commit lands.
    pub fn assign<R>(&self, mut commit: impl FnMut(u64) -> Option<R>) -> R {
        let mut next = self.next.lock();
        loop {
            let number = *next;
            *next += 1;
            if let Some(committed) = commit(number) {
                return committed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_from_max() {
        assert_eq!(TransactionCounter::after(None).peek(), 0);
        assert_eq!(TransactionCounter::after(Some(41)).peek(), 42);
    }

    #[test]
    fn test_raise_never_decreases() {
        let counter = TransactionCounter::after(Some(9));
        assert_eq!(counter.raise_to(4), 10);
        assert_eq!(counter.raise_to(15), 15);
    }

    #[test]
    fn test_assign_is_strictly_increasing() {
        let counter = TransactionCounter::default();
        let numbers: Vec<u64> = (0..5).map(|_| counter.assign(Some)).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
        assert_eq!(counter.peek(), 5);
    }

    #[test]
    fn test_assign_skips_taken_numbers() {
        let counter = TransactionCounter::after(Some(2));
        let taken = [3, 4];
        let mut tried = Vec::new();
        let number = counter.assign(|n| {
            tried.push(n);
            (!taken.contains(&n)).then_some(n)
        });
        assert_eq!(number, 5);
        assert_eq!(tried, vec![3, 4, 5]);
        assert_eq!(counter.peek(), 6);
    }
}
