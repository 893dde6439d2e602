//! Latest-wins coalescing of pointer samples.
//!
//! Pointer moves can arrive faster than a host wants to evaluate them.
//! Stale proximity readings are harmless to skip, so only the most recent
//! pending position is kept. Not thread-safe; feed it from the single
//! sample stream of one session.

use crate::geometry::Point;

#[derive(Clone, Debug, Default)]
pub struct SampleCoalescer {
    pending: Option<Point>,
    superseded: u64,
}

impl SampleCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a sample, replacing any pending one.
    pub fn push(&mut self, position: Point) {
        if self.pending.replace(position).is_some() {
            self.superseded += 1;
        }
    }

    /// Take the latest pending sample.
    pub fn take(&mut self) -> Option<Point> {
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Samples dropped because a newer one arrived before evaluation.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_wins() {
        let mut c = SampleCoalescer::new();
        c.push(Point::new(1.0, 1.0));
        c.push(Point::new(2.0, 2.0));
        c.push(Point::new(3.0, 3.0));
        assert_eq!(c.take(), Some(Point::new(3.0, 3.0)));
        assert_eq!(c.superseded(), 2);
        assert!(!c.has_pending());
        assert_eq!(c.take(), None);
    }

    #[test]
    fn test_take_then_push_is_not_superseded() {
        let mut c = SampleCoalescer::new();
        c.push(Point::new(1.0, 1.0));
        c.take();
        c.push(Point::new(2.0, 2.0));
        assert_eq!(c.superseded(), 0);
    }
}
