// src/pool/selector.rs

/// Round-robin cursor over a candidate list that is rebuilt on every call.
///
/// The cursor is an index into whatever list it is handed, so when the
/// membership of that list changes between calls the rotation shifts with
/// it. Fairness is exact only while the candidate set stays the same.
#[derive(Debug, Default)]
pub(crate) struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub(crate) fn select<T: Copy>(&mut self, candidates: &[T]) -> Option<T> {
        if candidates.is_empty() {
            return None;
        }
        let picked = candidates[self.cursor % candidates.len()];
        self.cursor = (self.cursor + 1) % candidates.len();
        Some(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_in_order() {
        let mut rr = RoundRobin::default();
        let picks: Vec<_> = (0..6).filter_map(|_| rr.select(&[10, 20, 30])).collect();
        assert_eq!(picks, vec![10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn test_shrinking_candidates_wrap() {
        let mut rr = RoundRobin::default();
        assert_eq!(rr.select(&[1, 2, 3]), Some(1));
        assert_eq!(rr.select(&[1, 2, 3]), Some(2));
        // cursor is 2, list shrank to one entry
        assert_eq!(rr.select(&[3]), Some(3));
        assert_eq!(rr.select(&[1, 3]), Some(1));
    }

    #[test]
    fn test_empty_candidates() {
        let mut rr = RoundRobin::default();
        assert_eq!(rr.select::<usize>(&[]), None);
    }
}
