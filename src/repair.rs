//! Gap repair for numeric measurement columns.
//!
//! Missing values are filled by linear interpolation between the nearest
//! known neighbours (by row position), then trailing gaps are filled
//! forward and leading gaps backward. A column with no known value at all
//! is left untouched.

use crate::models::{MeasurementColumn, MeasurementRecord};

/// Counts of values filled by each repair step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOutcome {
    pub interpolated: usize,
    pub forward_filled: usize,
    pub backward_filled: usize,
    /// The column had no known value, so nothing could be filled
    pub all_missing: bool,
}

impl RepairOutcome {
    pub fn total_filled(&self) -> usize {
        self.interpolated + self.forward_filled + self.backward_filled
    }
}

/// Fill gaps in `values` in place
pub fn repair_gaps(values: &mut [Option<f64>]) -> RepairOutcome {
    let mut outcome = RepairOutcome::default();

    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        outcome.all_missing = !values.is_empty();
        return outcome;
    };

    for pair in known.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        if right - left < 2 {
            continue;
        }

        let (Some(a), Some(b)) = (values[left], values[right]) else {
            continue;
        };
        let span = (right - left) as f64;

        for (i, slot) in values.iter_mut().enumerate().take(right).skip(left + 1) {
            let fraction = (i - left) as f64 / span;
            *slot = Some(a + (b - a) * fraction);
            outcome.interpolated += 1;
        }
    }

    let last_value = values[last];
    for slot in values.iter_mut().skip(last + 1) {
        *slot = last_value;
        outcome.forward_filled += 1;
    }

    let first_value = values[first];
    for slot in values.iter_mut().take(first) {
        *slot = first_value;
        outcome.backward_filled += 1;
    }

    outcome
}

/// Repair one column of a record set in place
pub fn repair_column(records: &mut [MeasurementRecord], column: MeasurementColumn) -> RepairOutcome {
    let mut values: Vec<Option<f64>> = records.iter().map(|r| r.get(column)).collect();
    let outcome = repair_gaps(&mut values);

    if outcome.total_filled() > 0 {
        for (record, value) in records.iter_mut().zip(values) {
            record.set(column, value);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolates_single_gap() {
        let mut values = vec![Some(4.0), None, Some(6.0)];
        let outcome = repair_gaps(&mut values);

        assert_eq!(values, vec![Some(4.0), Some(5.0), Some(6.0)]);
        assert_eq!(outcome.interpolated, 1);
        assert_eq!(outcome.total_filled(), 1);
    }

    #[test]
    fn test_interpolates_wide_gap_linearly() {
        let mut values = vec![Some(0.0), None, None, None, Some(8.0)];
        repair_gaps(&mut values);

        assert_eq!(
            values,
            vec![Some(0.0), Some(2.0), Some(4.0), Some(6.0), Some(8.0)]
        );
    }

    #[test]
    fn test_edges_are_filled_forward_then_backward() {
        let mut values = vec![None, None, Some(3.0), None, Some(5.0), None];
        let outcome = repair_gaps(&mut values);

        assert_eq!(
            values,
            vec![Some(3.0), Some(3.0), Some(3.0), Some(4.0), Some(5.0), Some(5.0)]
        );
        assert_eq!(outcome.interpolated, 1);
        assert_eq!(outcome.forward_filled, 1);
        assert_eq!(outcome.backward_filled, 2);
        assert!(!outcome.all_missing);
    }

    #[test]
    fn test_all_missing_column_passes_through() {
        let mut values = vec![None, None, None];
        let outcome = repair_gaps(&mut values);

        assert_eq!(values, vec![None, None, None]);
        assert!(outcome.all_missing);
        assert_eq!(outcome.total_filled(), 0);
    }

    #[test]
    fn test_empty_and_complete_columns_untouched() {
        let mut empty: Vec<Option<f64>> = Vec::new();
        assert_eq!(repair_gaps(&mut empty), RepairOutcome::default());

        let mut full = vec![Some(1.0), Some(2.0)];
        assert_eq!(repair_gaps(&mut full).total_filled(), 0);
        assert_eq!(full, vec![Some(1.0), Some(2.0)]);
    }
}
