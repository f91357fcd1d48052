/// Summary statistics of an `f64` dataset.
#[derive(Debug, Clone)]
pub struct DescriptiveStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population variance.
    pub variance: f64,
    pub std_dev: f64,
}

impl DescriptiveStats {
    /// Computes statistics from unsorted values. Returns `None` when the
    /// dataset is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// # use oxello_stats::descriptive::DescriptiveStats;
    /// let stats = DescriptiveStats::new([5.0, 2.0, 4.0, 1.0, 3.0]).unwrap();
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 5.0);
    /// assert_eq!(stats.mean, 3.0);
    /// assert_eq!(stats.median, 3.0);
    /// ```
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(f64::total_cmp);
        Self::from_sorted(&values)
    }

    /// Like [`DescriptiveStats::new`], but skips the sort.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64]) -> Option<Self> {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let min = *sorted_values.first()?;
        let max = *sorted_values.last()?;
        let sum = sorted_values.iter().copied().sum::<f64>();
        let n = sorted_values.len() as f64;
        let mean = sum / n;
        let median = sorted_values[sorted_values.len() / 2];
        let variance = sorted_values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();

        Some(Self {
            min,
            max,
            mean,
            median,
            variance,
            std_dev,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dataset() {
        assert!(DescriptiveStats::new(std::iter::empty()).is_none());
    }

    #[test]
    fn test_single_value() {
        let stats = DescriptiveStats::new([7.0]).unwrap();
        assert_eq!(stats.min, 7.0);
        assert_eq!(stats.max, 7.0);
        assert_eq!(stats.mean, 7.0);
        assert_eq!(stats.variance, 0.0);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_known_dataset() {
        let stats = DescriptiveStats::new([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.variance, 4.0);
        assert_eq!(stats.std_dev, 2.0);
        assert_eq!(stats.median, 5.0);
    }
}
