use std::iter::Sum;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Sums `term` over the local indices in `members`.
pub(crate) fn member_sum<T, F>(members: &[usize], term: F) -> T
where
    T: Sum<T> + Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(not(feature = "parallel"))]
    let iterator = members.iter();

    #[cfg(feature = "parallel")]
    let iterator = members.par_iter();

    iterator.map(|&i| term(i)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_sum_visits_only_members() {
        let values = [1.0, 10.0, 100.0, 1000.0];
        let total: f64 = member_sum(&[0, 2, 3], |i| values[i]);
        assert_eq!(total, 1101.0);
    }

    #[test]
    fn member_sum_of_no_members_is_zero() {
        let total: f64 = member_sum(&[], |_| 1.0);
        assert_eq!(total, 0.0);
    }
}
