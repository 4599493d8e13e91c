//! Threshold-triggered projection of stored flats into public views.
//!
//! Small result sets are projected in place. Once the set reaches the configured
//! threshold it is split into three contiguous slices (`n / 3`, `n / 3`, and the
//! remainder) and each slice is projected on its own scoped thread into a disjoint
//! range of a pre-sized output buffer, so no lock is involved and the output keeps
//! the input order. The scope doubles as the completion barrier.

use std::thread;

use crate::domain::{Flat, FlatView};

pub const PARTITIONS: usize = 3;

pub fn project_flats(flats: &[Flat], threshold: usize) -> Vec<FlatView> {
    if flats.len() < threshold {
        project_sequential(flats)
    } else {
        project_partitioned(flats)
    }
}

pub(crate) fn project_sequential(flats: &[Flat]) -> Vec<FlatView> {
    flats.iter().map(FlatView::from).collect()
}

pub(crate) fn project_partitioned(flats: &[Flat]) -> Vec<FlatView> {
    let mut views = vec![FlatView::default(); flats.len()];
    let slice_len = flats.len() / PARTITIONS;

    let (first_in, rest_in) = flats.split_at(slice_len);
    let (second_in, third_in) = rest_in.split_at(slice_len);
    let (first_out, rest_out) = views.split_at_mut(slice_len);
    let (second_out, third_out) = rest_out.split_at_mut(slice_len);

    thread::scope(|scope| {
        for (input, output) in [
            (first_in, first_out),
            (second_in, second_out),
            (third_in, third_out),
        ] {
            scope.spawn(move || project_into(input, output));
        }
    });

    views
}

fn project_into(input: &[Flat], output: &mut [FlatView]) {
    for (flat, slot) in input.iter().zip(output.iter_mut()) {
        *slot = FlatView::from(flat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlatStatus, UserId};

    fn flats(count: i64) -> Vec<Flat> {
        (1..=count)
            .map(|id| Flat {
                id,
                house_id: 8,
                owner_id: UserId::new_random(),
                price: id * 1_000,
                rooms: (id % 5 + 1) as i32,
                status: FlatStatus::ALL[(id % 4) as usize],
                moderator_id: Some(UserId::new_random()),
            })
            .collect()
    }

    #[test]
    fn parallel_and_sequential_paths_agree() {
        for count in [0, 1, 2, 3, 4, 10, 11, 101] {
            let input = flats(count);
            assert_eq!(
                project_partitioned(&input),
                project_sequential(&input),
                "mismatch for {count} flats"
            );
        }
    }

    #[test]
    fn threshold_selects_strategy_without_changing_output() {
        let input = flats(30);
        let below = project_flats(&input, 31);
        let at = project_flats(&input, 30);

        assert_eq!(below, at);
        assert_eq!(at.len(), 30);
        assert_eq!(at.first().map(|view| view.id), Some(1));
        assert_eq!(at.last().map(|view| view.id), Some(30));
    }

    #[test]
    fn remainder_lands_in_the_last_slice() {
        let input = flats(8);
        let views = project_partitioned(&input);
        let ids: Vec<i64> = views.iter().map(|view| view.id).collect();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    }
}
