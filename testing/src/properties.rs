//! Property-based testing strategies for domain types.

use cinema_booking_core::{BookingStatus, Currency, Money, SeatNumber};
use proptest::collection::btree_set;
use proptest::prelude::*;

/// A seat number such as `"C7"` or `"K14"`.
pub fn seat_number() -> impl Strategy<Value = SeatNumber> {
    ("[A-H]", 1u8..=16).prop_map(|(row, n)| SeatNumber::new(format!("{row}{n}")))
}

/// Between `min` and `max` distinct seat numbers, sorted.
pub fn distinct_seats(min: usize, max: usize) -> impl Strategy<Value = Vec<SeatNumber>> {
    btree_set(seat_number(), min..=max).prop_map(|set| set.into_iter().collect())
}

/// One of the fixture currencies.
pub fn currency() -> impl Strategy<Value = Currency> {
    prop_oneof![Just(Currency::IDR), Just(Currency::USD), Just(Currency::EUR)]
}

/// A price that cannot overflow when a handful are summed.
pub fn price(currency: Currency) -> impl Strategy<Value = Money> {
    (0u64..10_000_000).prop_map(move |minor| Money::new(minor, currency))
}

/// Any booking status.
pub fn booking_status() -> impl Strategy<Value = BookingStatus> {
    proptest::sample::select(BookingStatus::ALL.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn distinct_seats_are_unique(seats in distinct_seats(1, 8)) {
            let mut deduped = seats.clone();
            deduped.dedup();
            prop_assert_eq!(deduped, seats);
        }

        #[test]
        fn terminal_statuses_have_no_edges(status in booking_status(), to in booking_status()) {
            if status.is_terminal() {
                prop_assert!(!status.can_transition_to(to));
            }
        }
    }
}
