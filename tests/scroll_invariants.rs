use pmemstat::ui::scroll::{NavKey, ScrollState};
use proptest::prelude::*;

fn nav_key() -> impl Strategy<Value = NavKey> {
    prop_oneof![
        Just(NavKey::Up),
        Just(NavKey::Down),
        Just(NavKey::PageUp),
        Just(NavKey::PageDown),
        Just(NavKey::HalfPageUp),
        Just(NavKey::HalfPageDown),
        Just(NavKey::First),
        Just(NavKey::Last),
        Just(NavKey::PageTop),
        Just(NavKey::PageMiddle),
        Just(NavKey::PageBottom),
    ]
}

proptest! {
    #[test]
    fn scroll_stays_in_range(
        rows in 2usize..60,
        head in 0usize..20,
        body in 0usize..300,
        keys in proptest::collection::vec(nav_key(), 0..40),
    ) {
        let mut state = ScrollState::new(rows, 80);
        state.set_counts(head, body);
        for key in keys {
            state.apply_nav(key);
            prop_assert!(state.scroll <= state.max_scroll);
            prop_assert_eq!(state.head_view + 1 + state.view, rows);
        }
    }

    #[test]
    fn picked_block_stays_visible(
        rows in 10usize..60,
        body in 1usize..300,
        size in 1usize..4,
        keys in proptest::collection::vec(nav_key(), 1..40),
    ) {
        let mut state = ScrollState::new(rows, 80);
        state.set_counts(3, body);
        state.set_pick_mode(true, size);
        for key in keys {
            state.apply_nav(key);
            prop_assert!(state.pick < body);
            prop_assert_eq!(state.pick % size, 0);
            prop_assert!(state.scroll <= state.pick);
            prop_assert!(state.pick < state.scroll + state.view);
        }
    }

    #[test]
    fn indicator_fits_the_rule(
        rows in 2usize..60,
        cols in 1usize..200,
        body in 0usize..500,
        scroll in 0usize..500,
    ) {
        let mut state = ScrollState::new(rows, cols);
        state.set_counts(2, body);
        state.scroll = scroll;
        state.clamp();
        if let Some((start, width)) = state.indicator() {
            prop_assert!(width >= 1);
            prop_assert!(start + width <= cols);
        }
    }
}
