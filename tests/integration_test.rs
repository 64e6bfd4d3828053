//! Integration tests for the account ledger and the replay pipeline.
//!
//! Covers:
//! - The admission → fill → settle → sell lifecycle with the exact
//!   reference arithmetic
//! - Admission boundary rejections leaving no trace
//! - Cancellation as the exact inverse of admission
//! - Settlement leaving total assets unchanged
//! - Replay over a mock data port
//! - Property-based state invariants under random operation sequences

mod common;

use common::*;
use quantledger::cli::replay_bars;
use quantledger::domain::account::Account;
use quantledger::domain::error::LedgerError;
use quantledger::domain::order::{Direction, OrderStatus};
use quantledger::ports::data_port::MarketDataPort;

mod account_lifecycle {
    use super::*;

    #[test]
    fn buy_fill_settle_sell_cycle() {
        let mut account = Account::new(100_000.0);

        // Day 1: two buys of 100 @ 12.
        let first = account
            .submit_order("000001", 100, 12.0, Direction::Buy, None, None)
            .unwrap();
        assert!((account.available_cash - 98_800.0).abs() < f64::EPSILON);
        assert!(
            (account.get_position("000001").unwrap().frozen_cash - 1200.0).abs() < f64::EPSILON
        );

        account.apply_deal(&first).unwrap();
        {
            let pos = account.get_position("000001").unwrap();
            assert!(pos.frozen_cash.abs() < f64::EPSILON);
            assert_eq!(pos.volume_long_today, 100);
            assert!((pos.position_cost - 1200.0).abs() < f64::EPSILON);
        }

        let second = account
            .submit_order("000001", 100, 12.0, Direction::Buy, None, None)
            .unwrap();
        assert!((account.available_cash - 97_600.0).abs() < f64::EPSILON);
        account.apply_deal(&second).unwrap();
        {
            let pos = account.get_position("000001").unwrap();
            assert_eq!(pos.volume_long_today, 200);
            assert!((pos.position_cost - 2400.0).abs() < f64::EPSILON);
        }

        // Day boundary.
        account.settle();
        {
            let pos = account.get_position("000001").unwrap();
            assert_eq!(pos.volume_long_history, 200);
            assert_eq!(pos.volume_long_today, 0);
        }

        // Day 2: sell 100 @ 14.
        let sale = account
            .submit_order("000001", 100, 14.0, Direction::Sell, None, None)
            .unwrap();
        {
            let pos = account.get_position("000001").unwrap();
            assert_eq!(pos.volume_long_history, 100);
            assert_eq!(pos.volume_short_frozen, 100);
        }

        account.apply_deal(&sale).unwrap();
        let pos = account.get_position("000001").unwrap();
        assert_eq!(pos.volume_short_frozen, 0);
        assert_eq!(pos.volume_long_history, 0);
        assert_eq!(pos.volume_short_today, 100);
        assert!((account.available_cash - 99_000.0).abs() < f64::EPSILON);
        assert!((pos.position_cost - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buy_round_trip_restores_frozen_cash() {
        let mut account = Account::new(100_000.0);
        let order = account
            .submit_order("000001", 100, 12.0, Direction::Buy, None, None)
            .unwrap();
        account.apply_deal(&order).unwrap();

        let pos = account.get_position("000001").unwrap();
        assert!(pos.frozen_cash.abs() < f64::EPSILON);
        assert!((pos.position_cost - order.amount).abs() < f64::EPSILON);
    }

    #[test]
    fn rejected_orders_leave_no_trace() {
        let mut account = Account::new(1000.0);

        let err = account
            .submit_order("000001", 100, 12.0, Direction::Buy, None, None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        let err = account
            .submit_order("000001", 100, 12.0, Direction::Sell, None, None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientPosition { .. }));

        assert!(account.orders.is_empty());
        assert!((account.available_cash - 1000.0).abs() < f64::EPSILON);
        let pos = account.get_position("000001").unwrap();
        assert!(pos.frozen_cash.abs() < f64::EPSILON);
        assert_eq!(pos.volume_short_frozen, 0);
    }

    #[test]
    fn cancel_is_inverse_of_admission() {
        let mut account = Account::new(100_000.0);

        let buy = account
            .submit_order("000001", 100, 12.0, Direction::Buy, None, None)
            .unwrap();
        account.cancel_order(&buy.id).unwrap();
        assert!((account.available_cash - 100_000.0).abs() < f64::EPSILON);
        assert!(
            account
                .get_position("000001")
                .unwrap()
                .frozen_cash
                .abs()
                < f64::EPSILON
        );

        // Build a settled holding, then cancel a sell against it.
        let buy = account
            .submit_order("000001", 100, 12.0, Direction::Buy, None, None)
            .unwrap();
        account.apply_deal(&buy).unwrap();
        account.settle();

        let sale = account
            .submit_order("000001", 100, 14.0, Direction::Sell, None, None)
            .unwrap();
        account.cancel_order(&sale.id).unwrap();

        let pos = account.get_position("000001").unwrap();
        assert_eq!(pos.volume_long_history, 100);
        assert_eq!(pos.volume_short_frozen, 0);
        assert_eq!(account.orders[&sale.id].status, OrderStatus::Cancelled);
    }

    #[test]
    fn settle_never_changes_total_assets() {
        let mut account = Account::new(100_000.0);
        let buy = account
            .submit_order("000001", 100, 12.0, Direction::Buy, None, None)
            .unwrap();
        account.apply_deal(&buy).unwrap();
        account
            .submit_order("000002", 50, 20.0, Direction::Buy, None, None)
            .unwrap();
        account.on_price_change("000001", 13.0);

        let before = account.total_assets();
        account.settle();
        assert!((account.total_assets() - before).abs() < 1e-9);
        account.settle();
        assert!((account.total_assets() - before).abs() < 1e-9);
    }

    #[test]
    fn profit_ratio_tracks_mark_to_market() {
        let mut account = Account::new(100_000.0);
        let buy = account
            .submit_order("000001", 100, 12.0, Direction::Buy, None, None)
            .unwrap();
        account.apply_deal(&buy).unwrap();
        account.on_price_change("000001", 13.0);

        // 98800 cash + 1300 market value = 100100 → +0.10%
        assert!((account.total_assets() - 100_100.0).abs() < 1e-9);
        assert!((account.profit_ratio() - 0.1).abs() < f64::EPSILON);
        assert!((account.float_profit() - 100.0).abs() < 1e-9);
    }
}

mod replay_pipeline {
    use super::*;

    fn rising_bars() -> Vec<Bar> {
        vec![
            make_bar("000001", "2020-06-01", 10.0),
            make_bar("000001", "2020-06-02", 11.0),
            make_bar("000001", "2020-06-03", 12.0),
        ]
    }

    #[test]
    fn replay_buys_and_marks_to_market() {
        let port = MockDataPort::new().with_bars("000001", rising_bars());
        let bars = port
            .query_bars(
                &["000001".to_string()],
                dt("2020-06-01"),
                dt("2020-06-03"),
                Frequency::Daily,
                "mock",
            )
            .unwrap();
        assert_eq!(bars.len(), 3);

        let account = replay_bars(100_000.0, "000001", &bars).unwrap();

        // 100000 / 10 = 10000 shares, in whole lots.
        let pos = account.get_position("000001").unwrap();
        assert_eq!(pos.volume_long_history, 10_000);
        assert_eq!(pos.volume_long_today, 0);
        assert!((pos.last_price - 12.0).abs() < f64::EPSILON);
        assert!((account.available_cash - 0.0).abs() < f64::EPSILON);
        assert!((account.float_profit() - 20_000.0).abs() < 1e-9);
        assert!((account.profit_ratio() - 20.0).abs() < f64::EPSILON);
        assert_eq!(account.orders.len(), 1);
    }

    #[test]
    fn replay_without_bars_is_no_data() {
        let err = replay_bars(100_000.0, "000001", &[]).unwrap_err();
        assert!(matches!(err, LedgerError::NoData { .. }));
    }

    #[test]
    fn replay_skips_buy_when_cash_cannot_cover_a_lot() {
        let bars = rising_bars();
        let account = replay_bars(500.0, "000001", &bars).unwrap();
        assert!(account.orders.is_empty());
        assert!((account.available_cash - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mock_port_surfaces_errors_and_ranges() {
        let port = MockDataPort::new()
            .with_bars("000001", rising_bars())
            .with_error("000002", "connection refused");

        let err = port
            .query_bars(
                &["000002".to_string()],
                dt("2020-06-01"),
                dt("2020-06-03"),
                Frequency::Daily,
                "mock",
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Database { .. }));

        let range = port
            .data_range("000001", Frequency::Daily, "mock")
            .unwrap()
            .unwrap();
        assert_eq!(range.2, 3);

        let last = port
            .query_last_bars(
                2,
                &["000001".to_string()],
                dt("2020-06-03"),
                Frequency::Daily,
                "mock",
            )
            .unwrap();
        assert_eq!(last.len(), 2);
        assert!((last[1].close - 12.0).abs() < f64::EPSILON);
    }
}

mod state_invariants {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Buy { volume: i64, price: f64 },
        Sell { volume: i64, price: f64 },
        Fill,
        Cancel,
        Settle,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..500, 1.0f64..50.0).prop_map(|(volume, price)| Op::Buy { volume, price }),
            (1i64..500, 1.0f64..50.0).prop_map(|(volume, price)| Op::Sell { volume, price }),
            Just(Op::Fill),
            Just(Op::Cancel),
            Just(Op::Settle),
        ]
    }

    fn first_open_order(account: &Account) -> Option<quantledger::domain::order::Order> {
        let mut open: Vec<_> = account
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Accepted)
            .cloned()
            .collect();
        open.sort_by(|a, b| a.id.cmp(&b.id));
        open.into_iter().next()
    }

    fn assert_invariants(account: &Account) {
        assert!(
            account.available_cash >= -1e-6,
            "available cash went negative: {}",
            account.available_cash
        );
        for pos in account.positions.values() {
            assert!(
                pos.frozen_cash >= -1e-6,
                "frozen cash went negative for {}: {}",
                pos.code,
                pos.frozen_cash
            );
            assert!(
                pos.volume_short_frozen >= 0,
                "short frozen went negative for {}: {}",
                pos.code,
                pos.volume_short_frozen
            );
        }
    }

    proptest! {
        #[test]
        fn reachable_states_keep_reservations_non_negative(
            ops in proptest::collection::vec(op_strategy(), 1..60)
        ) {
            let mut account = Account::new(100_000.0);

            for op in ops {
                match op {
                    Op::Buy { volume, price } => {
                        let _ = account.submit_order(
                            "000001", volume, price, Direction::Buy, None, None,
                        );
                    }
                    Op::Sell { volume, price } => {
                        let _ = account.submit_order(
                            "000001", volume, price, Direction::Sell, None, None,
                        );
                    }
                    Op::Fill => {
                        if let Some(order) = first_open_order(&account) {
                            account.apply_deal(&order).unwrap();
                        }
                    }
                    Op::Cancel => {
                        if let Some(order) = first_open_order(&account) {
                            account.cancel_order(&order.id).unwrap();
                        }
                    }
                    Op::Settle => {
                        let before = account.total_assets();
                        account.settle();
                        prop_assert!((account.total_assets() - before).abs() < 1e-6);
                    }
                }
                assert_invariants(&account);
            }
        }
    }
}
