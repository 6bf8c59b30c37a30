mod common;

use common::{opportunity, Fill, MockExchange};
use crossarb_core::{ArbStatus, Side};
use crossarb_execution::{Lifecycle, LifecycleOutcome, LifecycleReport, LifecycleSettings};
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

async fn run_to_end(mock: &MockExchange, quantity: rust_decimal::Decimal) -> LifecycleReport {
    let (_cancel, cancel_rx) = oneshot::channel();
    Lifecycle::new(
        opportunity(quantity),
        mock.shared_pool(2),
        LifecycleSettings::default(),
        cancel_rx,
    )
    .run()
    .await
}

// ==================== Happy Path Tests ====================

#[tokio::test(start_paused = true)]
async fn test_full_lifecycle_realizes_profit() {
    let mock = MockExchange::new()
        .with_buy_fill(Fill::Gradual(2))
        .with_sell_fill(Fill::Immediate);

    let report = run_to_end(&mock, dec!(8)).await;

    assert_eq!(
        report.outcome,
        LifecycleOutcome::Completed {
            realized_profit: dec!(8)
        }
    );
    assert_eq!(report.opportunity.status, ArbStatus::Done);
    assert!(report.opportunity.buy_started_at.is_some());

    let placed = mock.placed();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[0].1.side, Side::Buy);
    assert_eq!(placed[0].1.quantity, dec!(8));
    assert_eq!(placed[0].1.limit_price, dec!(100));
    assert_eq!(placed[1].1.side, Side::Sell);
    assert_eq!(placed[1].1.quantity, dec!(8));
    assert_eq!(placed[1].1.limit_price, dec!(101));
    assert!(mock.canceled().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_orders_done_at_placement_skip_polling() {
    let mock = MockExchange::new()
        .with_buy_fill(Fill::OnPlacement)
        .with_sell_fill(Fill::OnPlacement);

    let report = run_to_end(&mock, dec!(2)).await;

    assert!(report.outcome.is_completed());
    assert_eq!(report.opportunity.status, ArbStatus::Done);
}

// ==================== Placement Retry Tests ====================

#[tokio::test(start_paused = true)]
async fn test_placement_retries_within_budget() {
    let mock = MockExchange::new();
    mock.fail_buys(4);

    let report = run_to_end(&mock, dec!(8)).await;

    assert!(report.outcome.is_completed());
    // four failed buys, the accepted buy, the sell
    assert_eq!(mock.place_attempts(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_error_budget_exhaustion_aborts() {
    let mock = MockExchange::new();
    mock.fail_buys(5);

    let report = run_to_end(&mock, dec!(8)).await;

    assert!(matches!(report.outcome, LifecycleOutcome::Aborted { .. }));
    assert_eq!(report.opportunity.status, ArbStatus::Init);
    assert_eq!(mock.place_attempts(), 5);
    assert!(mock.placed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sell_placement_failure_keeps_buy_complete() {
    let mock = MockExchange::new();
    mock.fail_sells(5);

    let report = run_to_end(&mock, dec!(8)).await;

    assert!(matches!(report.outcome, LifecycleOutcome::Aborted { .. }));
    assert_eq!(report.opportunity.status, ArbStatus::BuyComplete);
    assert_eq!(mock.placed().len(), 1);
}

// ==================== Buy Timeout Tests ====================

#[tokio::test(start_paused = true)]
async fn test_unfilled_buy_is_canceled_at_timeout() {
    let mock = MockExchange::new().with_buy_fill(Fill::Never);
    let started = Instant::now();

    let report = run_to_end(&mock, dec!(8)).await;

    assert!(started.elapsed() >= Duration::from_secs(8));
    assert_eq!(report.outcome, LifecycleOutcome::Canceled);
    assert_eq!(report.opportunity.status, ArbStatus::Canceled);

    let placed = mock.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(mock.canceled(), vec![placed[0].0.clone()]);
}

#[tokio::test(start_paused = true)]
async fn test_partial_buy_at_timeout_sells_filled_quantity() {
    let mock = MockExchange::new().with_buy_fill(Fill::Partial(dec!(3)));

    let report = run_to_end(&mock, dec!(8)).await;

    // bought 3 @ 100, sold 3 @ 101
    assert_eq!(
        report.outcome,
        LifecycleOutcome::Completed {
            realized_profit: dec!(3)
        }
    );
    assert_eq!(report.opportunity.status, ArbStatus::Done);

    let placed = mock.placed();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[1].1.side, Side::Sell);
    assert_eq!(placed[1].1.quantity, dec!(3));
    assert_eq!(mock.canceled(), vec![placed[0].0.clone()]);
}

// ==================== Cancel Signal Tests ====================

#[tokio::test(start_paused = true)]
async fn test_cancel_signal_cancels_resting_buy() {
    let mock = MockExchange::new().with_buy_fill(Fill::Never);
    let (cancel, cancel_rx) = oneshot::channel();
    let lifecycle = Lifecycle::new(
        opportunity(dec!(8)),
        mock.shared_pool(2),
        LifecycleSettings::default(),
        cancel_rx,
    );
    let task = tokio::spawn(lifecycle.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.send(()).unwrap();
    let report = task.await.unwrap();

    assert_eq!(report.outcome, LifecycleOutcome::Canceled);
    assert_eq!(report.opportunity.status, ArbStatus::Canceled);
    let placed = mock.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(mock.canceled(), vec![placed[0].0.clone()]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_signal_cancels_resting_sell() {
    let mock = MockExchange::new().with_sell_fill(Fill::Never);
    let (cancel, cancel_rx) = oneshot::channel();
    let lifecycle = Lifecycle::new(
        opportunity(dec!(8)),
        mock.shared_pool(2),
        LifecycleSettings::default(),
        cancel_rx,
    );
    let task = tokio::spawn(lifecycle.run());

    // the buy fills on its first poll, the sell then rests
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(mock.placed().len(), 2);
    cancel.send(()).unwrap();
    let report = task.await.unwrap();

    assert_eq!(report.outcome, LifecycleOutcome::Canceled);
    assert_eq!(report.opportunity.status, ArbStatus::Canceled);
    assert_eq!(mock.canceled(), vec![mock.placed()[1].0.clone()]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_placement_places_nothing() {
    let mock = MockExchange::new();
    let (cancel, cancel_rx) = oneshot::channel();
    cancel.send(()).unwrap();

    let report = Lifecycle::new(
        opportunity(dec!(8)),
        mock.shared_pool(1),
        LifecycleSettings::default(),
        cancel_rx,
    )
    .run()
    .await;

    assert!(matches!(report.outcome, LifecycleOutcome::Aborted { .. }));
    assert_eq!(report.opportunity.status, ArbStatus::Init);
    assert_eq!(mock.place_attempts(), 0);
}
