use ewallet::domain::{Cents, LedgerError, TransactionType, Wallet, sum_for_currency};
use proptest::prelude::*;

const CURRENCIES: [&str; 3] = ["USD", "EUR", "GBP"];

#[derive(Debug, Clone)]
enum Op {
    TopUp(Cents, usize),
    Withdraw(Cents, usize),
    TransferOut(Cents, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    (0u8..3, 1i64..=100_000, 0usize..CURRENCIES.len()).prop_map(|(kind, amount, ccy)| match kind {
        0 => Op::TopUp(amount, ccy),
        1 => Op::Withdraw(amount, ccy),
        _ => Op::TransferOut(amount, ccy),
    })
}

fn assert_consistent(wallet: &Wallet) {
    for (currency, balance) in wallet.balances() {
        assert!(balance >= 0, "{} balance went negative", currency);
        assert_eq!(balance, sum_for_currency(wallet.transactions(), currency));
    }
}

proptest! {
    #[test]
    fn balances_track_signed_sum_of_transactions(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let mut wallet = Wallet::new("prop").unwrap();
        let mut other = Wallet::new("other").unwrap();

        for op in ops {
            let before_count = wallet.get_total_transactions();
            let before_other = other.get_total_transactions();

            match op {
                Op::TopUp(amount, ccy) => {
                    let before = wallet.balance(CURRENCIES[ccy]);
                    wallet.top_up(amount, CURRENCIES[ccy]).unwrap();
                    prop_assert_eq!(wallet.balance(CURRENCIES[ccy]), before + amount);
                }
                Op::Withdraw(amount, ccy) => {
                    let before = wallet.balance(CURRENCIES[ccy]);
                    match wallet.withdraw(amount, CURRENCIES[ccy]) {
                        Ok(tx) => {
                            prop_assert!(amount <= before);
                            prop_assert_eq!(tx.amount, -amount);
                        }
                        Err(LedgerError::InsufficientFunds { .. }) => {
                            prop_assert!(amount > before);
                            prop_assert_eq!(wallet.balance(CURRENCIES[ccy]), before);
                            prop_assert_eq!(wallet.get_total_transactions(), before_count);
                        }
                        Err(err) => prop_assert!(false, "unexpected error: {}", err),
                    }
                }
                Op::TransferOut(amount, ccy) => {
                    let before = wallet.balance(CURRENCIES[ccy]);
                    let before_target = other.balance(CURRENCIES[ccy]);
                    match wallet.transfer(amount, CURRENCIES[ccy], &mut other) {
                        Ok(outcome) => {
                            prop_assert_eq!(outcome.outgoing.amount, -amount);
                            prop_assert_eq!(outcome.incoming.amount, amount);
                            prop_assert_eq!(wallet.balance(CURRENCIES[ccy]), before - amount);
                            prop_assert_eq!(other.balance(CURRENCIES[ccy]), before_target + amount);
                            prop_assert_eq!(wallet.get_total_transactions(), before_count + 1);
                            prop_assert_eq!(other.get_total_transactions(), before_other + 1);
                        }
                        Err(_) => {
                            prop_assert_eq!(wallet.balance(CURRENCIES[ccy]), before);
                            prop_assert_eq!(other.balance(CURRENCIES[ccy]), before_target);
                            prop_assert_eq!(wallet.get_total_transactions(), before_count);
                            prop_assert_eq!(other.get_total_transactions(), before_other);
                        }
                    }
                }
            }

            assert_consistent(&wallet);
            assert_consistent(&other);
        }
    }

    #[test]
    fn repeated_cycles_reproduce_exact_balance(amount in 1i64..=1_000_000, cycles in 1usize..100) {
        let mut wallet = Wallet::new("cycles").unwrap();
        wallet.top_up(1, "USD").unwrap();

        for _ in 0..cycles {
            wallet.top_up(amount, "USD").unwrap();
            wallet.withdraw(amount, "USD").unwrap();
        }

        prop_assert_eq!(wallet.balance("USD"), 1);
        prop_assert_eq!(wallet.list_balance(), vec!["USD 0.01".to_string()]);
    }
}

#[test]
fn test_list_balance_formatting() {
    let mut wallet = Wallet::new("test_wallet").unwrap();
    wallet.top_up(10000, "USD").unwrap();
    wallet.top_up(30000, "EUR").unwrap();
    wallet.top_up(5000, "GBP").unwrap();
    wallet.withdraw(5000, "GBP").unwrap();

    assert_eq!(
        wallet.list_balance(),
        vec!["USD 100.00", "EUR 300.00", "GBP 0.00"]
    );
}

#[test]
fn test_fractional_amounts_do_not_drift() {
    let mut wallet = Wallet::new("cents").unwrap();
    // 0.10 added ten times must be exactly 1.00
    for _ in 0..10 {
        wallet.top_up(10, "EUR").unwrap();
    }
    wallet.withdraw(30, "EUR").unwrap();

    assert_eq!(wallet.balance("EUR"), 70);
    assert_eq!(wallet.list_balance(), vec!["EUR 0.70"]);
}

#[test]
fn test_filter_preserves_insertion_order() {
    let mut wallet = Wallet::new("w").unwrap();
    let mut funder = Wallet::new("funder").unwrap();
    funder.top_up(1_000_000, "USD").unwrap();

    let first = wallet.top_up(100, "USD").unwrap();
    wallet.withdraw(50, "USD").unwrap();
    funder.transfer(500, "USD", &mut wallet).unwrap();
    let second = wallet.top_up(200, "USD").unwrap();
    wallet.transfer(100, "USD", &mut funder).unwrap();
    let third = wallet.top_up(300, "USD").unwrap();

    let top_ups: Vec<_> = wallet
        .filter_transactions(TransactionType::TopUp)
        .into_iter()
        .map(|tx| tx.id)
        .collect();
    assert_eq!(top_ups, vec![first.id, second.id, third.id]);
    assert_eq!(wallet.filter_transactions(TransactionType::Transfer).len(), 2);
}
