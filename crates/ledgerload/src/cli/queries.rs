//! `ledgerload run-queries`: print the account reports.

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_amount, print_table};
use ledgerload::queries::{self, OverdrawnAccount, OverpaidLoan, QueryReport};
use ledgerload::config;

/// Arguments for the run-queries command
#[derive(Debug)]
pub struct QueryArgs<'a> {
    pub database_url: Option<&'a str>,
    pub json: bool,
}

pub fn run(args: QueryArgs<'_>) -> anyhow::Result<()> {
    let conn = config::connect(args.database_url).map_err(HelpfulError::from)?;
    let report = queries::run_all(&conn).map_err(HelpfulError::from)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn member_name(first: &Option<String>, last: &Option<String>) -> String {
    [first.as_deref(), last.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

fn overdrawn_rows(accounts: &[OverdrawnAccount]) -> Vec<Vec<String>> {
    accounts
        .iter()
        .map(|a| {
            vec![
                member_name(&a.first_name, &a.last_name),
                a.member_guid.clone(),
                a.account_guid.clone(),
                format_amount(a.balance),
            ]
        })
        .collect()
}

fn overpaid_rows(loans: &[OverpaidLoan]) -> Vec<Vec<String>> {
    loans
        .iter()
        .map(|l| {
            vec![
                member_name(&l.first_name, &l.last_name),
                l.member_guid.clone(),
                l.account_guid.clone(),
                format_amount(l.overpaid_amount),
            ]
        })
        .collect()
}

fn print_report(report: &QueryReport) {
    println!("Overdrawn Checking Accounts:");
    if report.overdrawn_checking_accounts.is_empty() {
        println!("None found.");
    } else {
        print_table(
            &["Member", "Member GUID", "Account", "Balance"],
            overdrawn_rows(&report.overdrawn_checking_accounts),
        );
    }

    println!();
    println!("Overpaid Loans:");
    if report.overpaid_loans.is_empty() {
        println!("None found.");
    } else {
        print_table(
            &["Member", "Member GUID", "Account", "Overpaid Amount"],
            overpaid_rows(&report.overpaid_loans),
        );
    }

    println!();
    println!("Total Assets:");
    println!("{}", format_amount(report.total_assets));
}
