#[path = "../src/cashflow.rs"]
mod cashflow;
#[path = "../src/pricing.rs"]
mod pricing;
#[path = "../src/quote.rs"]
mod quote;

use cashflow::{
    expense_events, final_payment_date, payment_schedule, project_daily, project_monthly,
    CashFlowSettings, ExpenseTimingConfig, FlowKind, SubcontractorPayment, TimingRule,
};
use chrono::NaiveDate;
use pricing::Trade;
use quote::{CategoryTiming, PaymentTerm, Quote, QuoteItem, QuoteStatus};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
}

fn base_quote() -> Quote {
    serde_json::from_value(serde_json::json!({
        "id": "q-cash",
        "projectName": "Bathroom",
        "clientName": "Levi",
        "status": "approved",
        "createdAt": "2026-05-01",
        "totalPrice": 1000.0
    }))
    .expect("quote")
}

fn term(milestone: &str, percentage: f64) -> PaymentTerm {
    PaymentTerm {
        milestone: milestone.into(),
        percentage,
        payment_date: None,
    }
}

fn timing(start: &str, end: &str) -> CategoryTiming {
    CategoryTiming {
        start_date: d(start),
        end_date: d(end),
    }
}

fn item(category_id: &str, labor: f64, material: f64) -> QuoteItem {
    QuoteItem {
        category_id: category_id.into(),
        labor_cost: labor,
        material_cost: material,
        total_cost: labor + material,
        ..Default::default()
    }
}

#[test]
fn split_terms_land_on_approval_and_final_payment() {
    let mut q = base_quote();
    q.payment_terms = vec![term("", 50.0), term("", 50.0)];
    q.category_timings
        .insert("cat_paint_plaster".into(), timing("2026-05-01", "2026-05-04"));
    assert_eq!(final_payment_date(&q), Some(d("2026-05-11")));

    let events = payment_schedule(&q, &[]);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].date, d("2026-05-01"));
    assert_eq!(events[1].date, d("2026-05-11"));
    assert_eq!(events[0].label, "Project start");
    assert_eq!(events[1].label, "Project completion");
    let sum: f64 = events.iter().map(|e| e.amount).sum();
    assert_eq!(sum, q.total_price);
}

#[test]
fn quote_without_terms_uses_default_terms() {
    let q = base_quote();
    let defaults = vec![term("Deposit", 30.0), term("Midway", 40.0), term("Handover", 30.0)];
    let events = payment_schedule(&q, &defaults);
    assert_eq!(events.len(), 3);
    // No category timings: the final payment is four weeks after approval.
    assert_eq!(events[2].date, d("2026-05-29"));
    assert_eq!(events[1].date, d("2026-05-15"));
    assert_eq!(events[1].amount, 400.0);
    assert!(payment_schedule(&q, &[]).is_empty());
}

#[test]
fn explicit_payment_dates_are_kept() {
    let mut q = base_quote();
    q.payment_terms = vec![PaymentTerm {
        milestone: "Single payment".into(),
        percentage: 100.0,
        payment_date: Some(d("2026-06-02")),
    }];
    let events = payment_schedule(&q, &[]);
    assert_eq!(events[0].date, d("2026-06-02"));
    assert_eq!(events[0].label, "Single payment");
}

#[test]
fn direct_trades_pay_labor_and_materials_by_rule() {
    let mut q = base_quote();
    q.items = vec![item("cat_paint_plaster", 600.0, 200.0)];
    q.total_cost = 800.0;
    q.category_timings
        .insert("cat_paint_plaster".into(), timing("2026-05-05", "2026-05-12"));

    let mut settings = CashFlowSettings::default();
    settings.expense_timing.insert(
        Trade::Paint,
        ExpenseTimingConfig {
            labor: Some(TimingRule::CategoryEnd),
            materials: Some(TimingRule::OffsetFromCategoryStart { offset_days: -2 }),
            payment: None,
        },
    );
    let events = expense_events(&q, &settings);
    assert_eq!(events.len(), 2);
    let labor = events.iter().find(|e| e.label == "Labor costs").expect("labor");
    let materials = events.iter().find(|e| e.label == "Material costs").expect("materials");
    assert_eq!((labor.date, labor.amount), (d("2026-05-12"), 600.0));
    assert_eq!((materials.date, materials.amount), (d("2026-05-03"), 200.0));
    assert!(events.iter().all(|e| e.kind == FlowKind::Expense));
}

#[test]
fn demolition_books_everything_with_labor() {
    let mut q = base_quote();
    q.items = vec![item("cat_demolition", 300.0, 100.0)];
    q.total_cost = 400.0;
    q.category_timings
        .insert("cat_demolition".into(), timing("2026-05-02", "2026-05-03"));
    let events = expense_events(&q, &CashFlowSettings::default());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].date, d("2026-05-03"));
    assert_eq!(events[0].amount, 400.0);
}

#[test]
fn subcontractor_split_pays_half_at_each_end() {
    let mut q = base_quote();
    q.items = vec![item("cat_electricity", 1000.0, 0.0)];
    q.total_cost = 1000.0;
    q.category_timings
        .insert("cat_electricity".into(), timing("2026-05-10", "2026-05-20"));

    let mut settings = CashFlowSettings::default();
    settings.expense_timing.insert(
        Trade::Electrical,
        ExpenseTimingConfig {
            payment: Some(SubcontractorPayment::Split5050),
            ..Default::default()
        },
    );
    let events = expense_events(&q, &settings);
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].date, events[0].amount), (d("2026-05-10"), 500.0));
    assert_eq!((events[1].date, events[1].amount), (d("2026-05-20"), 500.0));

    // Built-in electrical timing pays on completion.
    let events = expense_events(&q, &CashFlowSettings::default());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].date, d("2026-05-20"));
}

#[test]
fn unattributed_cost_goes_to_categories_without_a_trade() {
    let mut q = base_quote();
    q.total_cost = 500.0;
    q.category_timings
        .insert("cat_custom_roof".into(), timing("2026-05-10", "2026-05-15"));
    let events = expense_events(&q, &CashFlowSettings::default());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].date, d("2026-05-08"));
    assert_eq!(events[0].amount, 500.0);
    assert_eq!(events[0].label, "Additional costs");
}

#[test]
fn daily_projection_counts_only_approved_quotes_in_window() {
    let mut q = base_quote();
    q.payment_terms = vec![term("", 50.0), term("", 50.0)];
    q.items = vec![item("cat_paint_plaster", 200.0, 100.0)];
    q.total_cost = 300.0;
    q.category_timings
        .insert("cat_paint_plaster".into(), timing("2026-05-01", "2026-05-04"));

    let mut draft = q.clone();
    draft.id = "q-draft".into();
    draft.status = QuoteStatus::Draft;

    let p = project_daily(&[q.clone(), draft], &CashFlowSettings::default(), d("2026-05-01"), 30);
    assert_eq!(p.days.len(), 30);
    assert_eq!(p.total_income, 1000.0);
    assert_eq!(p.total_expenses, 300.0);
    assert_eq!(p.net_flow, 700.0);
    assert_eq!(p.days[0].income, 500.0);
    assert_eq!(p.days[0].expenses, 300.0);
    assert_eq!(p.days[10].income, 500.0);

    // A 7-day window misses the final payment.
    let week = project_daily(&[q], &CashFlowSettings::default(), d("2026-05-01"), 7);
    assert_eq!(week.total_income, 500.0);
}

#[test]
fn monthly_projection_groups_by_calendar_month() {
    let mut q = base_quote();
    q.payment_terms = vec![term("", 50.0), term("", 50.0)];
    q.items = vec![item("cat_paint_plaster", 200.0, 100.0)];
    q.total_cost = 300.0;
    q.category_timings
        .insert("cat_paint_plaster".into(), timing("2026-05-01", "2026-06-20"));

    let p = project_monthly(&[q], &CashFlowSettings::default(), d("2026-05-01"), 3);
    assert_eq!(p.months.len(), 3);
    assert_eq!(p.months[0].month, "2026-05");
    assert_eq!(p.months[0].income, 500.0);
    assert_eq!(p.months[0].expenses, 300.0);
    assert_eq!(p.months[1].month, "2026-06");
    assert_eq!(p.months[1].income, 500.0);
    assert_eq!(p.months[2].income, 0.0);
    assert_eq!(p.months[0].projects, vec!["Bathroom".to_string()]);
    assert_eq!(p.active_projects, 1);
    assert_eq!(p.net_flow, 700.0);
}

#[test]
fn dates_at_the_calendar_edge_are_skipped_not_fatal() {
    let mut q = base_quote();
    q.payment_terms = vec![term("", 50.0), term("", 50.0)];
    q.items = vec![item("cat_paint_plaster", 60.0, 40.0)];
    q.total_cost = 400.0;
    q.category_timings.insert(
        "cat_paint_plaster".into(),
        CategoryTiming {
            start_date: d("2026-05-01"),
            end_date: NaiveDate::MAX,
        },
    );

    assert_eq!(final_payment_date(&q), None);
    assert!(payment_schedule(&q, &[]).is_empty());

    let daily = project_daily(&[q.clone()], &CashFlowSettings::default(), d("2026-05-01"), 30);
    assert_eq!(daily.total_income, 0.0);
    assert_eq!(daily.total_expenses, 100.0);

    let monthly = project_monthly(&[q], &CashFlowSettings::default(), d("2026-05-01"), 3);
    assert_eq!(monthly.months.len(), 3);
    assert_eq!(monthly.total_income, 0.0);
    assert!(monthly.months[0].expenses >= 100.0);
}

#[test]
fn leftover_cost_spreads_over_work_days_inside_the_window() {
    // No timings: the work span is 2026-05-01..=2026-05-31, 21 work days.
    let mut q = base_quote();
    q.total_cost = 500.0;

    let full = project_monthly(&[q.clone()], &CashFlowSettings::default(), d("2026-05-01"), 3);
    assert!((full.months[0].expenses - 500.0).abs() < 1e-6);
    assert_eq!(full.months[1].expenses, 0.0);

    // From the 15th only 11 of those work days are left.
    let late = project_monthly(&[q], &CashFlowSettings::default(), d("2026-05-15"), 3);
    assert!((late.months[0].expenses - 500.0 * 11.0 / 21.0).abs() < 1e-6);
}
