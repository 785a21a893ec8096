use chrono::{Datelike, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pricing::Trade;
use crate::quote::{shift_days, PaymentTerm, Quote, QuoteStatus};

/// Days between the last category end and the final payment.
pub const FINAL_PAYMENT_GRACE_DAYS: i64 = 7;
/// Final payment offset from approval when a quote has no category timings.
pub const FINAL_PAYMENT_FALLBACK_DAYS: i64 = 28;
/// Lead time for categories without a timing rule.
pub const UNMAPPED_CATEGORY_LEAD_DAYS: i64 = 2;
pub const DEFAULT_PROJECT_LENGTH_DAYS: i64 = 30;

pub const DAILY_RANGES: [u32; 3] = [7, 30, 60];
pub const MONTHLY_RANGES: [u32; 3] = [3, 6, 12];

fn default_day_of_month() -> u32 {
    1
}

/// When a direct-cost expense (labor or materials) is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimingRule {
    #[serde(rename_all = "camelCase")]
    FixedDayOfMonth {
        #[serde(default = "default_day_of_month")]
        day_of_month: u32,
    },
    CategoryStart,
    CategoryEnd,
    #[serde(rename_all = "camelCase")]
    OffsetFromCategoryStart {
        #[serde(default)]
        offset_days: i64,
    },
    #[serde(rename_all = "camelCase")]
    OffsetFromCategoryEnd {
        #[serde(default)]
        offset_days: i64,
    },
}

impl TimingRule {
    /// Payment date for a category running `start..=end`; `None` when the
    /// date falls outside the calendar chrono can represent.
    pub fn resolve(&self, start: NaiveDate, end: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Self::FixedDayOfMonth { day_of_month } => {
                let target = day_in_month(start, day_of_month)?;
                if target < start {
                    let next = first_of_month(start).checked_add_months(Months::new(1))?;
                    day_in_month(next, day_of_month)
                } else {
                    Some(target)
                }
            }
            Self::CategoryStart => Some(start),
            Self::CategoryEnd => Some(end),
            Self::OffsetFromCategoryStart { offset_days } => shift_days(start, offset_days),
            Self::OffsetFromCategoryEnd { offset_days } => shift_days(end, offset_days),
        }
    }
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// Day `day` of `d`'s month; days past the month's end roll into the next.
fn day_in_month(d: NaiveDate, day: u32) -> Option<NaiveDate> {
    shift_days(first_of_month(d), i64::from(day.max(1)) - 1)
}

/// How a subcontractor is paid for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SubcontractorPayment {
    #[serde(rename = "category_start")]
    CategoryStart,
    #[serde(rename = "category_end")]
    CategoryEnd,
    #[serde(rename = "split_50_50")]
    Split5050,
}

/// Per-trade expense timing as stored in the profile. Missing parts fall back
/// to the trade's built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpenseTimingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labor: Option<TimingRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials: Option<TimingRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<SubcontractorPayment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseTiming {
    /// Materials without a rule are paid together with labor.
    Direct {
        labor: TimingRule,
        materials: Option<TimingRule>,
    },
    Subcontracted(SubcontractorPayment),
}

impl ExpenseTiming {
    pub fn default_for(trade: Trade) -> Self {
        match trade {
            Trade::Paint | Trade::Tiling | Trade::Construction => Self::Direct {
                labor: TimingRule::CategoryStart,
                materials: Some(TimingRule::CategoryStart),
            },
            Trade::Demolition => Self::Direct {
                labor: TimingRule::CategoryEnd,
                materials: None,
            },
            Trade::Plumbing => Self::Subcontracted(SubcontractorPayment::CategoryStart),
            Trade::Electrical => Self::Subcontracted(SubcontractorPayment::CategoryEnd),
        }
    }

    pub fn to_config(self) -> ExpenseTimingConfig {
        match self {
            Self::Direct { labor, materials } => ExpenseTimingConfig {
                labor: Some(labor),
                materials,
                payment: None,
            },
            Self::Subcontracted(payment) => ExpenseTimingConfig {
                payment: Some(payment),
                ..Default::default()
            },
        }
    }

    pub fn for_trade(trade: Trade, config: Option<&ExpenseTimingConfig>) -> Self {
        let base = Self::default_for(trade);
        let Some(config) = config else {
            return base;
        };
        match base {
            Self::Direct { labor, materials } => Self::Direct {
                labor: config.labor.unwrap_or(labor),
                materials: config.materials.or(materials),
            },
            Self::Subcontracted(payment) => {
                Self::Subcontracted(config.payment.unwrap_or(payment))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CashFlowSettings {
    pub default_payment_terms: Vec<PaymentTerm>,
    pub expense_timing: BTreeMap<Trade, ExpenseTimingConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Income,
    Expense,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowEvent {
    pub date: NaiveDate,
    pub kind: FlowKind,
    pub quote_id: String,
    pub project_name: String,
    pub client_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub label: String,
}

impl CashFlowEvent {
    fn for_quote(quote: &Quote, kind: FlowKind, date: NaiveDate, amount: f64, label: &str) -> Self {
        Self {
            date,
            kind,
            quote_id: quote.id.clone(),
            project_name: quote.project_name.clone(),
            client_name: quote.client_name.clone(),
            category_id: None,
            category_name: None,
            amount,
            percentage: None,
            label: label.to_string(),
        }
    }

    fn in_category(mut self, category_id: &str, category_name: &str) -> Self {
        self.category_id = Some(category_id.to_string());
        self.category_name = Some(category_name.to_string());
        self
    }
}

/// Final payment date: a week after the last category ends, or four weeks
/// after approval when the quote has no category timings.
pub fn final_payment_date(quote: &Quote) -> Option<NaiveDate> {
    match quote.latest_category_end() {
        Some(end) => shift_days(end, FINAL_PAYMENT_GRACE_DAYS),
        None => shift_days(quote.created_at, FINAL_PAYMENT_FALLBACK_DAYS),
    }
}

/// Income events for a quote's payment terms (or the default terms).
pub fn payment_schedule(quote: &Quote, default_terms: &[PaymentTerm]) -> Vec<CashFlowEvent> {
    let terms = if quote.payment_terms.is_empty() {
        default_terms
    } else {
        &quote.payment_terms
    };
    let n = terms.len();
    if n == 0 {
        return Vec::new();
    }

    let approval = quote.created_at;
    let Some(final_date) = final_payment_date(quote) else {
        return Vec::new();
    };
    let days_between = (final_date - approval).num_days() as f64;

    terms
        .iter()
        .enumerate()
        .filter_map(|(idx, term)| {
            let date = match term.payment_date {
                Some(d) => d,
                None if idx == 0 => approval,
                None if idx == n - 1 => final_date,
                None => {
                    let offset = days_between * idx as f64 / (n - 1) as f64;
                    shift_days(approval, (offset + 0.5).floor() as i64)?
                }
            };
            let label = if !term.milestone.trim().is_empty() {
                term.milestone.as_str()
            } else if idx == 0 {
                "Project start"
            } else if idx == n - 1 {
                "Project completion"
            } else {
                "Interim payment"
            };
            let mut event = CashFlowEvent::for_quote(
                quote,
                FlowKind::Income,
                date,
                quote.total_price * term.percentage / 100.0,
                label,
            );
            event.percentage = Some(term.percentage);
            Some(event)
        })
        .collect()
}

struct FallbackCategory {
    category_id: String,
    category_name: String,
    expense_date: NaiveDate,
    total_cost: f64,
}

fn category_display_name(quote: &Quote, category_id: &str) -> String {
    if let Some(trade) = Trade::from_category_id(category_id) {
        return trade.label().to_string();
    }
    quote
        .items
        .iter()
        .find(|i| i.category_id == category_id && !i.category_name.is_empty())
        .map(|i| i.category_name.clone())
        .unwrap_or_else(|| category_id.to_string())
}

/// Expense events for a quote's timed categories.
///
/// Category cost is the labor plus material of its items. Cost the items do
/// not attribute to any timed category (`totalCost` minus the category sums)
/// is spread over categories that have no trade timing rule.
pub fn expense_events(quote: &Quote, settings: &CashFlowSettings) -> Vec<CashFlowEvent> {
    let mut events = Vec::new();
    let mut attributed = 0.0_f64;
    let mut fallbacks: Vec<FallbackCategory> = Vec::new();

    for (category_id, timing) in &quote.category_timings {
        let (labor, materials) = quote
            .items
            .iter()
            .filter(|i| &i.category_id == category_id)
            .fold((0.0_f64, 0.0_f64), |(l, m), i| (l + i.labor_cost, m + i.material_cost));
        let category_cost = labor + materials;
        let name = category_display_name(quote, category_id);
        let (start, end) = (timing.start_date, timing.end_date);

        let Some(trade) = Trade::from_category_id(category_id) else {
            let Some(expense_date) = shift_days(start, -UNMAPPED_CATEGORY_LEAD_DAYS) else {
                continue;
            };
            if category_cost > 0.0 {
                attributed += category_cost;
                events.push(
                    CashFlowEvent::for_quote(
                        quote,
                        FlowKind::Expense,
                        expense_date,
                        category_cost,
                        "Category costs",
                    )
                    .in_category(category_id, &name),
                );
            }
            fallbacks.push(FallbackCategory {
                category_id: category_id.clone(),
                category_name: name,
                expense_date,
                total_cost: category_cost,
            });
            continue;
        };

        attributed += category_cost;
        let mut push = |date: Option<NaiveDate>, amount: f64, label: &str| {
            let Some(date) = date else {
                return;
            };
            if amount > 0.0 {
                events.push(
                    CashFlowEvent::for_quote(quote, FlowKind::Expense, date, amount, label)
                        .in_category(category_id, &name),
                );
            }
        };

        match ExpenseTiming::for_trade(trade, settings.expense_timing.get(&trade)) {
            ExpenseTiming::Subcontracted(SubcontractorPayment::Split5050) => {
                let half = category_cost / 2.0;
                push(Some(start), half, "Subcontractor payment (50% at start)");
                push(Some(end), half, "Subcontractor payment (50% at completion)");
            }
            ExpenseTiming::Subcontracted(SubcontractorPayment::CategoryStart) => {
                push(Some(start), category_cost, "Subcontractor payment");
            }
            ExpenseTiming::Subcontracted(SubcontractorPayment::CategoryEnd) => {
                push(Some(end), category_cost, "Subcontractor payment");
            }
            ExpenseTiming::Direct {
                labor: labor_rule,
                materials: Some(material_rule),
            } => {
                push(labor_rule.resolve(start, end), labor, "Labor costs");
                push(material_rule.resolve(start, end), materials, "Material costs");
            }
            ExpenseTiming::Direct {
                labor: labor_rule,
                materials: None,
            } => {
                push(labor_rule.resolve(start, end), category_cost, "Labor costs");
            }
        }
    }

    let remaining = (quote.total_cost - attributed).max(0.0);
    if remaining > 0.0 && !fallbacks.is_empty() {
        allocate_remaining(quote, remaining, &mut fallbacks, &mut events);
    }
    events
}

fn allocate_remaining(
    quote: &Quote,
    remaining: f64,
    fallbacks: &mut [FallbackCategory],
    events: &mut Vec<CashFlowEvent>,
) {
    let mut book = |c: &FallbackCategory, amount: f64, label: &str| {
        events.push(
            CashFlowEvent::for_quote(quote, FlowKind::Expense, c.expense_date, amount, label)
                .in_category(&c.category_id, &c.category_name),
        );
    };

    if fallbacks.len() == 1 {
        book(&fallbacks[0], remaining, "Additional costs");
        return;
    }

    let share_base: f64 = fallbacks.iter().map(|c| c.total_cost).sum();
    if share_base > 0.0 {
        let last = fallbacks.len() - 1;
        let mut allocated = 0.0_f64;
        for (idx, c) in fallbacks.iter().enumerate() {
            let portion = if idx == last {
                remaining - allocated
            } else {
                (remaining * c.total_cost / share_base + 0.5).floor()
            };
            allocated += portion;
            if portion > 0.0 {
                book(c, portion, "Additional costs (proportional)");
            }
        }
        return;
    }

    fallbacks.sort_by_key(|c| c.expense_date);
    book(&fallbacks[0], remaining, "Additional costs (project total)");
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    pub date: NaiveDate,
    pub income: f64,
    pub expenses: f64,
    pub net_flow: f64,
    pub income_items: Vec<CashFlowEvent>,
    pub expense_items: Vec<CashFlowEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProjection {
    pub days: Vec<DayBucket>,
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_flow: f64,
}

/// Day-by-day cash flow of approved quotes over `[start, start + days - 1]`.
pub fn project_daily(
    quotes: &[Quote],
    settings: &CashFlowSettings,
    start: NaiveDate,
    days: u32,
) -> DailyProjection {
    let mut buckets: BTreeMap<NaiveDate, DayBucket> = (0..i64::from(days))
        .filter_map(|i| shift_days(start, i))
        .map(|date| {
            (
                date,
                DayBucket {
                    date,
                    income: 0.0,
                    expenses: 0.0,
                    net_flow: 0.0,
                    income_items: Vec::new(),
                    expense_items: Vec::new(),
                },
            )
        })
        .collect();

    let mut projection = DailyProjection::default();
    for quote in quotes.iter().filter(|q| q.status == QuoteStatus::Approved) {
        let events = payment_schedule(quote, &settings.default_payment_terms)
            .into_iter()
            .chain(expense_events(quote, settings));
        for event in events {
            let Some(bucket) = buckets.get_mut(&event.date) else {
                continue;
            };
            match event.kind {
                FlowKind::Income => {
                    bucket.income += event.amount;
                    projection.total_income += event.amount;
                    bucket.income_items.push(event);
                }
                FlowKind::Expense => {
                    bucket.expenses += event.amount;
                    projection.total_expenses += event.amount;
                    bucket.expense_items.push(event);
                }
            }
        }
    }

    projection.days = buckets
        .into_values()
        .map(|mut b| {
            b.net_flow = b.income - b.expenses;
            b
        })
        .collect();
    projection.net_flow = projection.total_income - projection.total_expenses;
    projection
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    pub month: String,
    pub income: f64,
    pub expenses: f64,
    pub net_flow: f64,
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyProjection {
    pub months: Vec<MonthBucket>,
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_flow: f64,
    pub active_projects: usize,
}

fn month_key(d: NaiveDate) -> String {
    d.format("%Y-%m").to_string()
}

/// Bounds of a quote's work: earliest category start (else the quote's start
/// date, else its creation date) to the latest category end (else 30 days on).
pub fn project_span(quote: &Quote) -> (NaiveDate, NaiveDate) {
    let start = quote
        .category_timings
        .values()
        .map(|t| t.start_date)
        .min()
        .or(quote.start_date)
        .unwrap_or(quote.created_at);
    let end = match quote.latest_category_end() {
        Some(end) if end > start => end,
        _ => shift_days(start, DEFAULT_PROJECT_LENGTH_DAYS).unwrap_or(start),
    };
    (start, end)
}

fn is_work_day(d: NaiveDate) -> bool {
    !matches!(d.weekday(), Weekday::Fri | Weekday::Sat)
}

/// Work days in `from..=to`, without walking every day of long spans.
fn count_work_days(from: NaiveDate, to: NaiveDate) -> i64 {
    if to < from {
        return 0;
    }
    let total = (to - from).num_days() + 1;
    let partial = from
        .iter_days()
        .take((total % 7) as usize)
        .filter(|d| is_work_day(*d))
        .count();
    total / 7 * 5 + partial as i64
}

/// Month-by-month cash flow of approved quotes for `months` calendar months
/// starting with `start`'s month; dates before `start` are ignored.
pub fn project_monthly(
    quotes: &[Quote],
    settings: &CashFlowSettings,
    start: NaiveDate,
    months: u32,
) -> MonthlyProjection {
    let first = first_of_month(start);
    let window_end = first
        .checked_add_months(Months::new(months))
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    let mut buckets: BTreeMap<String, MonthBucket> = (0..months)
        .filter_map(|i| first.checked_add_months(Months::new(i)))
        .map(|m| {
            let key = month_key(m);
            (
                key.clone(),
                MonthBucket {
                    month: key,
                    income: 0.0,
                    expenses: 0.0,
                    net_flow: 0.0,
                    projects: Vec::new(),
                },
            )
        })
        .collect();

    let mut projection = MonthlyProjection::default();
    let approved: Vec<&Quote> = quotes
        .iter()
        .filter(|q| q.status == QuoteStatus::Approved)
        .collect();
    projection.active_projects = approved.len();

    for quote in approved {
        for event in payment_schedule(quote, &settings.default_payment_terms) {
            if event.date < start {
                continue;
            }
            if let Some(bucket) = buckets.get_mut(&month_key(event.date)) {
                bucket.income += event.amount;
                projection.total_income += event.amount;
                if !bucket.projects.contains(&quote.project_name) {
                    bucket.projects.push(quote.project_name.clone());
                }
            }
        }

        let mut distributed = 0.0_f64;
        for (category_id, cost) in quote.category_costs() {
            let Some(timing) = quote.category_timings.get(&category_id) else {
                continue;
            };
            if cost <= 0.0 {
                continue;
            }
            distributed += cost;
            if timing.start_date < start {
                continue;
            }
            if let Some(bucket) = buckets.get_mut(&month_key(timing.start_date)) {
                bucket.expenses += cost;
                projection.total_expenses += cost;
            }
        }

        let remaining = quote.total_cost - distributed;
        if remaining <= 0.0 {
            continue;
        }
        let (span_start, span_end) = project_span(quote);
        let total_work_days = count_work_days(span_start, span_end);
        if total_work_days == 0 {
            continue;
        }
        let per_day = remaining / total_work_days as f64;
        let (from, to) = (span_start.max(start), span_end.min(window_end));
        for day in from
            .iter_days()
            .take_while(|d| *d <= to)
            .filter(|d| is_work_day(*d))
        {
            if let Some(bucket) = buckets.get_mut(&month_key(day)) {
                bucket.expenses += per_day;
                projection.total_expenses += per_day;
            }
        }
    }

    projection.months = buckets
        .into_values()
        .map(|mut b| {
            b.net_flow = b.income - b.expenses;
            b
        })
        .collect();
    projection.net_flow = projection.total_income - projection.total_expenses;
    projection
}
