use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pricing::{
    client_price, item_metrics_for_quantity, round_2_decimals, tiling_metrics, CalcError,
    CatalogItem, MetricsOptions, Trade, DEFAULT_MINIMUM_PROFIT_PERCENT,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Sent,
    Approved,
    Rejected,
}

impl QuoteStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Dates outside these years are rejected on input.
pub const MIN_SUPPORTED_YEAR: i32 = 1900;
pub const MAX_SUPPORTED_YEAR: i32 = 2200;

pub fn is_supported_date(d: NaiveDate) -> bool {
    (MIN_SUPPORTED_YEAR..=MAX_SUPPORTED_YEAR).contains(&d.year())
}

/// `d` moved by `days` (negative goes back); `None` past chrono's range.
pub fn shift_days(d: NaiveDate, days: i64) -> Option<NaiveDate> {
    let n = Days::new(days.unsigned_abs());
    if days >= 0 {
        d.checked_add_days(n)
    } else {
        d.checked_sub_days(n)
    }
}

/// Each percentage in 0..=100 and all of them together at most 100.
pub fn validate_payment_terms(terms: &[PaymentTerm]) -> Result<(), CalcError> {
    let mut sum = 0.0;
    for term in terms {
        if !(0.0..=100.0).contains(&term.percentage) {
            return Err(CalcError::new(
                "bad_params",
                "payment term percentage must be in 0..=100",
            )
            .with_details(serde_json::json!({ "milestone": term.milestone })));
        }
        sum += term.percentage;
    }
    if sum > 100.0 + 1e-9 {
        return Err(
            CalcError::new("bad_params", "payment term percentages exceed 100")
                .with_details(serde_json::json!({ "sum": sum })),
        );
    }
    Ok(())
}

fn check_date(field: &str, d: NaiveDate) -> Result<(), CalcError> {
    if is_supported_date(d) {
        return Ok(());
    }
    Err(CalcError::new(
        "bad_params",
        format!(
            "{} must fall between {} and {}",
            field, MIN_SUPPORTED_YEAR, MAX_SUPPORTED_YEAR
        ),
    )
    .with_details(serde_json::json!({ "field": field, "date": d.to_string() })))
}

fn default_layers() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub catalog_item_id: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default = "default_layers")]
    pub layers: u32,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub labor_cost: f64,
    #[serde(default)]
    pub material_cost: f64,
    #[serde(default)]
    pub profit: f64,
    #[serde(default)]
    pub work_days: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerm {
    #[serde(default)]
    pub milestone: String,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTiming {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalCost {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub contractor_cost: Option<f64>,
}

impl AdditionalCost {
    fn contractor_side(&self) -> f64 {
        match self.contractor_cost {
            Some(c) if c > 0.0 => c,
            _ => self.cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub status: QuoteStatus,
    #[serde(default)]
    pub items: Vec<QuoteItem>,
    #[serde(default)]
    pub payment_terms: Vec<PaymentTerm>,
    #[serde(default)]
    pub category_timings: BTreeMap<String, CategoryTiming>,
    #[serde(default)]
    pub discount_percent: f64,
    #[serde(default)]
    pub price_increase_percent: f64,
    #[serde(default)]
    pub additional_costs: Vec<AdditionalCost>,
    pub created_at: NaiveDate,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub total_cost: f64,
}

impl Quote {
    /// Re-derives the stored totals from items and adjustments.
    pub fn refresh_totals(&mut self) {
        let totals = quote_totals(self);
        self.total_price = totals.total;
        self.total_cost = totals.total_contractor_cost;
    }

    /// Contractor cost per category id, in category id order.
    pub fn category_costs(&self) -> BTreeMap<String, f64> {
        let mut out: BTreeMap<String, f64> = BTreeMap::new();
        for item in &self.items {
            if item.category_id.is_empty() {
                continue;
            }
            *out.entry(item.category_id.clone()).or_insert(0.0) += item.total_cost;
        }
        out
    }

    pub fn latest_category_end(&self) -> Option<NaiveDate> {
        self.category_timings.values().map(|t| t.end_date).max()
    }

    pub fn validate(&self) -> Result<(), CalcError> {
        if !(0.0..=100.0).contains(&self.discount_percent) {
            return Err(CalcError::new(
                "bad_params",
                "discountPercent must be between 0 and 100",
            ));
        }
        if !self.price_increase_percent.is_finite() || self.price_increase_percent < 0.0 {
            return Err(CalcError::new(
                "bad_params",
                "priceIncreasePercent must be a non-negative number",
            ));
        }
        validate_payment_terms(&self.payment_terms)?;
        check_date("createdAt", self.created_at)?;
        if let Some(start) = self.start_date {
            check_date("startDate", start)?;
        }
        for term in &self.payment_terms {
            if let Some(date) = term.payment_date {
                check_date("paymentTerms.paymentDate", date)?;
            }
        }
        for (category_id, timing) in &self.category_timings {
            check_date("categoryTimings.startDate", timing.start_date)?;
            check_date("categoryTimings.endDate", timing.end_date)?;
            if timing.end_date < timing.start_date {
                return Err(CalcError::new(
                    "bad_params",
                    "category timing ends before it starts",
                )
                .with_details(serde_json::json!({ "categoryId": category_id })));
            }
        }
        for item in &self.items {
            for (name, v) in [
                ("quantity", item.quantity),
                ("totalPrice", item.total_price),
                ("totalCost", item.total_cost),
            ] {
                if !v.is_finite() || v < 0.0 {
                    return Err(CalcError::new(
                        "bad_params",
                        format!("item {} must be a non-negative number", name),
                    )
                    .with_details(serde_json::json!({ "itemId": item.id })));
                }
            }
        }
        Ok(())
    }
}

/// Prices `quantity` of a catalog item for a quote line.
///
/// Electrical and plumbing items with a per-unit contractor cost (and any
/// other trade's items that carry one) are resold per unit; tiling uses the
/// tiling model; everything else goes through the itemized metrics.
pub fn price_quote_item(
    item: &CatalogItem,
    trade: Trade,
    quantity: f64,
    layers: u32,
    default_profit_percent: Option<f64>,
) -> Result<QuoteItem, CalcError> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(CalcError::new("bad_params", "quantity must be a positive number"));
    }
    let layers = layers.max(1);
    let mut line = QuoteItem {
        catalog_item_id: item.id.clone(),
        category_id: trade.category_id().to_string(),
        category_name: trade.label().to_string(),
        name: item.name.clone(),
        unit: item.unit.clone(),
        quantity,
        layers,
        ..Default::default()
    };

    if let Some(unit_cost) = item.contractor_cost_per_unit.filter(|c| *c > 0.0) {
        let profit_percent = item
            .desired_profit_percent
            .or(default_profit_percent)
            .unwrap_or(DEFAULT_MINIMUM_PROFIT_PERCENT);
        let unit_price = item
            .client_price_per_unit
            .filter(|p| *p > 0.0)
            .unwrap_or_else(|| client_price(unit_cost, profit_percent));
        line.unit_price = unit_price;
        line.total_price = round_2_decimals(unit_price * quantity);
        line.total_cost = round_2_decimals(unit_cost * quantity);
        line.labor_cost = line.total_cost;
        line.profit = round_2_decimals(line.total_price - line.total_cost);
        return Ok(line);
    }

    if trade == Trade::Tiling {
        let mut priced = item.clone();
        if priced.desired_profit_percent.is_none() {
            priced.desired_profit_percent = default_profit_percent;
        }
        let m = tiling_metrics(&priced, quantity);
        line.unit_price = round_2_decimals(m.price_per_meter);
        line.total_price = m.customer_price;
        line.total_cost = m.total_cost;
        line.labor_cost = m.total_labor_cost;
        line.material_cost = m.total_materials_cost;
        line.profit = round_2_decimals(m.customer_price - m.total_cost);
        line.work_days = m.billable_work_days;
        return Ok(line);
    }

    let opts = MetricsOptions {
        layers,
        apply_fixed_cost: true,
    };
    let m = item_metrics_for_quantity(item, quantity, &opts)
        .ok_or_else(|| CalcError::new("bad_params", "quantity must be a positive number"))?;
    line.unit_price = m.unit_price_customer;
    line.total_price = m.total_customer_price;
    line.total_cost = m.total_contractor_cost;
    line.labor_cost = m.labor_cost_total;
    line.material_cost = m.material_cost_total;
    line.profit = m.total_profit;
    line.work_days = m.work_days;
    Ok(line)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTotals {
    pub subtotal_items: f64,
    pub additional_costs: f64,
    pub subtotal: f64,
    pub price_increase_amount: f64,
    pub subtotal_after_increase: f64,
    pub discount_amount: f64,
    pub total: f64,
    pub total_items_cost: f64,
    pub additional_contractor_costs: f64,
    pub total_contractor_cost: f64,
    pub profit: f64,
    pub profit_percent: f64,
    pub total_work_days: f64,
    pub is_low_profit: bool,
}

// `Sum for f64` starts at -0.0, which would leak into empty totals.
fn sum(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |acc, v| acc + v)
}

pub fn quote_totals(quote: &Quote) -> QuoteTotals {
    let subtotal_items = sum(quote.items.iter().map(|i| i.total_price));
    let additional_costs = sum(quote.additional_costs.iter().map(|c| c.cost));
    let subtotal = subtotal_items + additional_costs;
    let price_increase_amount = subtotal * quote.price_increase_percent / 100.0;
    let subtotal_after_increase = subtotal + price_increase_amount;
    let discount_amount = subtotal_after_increase * quote.discount_percent / 100.0;
    let total = subtotal_after_increase - discount_amount;

    let total_items_cost = sum(quote.items.iter().map(|i| i.total_cost));
    let additional_contractor_costs =
        sum(quote.additional_costs.iter().map(AdditionalCost::contractor_side));
    let total_contractor_cost = total_items_cost + additional_contractor_costs;

    let profit = total - total_contractor_cost;
    let profit_percent = if total_contractor_cost > 0.0 {
        profit / total_contractor_cost * 100.0
    } else if total > 0.0 {
        100.0
    } else {
        0.0
    };

    QuoteTotals {
        subtotal_items: round_2_decimals(subtotal_items),
        additional_costs: round_2_decimals(additional_costs),
        subtotal: round_2_decimals(subtotal),
        price_increase_amount: round_2_decimals(price_increase_amount),
        subtotal_after_increase: round_2_decimals(subtotal_after_increase),
        discount_amount: round_2_decimals(discount_amount),
        total: round_2_decimals(total),
        total_items_cost: round_2_decimals(total_items_cost),
        additional_contractor_costs: round_2_decimals(additional_contractor_costs),
        total_contractor_cost: round_2_decimals(total_contractor_cost),
        profit: round_2_decimals(profit),
        profit_percent: round_2_decimals(profit_percent),
        total_work_days: sum(quote.items.iter().map(|i| i.work_days)),
        is_low_profit: profit_percent < DEFAULT_MINIMUM_PROFIT_PERCENT,
    }
}

const APPROVAL_WORDS: [&str; 5] = ["אישור", "חתימה", "approval", "approved", "signature"];
const FIRST_WORDS: [&str; 6] = ["מקדמה", "ראשון", "התחלה", "deposit", "first", "start"];
const FINAL_WORDS: [&str; 6] = ["סופי", "סיום", "אחרון", "final", "completion", "last"];

fn mentions(milestone: &str, words: &[&str]) -> bool {
    let text = milestone.to_lowercase();
    words.iter().any(|w| text.contains(w))
}

/// A term that cannot be dated until the client signs.
pub fn is_approval_dependent(milestone: &str) -> bool {
    mentions(milestone, &APPROVAL_WORDS)
}

/// Re-dates payment terms against a project timeline.
pub fn recalculate_payment_dates(
    terms: &[PaymentTerm],
    project_start: NaiveDate,
    project_end: NaiveDate,
    approval_date: Option<NaiveDate>,
) -> Vec<PaymentTerm> {
    let n = terms.len();
    let total_days = (project_end - project_start).num_days() as f64;
    terms
        .iter()
        .enumerate()
        .map(|(idx, term)| {
            let date = if is_approval_dependent(&term.milestone) {
                approval_date
            } else if idx == 0 || mentions(&term.milestone, &FIRST_WORDS) {
                Some(approval_date.unwrap_or(project_start))
            } else if idx == n - 1 || mentions(&term.milestone, &FINAL_WORDS) {
                Some(project_end)
            } else {
                let step = total_days / (n - 1) as f64;
                let offset = (step * idx as f64).round() as i64;
                shift_days(project_start, offset)
            };
            PaymentTerm {
                payment_date: date,
                ..term.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    fn term(milestone: &str, percentage: f64) -> PaymentTerm {
        PaymentTerm {
            milestone: milestone.into(),
            percentage,
            payment_date: None,
        }
    }

    #[test]
    fn approval_terms_stay_undated_until_approved() {
        let terms = vec![term("On signature", 30.0), term("Midway", 40.0), term("Handover", 30.0)];
        let out = recalculate_payment_dates(&terms, d("2026-03-01"), d("2026-03-21"), None);
        assert_eq!(out[0].payment_date, None);
        assert_eq!(out[1].payment_date, Some(d("2026-03-11")));
        assert_eq!(out[2].payment_date, Some(d("2026-03-21")));
    }

    #[test]
    fn first_term_prefers_approval_date() {
        let terms = vec![term("Deposit", 50.0), term("Final", 50.0)];
        let out = recalculate_payment_dates(
            &terms,
            d("2026-03-01"),
            d("2026-03-21"),
            Some(d("2026-02-20")),
        );
        assert_eq!(out[0].payment_date, Some(d("2026-02-20")));
        assert_eq!(out[1].payment_date, Some(d("2026-03-21")));
    }

    #[test]
    fn subcontracted_item_uses_client_price_from_cost() {
        let item = CatalogItem {
            id: "el_pt_1".into(),
            name: "Power point".into(),
            unit: "unit".into(),
            contractor_cost_per_unit: Some(120.0),
            ..Default::default()
        };
        let line = price_quote_item(&item, Trade::Electrical, 10.0, 1, Some(40.0)).expect("priced");
        assert_eq!(line.unit_price, 168.0);
        assert_eq!(line.total_price, 1680.0);
        assert_eq!(line.total_cost, 1200.0);
        assert_eq!(line.category_id, "cat_electricity");
    }
}
