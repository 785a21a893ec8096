use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Range label returned when an item has no usable price tiers.
pub const GENERAL_RANGE: &str = "general";

pub const DEFAULT_MINIMUM_PROFIT_PERCENT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trade {
    Paint,
    Tiling,
    Demolition,
    Electrical,
    Plumbing,
    Construction,
}

impl Trade {
    pub const ALL: [Trade; 6] = [
        Trade::Paint,
        Trade::Tiling,
        Trade::Demolition,
        Trade::Electrical,
        Trade::Plumbing,
        Trade::Construction,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|trade| trade.as_str() == t || trade.category_id() == t)
            .or(match t.as_str() {
                "paint_plaster" | "painting" => Some(Self::Paint),
                "electricity" => Some(Self::Electrical),
                _ => None,
            })
    }

    pub fn from_category_id(category_id: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|trade| trade.category_id() == category_id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paint => "paint",
            Self::Tiling => "tiling",
            Self::Demolition => "demolition",
            Self::Electrical => "electrical",
            Self::Plumbing => "plumbing",
            Self::Construction => "construction",
        }
    }

    /// Category id used on quote items and category timings.
    pub fn category_id(self) -> &'static str {
        match self {
            Self::Paint => "cat_paint_plaster",
            Self::Tiling => "cat_tiling",
            Self::Demolition => "cat_demolition",
            Self::Electrical => "cat_electricity",
            Self::Plumbing => "cat_plumbing",
            Self::Construction => "cat_construction",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Paint => "Paint & plaster",
            Self::Tiling => "Tiling & cladding",
            Self::Demolition => "Demolition & removal",
            Self::Electrical => "Electrical",
            Self::Plumbing => "Plumbing",
            Self::Construction => "Construction (general)",
        }
    }

    /// Electrical and plumbing work is bought from subcontractors per unit.
    pub fn is_subcontracted(self) -> bool {
        matches!(self, Self::Electrical | Self::Plumbing)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// `Math.round`-compatible rounding (halves go up, also for negatives).
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn round_1_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn positive(v: f64) -> Option<f64> {
    if v.is_finite() && v > 0.0 {
        Some(v)
    } else {
        None
    }
}

fn positive_opt(v: Option<f64>) -> Option<f64> {
    v.and_then(positive)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    #[serde(default, alias = "maxArea", alias = "squareMeters", alias = "quantity")]
    pub max: f64,
    #[serde(default, alias = "pricePerUnit", alias = "unitPrice")]
    pub price: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prices_by_layer: BTreeMap<String, f64>,
}

impl PriceTier {
    fn layer_price(&self, layers: u32) -> Option<f64> {
        self.prices_by_layer
            .get(&layers.to_string())
            .copied()
            .and_then(positive)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSetting {
    #[serde(default)]
    pub coverage: Option<f64>,
    #[serde(default, alias = "discountPercent")]
    pub daily_output: Option<f64>,
}

fn default_active() -> bool {
    true
}

/// A priced unit of work in a trade catalog. Unset numeric fields are zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,

    // Paint-style cost inputs.
    #[serde(default)]
    pub bucket_price: f64,
    #[serde(default)]
    pub coverage: f64,
    #[serde(default)]
    pub daily_output: f64,
    #[serde(default)]
    pub worker_daily_cost: f64,
    #[serde(default)]
    pub equipment_cost: f64,
    #[serde(default)]
    pub fixed_project_cost: f64,
    #[serde(default)]
    pub preparation_cost_per_meter: f64,
    #[serde(default)]
    pub cleaning_cost_per_meter: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layer_settings: Vec<LayerSetting>,

    // Customer pricing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub price_tiers: Vec<PriceTier>,
    #[serde(default, alias = "averageCustomerPrice", skip_serializing_if = "Option::is_none")]
    pub customer_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_profit_percent: Option<f64>,

    // Tiling inputs.
    #[serde(default)]
    pub material_cost: f64,
    #[serde(default)]
    pub additional_cost: f64,
    #[serde(default)]
    pub wastage_percent: f64,
    #[serde(default)]
    pub labor_cost_per_day: f64,
    #[serde(default)]
    pub has_panel: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_labor_work_capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_utilization_percent: Option<f64>,

    // Subcontracted per-unit pricing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contractor_cost_per_unit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_price_per_unit: Option<f64>,
}

impl CatalogItem {
    pub fn flat_customer_price(&self) -> f64 {
        positive_opt(self.customer_price).unwrap_or(0.0)
    }

    fn paint_bucket_price(&self) -> f64 {
        positive(self.bucket_price).unwrap_or(self.material_cost)
    }

    fn paint_labor_day_rate(&self) -> f64 {
        positive(self.worker_daily_cost).unwrap_or(self.labor_cost_per_day)
    }

    /// Rejects non-finite or negative numbers instead of treating them as zero.
    pub fn validate(&self) -> Result<(), CalcError> {
        let fields: [(&str, f64); 13] = [
            ("bucketPrice", self.bucket_price),
            ("coverage", self.coverage),
            ("dailyOutput", self.daily_output),
            ("workerDailyCost", self.worker_daily_cost),
            ("equipmentCost", self.equipment_cost),
            ("fixedProjectCost", self.fixed_project_cost),
            ("preparationCostPerMeter", self.preparation_cost_per_meter),
            ("cleaningCostPerMeter", self.cleaning_cost_per_meter),
            ("materialCost", self.material_cost),
            ("additionalCost", self.additional_cost),
            ("wastagePercent", self.wastage_percent),
            ("laborCostPerDay", self.labor_cost_per_day),
            ("customerPrice", self.customer_price.unwrap_or(0.0)),
        ];
        for (name, v) in fields {
            check_amount(&self.id, name, v)?;
        }
        let optional: [(&str, Option<f64>); 5] = [
            ("desiredProfitPercent", self.desired_profit_percent),
            ("panelLaborWorkCapacity", self.panel_labor_work_capacity),
            ("panelUtilizationPercent", self.panel_utilization_percent),
            ("contractorCostPerUnit", self.contractor_cost_per_unit),
            ("clientPricePerUnit", self.client_price_per_unit),
        ];
        for (name, v) in optional {
            if let Some(v) = v {
                check_amount(&self.id, name, v)?;
            }
        }
        for (idx, layer) in self.layer_settings.iter().enumerate() {
            for (name, v) in [("coverage", layer.coverage), ("dailyOutput", layer.daily_output)] {
                if let Some(v) = v {
                    check_amount(&self.id, &format!("layerSettings[{}].{}", idx, name), v)?;
                }
            }
        }
        for (idx, tier) in self.price_tiers.iter().enumerate() {
            check_amount(&self.id, &format!("priceTiers[{}].max", idx), tier.max)?;
            check_amount(&self.id, &format!("priceTiers[{}].price", idx), tier.price)?;
            for (layer, price) in &tier.prices_by_layer {
                check_amount(
                    &self.id,
                    &format!("priceTiers[{}].pricesByLayer.{}", idx, layer),
                    *price,
                )?;
            }
        }
        Ok(())
    }
}

fn check_amount(item_id: &str, field: &str, v: f64) -> Result<(), CalcError> {
    if v.is_finite() && v >= 0.0 {
        return Ok(());
    }
    Err(
        CalcError::new("bad_params", format!("{} must be a non-negative number", field))
            .with_details(serde_json::json!({ "itemId": item_id, "field": field })),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierMatch {
    pub tier: Option<PriceTier>,
    pub range: String,
    pub price: f64,
}

/// Finds the volume tier for `quantity` and the unit price to charge.
///
/// Tiers are matched by ascending upper bound; a quantity past the last bound
/// uses the last tier. A tier without a usable price borrows the nearest lower
/// tier's price, then the item's flat customer price.
pub fn identify_price_tier(item: &CatalogItem, quantity: f64, layers: u32) -> Option<TierMatch> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return None;
    }

    let mut tiers: Vec<&PriceTier> = item
        .price_tiers
        .iter()
        .filter(|t| t.max.is_finite() && t.max > 0.0)
        .collect();
    if tiers.is_empty() {
        return Some(TierMatch {
            tier: None,
            range: GENERAL_RANGE.to_string(),
            price: item.flat_customer_price(),
        });
    }
    tiers.sort_by(|a, b| a.max.partial_cmp(&b.max).unwrap_or(Ordering::Equal));

    let mut min = 0.0_f64;
    let mut matched: Option<(usize, String)> = None;
    for (idx, tier) in tiers.iter().enumerate() {
        if quantity > min && quantity <= tier.max {
            matched = Some((idx, format!("{} - {}", round_half_up(min + 1.0), tier.max)));
            break;
        }
        min = tier.max;
    }
    let (idx, range) = matched.unwrap_or_else(|| (tiers.len() - 1, format!("{}+", min)));

    let tier = tiers[idx];
    let mut price = tier.layer_price(layers).unwrap_or(tier.price);
    if price <= 0.0 {
        for lower in tiers[..idx].iter().rev() {
            if let Some(p) = lower.layer_price(layers) {
                price = p;
                break;
            }
            if lower.price > 0.0 {
                price = lower.price;
                break;
            }
        }
    }
    if price <= 0.0 {
        price = item.flat_customer_price();
    }

    Some(TierMatch {
        tier: Some(tier.clone()),
        range,
        price,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsOptions {
    pub layers: u32,
    pub apply_fixed_cost: bool,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            layers: 1,
            apply_fixed_cost: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMethod {
    ProfitPercent,
    Tiers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetrics {
    pub unit_price_customer: f64,
    pub total_customer_price: f64,
    pub material_cost_total: f64,
    pub labor_cost_total: f64,
    pub equipment_cost_total: f64,
    pub fixed_project_cost: f64,
    pub additional_cost_total: f64,
    pub total_contractor_cost: f64,
    pub total_profit: f64,
    /// `None` when there is no cost basis but the customer still pays.
    pub profit_percent: Option<f64>,
    pub work_days: f64,
    pub buckets_needed: f64,
    pub raw_work_days: f64,
    pub unit_price_labor: f64,
    pub pricing_method: PricingMethod,
}

/// Sum of `quantity / per_layer_rate` over all layers. A layer override wins
/// when it is positive; layers are independent of each other.
fn accumulate_layers<F>(item: &CatalogItem, quantity: f64, layers: u32, base: f64, pick: F) -> f64
where
    F: Fn(&LayerSetting) -> Option<f64>,
{
    (0..layers as usize)
        .map(|i| {
            let rate = item
                .layer_settings
                .get(i)
                .and_then(|s| positive_opt(pick(s)))
                .unwrap_or(base);
            quantity / rate
        })
        .sum()
}

/// Contractor cost breakdown and customer price for `quantity` of `item`.
pub fn item_metrics_for_quantity(
    item: &CatalogItem,
    quantity: f64,
    opts: &MetricsOptions,
) -> Option<ItemMetrics> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return None;
    }
    let layers = opts.layers.max(1);

    let base_coverage = positive(item.coverage).unwrap_or(1.0);
    let raw_buckets = accumulate_layers(item, quantity, layers, base_coverage, |s| s.coverage);
    let buckets_needed = raw_buckets.ceil();
    let material_cost = buckets_needed * item.bucket_price;

    let base_output = positive(item.daily_output).unwrap_or(1.0);
    let raw_work_days = accumulate_layers(item, quantity, layers, base_output, |s| s.daily_output);
    let work_days = raw_work_days.ceil();
    let labor_cost = work_days * item.worker_daily_cost;

    let (equipment_cost, fixed_cost) = if opts.apply_fixed_cost {
        (item.equipment_cost, item.fixed_project_cost)
    } else {
        (0.0, 0.0)
    };
    let additional_cost =
        (item.preparation_cost_per_meter + item.cleaning_cost_per_meter) * quantity;

    let total_cost = material_cost + labor_cost + equipment_cost + fixed_cost + additional_cost;

    let area = quantity * layers as f64;
    let (mut total_price, unit_price, pricing_method) =
        match positive_opt(item.desired_profit_percent) {
            Some(percent) => {
                let price = total_cost + total_cost * percent / 100.0;
                (price, price / area, PricingMethod::ProfitPercent)
            }
            None => {
                let unit = identify_price_tier(item, quantity, layers)
                    .map(|m| m.price)
                    .unwrap_or(0.0);
                (unit * area, unit, PricingMethod::Tiers)
            }
        };

    // Misconfigured tiers must not show a loss.
    if total_price < total_cost {
        total_price = total_cost;
    }

    let total_profit = total_price - total_cost;
    let profit_percent = if total_cost > 0.0 {
        Some(round_2_decimals(total_profit / total_cost * 100.0))
    } else if total_price > 0.0 {
        None
    } else {
        Some(0.0)
    };

    Some(ItemMetrics {
        unit_price_customer: round_2_decimals(unit_price),
        total_customer_price: round_2_decimals(total_price),
        material_cost_total: round_2_decimals(material_cost),
        labor_cost_total: round_2_decimals(labor_cost),
        equipment_cost_total: round_2_decimals(equipment_cost),
        fixed_project_cost: round_2_decimals(fixed_cost),
        additional_cost_total: round_2_decimals(additional_cost),
        total_contractor_cost: round_2_decimals(total_cost),
        total_profit: round_2_decimals(total_profit),
        profit_percent,
        work_days,
        buckets_needed,
        raw_work_days,
        unit_price_labor: round_2_decimals(labor_cost / quantity),
        pricing_method,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintRequirements {
    pub total_buckets_final: f64,
    pub total_work_days_final: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintContractorCosts {
    pub material_cost: f64,
    pub labor_cost: f64,
    pub work_days: f64,
    pub total_cost: f64,
    pub total_cost_per_unit: f64,
    pub requirements: PaintRequirements,
}

/// Unrounded contractor cost of painting `quantity` m² with `layers` coats.
pub fn paint_contractor_costs(item: &CatalogItem, quantity: f64, layers: u32) -> PaintContractorCosts {
    if !quantity.is_finite() || quantity <= 0.0 {
        return PaintContractorCosts::default();
    }

    let cost_per_bucket = item.paint_bucket_price();
    let coverage = positive(item.coverage).unwrap_or(20.0);
    let daily_output = positive(item.daily_output).unwrap_or(50.0);
    let day_rate = positive(item.paint_labor_day_rate()).unwrap_or(500.0);

    let painted_area = quantity * layers as f64;
    let buckets = painted_area / coverage;
    let work_days = painted_area / daily_output;
    let material_cost = buckets * cost_per_bucket;
    let labor_cost = work_days * day_rate;
    let total_cost = material_cost + labor_cost;

    PaintContractorCosts {
        material_cost,
        labor_cost,
        work_days,
        total_cost,
        total_cost_per_unit: total_cost / quantity,
        requirements: PaintRequirements {
            total_buckets_final: round_1_decimal(buckets),
            total_work_days_final: round_1_decimal(work_days),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaintOptions {
    pub layers: u32,
    pub round_buckets: bool,
    pub round_work_days: bool,
    pub difficulty_multiplier: f64,
}

impl Default for PaintOptions {
    fn default() -> Self {
        Self {
            layers: 1,
            round_buckets: true,
            round_work_days: false,
            difficulty_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintCostMetrics {
    pub total_cost: f64,
    pub cost_per_meter: f64,
    pub total_material_cost: f64,
    pub total_labor_cost: f64,
    pub total_work_days: f64,
    pub final_work_days: f64,
    pub total_buckets_needed: f64,
    pub final_buckets: f64,
}

pub fn exact_paint_metrics(item: &CatalogItem, square_meters: f64, opts: &PaintOptions) -> PaintCostMetrics {
    if !square_meters.is_finite() || square_meters <= 0.0 || opts.layers == 0 {
        return PaintCostMetrics::default();
    }

    let bucket_price = item.paint_bucket_price();
    let day_rate = item.paint_labor_day_rate();
    let per_meter_other = positive(item.equipment_cost).unwrap_or(item.additional_cost)
        + item.cleaning_cost_per_meter
        + item.preparation_cost_per_meter;
    let multiplier = positive(opts.difficulty_multiplier).unwrap_or(1.0);

    let mut buckets = 0.0_f64;
    let mut work_days = 0.0_f64;
    if let Some(last) = item.layer_settings.last() {
        for i in 0..opts.layers as usize {
            let setting = item.layer_settings.get(i).unwrap_or(last);
            let coverage = positive_opt(setting.coverage).unwrap_or(item.coverage);
            let output = positive_opt(setting.daily_output).unwrap_or(item.daily_output);
            if coverage > 0.0 {
                buckets += square_meters / coverage;
            }
            if output > 0.0 {
                work_days += square_meters / output;
            }
        }
    } else {
        let layers = opts.layers as f64;
        if item.coverage > 0.0 {
            buckets = square_meters / item.coverage * layers;
        }
        if item.daily_output > 0.0 {
            work_days = square_meters / item.daily_output * layers;
        }
    }

    let final_buckets = if opts.round_buckets {
        buckets.ceil()
    } else {
        buckets
    };
    let final_work_days = if opts.round_work_days {
        work_days.ceil()
    } else {
        work_days
    };
    let material_cost = final_buckets * bucket_price;
    let labor_cost = final_work_days * day_rate;
    let other_costs = per_meter_other * square_meters;
    let total_cost = (material_cost + labor_cost + other_costs) * multiplier;

    PaintCostMetrics {
        total_cost: round_half_up(total_cost),
        cost_per_meter: round_2_decimals(total_cost / square_meters),
        total_material_cost: round_half_up(material_cost),
        total_labor_cost: round_half_up(labor_cost),
        total_work_days: round_1_decimal(work_days),
        final_work_days: round_1_decimal(final_work_days),
        total_buckets_needed: round_2_decimals(buckets),
        final_buckets,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintPriceMetrics {
    #[serde(flatten)]
    pub cost: PaintCostMetrics,
    pub total_profit: f64,
    pub profit_percentage: f64,
    pub selling_price: f64,
    pub selling_price_per_meter: f64,
}

pub fn paint_metrics(
    item: &CatalogItem,
    square_meters: f64,
    opts: &PaintOptions,
    desired_profit_percent: f64,
) -> PaintPriceMetrics {
    if !square_meters.is_finite() || square_meters <= 0.0 || opts.layers == 0 {
        return PaintPriceMetrics::default();
    }
    let cost = exact_paint_metrics(item, square_meters, opts);
    let percent = if desired_profit_percent.is_finite() {
        desired_profit_percent
    } else {
        0.0
    };
    let profit = cost.total_cost * percent / 100.0;
    let selling_price = cost.total_cost + profit;
    let profit_percentage = if cost.total_cost > 0.0 {
        profit / cost.total_cost * 100.0
    } else {
        0.0
    };

    PaintPriceMetrics {
        total_profit: round_half_up(profit),
        profit_percentage: round_2_decimals(profit_percentage),
        selling_price: round_half_up(selling_price),
        selling_price_per_meter: round_2_decimals(selling_price / square_meters),
        cost,
    }
}

/// User-level fallbacks for panel settings, taken from the tiling defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelDefaults {
    pub panel_labor_work_capacity: Option<f64>,
    pub panel_utilization_percent: Option<f64>,
    pub labor_cost_per_day: Option<f64>,
    pub desired_profit_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelCosts {
    pub total_material_cost: f64,
    pub total_labor_cost: f64,
    pub total_cost: f64,
    pub profit: f64,
    pub selling_price: f64,
    pub work_days: f64,
    pub material_cost_per_linear_meter: f64,
    pub labor_cost_per_linear_meter: f64,
    pub cost_per_linear_meter: f64,
    pub selling_price_per_linear_meter: f64,
    pub panel_labor_work_capacity: f64,
    pub panel_utilization_percent: f64,
    pub tile_material_cost_per_sq_m: f64,
}

pub fn supports_panel(item: &CatalogItem) -> bool {
    item.has_panel
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSettings {
    pub panel_labor_work_capacity: f64,
    pub panel_utilization_percent: f64,
}

impl PanelSettings {
    pub fn is_valid(&self) -> bool {
        self.panel_labor_work_capacity > 0.0
            && self.panel_utilization_percent > 0.0
            && self.panel_utilization_percent <= 100.0
    }
}

pub fn panel_settings(item: &CatalogItem, defaults: &PanelDefaults) -> Option<PanelSettings> {
    if !item.has_panel {
        return None;
    }
    Some(PanelSettings {
        panel_labor_work_capacity: positive_opt(item.panel_labor_work_capacity)
            .or(positive_opt(defaults.panel_labor_work_capacity))
            .unwrap_or(0.0),
        panel_utilization_percent: positive_opt(item.panel_utilization_percent)
            .or(positive_opt(defaults.panel_utilization_percent))
            .unwrap_or(0.0),
    })
}

/// Cost of a panel strip priced per linear meter, derived from the tile's
/// per-m² material cost and the crew's daily linear-meter capacity.
pub fn panel_costs(item: &CatalogItem, linear_meters: f64, defaults: &PanelDefaults) -> PanelCosts {
    if !linear_meters.is_finite() || linear_meters <= 0.0 {
        return PanelCosts::default();
    }

    let capacity = positive_opt(item.panel_labor_work_capacity)
        .or(positive_opt(defaults.panel_labor_work_capacity))
        .unwrap_or(50.0);
    let utilization = item
        .panel_utilization_percent
        .filter(|v| v.is_finite() && *v >= 0.0)
        .or(positive_opt(defaults.panel_utilization_percent))
        .unwrap_or(30.0);
    let tile_cost = item.material_cost;

    let material_per_meter = tile_cost * utilization / 100.0;
    let total_material = material_per_meter * linear_meters;

    let work_days = linear_meters / capacity;
    let day_rate = positive(item.labor_cost_per_day)
        .or(positive_opt(defaults.labor_cost_per_day))
        .unwrap_or(0.0);
    let total_labor = work_days * day_rate;

    let total_cost = total_material + total_labor;
    let profit_percent = positive_opt(item.desired_profit_percent)
        .or(positive_opt(defaults.desired_profit_percent))
        .unwrap_or(0.0);
    let profit = total_cost * profit_percent / 100.0;
    let selling_price = total_cost + profit;

    PanelCosts {
        total_material_cost: round_half_up(total_material),
        total_labor_cost: round_half_up(total_labor),
        total_cost: round_half_up(total_cost),
        profit: round_half_up(profit),
        selling_price: round_half_up(selling_price),
        work_days: round_1_decimal(work_days),
        material_cost_per_linear_meter: round_half_up(total_material / linear_meters),
        labor_cost_per_linear_meter: round_half_up(total_labor / linear_meters),
        cost_per_linear_meter: round_half_up(total_cost / linear_meters),
        selling_price_per_linear_meter: round_half_up(selling_price / linear_meters),
        panel_labor_work_capacity: capacity,
        panel_utilization_percent: utilization,
        tile_material_cost_per_sq_m: tile_cost,
    }
}

pub fn panel_quick_price(item: &CatalogItem, linear_meters: f64, defaults: &PanelDefaults) -> f64 {
    panel_costs(item, linear_meters, defaults).selling_price
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TilingMetrics {
    pub valid_area: f64,
    pub work_days: f64,
    pub billable_work_days: f64,
    pub tiles_area_with_wastage: f64,
    pub total_materials_cost: f64,
    pub total_labor_cost: f64,
    pub total_cost: f64,
    pub customer_price: f64,
    pub profit: f64,
    pub profit_percentage: f64,
    pub cost_per_meter: f64,
    pub price_per_meter: f64,
}

pub fn tiling_metrics(item: &CatalogItem, area: f64) -> TilingMetrics {
    let valid_area = if area.is_finite() { area.max(0.0) } else { 0.0 };
    if valid_area <= 0.0 || item.daily_output <= 0.0 {
        return TilingMetrics::default();
    }

    let day_rate = positive(item.labor_cost_per_day).unwrap_or(item.worker_daily_cost);
    let work_days = valid_area / item.daily_output;
    let billable_work_days = work_days.ceil().max(1.0);

    let wastage_factor = 1.0 + item.wastage_percent / 100.0;
    let tiles_area = if item.material_cost > 0.0 {
        valid_area * wastage_factor
    } else {
        valid_area
    };
    let materials =
        round_half_up(item.material_cost * tiles_area + item.additional_cost * valid_area);
    let labor = round_half_up(billable_work_days * day_rate);
    let total_cost = materials + labor;

    let profit_percent =
        positive_opt(item.desired_profit_percent).unwrap_or(DEFAULT_MINIMUM_PROFIT_PERCENT);
    let profit = total_cost * profit_percent / 100.0;
    let customer_price = round_half_up(total_cost + profit);

    TilingMetrics {
        valid_area,
        work_days,
        billable_work_days,
        tiles_area_with_wastage: tiles_area,
        total_materials_cost: materials,
        total_labor_cost: labor,
        total_cost,
        customer_price,
        profit,
        profit_percentage: if total_cost > 0.0 {
            profit / total_cost * 100.0
        } else {
            0.0
        },
        cost_per_meter: total_cost / valid_area,
        price_per_meter: customer_price / valid_area,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitCheck {
    pub current_profit_percent: f64,
    pub current_total_price: f64,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_price: Option<f64>,
    pub needs_adjustment: bool,
}

/// Compares a quote's margin against a minimum; `None` without a positive
/// revenue and cost.
pub fn check_profit_margin(revenue: f64, cost: f64, minimum_percent: f64) -> Option<ProfitCheck> {
    if !(revenue > 0.0) || !(cost > 0.0) {
        return None;
    }
    let profit_percent = (revenue - cost) / cost * 100.0;
    let needs_adjustment = profit_percent < minimum_percent;
    Some(ProfitCheck {
        current_profit_percent: profit_percent,
        current_total_price: revenue,
        total_cost: cost,
        recommended_price: needs_adjustment
            .then(|| (cost * (1.0 + minimum_percent / 100.0)).ceil()),
        needs_adjustment,
    })
}

/// Per-unit client price for subcontracted items.
pub fn client_price(cost: f64, profit_percent: f64) -> f64 {
    let cost = if cost.is_finite() { cost } else { 0.0 };
    let pp = if profit_percent.is_finite() {
        profit_percent
    } else {
        0.0
    };
    round_half_up(cost * (1.0 + pp / 100.0)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiered(tiers: &[(f64, f64)]) -> CatalogItem {
        CatalogItem {
            id: "t".into(),
            price_tiers: tiers
                .iter()
                .map(|(max, price)| PriceTier {
                    max: *max,
                    price: *price,
                    prices_by_layer: BTreeMap::new(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn tier_ranges_follow_previous_upper_bound() {
        let item = tiered(&[(20.0, 90.0), (10.0, 100.0)]);
        let m = identify_price_tier(&item, 5.0, 1).expect("match");
        assert_eq!(m.range, "1 - 10");
        assert_eq!(m.price, 100.0);
        let m = identify_price_tier(&item, 15.0, 1).expect("match");
        assert_eq!(m.range, "11 - 20");
        assert_eq!(m.price, 90.0);
        let m = identify_price_tier(&item, 25.0, 1).expect("match");
        assert_eq!(m.range, "20+");
        assert_eq!(m.price, 90.0);
    }

    #[test]
    fn zero_priced_tier_borrows_from_lower_tier() {
        let item = tiered(&[(10.0, 100.0), (20.0, 0.0)]);
        let m = identify_price_tier(&item, 15.0, 1).expect("match");
        assert_eq!(m.price, 100.0);
    }

    #[test]
    fn non_positive_quantity_has_no_tier() {
        let item = tiered(&[(10.0, 100.0)]);
        assert!(identify_price_tier(&item, 0.0, 1).is_none());
        assert!(identify_price_tier(&item, -3.0, 1).is_none());
        assert!(identify_price_tier(&item, f64::NAN, 1).is_none());
    }

    #[test]
    fn validate_rejects_negative_costs() {
        let item = CatalogItem {
            id: "neg".into(),
            bucket_price: -1.0,
            ..Default::default()
        };
        let e = item.validate().expect_err("negative bucket price");
        assert_eq!(e.code, "bad_params");
    }

    #[test]
    fn client_price_rounds_like_the_catalog_editor() {
        assert_eq!(client_price(120.0, 40.0), 168.0);
        assert_eq!(client_price(0.0, 40.0), 0.0);
        assert_eq!(client_price(99.5, 0.0), 100.0);
    }
}
