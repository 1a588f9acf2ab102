use thiserror::Error;

pub const MIN_GRID_PERCENT: f64 = 0.1;
pub const MAX_GRID_PERCENT: f64 = 20.0;
pub const MAX_GRID_LEVELS: usize = 1000;

/// Relative slack when comparing a level price against the end price.
const PRICE_EPSILON: f64 = 1e-9;

#[derive(Debug, Error, PartialEq)]
pub enum GridPlanError {
    #[error("{0} must be a number")]
    NotNumeric(&'static str),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("grid step must be between {MIN_GRID_PERCENT}% and {MAX_GRID_PERCENT}%, got {0}%")]
    PercentOutOfRange(f64),
    #[error("{side:?} grid needs start price {expected} end price")]
    InvalidRange {
        side: GridSide,
        expected: &'static str,
    },
    #[error("plan would exceed {MAX_GRID_LEVELS} levels")]
    TooManyLevels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSide {
    /// Buys while the price falls, spending equal currency per level.
    Long,
    /// Sells while the price rises, selling equal units per level.
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridInputs {
    pub start_price: f64,
    pub end_price: f64,
    pub grid_percent: f64,
    pub start_asset: f64,
}

impl GridInputs {
    pub fn parse(
        start_price: &str,
        end_price: &str,
        grid_percent: &str,
        start_asset: &str,
    ) -> Result<Self, GridPlanError> {
        let inputs = Self {
            start_price: parse_number("start price", start_price)?,
            end_price: parse_number("end price", end_price)?,
            grid_percent: parse_number("grid percent", grid_percent)?,
            start_asset: parse_number("start asset", start_asset)?,
        };
        inputs.validate()?;
        Ok(inputs)
    }

    pub fn validate(&self) -> Result<(), GridPlanError> {
        for (name, value) in [
            ("start price", self.start_price),
            ("end price", self.end_price),
            ("grid percent", self.grid_percent),
            ("start asset", self.start_asset),
        ] {
            if !value.is_finite() {
                return Err(GridPlanError::NotNumeric(name));
            }
            if value <= 0.0 {
                return Err(GridPlanError::NotPositive(name));
            }
        }
        if !(MIN_GRID_PERCENT..=MAX_GRID_PERCENT).contains(&self.grid_percent) {
            return Err(GridPlanError::PercentOutOfRange(self.grid_percent));
        }
        Ok(())
    }
}

fn parse_number(name: &'static str, raw: &str) -> Result<f64, GridPlanError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(GridPlanError::NotNumeric(name))
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridLevel {
    pub index: usize,
    pub price: f64,
    /// Units bought (long) or sold (short) at this level.
    pub quantity: f64,
    /// Currency spent (long) or received (short) at this level.
    pub currency: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridPlan {
    pub side: GridSide,
    pub levels: Vec<GridLevel>,
    pub total_quantity: f64,
    pub total_currency: f64,
}

impl GridPlan {
    pub fn average_price(&self) -> Option<f64> {
        (self.total_quantity > 0.0).then(|| self.total_currency / self.total_quantity)
    }
}

pub fn plan(side: GridSide, inputs: &GridInputs) -> Result<GridPlan, GridPlanError> {
    inputs.validate()?;
    let step = inputs.grid_percent / 100.0;
    let prices = match side {
        GridSide::Long => {
            if inputs.start_price <= inputs.end_price {
                return Err(GridPlanError::InvalidRange {
                    side,
                    expected: "above",
                });
            }
            level_prices(inputs.start_price, 1.0 - step, |p| {
                p >= inputs.end_price * (1.0 - PRICE_EPSILON)
            })?
        }
        GridSide::Short => {
            if inputs.end_price <= inputs.start_price {
                return Err(GridPlanError::InvalidRange {
                    side,
                    expected: "below",
                });
            }
            level_prices(inputs.start_price, 1.0 + step, |p| {
                p <= inputs.end_price * (1.0 + PRICE_EPSILON)
            })?
        }
    };

    let share = inputs.start_asset / prices.len() as f64;
    let levels: Vec<GridLevel> = prices
        .into_iter()
        .enumerate()
        .map(|(index, price)| match side {
            GridSide::Long => GridLevel {
                index,
                price,
                quantity: share / price,
                currency: share,
            },
            GridSide::Short => GridLevel {
                index,
                price,
                quantity: share,
                currency: share * price,
            },
        })
        .collect();

    Ok(GridPlan {
        side,
        total_quantity: levels.iter().map(|l| l.quantity).sum(),
        total_currency: levels.iter().map(|l| l.currency).sum(),
        levels,
    })
}

fn level_prices(
    start: f64,
    factor: f64,
    in_range: impl Fn(f64) -> bool,
) -> Result<Vec<f64>, GridPlanError> {
    let mut prices = Vec::new();
    let mut price = start;
    while in_range(price) {
        if prices.len() == MAX_GRID_LEVELS {
            return Err(GridPlanError::TooManyLevels);
        }
        prices.push(price);
        // from start each time so rounding does not accumulate
        price = start * factor.powi(prices.len() as i32);
    }
    Ok(prices)
}

#[cfg(test)]
#[path = "tests/grid_tests.rs"]
mod tests;
