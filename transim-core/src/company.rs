//! Company ledger.

use crate::map::{CompanyId, TileIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Company that owns nothing and may do anything.
pub const OWNER_DEITY: CompanyId = u8::MAX;

/// Who a command is issued on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    Company(CompanyId),
    /// Game scripts and the server itself.
    Deity,
    /// A participant watching without a company.
    Spectator,
}

impl Actor {
    pub fn company(self) -> Option<CompanyId> {
        match self {
            Actor::Company(c) => Some(c),
            Actor::Deity => Some(OWNER_DEITY),
            Actor::Spectator => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExpenseType {
    Construction,
    NewVehicles,
    TrainRun,
    ShipRun,
    Property,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub money: i64,
    pub loan: i64,
    pub max_loan: i64,
    /// Tile of the last successful construction, for the viewport to follow.
    pub last_build_tile: Option<TileIndex>,
    pub bankrupt: bool,
    /// Running totals per category.
    pub expenses: BTreeMap<ExpenseType, i64>,
}

impl Company {
    pub fn new(money: i64) -> Self {
        Self {
            money,
            loan: 0,
            max_loan: 0,
            last_build_tile: None,
            bankrupt: false,
            expenses: BTreeMap::new(),
        }
    }

    /// Money that can still be spent, counting the unused loan allowance.
    pub fn available_money(&self) -> i64 {
        self.money + (self.max_loan - self.loan).max(0)
    }

    pub fn subtract(&mut self, expense: ExpenseType, cost: i64) {
        if cost == 0 {
            return;
        }
        self.money -= cost;
        *self.expenses.entry(expense).or_insert(0) += cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtract_books_expense() {
        let mut c = Company::new(500);
        c.subtract(ExpenseType::Construction, 120);
        c.subtract(ExpenseType::Construction, 30);
        c.subtract(ExpenseType::Other, -50);
        assert_eq!(c.money, 400);
        assert_eq!(c.expenses[&ExpenseType::Construction], 150);
        assert_eq!(c.expenses[&ExpenseType::Other], -50);
    }

    #[test]
    fn test_available_money_counts_loan_headroom() {
        let mut c = Company::new(100);
        c.max_loan = 300;
        c.loan = 100;
        assert_eq!(c.available_money(), 300);
    }
}
