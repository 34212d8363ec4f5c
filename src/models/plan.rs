// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Charging plans offered after a successful scan.

use serde::Serialize;

/// A purchasable charging plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: &'static str,
    pub label: &'static str,
    /// Price in whole currency units
    pub price: u64,
}

/// Plans shown on the charging page, in display order.
///
/// The two test plans exist so the hardware can be exercised with a ₹1/₹2
/// payment.
pub const PLANS: [Plan; 5] = [
    Plan {
        id: "quick5",
        label: "5 Seconds (Test)",
        price: 1,
    },
    Plan {
        id: "quick10",
        label: "10 Seconds (Test)",
        price: 2,
    },
    Plan {
        id: "plan1",
        label: "30 Minutes",
        price: 100,
    },
    Plan {
        id: "plan2",
        label: "65 Minutes",
        price: 200,
    },
    Plan {
        id: "plan3",
        label: "2 Hours",
        price: 400,
    },
];

/// Look up a plan by id.
pub fn find_plan(id: &str) -> Option<&'static Plan> {
    PLANS.iter().find(|p| p.id == id)
}

impl Plan {
    /// Price in minor currency units, as the checkout widget expects.
    pub fn amount_minor(&self) -> u64 {
        self.price.saturating_mul(100)
    }
}
