//! Product access flags and the deltas applied to them on purchase.

use crate::product::ProductId;

use super::User;

/// Set of product entitlements, either held by a user or to be granted to
/// one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Access {
    pub guide: bool,
    pub planner: bool,
    pub freebie: bool,
}

impl Access {
    pub const GUIDE_AND_PLANNER: Access = Access {
        guide: true,
        planner: true,
        freebie: false,
    };

    /// Computes the entitlements granted by purchasing the product.
    ///
    /// The Guide bundles the Planner, and a BOGO purchase gives the buyer
    /// the same as buying the Guide. Collective memberships don't grant any
    /// product access.
    pub fn for_product(product: ProductId) -> Self {
        match product {
            ProductId::Guide | ProductId::Bogo => Self::GUIDE_AND_PLANNER,
            ProductId::Planner => Access {
                planner: true,
                ..Default::default()
            },
            ProductId::Freebie => Access {
                freebie: true,
                ..Default::default()
            },
            ProductId::CollectiveMonthly | ProductId::CollectiveYearly => Access::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Access::default()
    }
}

impl User {
    pub fn access(&self) -> Access {
        Access {
            guide: self.owns_guide,
            planner: self.owns_planner,
            freebie: self.owns_freebie,
        }
    }

    /// Grants the provided entitlements. Flags are only ever raised here,
    /// never lowered. Returns true if anything changed.
    pub fn grant(&mut self, access: Access) -> bool {
        let before = self.access();
        self.owns_guide |= access.guide;
        self.owns_planner |= access.planner;
        self.owns_freebie |= access.freebie;
        before != self.access()
    }
}
