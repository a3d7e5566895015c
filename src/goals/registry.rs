//! Vertical adapter registry.
//!
//! Write-once at startup, then shared read-only across requests.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::adapter::VerticalAdapter;
use super::{CoachingAdapter, FinanceAdapter, NetworkMarketingAdapter, RealEstateAdapter};
use crate::types::{VerticalId, VerticalInfo};

/// Shared adapter handle
pub type SharedAdapter = Arc<dyn VerticalAdapter>;

/// Maps `vertical_id → adapter`
pub struct VerticalRegistry {
    adapters: HashMap<VerticalId, SharedAdapter>,
    default_vertical: VerticalId,
    fallback: SharedAdapter,
}

impl Default for VerticalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VerticalRegistry {
    /// Registry with the four standard adapters; network marketing is the default
    pub fn new() -> Self {
        let fallback: SharedAdapter = Arc::new(NetworkMarketingAdapter::default());
        let mut registry = Self {
            adapters: HashMap::new(),
            default_vertical: VerticalId::NetworkMarketing,
            fallback: Arc::clone(&fallback),
        };
        registry.register(fallback);
        registry.register(Arc::new(RealEstateAdapter::default()));
        registry.register(Arc::new(FinanceAdapter::default()));
        registry.register(Arc::new(CoachingAdapter::default()));
        registry
    }

    /// Change the vertical used for unknown ids
    pub fn with_default(mut self, vertical: VerticalId) -> Self {
        if let Some(adapter) = self.adapters.get(&vertical) {
            self.fallback = Arc::clone(adapter);
            self.default_vertical = vertical;
        } else {
            warn!("Default vertical {} is not registered; keeping {}", vertical, self.default_vertical);
        }
        self
    }

    /// Register or replace the adapter for its vertical
    pub fn register(&mut self, adapter: SharedAdapter) {
        let id = adapter.vertical_id();
        if id == self.default_vertical {
            self.fallback = Arc::clone(&adapter);
        }
        self.adapters.insert(id, adapter);
    }

    pub fn default_vertical(&self) -> VerticalId {
        self.default_vertical
    }

    /// Exact lookup; `None` for unknown or unregistered ids
    pub fn get_adapter(&self, vertical_id: &str) -> Option<SharedAdapter> {
        let id: VerticalId = vertical_id.parse().ok()?;
        self.adapters.get(&id).cloned()
    }

    /// Lookup that never fails: unknown ids resolve to the default adapter with a warning
    pub fn get_or_default(&self, vertical_id: &str) -> SharedAdapter {
        match self.get_adapter(vertical_id) {
            Some(adapter) => adapter,
            None => {
                warn!(
                    "Unknown vertical '{}', falling back to {}",
                    vertical_id, self.default_vertical
                );
                Arc::clone(&self.fallback)
            }
        }
    }

    /// Registered verticals with labels and KPIs, in declaration order
    pub fn list_verticals(&self) -> Vec<VerticalInfo> {
        VerticalId::ALL
            .iter()
            .filter_map(|id| self.adapters.get(id))
            .map(|adapter| VerticalInfo {
                id: adapter.vertical_id(),
                label: adapter.label().to_string(),
                kpis: adapter.kpi_definitions(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registration() {
        let registry = VerticalRegistry::new();
        let verticals = registry.list_verticals();
        assert_eq!(verticals.len(), 4);
        assert_eq!(verticals[0].id, VerticalId::NetworkMarketing);
        assert_eq!(verticals[1].label, "Real Estate");
        assert!(verticals.iter().all(|v| v.kpis.iter().any(|k| k.is_primary)));
    }

    #[test]
    fn test_get_adapter_exact() {
        let registry = VerticalRegistry::new();
        let adapter = registry.get_adapter("real_estate").unwrap();
        assert_eq!(adapter.vertical_id(), VerticalId::RealEstate);
        assert!(registry.get_adapter("insurance").is_none());
    }

    #[test]
    fn test_unknown_vertical_falls_back() {
        let registry = VerticalRegistry::new();
        let adapter = registry.get_or_default("insurance");
        assert_eq!(adapter.vertical_id(), VerticalId::NetworkMarketing);
    }

    #[test]
    fn test_custom_default() {
        let registry = VerticalRegistry::new().with_default(VerticalId::Coaching);
        assert_eq!(registry.default_vertical(), VerticalId::Coaching);
        assert_eq!(
            registry.get_or_default("").vertical_id(),
            VerticalId::Coaching
        );
    }

    #[test]
    fn test_register_replaces_adapter() {
        let mut registry = VerticalRegistry::new();
        registry.register(Arc::new(RealEstateAdapter {
            avg_commission_per_deal: 20_000.0,
            ..RealEstateAdapter::default()
        }));
        let adapter = registry.get_adapter("real_estate").unwrap();
        let input = crate::types::GoalInput::new(
            VerticalId::RealEstate,
            crate::types::GoalType::Income,
            20_000.0,
            3,
        );
        assert_eq!(adapter.compute_goal_breakdown(&input).unwrap().primary_units, 3);
    }
}
