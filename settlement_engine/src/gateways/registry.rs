use std::{collections::HashMap, fmt::Debug, sync::Arc};

use log::*;

use super::PaymentGateway;

/// Runtime lookup of payment gateways by name.
///
/// Cloning is cheap; clones share the same gateway instances.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<String, Arc<dyn PaymentGateway>>,
}

impl Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry").field("gateways", &self.names()).finish()
    }
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a gateway under its own name. A gateway already registered under that name is replaced.
    pub fn register<G: PaymentGateway + 'static>(&mut self, gateway: G) -> &mut Self {
        self.register_arc(Arc::new(gateway))
    }

    pub fn register_arc(&mut self, gateway: Arc<dyn PaymentGateway>) -> &mut Self {
        let name = gateway.name().to_string();
        if self.gateways.insert(name.clone(), gateway).is_some() {
            warn!("💳️ Payment gateway {name} was registered twice. The last registration wins");
        } else {
            info!("💳️ Payment gateway {name} registered");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(name).cloned()
    }

    /// Registered gateway names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.gateways.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PaymentGateway>> {
        self.gateways.values()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}
